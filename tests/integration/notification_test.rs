use super::helpers::{create_test_app, price_page, RecordingDelivery};
use chrono::Utc;
use rivalwatch::domain::models::change::{Change, ChangeKind};
use rivalwatch::domain::models::notification::{Notification, NotificationKind};
use rivalwatch::domain::services::notification_service::{
    DeliveryError, NotificationDelivery, NotificationError, NotificationService,
};
use rivalwatch::workers::notification_worker::{self, NotificationDispatcher, PipelineEvent};
use std::sync::Arc;
use uuid::Uuid;

fn dispatcher(service: NotificationService, emit_scrape_events: bool) -> NotificationDispatcher {
    let (_sender, receiver) = notification_worker::channel(1);
    NotificationDispatcher::new(receiver, service, emit_scrape_events)
}

fn price_change(target_id: Uuid, old: &str, new: &str) -> Change {
    Change::new(
        target_id,
        ChangeKind::Price,
        Some(old.to_string()),
        Some(new.to_string()),
        1.0,
        Utc::now(),
    )
}

#[tokio::test]
async fn test_each_detected_change_becomes_a_notification() {
    let app = create_test_app().await;
    let target_id = Uuid::new_v4();
    let changes = vec![
        price_change(target_id, "$10", "$12"),
        price_change(target_id, "$5", "$4").with_field("shipping"),
    ];

    dispatcher(app.notifications.clone(), false)
        .dispatch(PipelineEvent::ChangesDetected {
            target_id,
            target_name: "Acme".to_string(),
            changes: changes.clone(),
        })
        .await;

    let stored = app.notifications.list(10).await.unwrap();
    assert_eq!(stored.len(), 2);
    assert!(stored.iter().all(|n| n.kind == NotificationKind::Change));
    assert!(stored.iter().all(|n| n.target_id == Some(target_id)));
    for change in &changes {
        assert!(stored.iter().any(|n| n.change_id == Some(change.id)));
    }
    assert!(stored.iter().any(|n| n.title == "Acme: shipping price change detected"));
    assert_eq!(app.delivery.delivered().len(), 2);
}

#[tokio::test]
async fn test_scrape_events_follow_configuration() {
    let app = create_test_app().await;
    let event = || PipelineEvent::ScrapeCompleted {
        target_id: Uuid::new_v4(),
        target_name: "Acme".to_string(),
        job_id: Uuid::new_v4(),
        changes: 0,
    };

    dispatcher(app.notifications.clone(), false).dispatch(event()).await;
    assert!(app.notifications.list(10).await.unwrap().is_empty());

    dispatcher(app.notifications.clone(), true).dispatch(event()).await;
    let stored = app.notifications.list(10).await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].kind, NotificationKind::Scrape);
}

#[tokio::test]
async fn test_failed_scrape_always_alerts() {
    let app = create_test_app().await;

    dispatcher(app.notifications.clone(), false)
        .dispatch(PipelineEvent::ScrapeFailed {
            target_id: Uuid::new_v4(),
            target_name: "Acme".to_string(),
            job_id: Uuid::new_v4(),
            reason: "Fetch failed after 3 attempt(s)".to_string(),
        })
        .await;

    let stored = app.notifications.list(10).await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].kind, NotificationKind::Alert);
    assert_eq!(stored[0].title, "Scrape failed for Acme");
}

#[tokio::test]
async fn test_delivery_failure_still_records_notification() {
    let app = create_test_app().await;
    app.delivery.fail(true);

    let saved = app
        .notifications
        .publish(Notification::new(NotificationKind::Alert, "title", "message"))
        .await
        .unwrap();

    let stored = app.notifications.list(10).await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].id, saved.id);
    assert!(app.delivery.delivered().is_empty());
}

#[tokio::test]
async fn test_send_test_requires_delivery_channel() {
    let app = create_test_app().await;
    let unconfigured = NotificationService::new(app.notification_repo.clone(), None);

    assert!(matches!(
        unconfigured.send_test().await,
        Err(NotificationError::Delivery(DeliveryError::NotConfigured))
    ));
}

#[tokio::test]
async fn test_send_test_delivers_without_recording() {
    let app = create_test_app().await;
    let delivery = Arc::new(RecordingDelivery::default());
    let service = NotificationService::new(
        app.notification_repo.clone(),
        Some(delivery.clone() as Arc<dyn NotificationDelivery>),
    );

    service.send_test().await.unwrap();
    assert_eq!(delivery.delivered().len(), 1);
    assert!(service.list(10).await.unwrap().is_empty());

    delivery.fail(true);
    assert!(matches!(
        service.send_test().await,
        Err(NotificationError::Delivery(DeliveryError::Rejected(503)))
    ));
}

#[tokio::test]
async fn test_mark_read_unknown_notification() {
    let app = create_test_app().await;
    let id = Uuid::new_v4();
    assert!(matches!(
        app.notifications.mark_read(id).await,
        Err(NotificationError::NotFound(missing)) if missing == id
    ));
}

#[tokio::test]
async fn test_pipeline_change_reaches_delivery() {
    let mut app = create_test_app().await;
    let target = app.seed_price_target().await;
    let worker = app.worker();

    app.fetcher.push_html(price_page("$19.99"));
    app.scheduler.schedule_one(target.id).await.unwrap();
    worker.process_next().await.unwrap();

    app.fetcher.push_html(price_page("$17.49"));
    app.scheduler.schedule_one(target.id).await.unwrap();
    worker.process_next().await.unwrap();

    let dispatcher = dispatcher(app.notifications.clone(), false);
    for event in app.drain_events() {
        dispatcher.dispatch(event).await;
    }

    let delivered = app.delivery.delivered();
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].kind, NotificationKind::Change);
    assert_eq!(delivered[0].target_id, Some(target.id));
    assert_eq!(app.notifications.unread_count().await.unwrap(), 1);
}
