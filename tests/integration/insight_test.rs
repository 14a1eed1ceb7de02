use super::helpers::create_test_app;
use chrono::{Duration, Utc};
use rivalwatch::domain::models::notification::NotificationKind;
use rivalwatch::domain::services::change_ledger::LedgerError;
use rivalwatch::domain::services::insight_service::{
    InsightError, INSIGHT_PLACEHOLDER, RECOMMENDATION_PLACEHOLDER, REPORT_PLACEHOLDER,
    SUMMARY_PLACEHOLDER,
};
use uuid::Uuid;

#[tokio::test]
async fn test_insight_is_generated_at_most_once() {
    let app = create_test_app().await;
    let target = app.seed_price_target().await;
    let change = app.seed_change(&target, "$10", "$12").await;

    let annotated = app.insights.request_insight(change.id).await.unwrap();
    let insight = annotated.insight.clone().unwrap();
    assert!(insight.contains("$10"));
    assert!(insight.contains("$12"));

    let again = app.insights.request_insight(change.id).await;
    assert!(matches!(
        again,
        Err(InsightError::Ledger(LedgerError::AlreadyAnnotated(id))) if id == change.id
    ));
    assert_eq!(app.generator.calls(), 1);

    let stored = app.ledger.get(change.id).await.unwrap();
    assert_eq!(stored.insight, Some(insight));

    let notifications = app.notifications.list(10).await.unwrap();
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0].kind, NotificationKind::Insight);
    assert_eq!(notifications[0].change_id, Some(change.id));
}

#[tokio::test]
async fn test_concurrent_insight_requests_call_generator_once() {
    let app = create_test_app().await;
    let target = app.seed_price_target().await;
    let change = app.seed_change(&target, "$10", "$12").await;
    app.generator.set_delay(std::time::Duration::from_millis(200));

    let (first, second) = tokio::join!(
        app.insights.request_insight(change.id),
        app.insights.request_insight(change.id)
    );

    assert!(first.is_ok());
    assert!(matches!(second, Err(InsightError::InProgress(_))));
    assert_eq!(app.generator.calls(), 1);
}

#[tokio::test]
async fn test_generator_failure_attaches_placeholder() {
    let app = create_test_app().await;
    let target = app.seed_price_target().await;
    let change = app.seed_change(&target, "$10", "$12").await;
    app.generator.fail(true);

    let annotated = app.insights.request_insight(change.id).await.unwrap();
    assert_eq!(annotated.insight.as_deref(), Some(INSIGHT_PLACEHOLDER));
}

#[tokio::test]
async fn test_insight_for_unknown_change_is_not_found() {
    let app = create_test_app().await;
    let result = app.insights.request_insight(Uuid::new_v4()).await;
    assert!(matches!(result, Err(InsightError::Ledger(LedgerError::NotFound(_)))));
    assert_eq!(app.generator.calls(), 0);
}

#[tokio::test]
async fn test_summary_without_changes_skips_generator() {
    let app = create_test_app().await;
    let target = app.seed_price_target().await;

    let summary = app.insights.summarize_target(target.id).await.unwrap();
    assert_eq!(
        summary,
        format!("{} has had no significant changes recently.", target.name)
    );
    assert_eq!(app.generator.calls(), 0);
}

#[tokio::test]
async fn test_summary_uses_recent_changes() {
    let app = create_test_app().await;
    let target = app.seed_price_target().await;
    app.seed_change(&target, "$10", "$12").await;
    app.seed_change(&target, "$12", "$15").await;

    let summary = app.insights.summarize_target(target.id).await.unwrap();
    assert_eq!(summary, format!("{} made 2 change(s)", target.name));

    app.generator.fail(true);
    let fallback = app.insights.summarize_target(target.id).await.unwrap();
    assert_eq!(fallback, SUMMARY_PLACEHOLDER);
}

#[tokio::test]
async fn test_summary_for_unknown_target() {
    let app = create_test_app().await;
    let result = app.insights.summarize_target(Uuid::new_v4()).await;
    assert!(matches!(result, Err(InsightError::TargetNotFound(_))));
}

#[tokio::test]
async fn test_weekly_report_groups_by_target_and_publishes() {
    let app = create_test_app().await;
    let first = app.seed_price_target().await;
    let second = app.seed_price_target().await;
    app.seed_change(&first, "$10", "$12").await;
    app.seed_change(&second, "$99", "$89").await;

    let report = app
        .insights
        .weekly_report(Utc::now() - Duration::days(7))
        .await
        .unwrap();
    assert_eq!(report.summary, "2 competitor(s) active");
    assert_eq!(report.key_changes.len(), 2);

    let notifications = app.notifications.list(10).await.unwrap();
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0].kind, NotificationKind::Report);
    assert_eq!(notifications[0].message, report.summary);
}

#[tokio::test]
async fn test_weekly_report_falls_back_to_placeholder() {
    let app = create_test_app().await;
    app.generator.fail(true);

    let report = app
        .insights
        .weekly_report(Utc::now() - Duration::days(7))
        .await
        .unwrap();
    assert_eq!(report.summary, REPORT_PLACEHOLDER);
    assert!(report.key_changes.is_empty());
    assert!(report.recommendations.is_empty());
}

#[tokio::test]
async fn test_recommendation_for_change() {
    let app = create_test_app().await;
    let target = app.seed_price_target().await;
    let change = app.seed_change(&target, "$10", "$12").await;

    let advice = app.insights.recommend(change.id).await.unwrap();
    assert_eq!(advice, "Respond to the price change");

    app.generator.fail(true);
    let fallback = app.insights.recommend(change.id).await.unwrap();
    assert_eq!(fallback, RECOMMENDATION_PLACEHOLDER);

    let stored = app.ledger.get(change.id).await.unwrap();
    assert!(stored.insight.is_none());
}
