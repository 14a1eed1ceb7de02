use super::helpers::create_test_app;
use chrono::Utc;
use futures::TryStreamExt;
use rivalwatch::application::dto::target_request::{CreateTargetRequestDto, UpdateTargetRequestDto};
use rivalwatch::application::usecases::manage_targets::TargetError;
use rivalwatch::domain::models::change::{Change, ChangeKind};
use rivalwatch::domain::models::job::{FailureKind, Job, JobStage, JobStatus};
use rivalwatch::domain::models::notification::{Notification, NotificationKind};
use rivalwatch::domain::models::snapshot::{ExtractedValue, Snapshot};
use rivalwatch::domain::models::target::{ContentCategory, RunOutcome};
use rivalwatch::domain::repositories::job_repository::RepositoryError;
use rivalwatch::domain::repositories::snapshot_repository::Observation;
use uuid::Uuid;

fn create_request(category: ContentCategory, selector: Option<&str>) -> CreateTargetRequestDto {
    CreateTargetRequestDto {
        name: "Acme Store".to_string(),
        url: "https://acme.example.com/pricing".to_string(),
        platform: Some("shopify".to_string()),
        category,
        selector: selector.map(str::to_string),
        interval_secs: None,
    }
}

#[tokio::test]
async fn test_commit_with_stale_hash_rolls_back_everything() {
    let app = create_test_app().await;
    let target = app.seed_price_target().await;
    let now = Utc::now();

    app.snapshots
        .commit_observation(Observation {
            job: None,
            snapshot: Snapshot::capture(target.id, ExtractedValue::Text("$10".to_string()), now),
            previous_hash: None,
            changes: Vec::new(),
            outcome: RunOutcome::Unchanged,
        })
        .await
        .unwrap();
    let baseline = app.snapshots.find_current(target.id).await.unwrap().unwrap();

    let change = Change::new(
        target.id,
        ChangeKind::Price,
        Some("$10".to_string()),
        Some("$12".to_string()),
        1.0,
        now,
    );
    let result = app
        .snapshots
        .commit_observation(Observation {
            job: None,
            snapshot: Snapshot::capture(target.id, ExtractedValue::Text("$12".to_string()), now),
            previous_hash: Some("stale".to_string()),
            changes: vec![change],
            outcome: RunOutcome::Changed,
        })
        .await;
    assert!(matches!(result, Err(RepositoryError::Conflict(_))));

    let current = app.snapshots.find_current(target.id).await.unwrap().unwrap();
    assert_eq!(current.content_hash, baseline.content_hash);
    let changes: Vec<Change> = app.ledger.list_by_target(target.id).try_collect().await.unwrap();
    assert!(changes.is_empty());
    let refreshed = app.targets.find_by_id(target.id).await.unwrap().unwrap();
    assert_eq!(refreshed.last_outcome, Some(RunOutcome::Unchanged));
}

#[tokio::test]
async fn test_second_baseline_for_same_target_conflicts() {
    let app = create_test_app().await;
    let target = app.seed_price_target().await;

    let observation = Observation {
        job: None,
        snapshot: Snapshot::capture(target.id, ExtractedValue::Text("$10".to_string()), Utc::now()),
        previous_hash: None,
        changes: Vec::new(),
        outcome: RunOutcome::Unchanged,
    };
    app.snapshots.commit_observation(observation.clone()).await.unwrap();

    let result = app.snapshots.commit_observation(observation).await;
    assert!(matches!(result, Err(RepositoryError::Conflict(_))));
}

#[tokio::test]
async fn test_second_in_flight_job_violates_unique_index() {
    let app = create_test_app().await;
    let target = app.seed_price_target().await;

    app.jobs.create(&Job::new(target.id)).await.unwrap();
    let result = app.jobs.create(&Job::new(target.id)).await;
    assert!(matches!(result, Err(RepositoryError::Conflict(_))));
}

#[tokio::test]
async fn test_create_target_applies_defaults() {
    let app = create_test_app().await;
    let target = app
        .manage_targets()
        .create(create_request(ContentCategory::Price, Some("  .price  ")))
        .await
        .unwrap();

    assert!(target.is_active);
    assert_eq!(target.interval_secs, 86_400);
    assert_eq!(target.selector.as_deref(), Some(".price"));
    assert_eq!(target.platform.as_deref(), Some("shopify"));
    assert!(target.last_run_at.is_none());
}

#[tokio::test]
async fn test_product_target_requires_selector() {
    let app = create_test_app().await;
    let result = app
        .manage_targets()
        .create(create_request(ContentCategory::Product, None))
        .await;
    assert!(matches!(result, Err(TargetError::Validation(_))));
}

#[tokio::test]
async fn test_update_keeps_run_record() {
    let app = create_test_app().await;
    let target = app.seed_price_target().await;
    let ran_at = Utc::now();
    app.targets
        .record_run(target.id, ran_at, RunOutcome::Changed)
        .await
        .unwrap();

    let updated = app
        .manage_targets()
        .update(
            target.id,
            UpdateTargetRequestDto {
                name: Some("Renamed".to_string()),
                interval_secs: Some(600),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(updated.name, "Renamed");
    assert_eq!(updated.interval_secs, 600);
    assert_eq!(updated.last_outcome, Some(RunOutcome::Changed));
    assert!(updated.last_run_at.is_some());
}

#[tokio::test]
async fn test_delete_target_with_changes_is_refused() {
    let app = create_test_app().await;
    let target = app.seed_price_target().await;
    app.seed_change(&target, "$10", "$12").await;

    let result = app.manage_targets().delete(target.id).await;
    assert!(matches!(result, Err(TargetError::Referenced(_))));
    assert!(app.targets.find_by_id(target.id).await.unwrap().is_some());
}

#[tokio::test]
async fn test_commit_for_reclaimed_job_writes_nothing() {
    let app = create_test_app().await;
    let target = app.seed_price_target().await;
    app.snapshots
        .commit_observation(Observation {
            job: None,
            snapshot: Snapshot::capture(target.id, ExtractedValue::Text("$10".to_string()), Utc::now()),
            previous_hash: None,
            changes: Vec::new(),
            outcome: RunOutcome::Unchanged,
        })
        .await
        .unwrap();
    let baseline = app.snapshots.find_current(target.id).await.unwrap().unwrap();

    app.scheduler.schedule_one(target.id).await.unwrap();
    let job = app.queue.dequeue(Uuid::new_v4()).await.unwrap().unwrap();
    let completed = job
        .advance(JobStage::Extracting)
        .and_then(|job| job.advance(JobStage::Diffing))
        .and_then(|job| job.advance(JobStage::Persisting))
        .and_then(|job| job.complete(1))
        .unwrap();
    app.scheduler.recover_interrupted().await.unwrap();

    let next = Snapshot::capture(target.id, ExtractedValue::Text("$12".to_string()), Utc::now());
    let change = Change::new(
        target.id,
        ChangeKind::Price,
        Some("$10".to_string()),
        Some("$12".to_string()),
        1.0,
        next.captured_at,
    );
    let result = app
        .snapshots
        .commit_observation(Observation {
            job: Some(completed.clone()),
            snapshot: next,
            previous_hash: Some(baseline.content_hash.clone()),
            changes: vec![change],
            outcome: RunOutcome::Changed,
        })
        .await;
    assert!(matches!(result, Err(RepositoryError::JobNotActive(id)) if id == completed.id));

    let result = app.snapshots.touch(target.id, Utc::now(), Some(&completed)).await;
    assert!(matches!(result, Err(RepositoryError::JobNotActive(_))));

    let current = app.snapshots.find_current(target.id).await.unwrap().unwrap();
    assert_eq!(current, baseline);
    let changes: Vec<Change> = app.ledger.list_by_target(target.id).try_collect().await.unwrap();
    assert!(changes.is_empty());

    let job = app.jobs.find_by_id(completed.id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.failure_kind, Some(FailureKind::Interrupted));
}

#[tokio::test]
async fn test_delete_target_removes_snapshot_and_jobs() {
    let app = create_test_app().await;
    let target = app.seed_price_target().await;
    app.snapshots
        .commit_observation(Observation {
            job: None,
            snapshot: Snapshot::capture(target.id, ExtractedValue::Text("$10".to_string()), Utc::now()),
            previous_hash: None,
            changes: Vec::new(),
            outcome: RunOutcome::Unchanged,
        })
        .await
        .unwrap();
    let job = app.scheduler.schedule_one(target.id).await.unwrap();

    app.manage_targets().delete(target.id).await.unwrap();

    assert!(app.targets.find_by_id(target.id).await.unwrap().is_none());
    assert!(app.snapshots.find_current(target.id).await.unwrap().is_none());
    assert!(app.jobs.find_by_id(job.id).await.unwrap().is_none());
    assert!(matches!(
        app.manage_targets().get(target.id).await,
        Err(TargetError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_attach_insight_only_once() {
    let app = create_test_app().await;
    let target = app.seed_price_target().await;
    let change = app.seed_change(&target, "$10", "$12").await;

    assert!(app.changes.attach_insight(change.id, "first").await.unwrap());
    assert!(!app.changes.attach_insight(change.id, "second").await.unwrap());

    let stored = app.changes.find_by_id(change.id).await.unwrap().unwrap();
    assert_eq!(stored.insight.as_deref(), Some("first"));
}

#[tokio::test]
async fn test_notifications_read_state() {
    let app = create_test_app().await;
    let first = app
        .notification_repo
        .create(&Notification::new(NotificationKind::Alert, "one", "body"))
        .await
        .unwrap();
    app.notification_repo
        .create(&Notification::new(NotificationKind::Report, "two", "body"))
        .await
        .unwrap();

    assert_eq!(app.notification_repo.unread_count().await.unwrap(), 2);
    app.notification_repo.mark_read(first.id).await.unwrap();
    assert_eq!(app.notification_repo.unread_count().await.unwrap(), 1);

    assert!(matches!(
        app.notification_repo.mark_read(Uuid::new_v4()).await,
        Err(RepositoryError::NotFound)
    ));

    assert_eq!(app.notification_repo.mark_all_read().await.unwrap(), 1);
    assert_eq!(app.notification_repo.unread_count().await.unwrap(), 0);

    let listed = app.notification_repo.list(10, 0).await.unwrap();
    assert_eq!(listed.len(), 2);
    assert!(listed.iter().all(|n| n.is_read));
}
