use super::helpers::{create_test_app, HISTORY_PER_TARGET};
use chrono::Utc;
use futures::future::join_all;
use futures::TryStreamExt;
use rivalwatch::domain::models::job::{FailureKind, Job, JobStage, JobStatus};
use rivalwatch::domain::models::target::RunOutcome;
use rivalwatch::queue::scheduler::SchedulerError;
use std::time::Duration;
use uuid::Uuid;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_triggers_admit_exactly_one_job() {
    let app = create_test_app().await;
    let target = app.seed_price_target().await;

    let attempts = (0..8).map(|_| {
        let scheduler = app.scheduler.clone();
        let target_id = target.id;
        tokio::spawn(async move { scheduler.schedule_one(target_id).await })
    });
    let results: Vec<_> = join_all(attempts)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect();

    let admitted = results.iter().filter(|r| r.is_ok()).count();
    let rejected = results
        .iter()
        .filter(|r| matches!(r, Err(SchedulerError::AlreadyInFlight(id)) if *id == target.id))
        .count();
    assert_eq!(admitted, 1);
    assert_eq!(rejected, 7);

    let stats = app.scheduler.stats().await.unwrap();
    assert_eq!(stats.waiting, 1);
}

#[tokio::test]
async fn test_schedule_due_is_idempotent() {
    let app = create_test_app().await;
    let first = app.seed_price_target().await;
    let second = app.seed_price_target().await;

    let enqueued = app.scheduler.schedule_due().await.unwrap();
    assert_eq!(enqueued.len(), 2);

    let again = app.scheduler.schedule_due().await.unwrap();
    assert!(again.is_empty());

    for target_id in [first.id, second.id] {
        let in_flight = app.jobs.find_in_flight(target_id).await.unwrap();
        assert!(in_flight.is_some());
    }
}

#[tokio::test]
async fn test_schedule_due_skips_inactive_and_recent_targets() {
    let app = create_test_app().await;
    let due = app.seed_price_target().await;
    let recent = app.seed_price_target().await;
    let inactive = app.seed_price_target().await;

    app.targets
        .record_run(recent.id, Utc::now(), RunOutcome::Unchanged)
        .await
        .unwrap();
    app.manage_targets().deactivate(inactive.id).await.unwrap();

    let enqueued = app.scheduler.schedule_due().await.unwrap();
    assert_eq!(enqueued.len(), 1);

    let job = app.scheduler.get_job(enqueued[0]).await.unwrap();
    assert_eq!(job.target_id, due.id);
}

#[tokio::test]
async fn test_schedule_one_rejects_unknown_and_inactive_targets() {
    let app = create_test_app().await;

    let missing = Uuid::new_v4();
    assert!(matches!(
        app.scheduler.schedule_one(missing).await,
        Err(SchedulerError::TargetNotFound(id)) if id == missing
    ));

    let target = app.seed_price_target().await;
    app.manage_targets().deactivate(target.id).await.unwrap();
    assert!(matches!(
        app.scheduler.schedule_one(target.id).await,
        Err(SchedulerError::TargetInactive(_))
    ));
}

#[tokio::test]
async fn test_cancel_waiting_job_releases_target() {
    let app = create_test_app().await;
    let target = app.seed_price_target().await;
    let job = app.scheduler.schedule_one(target.id).await.unwrap();

    let cancelled = app.scheduler.cancel_job(job.id).await.unwrap();
    assert_eq!(cancelled.status, JobStatus::Failed);
    assert_eq!(cancelled.failure_kind, Some(FailureKind::Cancelled));
    assert!(cancelled.finished_at.is_some());

    assert!(matches!(
        app.scheduler.cancel_job(job.id).await,
        Err(SchedulerError::NotCancellable(_))
    ));

    let next = app.scheduler.schedule_one(target.id).await.unwrap();
    assert_ne!(next.id, job.id);
    assert_eq!(next.status, JobStatus::Waiting);
}

#[tokio::test]
async fn test_job_past_extraction_cannot_be_cancelled() {
    let app = create_test_app().await;
    let target = app.seed_price_target().await;
    let job = app.scheduler.schedule_one(target.id).await.unwrap();

    app.queue.dequeue(Uuid::new_v4()).await.unwrap().unwrap();
    assert!(app
        .queue
        .advance(job.id, JobStage::Admitted, JobStage::Extracting)
        .await
        .unwrap());

    assert!(matches!(
        app.scheduler.cancel_job(job.id).await,
        Err(SchedulerError::NotCancellable(_))
    ));
    let job = app.scheduler.get_job(job.id).await.unwrap();
    assert_eq!(job.status, JobStatus::Active);
    assert_eq!(job.stage, JobStage::Extracting);
}

#[tokio::test]
async fn test_cancel_unknown_job_is_not_found() {
    let app = create_test_app().await;
    assert!(matches!(
        app.scheduler.cancel_job(Uuid::new_v4()).await,
        Err(SchedulerError::JobNotFound(_))
    ));
}

#[tokio::test]
async fn test_recover_stale_only_reclaims_silent_jobs() {
    let app = create_test_app().await;
    let target = app.seed_price_target().await;
    let stuck = app.scheduler.schedule_one(target.id).await.unwrap();
    app.queue.dequeue(Uuid::new_v4()).await.unwrap().unwrap();

    let reclaimed = app.scheduler.recover_stale(Duration::from_secs(3600)).await.unwrap();
    assert!(reclaimed.is_empty());
    assert_eq!(app.scheduler.get_job(stuck.id).await.unwrap().status, JobStatus::Active);

    tokio::time::sleep(Duration::from_millis(50)).await;
    let readmitted = app.scheduler.recover_stale(Duration::from_millis(10)).await.unwrap();
    assert_eq!(readmitted.len(), 1);

    let stuck = app.scheduler.get_job(stuck.id).await.unwrap();
    assert_eq!(stuck.status, JobStatus::Failed);
    assert_eq!(stuck.failure_kind, Some(FailureKind::Interrupted));
    assert_eq!(
        app.scheduler.get_job(readmitted[0]).await.unwrap().status,
        JobStatus::Waiting
    );
}

#[tokio::test]
async fn test_recover_interrupted_fails_and_readmits() {
    let app = create_test_app().await;
    let target = app.seed_price_target().await;
    let orphan = app.scheduler.schedule_one(target.id).await.unwrap();
    app.queue.dequeue(Uuid::new_v4()).await.unwrap().unwrap();

    let readmitted = app.scheduler.recover_interrupted().await.unwrap();
    assert_eq!(readmitted.len(), 1);

    let orphan = app.scheduler.get_job(orphan.id).await.unwrap();
    assert_eq!(orphan.status, JobStatus::Failed);
    assert_eq!(orphan.failure_kind, Some(FailureKind::Interrupted));

    let replacement = app.scheduler.get_job(readmitted[0]).await.unwrap();
    assert_eq!(replacement.target_id, target.id);
    assert_eq!(replacement.status, JobStatus::Waiting);
    assert_eq!(replacement.stage, JobStage::Admitted);
}

#[tokio::test]
async fn test_recover_interrupted_skips_deactivated_target() {
    let app = create_test_app().await;
    let target = app.seed_price_target().await;
    app.scheduler.schedule_one(target.id).await.unwrap();
    app.queue.dequeue(Uuid::new_v4()).await.unwrap().unwrap();
    app.manage_targets().deactivate(target.id).await.unwrap();

    let readmitted = app.scheduler.recover_interrupted().await.unwrap();
    assert!(readmitted.is_empty());
    assert_eq!(app.scheduler.stats().await.unwrap().failed, 1);
}

#[tokio::test]
async fn test_prune_history_keeps_latest_terminal_jobs() {
    let app = create_test_app().await;
    let target = app.seed_price_target().await;

    let total = HISTORY_PER_TARGET + 3;
    for _ in 0..total {
        let job = app.scheduler.schedule_one(target.id).await.unwrap();
        app.scheduler.cancel_job(job.id).await.unwrap();
    }
    let pending = app.scheduler.schedule_one(target.id).await.unwrap();

    let removed = app.scheduler.prune_history().await.unwrap();
    assert_eq!(removed, 3);

    let remaining: Vec<Job> = app.scheduler.status().try_collect().await.unwrap();
    assert_eq!(remaining.len() as u64, HISTORY_PER_TARGET + 1);
    assert!(remaining.iter().any(|j| j.id == pending.id));

    assert_eq!(app.scheduler.prune_history().await.unwrap(), 0);
}

#[tokio::test]
async fn test_status_lists_newest_first() {
    let app = create_test_app().await;
    let first = app.seed_price_target().await;
    let second = app.seed_price_target().await;

    let older = app.scheduler.schedule_one(first.id).await.unwrap();
    let newer = app.scheduler.schedule_one(second.id).await.unwrap();

    let jobs: Vec<Job> = app.scheduler.status().try_collect().await.unwrap();
    let ids: Vec<Uuid> = jobs.iter().map(|j| j.id).collect();
    assert_eq!(ids, vec![newer.id, older.id]);
}
