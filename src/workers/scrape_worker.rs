// Copyright 2025 Kirky.X
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use async_trait::async_trait;
use chrono::Utc;
use metrics::{counter, histogram};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::time::{sleep, timeout, timeout_at};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::config::settings::WorkerSettings;
use crate::domain::models::change::Change;
use crate::domain::models::job::{FailureKind, Job, JobStage};
use crate::domain::models::snapshot::Snapshot;
use crate::domain::models::target::{RunOutcome, Target};
use crate::domain::repositories::job_repository::RepositoryError;
use crate::domain::repositories::snapshot_repository::{Observation, SnapshotRepository};
use crate::domain::repositories::target_repository::TargetRepository;
use crate::domain::services::differ;
use crate::engines::traits::{
    ExtractionDirective, ExtractionError, Extractor, FetchError, FetchRequest, FetchedPage, Fetcher,
};
use crate::queue::job_queue::{JobQueue, QueueError};
use crate::queue::target_locks::TargetLocks;
use crate::utils::errors::WorkerError;
use crate::utils::retry_policy::RetryPolicy;
use crate::workers::notification_worker::PipelineEvent;
use crate::workers::worker::Worker;

/// 任务终止原因
#[derive(Error, Debug)]
pub enum JobFailure {
    /// 抓取失败且重试次数耗尽，或遇到不可重试的抓取错误
    #[error("Fetch failed after {attempts} attempt(s): {error}")]
    Fetch { error: FetchError, attempts: u32 },
    /// 提取失败，需要人工修正提取指令
    #[error("Extraction failed: {0}")]
    Extraction(#[from] ExtractionError),
    /// 超过任务截止时间
    #[error("Job exceeded its deadline of {0:?}")]
    Timeout(Duration),
    /// 持久化失败，任务可通过重新触发重放
    #[error("Store error: {0}")]
    Store(String),
}

impl JobFailure {
    pub fn kind(&self) -> FailureKind {
        match self {
            JobFailure::Fetch {
                error: FetchError::Timeout,
                ..
            } => FailureKind::Timeout,
            JobFailure::Fetch { .. } => FailureKind::FetchError,
            JobFailure::Extraction(_) => FailureKind::ExtractionError,
            JobFailure::Timeout(_) => FailureKind::Timeout,
            JobFailure::Store(_) => FailureKind::StoreError,
        }
    }
}

impl From<RepositoryError> for JobFailure {
    fn from(err: RepositoryError) -> Self {
        JobFailure::Store(err.to_string())
    }
}

impl From<QueueError> for JobFailure {
    fn from(err: QueueError) -> Self {
        JobFailure::Store(err.to_string())
    }
}

/// 抓取工作器的协作方
#[derive(Clone)]
pub struct ScrapeContext {
    pub queue: Arc<dyn JobQueue>,
    pub targets: Arc<dyn TargetRepository>,
    pub snapshots: Arc<dyn SnapshotRepository>,
    pub fetcher: Arc<dyn Fetcher>,
    pub extractor: Arc<dyn Extractor>,
    /// 所有工作器共享，串行化同一目标的执行
    pub execution_locks: TargetLocks,
    pub events: mpsc::Sender<PipelineEvent>,
}

/// 比较阶段的结果，尚未写入任何共享状态
enum Observed {
    /// 内容哈希未变化
    Unchanged,
    /// 目标的第一次观察，只建立基线
    Baseline(Snapshot),
    /// 内容哈希变化，附带比较得到的变更（可能为空）
    Changed {
        snapshot: Snapshot,
        previous_hash: String,
        changes: Vec<Change>,
    },
}

impl Observed {
    fn change_count(&self) -> usize {
        match self {
            Observed::Changed { changes, .. } => changes.len(),
            _ => 0,
        }
    }
}

/// 终止状态写入的最大尝试次数
const TERMINAL_WRITE_ATTEMPTS: u32 = 3;

/// 抓取工作者
///
/// 每次执行一个任务，直到完成或以记录在案的原因失败。
/// 失败的任务不会写入快照或变更。
pub struct ScrapeWorker {
    worker_id: Uuid,
    ctx: ScrapeContext,
    retry: RetryPolicy,
    fetch_timeout: Duration,
    job_deadline: Duration,
    poll_interval: Duration,
}

impl ScrapeWorker {
    /// 创建新的抓取工作器实例
    pub fn new(ctx: ScrapeContext, settings: &WorkerSettings, poll_interval: Duration) -> Self {
        Self {
            worker_id: Uuid::new_v4(),
            ctx,
            retry: RetryPolicy::from(settings),
            fetch_timeout: settings.fetch_timeout(),
            job_deadline: settings.job_deadline(),
            poll_interval,
        }
    }

    /// 替换重试策略
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn worker_id(&self) -> Uuid {
        self.worker_id
    }

    /// 认领并执行下一个等待任务
    ///
    /// # 返回值
    ///
    /// * `Ok(true)` - 执行了一个任务
    /// * `Ok(false)` - 队列为空
    pub async fn process_next(&self) -> Result<bool, WorkerError> {
        match self.ctx.queue.dequeue(self.worker_id).await? {
            Some(job) => {
                self.process_job(job).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// 执行一个已认领的任务
    #[instrument(skip(self, job), fields(job_id = %job.id, target_id = %job.target_id))]
    pub async fn process_job(&self, job: Job) -> Result<(), WorkerError> {
        let started = Instant::now();

        let target = match self.ctx.targets.find_by_id(job.target_id).await {
            Ok(Some(target)) => target,
            Ok(None) => {
                let failure = JobFailure::Store("target no longer exists".to_string());
                return self.finish_failed(job, None, failure, 0).await;
            }
            Err(e) => return self.finish_failed(job, None, e.into(), 0).await,
        };

        // 同一目标的提取到持久化按准入顺序串行执行
        let _execution = self.ctx.execution_locks.acquire(target.id).await;

        // 进入提取阶段之前的最后一个取消点
        match self
            .ctx
            .queue
            .advance(job.id, JobStage::Admitted, JobStage::Extracting)
            .await
        {
            Ok(true) => {}
            Ok(false) => {
                info!("Job was cancelled before extraction started");
                return Ok(());
            }
            Err(e) => return self.finish_failed(job, Some(&target), e.into(), 0).await,
        }
        let job = job.advance(JobStage::Extracting)?;
        info!(url = %target.url, "Processing job");

        let mut attempts = 0u32;
        let deadline = tokio::time::Instant::now() + self.job_deadline;
        let observed = match timeout_at(deadline, self.observe(&job, &target, &mut attempts)).await {
            Ok(result) => result,
            Err(_) => Err(JobFailure::Timeout(self.job_deadline)),
        };

        let observed = match observed {
            Ok(Some(observed)) => observed,
            Ok(None) => {
                info!("Job is no longer active, observation discarded");
                return Ok(());
            }
            Err(failure) => return self.finish_failed(job, Some(&target), failure, attempts).await,
        };

        let mut completed = job
            .clone()
            .advance(JobStage::Diffing)?
            .advance(JobStage::Persisting)?
            .complete(observed.change_count())?;
        completed.attempt_count = attempts as i32;

        // 持久化阶段不受截止时间约束，也不可取消
        match self.persist(&completed, &target, observed).await {
            Ok(Some(changes)) => {
                self.finish_completed(&completed, &target, changes);
                histogram!("job_duration_seconds").record(started.elapsed().as_secs_f64());
                Ok(())
            }
            Ok(None) => {
                info!("Job is no longer active, observation discarded");
                Ok(())
            }
            Err(failure) => self.finish_failed(job, Some(&target), failure, attempts).await,
        }
    }

    /// 抓取、提取并与当前快照比较
    async fn observe(
        &self,
        job: &Job,
        target: &Target,
        attempts: &mut u32,
    ) -> Result<Option<Observed>, JobFailure> {
        let page = self.fetch_with_retry(job, target, attempts).await?;

        let directive = ExtractionDirective {
            category: target.category,
            selector: target.selector.clone(),
        };
        let value = self.ctx.extractor.extract(&page.content, &directive)?;

        if !self
            .ctx
            .queue
            .advance(job.id, JobStage::Extracting, JobStage::Diffing)
            .await?
        {
            return Ok(None);
        }

        let now = Utc::now();
        let new_hash = value.content_hash();
        let observed = match self.ctx.snapshots.find_current(target.id).await? {
            None => Observed::Baseline(Snapshot::capture(target.id, value, now)),
            Some(current) if current.content_hash == new_hash => Observed::Unchanged,
            Some(current) => {
                let changes = differ::diff(target.category, &current.value, &value)
                    .into_iter()
                    .map(|d| d.into_change(target.id, now))
                    .collect();
                Observed::Changed {
                    snapshot: Snapshot::capture(target.id, value, now),
                    previous_hash: current.content_hash,
                    changes,
                }
            }
        };
        Ok(Some(observed))
    }

    /// 带重试的抓取
    ///
    /// 只重试可重试的错误，次数与退避由重试策略决定
    async fn fetch_with_retry(
        &self,
        job: &Job,
        target: &Target,
        attempts: &mut u32,
    ) -> Result<FetchedPage, JobFailure> {
        let request = FetchRequest {
            url: target.url.clone(),
            timeout: self.fetch_timeout,
        };

        loop {
            *attempts += 1;
            counter!("fetch_attempts_total").increment(1);

            let result = match timeout(self.fetch_timeout, self.ctx.fetcher.fetch(&request)).await {
                Ok(result) => result,
                Err(_) => Err(FetchError::Timeout),
            };

            match result {
                Ok(page) => {
                    debug!(attempt = *attempts, status_code = page.status_code, "Fetch succeeded");
                    return Ok(page);
                }
                Err(e) if e.is_retryable() && self.retry.should_retry(*attempts) => {
                    let backoff = self.retry.calculate_backoff(*attempts);
                    warn!(
                        attempt = *attempts,
                        error = %e,
                        backoff_ms = backoff.as_millis() as u64,
                        "Fetch failed, retrying"
                    );
                    if let Err(record_err) = self.ctx.queue.record_attempts(job.id, *attempts as i32).await {
                        debug!(error = %record_err, "Failed to record fetch attempts");
                    }
                    sleep(backoff).await;
                }
                Err(e) => {
                    return Err(JobFailure::Fetch {
                        error: e,
                        attempts: *attempts,
                    })
                }
            }
        }
    }

    /// 写入观察结果并完成任务，返回提交的变更
    ///
    /// 任务在此期间已被终止或回收时不写入任何内容，返回 `Ok(None)`
    async fn persist(
        &self,
        completed: &Job,
        target: &Target,
        observed: Observed,
    ) -> Result<Option<Vec<Change>>, JobFailure> {
        if !self
            .ctx
            .queue
            .advance(completed.id, JobStage::Diffing, JobStage::Persisting)
            .await?
        {
            return Ok(None);
        }

        let (committed, changes) = match observed {
            Observed::Unchanged => {
                let result = self
                    .ctx
                    .snapshots
                    .touch(target.id, Utc::now(), Some(completed))
                    .await;
                (result, Vec::new())
            }
            Observed::Baseline(snapshot) => {
                let result = self
                    .ctx
                    .snapshots
                    .commit_observation(Observation {
                        job: Some(completed.clone()),
                        snapshot,
                        previous_hash: None,
                        changes: Vec::new(),
                        outcome: RunOutcome::Unchanged,
                    })
                    .await;
                (result, Vec::new())
            }
            Observed::Changed {
                snapshot,
                previous_hash,
                changes,
            } => {
                let outcome = if changes.is_empty() {
                    RunOutcome::Unchanged
                } else {
                    RunOutcome::Changed
                };
                let result = self
                    .ctx
                    .snapshots
                    .commit_observation(Observation {
                        job: Some(completed.clone()),
                        snapshot,
                        previous_hash: Some(previous_hash),
                        changes: changes.clone(),
                        outcome,
                    })
                    .await;
                (result, changes)
            }
        };

        match committed {
            Ok(()) => {
                debug!("Committed {} change(s)", changes.len());
                Ok(Some(changes))
            }
            Err(RepositoryError::JobNotActive(_)) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn finish_completed(&self, completed: &Job, target: &Target, changes: Vec<Change>) {
        counter!("jobs_completed_total").increment(1);
        for change in &changes {
            counter!("changes_detected_total", "kind" => change.kind.to_string()).increment(1);
        }
        info!(changes = changes.len(), "Job completed");

        let count = changes.len();
        if !changes.is_empty() {
            self.emit(PipelineEvent::ChangesDetected {
                target_id: target.id,
                target_name: target.name.clone(),
                changes,
            });
        }
        self.emit(PipelineEvent::ScrapeCompleted {
            target_id: target.id,
            target_name: target.name.clone(),
            job_id: completed.id,
            changes: count,
        });
    }

    async fn finish_failed(
        &self,
        job: Job,
        target: Option<&Target>,
        failure: JobFailure,
        attempts: u32,
    ) -> Result<(), WorkerError> {
        let kind = failure.kind();
        let reason = failure.to_string();
        error!(reason = %reason, "Job failed");

        let target_id = job.target_id;
        let mut failed = job.fail(kind, reason.clone())?;
        failed.attempt_count = attempts as i32;
        if !self.finish_with_retry(&failed).await? {
            warn!("Job was already terminal, failure not recorded");
            return Ok(());
        }
        counter!("jobs_failed_total", "reason" => kind.to_string()).increment(1);

        // 运行记录只更新目标的时间戳与结果，快照与变更保持不变
        if let Some(target) = target {
            if let Err(e) = self
                .ctx
                .targets
                .record_run(target_id, Utc::now(), RunOutcome::Failed)
                .await
            {
                warn!(error = %e, "Failed to record failed run on target");
            }
            self.emit(PipelineEvent::ScrapeFailed {
                target_id,
                target_name: target.name.clone(),
                job_id: failed.id,
                reason,
            });
        }
        Ok(())
    }

    /// 写入终止状态，数据库错误按重试策略退避后重试
    ///
    /// 最终仍失败时任务保持执行中，由调度器的超时回收终止
    async fn finish_with_retry(&self, job: &Job) -> Result<bool, WorkerError> {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match self.ctx.queue.finish(job).await {
                Ok(finished) => return Ok(finished),
                Err(e) if attempt < TERMINAL_WRITE_ATTEMPTS => {
                    let backoff = self.retry.calculate_backoff(attempt);
                    warn!(attempt, error = %e, "Failed to record terminal job state, retrying");
                    sleep(backoff).await;
                }
                Err(e) => {
                    error!(attempt, error = %e, "Failed to record terminal job state");
                    return Err(e.into());
                }
            }
        }
    }

    /// 尽力发送流水线事件，通道满或关闭时丢弃
    fn emit(&self, event: PipelineEvent) {
        if let Err(e) = self.ctx.events.try_send(event) {
            warn!(error = %e, "Dropping pipeline event");
        }
    }
}

#[async_trait]
impl Worker for ScrapeWorker {
    async fn run(&self) -> Result<(), WorkerError> {
        info!("Scrape worker {} started", self.worker_id);

        loop {
            match self.process_next().await {
                Ok(true) => {}
                Ok(false) => sleep(self.poll_interval).await,
                Err(e) => {
                    error!("Error processing job: {}", e);
                    sleep(self.poll_interval).await;
                }
            }
        }
    }

    fn name(&self) -> &str {
        "ScrapeWorker"
    }
}
