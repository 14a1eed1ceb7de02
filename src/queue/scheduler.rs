// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::job::{FailureKind, Job};
use crate::domain::repositories::job_repository::{JobRepository, JobStats, RepositoryError};
use crate::domain::repositories::target_repository::TargetRepository;
use crate::queue::job_queue::{JobQueue, QueueError};
use crate::queue::target_locks::TargetLocks;
use crate::utils::paging::{paged, DEFAULT_PAGE_SIZE};
use chrono::Utc;
use futures::stream::BoxStream;
use metrics::counter;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// 调度器错误类型
#[derive(Error, Debug)]
pub enum SchedulerError {
    /// 目标已有等待中或执行中的任务
    #[error("A job for target {0} is already waiting or active")]
    AlreadyInFlight(Uuid),
    /// 目标不存在
    #[error("Target {0} not found")]
    TargetNotFound(Uuid),
    /// 目标已停用
    #[error("Target {0} is inactive")]
    TargetInactive(Uuid),
    /// 任务不存在
    #[error("Job {0} not found")]
    JobNotFound(Uuid),
    /// 任务已进入提取阶段或已终止，不能取消
    #[error("Job {0} can no longer be cancelled")]
    NotCancellable(Uuid),
    /// 仓库错误
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),
}

impl From<QueueError> for SchedulerError {
    fn from(err: QueueError) -> Self {
        match err {
            QueueError::AlreadyInFlight(target_id) => SchedulerError::AlreadyInFlight(target_id),
            QueueError::Repository(e) => SchedulerError::Repository(e),
        }
    }
}

/// 任务调度器
///
/// 决定哪些目标到期、为其入队任务，并保证每个目标同一时刻最多只有一个
/// 在途任务。调度器自身不计时，`schedule_due` 由外部节拍调用。
pub struct JobScheduler {
    targets: Arc<dyn TargetRepository>,
    jobs: Arc<dyn JobRepository>,
    queue: Arc<dyn JobQueue>,
    admission: TargetLocks,
    history_per_target: u64,
    /// 执行中任务多久未更新即由节拍回收；为 None 时不回收
    stale_after: Option<Duration>,
}

impl JobScheduler {
    /// 创建新的任务调度器实例
    ///
    /// # 参数
    ///
    /// * `targets` - 目标仓库
    /// * `jobs` - 任务仓库
    /// * `queue` - 任务队列
    /// * `history_per_target` - 每个目标保留的终止任务数量
    pub fn new(
        targets: Arc<dyn TargetRepository>,
        jobs: Arc<dyn JobRepository>,
        queue: Arc<dyn JobQueue>,
        history_per_target: u64,
    ) -> Self {
        Self {
            targets,
            jobs,
            queue,
            admission: TargetLocks::new(),
            history_per_target,
            stale_after: None,
        }
    }

    /// 启用节拍中的失联任务回收
    pub fn with_stale_after(mut self, stale_after: Duration) -> Self {
        self.stale_after = Some(stale_after);
        self
    }

    /// 为所有到期的启用目标入队任务
    ///
    /// 已有在途任务的目标被跳过，重复的节拍不会重复入队。
    /// 单个目标入队失败只记录日志，不影响其他目标。
    ///
    /// # 返回值
    ///
    /// 新入队任务的ID列表
    pub async fn schedule_due(&self) -> Result<Vec<Uuid>, SchedulerError> {
        let now = Utc::now();
        let due: Vec<_> = self
            .targets
            .list_active()
            .await?
            .into_iter()
            .filter(|t| t.is_due(now))
            .collect();

        let mut enqueued = Vec::with_capacity(due.len());
        for target in due {
            match self.admit(target.id).await {
                Ok(job) => enqueued.push(job.id),
                Err(SchedulerError::AlreadyInFlight(_)) => {
                    debug!(target_id = %target.id, "Target already has a job in flight");
                }
                Err(e) => {
                    warn!(target_id = %target.id, error = %e, "Failed to enqueue due target");
                }
            }
        }

        if !enqueued.is_empty() {
            info!("Enqueued {} due jobs", enqueued.len());
        }
        Ok(enqueued)
    }

    /// 手动触发单个目标
    ///
    /// 目标已有等待中或执行中的任务时返回 `AlreadyInFlight`，不会排入重复任务
    pub async fn schedule_one(&self, target_id: Uuid) -> Result<Job, SchedulerError> {
        let target = self
            .targets
            .find_by_id(target_id)
            .await?
            .ok_or(SchedulerError::TargetNotFound(target_id))?;
        if !target.is_active {
            return Err(SchedulerError::TargetInactive(target_id));
        }
        self.admit(target_id).await
    }

    /// 当前和最近终止的任务，按创建时间倒序的惰性流
    pub fn status(&self) -> BoxStream<'static, Result<Job, SchedulerError>> {
        let jobs = self.jobs.clone();
        paged(DEFAULT_PAGE_SIZE, None, move |limit, offset| {
            let jobs = jobs.clone();
            async move { jobs.list_recent(limit, offset).await.map_err(SchedulerError::from) }
        })
    }

    /// 读取单个任务
    pub async fn get_job(&self, job_id: Uuid) -> Result<Job, SchedulerError> {
        self.jobs
            .find_by_id(job_id)
            .await?
            .ok_or(SchedulerError::JobNotFound(job_id))
    }

    /// 取消尚未进入提取阶段的任务
    ///
    /// 被取消的任务以 `Cancelled` 原因终止于 failed 状态
    pub async fn cancel_job(&self, job_id: Uuid) -> Result<Job, SchedulerError> {
        let job = self.get_job(job_id).await?;
        if !job.is_cancellable() {
            return Err(SchedulerError::NotCancellable(job_id));
        }

        // 条件更新：工作器可能在读取之后已经推进了阶段
        if !self
            .jobs
            .cancel(job_id, FailureKind::Cancelled, "Cancelled by user")
            .await?
        {
            return Err(SchedulerError::NotCancellable(job_id));
        }

        info!(job_id = %job_id, target_id = %job.target_id, "Job cancelled");
        counter!("jobs_failed_total", "reason" => FailureKind::Cancelled.to_string()).increment(1);
        self.get_job(job_id).await
    }

    /// 回收上一个进程遗留的执行中任务
    ///
    /// 每个遗留任务以 `Interrupted` 原因终止，并为仍启用的目标重新入队一个等待任务，
    /// 不丢失触发，也不违反状态单调性。
    ///
    /// # 返回值
    ///
    /// 重新入队的任务ID列表
    pub async fn recover_interrupted(&self) -> Result<Vec<Uuid>, SchedulerError> {
        let orphaned = self.jobs.list_active().await?;
        self.interrupt_and_readmit(orphaned, "Process stopped while the job was running")
            .await
    }

    /// 回收长时间未更新的执行中任务
    ///
    /// `updated_at` 早于 `max_age` 之前的执行中任务视为失联，处理方式与
    /// `recover_interrupted` 相同。失联任务的工作器若仍在运行，其提交会因任务
    /// 已终止而整体回滚。
    pub async fn recover_stale(&self, max_age: Duration) -> Result<Vec<Uuid>, SchedulerError> {
        let Some(cutoff) = chrono::Duration::from_std(max_age)
            .ok()
            .and_then(|age| Utc::now().checked_sub_signed(age))
        else {
            return Ok(Vec::new());
        };

        let stale: Vec<Job> = self
            .jobs
            .list_active()
            .await?
            .into_iter()
            .filter(|job| job.updated_at <= cutoff)
            .collect();
        if stale.is_empty() {
            return Ok(Vec::new());
        }

        warn!("Reclaiming {} stale active jobs", stale.len());
        self.interrupt_and_readmit(stale, "Job stopped reporting progress")
            .await
    }

    async fn interrupt_and_readmit(
        &self,
        jobs: Vec<Job>,
        reason: &str,
    ) -> Result<Vec<Uuid>, SchedulerError> {
        let mut readmitted = Vec::new();

        for job in jobs {
            let target_id = job.target_id;
            let job_id = job.id;
            let failed = match job.fail(FailureKind::Interrupted, reason) {
                Ok(failed) => failed,
                Err(e) => {
                    warn!(job_id = %job_id, error = %e, "Skipping unrecoverable job");
                    continue;
                }
            };
            if !self.jobs.finish(&failed).await? {
                debug!(job_id = %job_id, "Job finished before it could be interrupted");
                continue;
            }
            counter!("jobs_failed_total", "reason" => FailureKind::Interrupted.to_string()).increment(1);

            match self.schedule_one(target_id).await {
                Ok(new_job) => {
                    info!(job_id = %job_id, new_job_id = %new_job.id, "Re-admitted interrupted job");
                    readmitted.push(new_job.id);
                }
                Err(e) => warn!(job_id = %job_id, error = %e, "Interrupted job not re-admitted"),
            }
        }

        Ok(readmitted)
    }

    /// 每个目标只保留最新的若干条终止任务
    pub async fn prune_history(&self) -> Result<u64, SchedulerError> {
        let removed = self.jobs.prune_terminal(self.history_per_target).await?;
        if removed > 0 {
            debug!("Pruned {} terminal jobs", removed);
        }
        Ok(removed)
    }

    /// 各状态任务数量
    pub async fn stats(&self) -> Result<JobStats, SchedulerError> {
        Ok(self.jobs.stats().await?)
    }

    /// 启动外部调度节拍
    ///
    /// 每个节拍回收失联任务、调用一次 `schedule_due` 并清理历史任务
    pub fn start_ticker(self: Arc<Self>, every: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                ticker.tick().await;

                if let Some(stale_after) = self.stale_after {
                    if let Err(e) = self.recover_stale(stale_after).await {
                        error!("Failed to reclaim stale jobs: {}", e);
                    }
                }
                if let Err(e) = self.schedule_due().await {
                    error!("Scheduling tick failed: {}", e);
                }
                if let Err(e) = self.prune_history().await {
                    error!("Failed to prune job history: {}", e);
                }
            }
        })
    }

    /// 在目标锁内检查在途任务并入队
    async fn admit(&self, target_id: Uuid) -> Result<Job, SchedulerError> {
        let _guard = self.admission.acquire(target_id).await;

        if self.jobs.find_in_flight(target_id).await?.is_some() {
            return Err(SchedulerError::AlreadyInFlight(target_id));
        }

        let job = self.queue.enqueue(Job::new(target_id)).await?;
        counter!("jobs_enqueued_total").increment(1);
        debug!(job_id = %job.id, target_id = %target_id, "Job admitted");
        Ok(job)
    }
}
