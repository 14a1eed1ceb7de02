// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::job::{Job, JobStage};
use crate::domain::repositories::job_repository::{JobRepository, RepositoryError};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

/// 队列错误类型
#[derive(Error, Debug)]
pub enum QueueError {
    /// 目标已有在途任务
    #[error("A job for target {0} is already waiting or active")]
    AlreadyInFlight(Uuid),

    /// 仓库错误
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),
}

/// 任务队列特质
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// 入队任务
    async fn enqueue(&self, job: Job) -> Result<Job, QueueError>;

    /// 出队任务并置为执行中
    async fn dequeue(&self, worker_id: Uuid) -> Result<Option<Job>, QueueError>;

    /// 推进阶段；任务已被取消或不在 `from` 阶段时返回 false
    async fn advance(&self, job_id: Uuid, from: JobStage, to: JobStage) -> Result<bool, QueueError>;

    /// 记录抓取尝试次数
    async fn record_attempts(&self, job_id: Uuid, attempts: i32) -> Result<(), QueueError>;

    /// 写入终止状态；任务已终止时返回 false
    async fn finish(&self, job: &Job) -> Result<bool, QueueError>;
}

/// 基于数据库的任务队列实现
pub struct PersistentJobQueue<R: JobRepository + ?Sized> {
    /// 任务仓库
    repository: Arc<R>,
}

impl<R: JobRepository + ?Sized> PersistentJobQueue<R> {
    /// 创建新的任务队列实例
    pub fn new(repository: Arc<R>) -> Self {
        Self { repository }
    }
}

#[async_trait]
impl<R: JobRepository + ?Sized> JobQueue for PersistentJobQueue<R> {
    /// 入队任务
    ///
    /// 数据库上的部分唯一索引保证同一目标最多只有一个在途任务，
    /// 冲突被转换为 `AlreadyInFlight`
    async fn enqueue(&self, job: Job) -> Result<Job, QueueError> {
        let target_id = job.target_id;
        match self.repository.create(&job).await {
            Ok(created) => Ok(created),
            Err(RepositoryError::Conflict(_)) => Err(QueueError::AlreadyInFlight(target_id)),
            Err(e) => Err(e.into()),
        }
    }

    async fn dequeue(&self, worker_id: Uuid) -> Result<Option<Job>, QueueError> {
        Ok(self.repository.acquire_next(worker_id).await?)
    }

    async fn advance(&self, job_id: Uuid, from: JobStage, to: JobStage) -> Result<bool, QueueError> {
        Ok(self.repository.advance_stage(job_id, from, to).await?)
    }

    async fn record_attempts(&self, job_id: Uuid, attempts: i32) -> Result<(), QueueError> {
        Ok(self.repository.record_attempts(job_id, attempts).await?)
    }

    async fn finish(&self, job: &Job) -> Result<bool, QueueError> {
        Ok(self.repository.finish(job).await?)
    }
}
