// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use thiserror::Error;

/// Worker错误类型
///
/// 只描述工作器自身循环的故障；单个任务的失败原因记录在任务上，
/// 不会以该错误的形式向外传播
#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("仓库错误: {0}")]
    RepositoryError(String),

    #[error("队列错误: {0}")]
    QueueError(String),

    #[error("内部错误: {0}")]
    InternalError(String),
}

impl From<crate::domain::repositories::job_repository::RepositoryError> for WorkerError {
    fn from(err: crate::domain::repositories::job_repository::RepositoryError) -> Self {
        WorkerError::RepositoryError(err.to_string())
    }
}

impl From<crate::domain::models::job::DomainError> for WorkerError {
    fn from(err: crate::domain::models::job::DomainError) -> Self {
        WorkerError::InternalError(err.to_string())
    }
}

impl From<crate::queue::job_queue::QueueError> for WorkerError {
    fn from(err: crate::queue::job_queue::QueueError) -> Self {
        WorkerError::QueueError(err.to_string())
    }
}
