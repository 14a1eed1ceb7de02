// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::job::{FailureKind, Job, JobStage};
use async_trait::async_trait;
use sea_orm::DbErr;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

/// 仓库错误类型
#[derive(Error, Debug)]
pub enum RepositoryError {
    /// 数据库错误
    #[error("Database error: {0}")]
    Database(#[from] DbErr),
    /// 记录未找到
    #[error("Record not found")]
    NotFound,
    /// 违反唯一性或前置条件
    #[error("Conflict: {0}")]
    Conflict(String),
    /// 任务已不在执行中（已终止或被回收），写入被整体回滚
    #[error("Job {0} is no longer active")]
    JobNotActive(Uuid),
}

/// 各状态任务数量
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct JobStats {
    pub waiting: u64,
    pub active: u64,
    pub completed: u64,
    pub failed: u64,
}

/// 任务仓库特质
///
/// 定义任务数据访问接口。所有状态写入都是条件更新，
/// 已终止的任务不会被覆盖。
#[async_trait]
pub trait JobRepository: Send + Sync {
    /// 创建新任务；同一目标已有在途任务时返回 `Conflict`
    async fn create(&self, job: &Job) -> Result<Job, RepositoryError>;
    /// 根据ID查找任务
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Job>, RepositoryError>;
    /// 查找目标当前的在途任务（等待或执行中）
    async fn find_in_flight(&self, target_id: Uuid) -> Result<Option<Job>, RepositoryError>;
    /// 认领最早入队的等待任务并置为执行中
    async fn acquire_next(&self, worker_id: Uuid) -> Result<Option<Job>, RepositoryError>;
    /// 推进执行中任务的阶段；任务已不在 `from` 阶段或已终止时返回 false
    async fn advance_stage(
        &self,
        id: Uuid,
        from: JobStage,
        to: JobStage,
    ) -> Result<bool, RepositoryError>;
    /// 记录抓取尝试次数
    async fn record_attempts(&self, id: Uuid, attempts: i32) -> Result<(), RepositoryError>;
    /// 写入终止状态；任务已终止时返回 false
    async fn finish(&self, job: &Job) -> Result<bool, RepositoryError>;
    /// 取消尚未进入提取阶段的任务；无法取消时返回 false
    async fn cancel(
        &self,
        id: Uuid,
        kind: FailureKind,
        reason: &str,
    ) -> Result<bool, RepositoryError>;
    /// 按创建时间倒序分页列出任务
    async fn list_recent(&self, limit: u64, offset: u64) -> Result<Vec<Job>, RepositoryError>;
    /// 列出所有执行中的任务
    async fn list_active(&self) -> Result<Vec<Job>, RepositoryError>;
    /// 每个目标只保留最新的 `keep` 条终止任务，返回删除数量
    async fn prune_terminal(&self, keep: u64) -> Result<u64, RepositoryError>;
    /// 统计各状态任务数量
    async fn stats(&self) -> Result<JobStats, RepositoryError>;
}
