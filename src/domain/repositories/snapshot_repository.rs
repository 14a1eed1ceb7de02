// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::job_repository::RepositoryError;
use crate::domain::models::change::Change;
use crate::domain::models::job::Job;
use crate::domain::models::snapshot::Snapshot;
use crate::domain::models::target::RunOutcome;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// 一次成功观察的持久化单元
///
/// 新快照、由它产生的变更、目标的运行记录以及产生它的任务的完成状态
/// 在同一事务中写入
#[derive(Debug, Clone)]
pub struct Observation {
    /// 已置为完成的任务；数据库中该任务已不在执行中时整个单元回滚
    pub job: Option<Job>,
    /// 新的当前快照
    pub snapshot: Snapshot,
    /// 被替换快照的哈希；首次观察为 None
    pub previous_hash: Option<String>,
    /// 本次检测到的变更
    pub changes: Vec<Change>,
    /// 写入目标的运行结果
    pub outcome: RunOutcome,
}

/// 快照仓库特质
#[async_trait]
pub trait SnapshotRepository: Send + Sync {
    /// 读取目标的当前快照
    async fn find_current(&self, target_id: Uuid) -> Result<Option<Snapshot>, RepositoryError>;

    /// 内容未变化：刷新快照确认时间、记录运行结果并完成任务，不修改内容
    ///
    /// 任务已不在执行中时不做任何写入，返回 `JobNotActive`
    async fn touch(
        &self,
        target_id: Uuid,
        at: DateTime<Utc>,
        job: Option<&Job>,
    ) -> Result<(), RepositoryError>;

    /// 原子地替换当前快照、追加变更、记录运行结果并完成任务
    ///
    /// 当前快照的哈希与 `previous_hash` 不一致时整个单元回滚并返回 `Conflict`；
    /// 任务已不在执行中时回滚并返回 `JobNotActive`
    async fn commit_observation(&self, observation: Observation) -> Result<(), RepositoryError>;

    /// 按时间倒序列出历史快照
    async fn list_history(
        &self,
        target_id: Uuid,
        limit: u64,
    ) -> Result<Vec<Snapshot>, RepositoryError>;
}
