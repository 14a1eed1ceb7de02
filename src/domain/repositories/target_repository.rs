// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::job_repository::RepositoryError;
use crate::domain::models::target::{RunOutcome, Target};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// 监控目标仓库特质
#[async_trait]
pub trait TargetRepository: Send + Sync {
    /// 创建目标
    async fn create(&self, target: &Target) -> Result<Target, RepositoryError>;
    /// 根据ID查找目标
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Target>, RepositoryError>;
    /// 保存用户可编辑的字段（名称、平台、选择器、间隔、启用状态）
    async fn update(&self, target: &Target) -> Result<Target, RepositoryError>;
    /// 按创建时间列出全部目标
    async fn list(&self) -> Result<Vec<Target>, RepositoryError>;
    /// 列出启用中的目标
    async fn list_active(&self) -> Result<Vec<Target>, RepositoryError>;
    /// 记录一次运行的时间与结果
    async fn record_run(
        &self,
        id: Uuid,
        at: DateTime<Utc>,
        outcome: RunOutcome,
    ) -> Result<(), RepositoryError>;
    /// 硬删除目标；存在关联变更时返回 `Conflict`
    async fn delete(&self, id: Uuid) -> Result<(), RepositoryError>;
}
