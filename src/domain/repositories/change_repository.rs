// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::job_repository::RepositoryError;
use crate::domain::models::change::Change;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// 变更记录仓库特质
///
/// 变更只在快照提交事务中追加，这里只提供读取与一次性洞察附加
#[async_trait]
pub trait ChangeRepository: Send + Sync {
    /// 根据ID查找变更
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Change>, RepositoryError>;
    /// 在洞察为空时写入洞察；已有洞察时返回 false
    async fn attach_insight(&self, id: Uuid, insight: &str) -> Result<bool, RepositoryError>;
    /// 按检测时间倒序分页列出目标的变更
    async fn list_by_target(
        &self,
        target_id: Uuid,
        limit: u64,
        offset: u64,
    ) -> Result<Vec<Change>, RepositoryError>;
    /// 按检测时间倒序分页列出全部变更
    async fn list_recent(&self, limit: u64, offset: u64) -> Result<Vec<Change>, RepositoryError>;
    /// 列出某时间之后检测到的变更，按时间正序
    async fn list_since(&self, since: DateTime<Utc>) -> Result<Vec<Change>, RepositoryError>;
}
