// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::job_repository::RepositoryError;
use crate::domain::models::notification::Notification;
use async_trait::async_trait;
use uuid::Uuid;

/// 通知仓库特质
#[async_trait]
pub trait NotificationRepository: Send + Sync {
    /// 保存通知
    async fn create(&self, notification: &Notification) -> Result<Notification, RepositoryError>;
    /// 按创建时间倒序分页列出通知
    async fn list(&self, limit: u64, offset: u64) -> Result<Vec<Notification>, RepositoryError>;
    /// 标记为已读；通知不存在时返回 `NotFound`
    async fn mark_read(&self, id: Uuid) -> Result<(), RepositoryError>;
    /// 全部标记为已读，返回受影响数量
    async fn mark_all_read(&self) -> Result<u64, RepositoryError>;
    /// 未读数量
    async fn unread_count(&self) -> Result<u64, RepositoryError>;
}
