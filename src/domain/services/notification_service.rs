// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::notification::{Notification, NotificationKind};
use crate::domain::repositories::job_repository::RepositoryError;
use crate::domain::repositories::notification_repository::NotificationRepository;
use async_trait::async_trait;
use metrics::counter;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

/// 通知投递错误类型
#[derive(Error, Debug)]
pub enum DeliveryError {
    /// 未配置投递通道
    #[error("No delivery channel configured")]
    NotConfigured,
    /// 请求失败
    #[error("Delivery request failed: {0}")]
    Request(String),
    /// 接收方返回了非成功状态码
    #[error("Delivery rejected with status {0}")]
    Rejected(u16),
}

/// 通知服务错误类型
#[derive(Error, Debug)]
pub enum NotificationError {
    /// 通知不存在
    #[error("Notification {0} not found")]
    NotFound(Uuid),
    /// 投递失败（只有手动发送测试通知时才会向外暴露）
    #[error(transparent)]
    Delivery(#[from] DeliveryError),
    /// 仓库错误
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),
}

/// 通知投递通道特质
#[async_trait]
pub trait NotificationDelivery: Send + Sync {
    /// 投递一个通知事件
    async fn deliver(&self, notification: &Notification) -> Result<(), DeliveryError>;
}

/// 通知服务
///
/// 保存通知并尽力投递。投递失败只记录日志和指标，不会重试，
/// 也不会影响产生通知的任务。
#[derive(Clone)]
pub struct NotificationService {
    repository: Arc<dyn NotificationRepository>,
    delivery: Option<Arc<dyn NotificationDelivery>>,
}

impl NotificationService {
    pub fn new(
        repository: Arc<dyn NotificationRepository>,
        delivery: Option<Arc<dyn NotificationDelivery>>,
    ) -> Self {
        Self {
            repository,
            delivery,
        }
    }

    /// 保存并尽力投递一个通知
    pub async fn publish(&self, notification: Notification) -> Result<Notification, NotificationError> {
        let saved = self.repository.create(&notification).await?;
        debug!(notification_id = %saved.id, kind = %saved.kind, "Notification recorded");

        if let Some(delivery) = &self.delivery {
            if let Err(e) = delivery.deliver(&saved).await {
                warn!(notification_id = %saved.id, error = %e, "Notification delivery failed");
                counter!("notification_delivery_failed_total").increment(1);
            }
        }

        Ok(saved)
    }

    /// 按创建时间倒序列出通知
    pub async fn list(&self, limit: u64) -> Result<Vec<Notification>, NotificationError> {
        Ok(self.repository.list(limit, 0).await?)
    }

    /// 标记为已读
    pub async fn mark_read(&self, id: Uuid) -> Result<(), NotificationError> {
        self.repository.mark_read(id).await.map_err(|e| match e {
            RepositoryError::NotFound => NotificationError::NotFound(id),
            other => NotificationError::Repository(other),
        })
    }

    /// 全部标记为已读
    pub async fn mark_all_read(&self) -> Result<u64, NotificationError> {
        Ok(self.repository.mark_all_read().await?)
    }

    /// 未读数量
    pub async fn unread_count(&self) -> Result<u64, NotificationError> {
        Ok(self.repository.unread_count().await?)
    }

    /// 通过投递通道发送一条测试通知
    ///
    /// 测试通知不入库；这是唯一会把投递错误返回给调用方的路径
    pub async fn send_test(&self) -> Result<(), NotificationError> {
        let delivery = self.delivery.as_ref().ok_or(DeliveryError::NotConfigured)?;
        let notification = Notification::new(
            NotificationKind::Alert,
            "Test notification",
            "If you can read this, notification delivery is working.",
        );
        delivery.deliver(&notification).await?;
        Ok(())
    }
}
