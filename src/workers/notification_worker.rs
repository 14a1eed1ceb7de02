// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::change::Change;
use crate::domain::models::notification::{Notification, NotificationKind};
use crate::domain::services::notification_service::NotificationService;
use crate::utils::errors::WorkerError;
use crate::workers::worker::Worker;
use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// 抓取流水线产生的事件
#[derive(Debug, Clone)]
pub enum PipelineEvent {
    /// 新的变更已经提交
    ChangesDetected {
        target_id: Uuid,
        target_name: String,
        changes: Vec<Change>,
    },
    /// 任务成功完成（包括无变化的运行）
    ScrapeCompleted {
        target_id: Uuid,
        target_name: String,
        job_id: Uuid,
        changes: usize,
    },
    /// 任务失败
    ScrapeFailed {
        target_id: Uuid,
        target_name: String,
        job_id: Uuid,
        reason: String,
    },
}

/// 创建流水线事件通道
pub fn channel(capacity: usize) -> (mpsc::Sender<PipelineEvent>, mpsc::Receiver<PipelineEvent>) {
    mpsc::channel(capacity.max(1))
}

/// 通知分发器
///
/// 消费流水线事件并转换为通知。分发与任务解耦：
/// 这里的任何失败都只记录日志，不会回滚已完成的任务，也不会重试。
pub struct NotificationDispatcher {
    receiver: Mutex<mpsc::Receiver<PipelineEvent>>,
    service: NotificationService,
    emit_scrape_events: bool,
}

impl NotificationDispatcher {
    pub fn new(
        receiver: mpsc::Receiver<PipelineEvent>,
        service: NotificationService,
        emit_scrape_events: bool,
    ) -> Self {
        Self {
            receiver: Mutex::new(receiver),
            service,
            emit_scrape_events,
        }
    }

    /// 把单个事件转换为零个或多个通知并发布
    pub async fn dispatch(&self, event: PipelineEvent) {
        for notification in self.notifications_for(event) {
            let kind = notification.kind;
            if let Err(e) = self.service.publish(notification).await {
                warn!(kind = %kind, error = %e, "Failed to dispatch notification");
            }
        }
    }

    fn notifications_for(&self, event: PipelineEvent) -> Vec<Notification> {
        match event {
            PipelineEvent::ChangesDetected {
                target_id,
                target_name,
                changes,
            } => changes
                .into_iter()
                .map(|change| {
                    let subject = match &change.field {
                        Some(field) => format!("{} {} change", field, change.kind),
                        None => format!("{} change", change.kind),
                    };
                    Notification::new(
                        NotificationKind::Change,
                        format!("{}: {} detected", target_name, subject),
                        format!(
                            "Changed from \"{}\" to \"{}\"",
                            change.old_value.as_deref().unwrap_or(""),
                            change.new_value.as_deref().unwrap_or(""),
                        ),
                    )
                    .for_target(target_id)
                    .for_change(change.id)
                })
                .collect(),
            PipelineEvent::ScrapeCompleted {
                target_id,
                target_name,
                changes,
                ..
            } if self.emit_scrape_events => vec![Notification::new(
                NotificationKind::Scrape,
                format!("Scrape completed for {}", target_name),
                format!("{} change(s) detected", changes),
            )
            .for_target(target_id)],
            PipelineEvent::ScrapeCompleted { job_id, .. } => {
                debug!(job_id = %job_id, "Scrape events disabled, skipping");
                Vec::new()
            }
            PipelineEvent::ScrapeFailed {
                target_id,
                target_name,
                reason,
                ..
            } => vec![Notification::new(
                NotificationKind::Alert,
                format!("Scrape failed for {}", target_name),
                reason,
            )
            .for_target(target_id)],
        }
    }
}

#[async_trait]
impl Worker for NotificationDispatcher {
    async fn run(&self) -> Result<(), WorkerError> {
        info!("Notification dispatcher started");
        let mut receiver = self.receiver.lock().await;
        while let Some(event) = receiver.recv().await {
            self.dispatch(event).await;
        }
        info!("Pipeline event channel closed, notification dispatcher stopping");
        Ok(())
    }

    fn name(&self) -> &str {
        "NotificationDispatcher"
    }
}
