// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::change::{Change, ChangeKind};
use crate::domain::models::notification::{Notification, NotificationKind};
use crate::domain::repositories::job_repository::RepositoryError;
use crate::domain::repositories::target_repository::TargetRepository;
use crate::domain::services::change_ledger::{ChangeLedger, LedgerError};
use crate::domain::services::notification_service::NotificationService;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use futures::{StreamExt, TryStreamExt};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

pub const INSIGHT_PLACEHOLDER: &str = "Unable to generate insight at this time";
pub const SUMMARY_PLACEHOLDER: &str = "Unable to generate summary at this time";
pub const REPORT_PLACEHOLDER: &str = "Unable to generate report at this time";
pub const RECOMMENDATION_PLACEHOLDER: &str = "Monitor this change closely";

/// 目标摘要读取的最近变更数量
const SUMMARY_WINDOW: usize = 10;
const UNKNOWN_TARGET: &str = "Unknown competitor";

/// 生成器错误类型
#[derive(Error, Debug)]
pub enum GenerationError {
    /// 未配置 API 密钥
    #[error("Insight generator is not configured")]
    NotConfigured,
    /// 请求失败
    #[error("Generation request failed: {0}")]
    Request(String),
    /// 响应内容无法使用
    #[error("Invalid generation response: {0}")]
    InvalidResponse(String),
}

/// 洞察服务错误类型
#[derive(Error, Debug)]
pub enum InsightError {
    /// 同一变更的洞察正在生成
    #[error("Insight generation for change {0} is already in progress")]
    InProgress(Uuid),
    /// 目标不存在
    #[error("Target {0} not found")]
    TargetNotFound(Uuid),
    /// 账本错误（包括 AlreadyAnnotated）
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    /// 仓库错误
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),
}

/// 传给生成器的单条变更上下文
#[derive(Debug, Clone, Serialize)]
pub struct ChangeContext {
    pub target_name: String,
    pub kind: ChangeKind,
    pub field: Option<String>,
    pub old_value: String,
    pub new_value: String,
    pub detected_at: DateTime<Utc>,
}

impl ChangeContext {
    pub fn new(target_name: &str, change: &Change) -> Self {
        Self {
            target_name: target_name.to_string(),
            kind: change.kind,
            field: change.field.clone(),
            old_value: change.old_value.clone().unwrap_or_default(),
            new_value: change.new_value.clone().unwrap_or_default(),
            detected_at: change.detected_at,
        }
    }
}

/// 一个目标在报告周期内的活动
#[derive(Debug, Clone, Serialize)]
pub struct TargetActivity {
    pub target_name: String,
    pub changes: Vec<ChangeContext>,
}

/// 周报
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeeklyReport {
    pub summary: String,
    #[serde(default)]
    pub key_changes: Vec<String>,
    #[serde(default)]
    pub recommendations: Vec<String>,
}

impl WeeklyReport {
    fn placeholder() -> Self {
        Self {
            summary: REPORT_PLACEHOLDER.to_string(),
            key_changes: Vec::new(),
            recommendations: Vec::new(),
        }
    }
}

/// AI 洞察生成器特质
///
/// 外部协作方，负责提示词与响应解析。失败由调用方降级为占位文本。
#[async_trait]
pub trait InsightGenerator: Send + Sync {
    /// 单条变更的洞察
    async fn change_insight(&self, context: &ChangeContext) -> Result<String, GenerationError>;
    /// 单个目标近期活动摘要
    async fn target_summary(
        &self,
        target_name: &str,
        changes: &[ChangeContext],
    ) -> Result<String, GenerationError>;
    /// 跨目标的周报
    async fn weekly_report(&self, activity: &[TargetActivity]) -> Result<WeeklyReport, GenerationError>;
    /// 针对单条变更的一句话建议
    async fn recommendation(&self, context: &ChangeContext) -> Result<String, GenerationError>;
}

/// 正在生成洞察的变更，离开作用域时释放
struct InFlightGuard {
    in_flight: Arc<DashMap<Uuid, ()>>,
    change_id: Uuid,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.in_flight.remove(&self.change_id);
    }
}

/// 洞察服务
///
/// 按需把变更转换为洞察请求。每条变更至多调用一次生成器：
/// 已有洞察的变更直接返回 `AlreadyAnnotated`，并发请求返回 `InProgress`。
#[derive(Clone)]
pub struct InsightService {
    ledger: ChangeLedger,
    targets: Arc<dyn TargetRepository>,
    generator: Arc<dyn InsightGenerator>,
    notifications: NotificationService,
    in_flight: Arc<DashMap<Uuid, ()>>,
}

impl InsightService {
    pub fn new(
        ledger: ChangeLedger,
        targets: Arc<dyn TargetRepository>,
        generator: Arc<dyn InsightGenerator>,
        notifications: NotificationService,
    ) -> Self {
        Self {
            ledger,
            targets,
            generator,
            notifications,
            in_flight: Arc::new(DashMap::new()),
        }
    }

    /// 为变更生成并附加洞察
    pub async fn request_insight(&self, change_id: Uuid) -> Result<Change, InsightError> {
        let _guard = self.claim(change_id)?;

        let change = self.ledger.get(change_id).await?;
        if change.is_annotated() {
            return Err(LedgerError::AlreadyAnnotated(change_id).into());
        }

        let target_name = self.target_name(change.target_id).await?;
        let context = ChangeContext::new(&target_name, &change);
        let text = self.generator.change_insight(&context).await.unwrap_or_else(|e| {
            warn!(change_id = %change_id, error = %e, "Insight generation failed, using placeholder");
            INSIGHT_PLACEHOLDER.to_string()
        });

        let annotated = self.ledger.attach_insight(change_id, &text).await?;
        info!(change_id = %change_id, "Insight attached");

        let notification = Notification::new(
            NotificationKind::Insight,
            format!("New insight for {}", target_name),
            text,
        )
        .for_target(annotated.target_id)
        .for_change(annotated.id);
        if let Err(e) = self.notifications.publish(notification).await {
            warn!(change_id = %change_id, error = %e, "Failed to record insight notification");
        }

        Ok(annotated)
    }

    /// 目标近期活动摘要
    pub async fn summarize_target(&self, target_id: Uuid) -> Result<String, InsightError> {
        let target = self
            .targets
            .find_by_id(target_id)
            .await?
            .ok_or(InsightError::TargetNotFound(target_id))?;

        let changes: Vec<Change> = self
            .ledger
            .list_by_target(target_id)
            .take(SUMMARY_WINDOW)
            .try_collect()
            .await?;

        if changes.is_empty() {
            return Ok(format!("{} has had no significant changes recently.", target.name));
        }

        let contexts: Vec<ChangeContext> = changes
            .iter()
            .map(|c| ChangeContext::new(&target.name, c))
            .collect();

        Ok(self
            .generator
            .target_summary(&target.name, &contexts)
            .await
            .unwrap_or_else(|e| {
                warn!(target_id = %target_id, error = %e, "Summary generation failed, using placeholder");
                SUMMARY_PLACEHOLDER.to_string()
            }))
    }

    /// 生成 `since` 之后的跨目标周报，并作为 `report` 通知发布
    pub async fn weekly_report(&self, since: DateTime<Utc>) -> Result<WeeklyReport, InsightError> {
        let changes = self.ledger.list_since(since).await?;
        let names: HashMap<Uuid, String> = self
            .targets
            .list()
            .await?
            .into_iter()
            .map(|t| (t.id, t.name))
            .collect();

        let mut grouped: BTreeMap<String, Vec<ChangeContext>> = BTreeMap::new();
        for change in &changes {
            let name = names
                .get(&change.target_id)
                .map(String::as_str)
                .unwrap_or(UNKNOWN_TARGET);
            grouped
                .entry(name.to_string())
                .or_default()
                .push(ChangeContext::new(name, change));
        }
        let activity: Vec<TargetActivity> = grouped
            .into_iter()
            .map(|(target_name, changes)| TargetActivity { target_name, changes })
            .collect();

        let report = self.generator.weekly_report(&activity).await.unwrap_or_else(|e| {
            warn!(error = %e, "Report generation failed, using placeholder");
            WeeklyReport::placeholder()
        });

        let notification = Notification::new(
            NotificationKind::Report,
            "Weekly competitive report",
            report.summary.clone(),
        );
        if let Err(e) = self.notifications.publish(notification).await {
            warn!(error = %e, "Failed to record report notification");
        }

        Ok(report)
    }

    /// 针对单条变更的一句话建议
    pub async fn recommend(&self, change_id: Uuid) -> Result<String, InsightError> {
        let change = self.ledger.get(change_id).await?;
        let target_name = self.target_name(change.target_id).await?;
        let context = ChangeContext::new(&target_name, &change);

        Ok(self.generator.recommendation(&context).await.unwrap_or_else(|e| {
            warn!(change_id = %change_id, error = %e, "Recommendation failed, using placeholder");
            RECOMMENDATION_PLACEHOLDER.to_string()
        }))
    }

    fn claim(&self, change_id: Uuid) -> Result<InFlightGuard, InsightError> {
        if self.in_flight.insert(change_id, ()).is_some() {
            return Err(InsightError::InProgress(change_id));
        }
        Ok(InFlightGuard {
            in_flight: self.in_flight.clone(),
            change_id,
        })
    }

    async fn target_name(&self, target_id: Uuid) -> Result<String, InsightError> {
        Ok(self
            .targets
            .find_by_id(target_id)
            .await?
            .map(|t| t.name)
            .unwrap_or_else(|| UNKNOWN_TARGET.to_string()))
    }
}
