// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::application::dto::list_query::{ListQueryDto, ReportQueryDto};
use crate::domain::models::change::Change;
use crate::domain::services::change_ledger::{ChangeLedger, LedgerError};
use crate::domain::services::insight_service::{InsightError, InsightService, WeeklyReport};
use crate::presentation::errors::AppError;
use axum::{
    extract::{Extension, Path, Query},
    Json,
};
use futures::{StreamExt, TryStreamExt};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

/// 文本结果
#[derive(Debug, Serialize)]
pub struct TextResponse {
    pub text: String,
}

/// 最近的变更，跨所有目标
pub async fn list_changes(
    Extension(ledger): Extension<ChangeLedger>,
    Query(query): Query<ListQueryDto>,
) -> Result<Json<Vec<Change>>, AppError> {
    query.validate()?;

    let changes: Vec<Change> = ledger
        .list_recent(query.limit())
        .take(query.limit() as usize)
        .try_collect()
        .await?;
    Ok(Json(changes))
}

pub async fn get_change(
    Extension(ledger): Extension<ChangeLedger>,
    Path(change_id): Path<Uuid>,
) -> Result<Json<Change>, AppError> {
    Ok(Json(ledger.get(change_id).await?))
}

/// 为变更生成洞察
///
/// 已有洞察时返回现有洞察，不再调用生成器
pub async fn request_insight(
    Extension(insights): Extension<Arc<InsightService>>,
    Extension(ledger): Extension<ChangeLedger>,
    Path(change_id): Path<Uuid>,
) -> Result<Json<Change>, AppError> {
    match insights.request_insight(change_id).await {
        Ok(change) => Ok(Json(change)),
        Err(InsightError::Ledger(LedgerError::AlreadyAnnotated(_))) => {
            Ok(Json(ledger.get(change_id).await?))
        }
        Err(e) => Err(e.into()),
    }
}

/// 针对单个变更的一句话建议
pub async fn recommend(
    Extension(insights): Extension<Arc<InsightService>>,
    Path(change_id): Path<Uuid>,
) -> Result<Json<TextResponse>, AppError> {
    let text = insights.recommend(change_id).await?;
    Ok(Json(TextResponse { text }))
}

/// 目标近期活动摘要
pub async fn summarize_target(
    Extension(insights): Extension<Arc<InsightService>>,
    Path(target_id): Path<Uuid>,
) -> Result<Json<TextResponse>, AppError> {
    let text = insights.summarize_target(target_id).await?;
    Ok(Json(TextResponse { text }))
}

/// 生成周报并发布 report 通知
pub async fn weekly_report(
    Extension(insights): Extension<Arc<InsightService>>,
    Query(query): Query<ReportQueryDto>,
) -> Result<Json<WeeklyReport>, AppError> {
    Ok(Json(insights.weekly_report(query.since()).await?))
}
