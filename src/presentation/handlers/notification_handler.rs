// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::application::dto::list_query::ListQueryDto;
use crate::domain::models::notification::Notification;
use crate::domain::services::notification_service::NotificationService;
use crate::presentation::errors::AppError;
use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Serialize)]
pub struct UnreadCountResponse {
    pub unread: u64,
}

#[derive(Debug, Serialize)]
pub struct MarkAllReadResponse {
    pub updated: u64,
}

pub async fn list_notifications(
    Extension(service): Extension<NotificationService>,
    Query(query): Query<ListQueryDto>,
) -> Result<Json<Vec<Notification>>, AppError> {
    query.validate()?;
    Ok(Json(service.list(query.limit()).await?))
}

pub async fn unread_count(
    Extension(service): Extension<NotificationService>,
) -> Result<Json<UnreadCountResponse>, AppError> {
    let unread = service.unread_count().await?;
    Ok(Json(UnreadCountResponse { unread }))
}

pub async fn mark_read(
    Extension(service): Extension<NotificationService>,
    Path(notification_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    service.mark_read(notification_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn mark_all_read(
    Extension(service): Extension<NotificationService>,
) -> Result<Json<MarkAllReadResponse>, AppError> {
    let updated = service.mark_all_read().await?;
    Ok(Json(MarkAllReadResponse { updated }))
}

/// 手动发送测试通知，投递失败时返回错误
pub async fn send_test(
    Extension(service): Extension<NotificationService>,
) -> Result<StatusCode, AppError> {
    service.send_test().await?;
    Ok(StatusCode::NO_CONTENT)
}
