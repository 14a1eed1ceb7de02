// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::application::dto::list_query::ListQueryDto;
use crate::application::dto::target_request::{CreateTargetRequestDto, UpdateTargetRequestDto};
use crate::application::usecases::manage_targets::ManageTargetsUseCase;
use crate::domain::models::change::Change;
use crate::domain::models::snapshot::Snapshot;
use crate::domain::models::target::Target;
use crate::domain::services::change_ledger::ChangeLedger;
use crate::presentation::errors::AppError;
use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    Json,
};
use futures::{StreamExt, TryStreamExt};
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

pub async fn create_target(
    Extension(use_case): Extension<Arc<ManageTargetsUseCase>>,
    Json(payload): Json<CreateTargetRequestDto>,
) -> Result<(StatusCode, Json<Target>), AppError> {
    let target = use_case.create(payload).await?;
    Ok((StatusCode::CREATED, Json(target)))
}

pub async fn list_targets(
    Extension(use_case): Extension<Arc<ManageTargetsUseCase>>,
) -> Result<Json<Vec<Target>>, AppError> {
    Ok(Json(use_case.list().await?))
}

pub async fn get_target(
    Extension(use_case): Extension<Arc<ManageTargetsUseCase>>,
    Path(target_id): Path<Uuid>,
) -> Result<Json<Target>, AppError> {
    Ok(Json(use_case.get(target_id).await?))
}

/// 修改间隔、启用状态、选择器等用户字段
pub async fn update_target(
    Extension(use_case): Extension<Arc<ManageTargetsUseCase>>,
    Path(target_id): Path<Uuid>,
    Json(payload): Json<UpdateTargetRequestDto>,
) -> Result<Json<Target>, AppError> {
    Ok(Json(use_case.update(target_id, payload).await?))
}

/// 软删除
pub async fn deactivate_target(
    Extension(use_case): Extension<Arc<ManageTargetsUseCase>>,
    Path(target_id): Path<Uuid>,
) -> Result<Json<Target>, AppError> {
    Ok(Json(use_case.deactivate(target_id).await?))
}

/// 硬删除；存在关联变更时返回 409
pub async fn delete_target(
    Extension(use_case): Extension<Arc<ManageTargetsUseCase>>,
    Path(target_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    use_case.delete(target_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// 目标的变更，按检测时间倒序
pub async fn list_target_changes(
    Extension(use_case): Extension<Arc<ManageTargetsUseCase>>,
    Extension(ledger): Extension<ChangeLedger>,
    Path(target_id): Path<Uuid>,
    Query(query): Query<ListQueryDto>,
) -> Result<Json<Vec<Change>>, AppError> {
    query.validate()?;
    use_case.get(target_id).await?;

    let changes: Vec<Change> = ledger
        .list_by_target(target_id)
        .take(query.limit() as usize)
        .try_collect()
        .await?;
    Ok(Json(changes))
}

/// 目标的历史快照
pub async fn list_target_snapshots(
    Extension(use_case): Extension<Arc<ManageTargetsUseCase>>,
    Path(target_id): Path<Uuid>,
    Query(query): Query<ListQueryDto>,
) -> Result<Json<Vec<Snapshot>>, AppError> {
    query.validate()?;
    Ok(Json(use_case.snapshot_history(target_id, query.limit()).await?))
}
