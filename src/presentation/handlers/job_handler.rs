// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::application::dto::list_query::ListQueryDto;
use crate::domain::models::job::Job;
use crate::domain::repositories::job_repository::JobStats;
use crate::presentation::errors::AppError;
use crate::queue::scheduler::JobScheduler;
use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    Json,
};
use futures::{StreamExt, TryStreamExt};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

/// 调度结果
#[derive(Debug, Serialize)]
pub struct ScheduleResponse {
    /// 新入队的任务ID
    pub enqueued: Vec<Uuid>,
}

/// 为所有到期目标入队任务
pub async fn schedule_due(
    Extension(scheduler): Extension<Arc<JobScheduler>>,
) -> Result<Json<ScheduleResponse>, AppError> {
    let enqueued = scheduler.schedule_due().await?;
    Ok(Json(ScheduleResponse { enqueued }))
}

/// 手动触发单个目标
///
/// 目标已有在途任务时返回 409
pub async fn scrape_target(
    Extension(scheduler): Extension<Arc<JobScheduler>>,
    Path(target_id): Path<Uuid>,
) -> Result<(StatusCode, Json<Job>), AppError> {
    let job = scheduler.schedule_one(target_id).await?;
    Ok((StatusCode::ACCEPTED, Json(job)))
}

/// 当前和最近终止的任务，按创建时间倒序
pub async fn list_jobs(
    Extension(scheduler): Extension<Arc<JobScheduler>>,
    Query(query): Query<ListQueryDto>,
) -> Result<Json<Vec<Job>>, AppError> {
    query.validate()?;

    let jobs: Vec<Job> = scheduler
        .status()
        .take(query.limit() as usize)
        .try_collect()
        .await?;
    Ok(Json(jobs))
}

pub async fn get_job(
    Extension(scheduler): Extension<Arc<JobScheduler>>,
    Path(job_id): Path<Uuid>,
) -> Result<Json<Job>, AppError> {
    Ok(Json(scheduler.get_job(job_id).await?))
}

/// 取消尚未进入提取阶段的任务
pub async fn cancel_job(
    Extension(scheduler): Extension<Arc<JobScheduler>>,
    Path(job_id): Path<Uuid>,
) -> Result<Json<Job>, AppError> {
    Ok(Json(scheduler.cancel_job(job_id).await?))
}

pub async fn job_stats(
    Extension(scheduler): Extension<Arc<JobScheduler>>,
) -> Result<Json<JobStats>, AppError> {
    Ok(Json(scheduler.stats().await?))
}
