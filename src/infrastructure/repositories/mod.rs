// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::repositories::job_repository::RepositoryError;
use chrono::{DateTime, FixedOffset, Utc};
use sea_orm::{DbErr, SqlErr};

/// 仓库实现模块
///
/// 提供领域仓库接口基于SeaORM的具体实现
pub mod change_repo_impl;
pub mod job_repo_impl;
pub mod notification_repo_impl;
pub mod snapshot_repo_impl;
pub mod target_repo_impl;

/// 唯一约束冲突映射为 `Conflict`，其余保持数据库错误
pub(crate) fn map_write_error(err: DbErr) -> RepositoryError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(detail)) => RepositoryError::Conflict(detail),
        Some(SqlErr::ForeignKeyConstraintViolation(detail)) => RepositoryError::Conflict(detail),
        _ => RepositoryError::Database(err),
    }
}

pub(crate) fn to_utc(at: DateTime<FixedOffset>) -> DateTime<Utc> {
    at.with_timezone(&Utc)
}

pub(crate) fn to_fixed(at: DateTime<Utc>) -> DateTime<FixedOffset> {
    at.into()
}
