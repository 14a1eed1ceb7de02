// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::application::usecases::manage_targets::TargetError;
use crate::domain::repositories::job_repository::RepositoryError;
use crate::domain::services::change_ledger::LedgerError;
use crate::domain::services::insight_service::InsightError;
use crate::domain::services::notification_service::{DeliveryError, NotificationError};
use crate::queue::scheduler::SchedulerError;

/// 应用错误类型
///
/// 封装所有可能的应用层错误，提供统一的错误处理接口
#[derive(Debug)]
pub struct AppError(anyhow::Error);

impl AppError {
    fn status(&self) -> StatusCode {
        if let Some(e) = self.0.downcast_ref::<SchedulerError>() {
            return match e {
                SchedulerError::AlreadyInFlight(_)
                | SchedulerError::TargetInactive(_)
                | SchedulerError::NotCancellable(_) => StatusCode::CONFLICT,
                SchedulerError::TargetNotFound(_) | SchedulerError::JobNotFound(_) => {
                    StatusCode::NOT_FOUND
                }
                SchedulerError::Repository(e) => repository_status(e),
            };
        }
        if let Some(e) = self.0.downcast_ref::<TargetError>() {
            return match e {
                TargetError::NotFound(_) => StatusCode::NOT_FOUND,
                TargetError::Validation(_) => StatusCode::BAD_REQUEST,
                TargetError::Referenced(_) => StatusCode::CONFLICT,
                TargetError::Repository(e) => repository_status(e),
            };
        }
        if let Some(e) = self.0.downcast_ref::<InsightError>() {
            return match e {
                InsightError::InProgress(_) => StatusCode::CONFLICT,
                InsightError::TargetNotFound(_) => StatusCode::NOT_FOUND,
                InsightError::Ledger(e) => ledger_status(e),
                InsightError::Repository(e) => repository_status(e),
            };
        }
        if let Some(e) = self.0.downcast_ref::<LedgerError>() {
            return ledger_status(e);
        }
        if let Some(e) = self.0.downcast_ref::<NotificationError>() {
            return match e {
                NotificationError::NotFound(_) => StatusCode::NOT_FOUND,
                NotificationError::Delivery(DeliveryError::NotConfigured) => {
                    StatusCode::BAD_REQUEST
                }
                NotificationError::Delivery(_) => StatusCode::BAD_GATEWAY,
                NotificationError::Repository(e) => repository_status(e),
            };
        }
        if self.0.downcast_ref::<validator::ValidationErrors>().is_some() {
            return StatusCode::BAD_REQUEST;
        }
        if let Some(e) = self.0.downcast_ref::<RepositoryError>() {
            return repository_status(e);
        }
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

fn repository_status(err: &RepositoryError) -> StatusCode {
    match err {
        RepositoryError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        RepositoryError::NotFound => StatusCode::NOT_FOUND,
        RepositoryError::Conflict(_) | RepositoryError::JobNotActive(_) => StatusCode::CONFLICT,
    }
}

fn ledger_status(err: &LedgerError) -> StatusCode {
    match err {
        LedgerError::NotFound(_) => StatusCode::NOT_FOUND,
        LedgerError::AlreadyAnnotated(_) => StatusCode::CONFLICT,
        LedgerError::Repository(e) => repository_status(e),
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("Request failed: {:#}", self.0);
        }

        let body = Json(json!({ "error": self.0.to_string() }));
        (status, body).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}
