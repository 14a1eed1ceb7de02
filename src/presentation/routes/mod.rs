// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::application::usecases::manage_targets::ManageTargetsUseCase;
use crate::domain::services::change_ledger::ChangeLedger;
use crate::domain::services::insight_service::InsightService;
use crate::domain::services::notification_service::NotificationService;
use crate::presentation::handlers::{
    change_handler, job_handler, notification_handler, target_handler,
};
use crate::queue::scheduler::JobScheduler;
use axum::{
    routing::{get, post},
    Extension, Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// 路由依赖的组件
#[derive(Clone)]
pub struct AppState {
    pub scheduler: Arc<JobScheduler>,
    pub targets: Arc<ManageTargetsUseCase>,
    pub ledger: ChangeLedger,
    pub insights: Arc<InsightService>,
    pub notifications: NotificationService,
}

/// 创建应用路由
///
/// # 参数
///
/// * `state` - 处理器使用的组件，以 `Extension` 注入
///
/// # 返回值
///
/// 返回配置好的路由
pub fn routes(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(health_check))
        .route("/v1/version", get(version));

    let api_routes = Router::new()
        // 任务
        .route("/v1/jobs", get(job_handler::list_jobs))
        .route("/v1/jobs/schedule", post(job_handler::schedule_due))
        .route("/v1/jobs/stats", get(job_handler::job_stats))
        .route("/v1/jobs/{id}", get(job_handler::get_job))
        .route("/v1/jobs/{id}/cancel", post(job_handler::cancel_job))
        // 目标
        .route(
            "/v1/targets",
            get(target_handler::list_targets).post(target_handler::create_target),
        )
        .route(
            "/v1/targets/{id}",
            get(target_handler::get_target)
                .patch(target_handler::update_target)
                .delete(target_handler::delete_target),
        )
        .route(
            "/v1/targets/{id}/deactivate",
            post(target_handler::deactivate_target),
        )
        .route("/v1/targets/{id}/scrape", post(job_handler::scrape_target))
        .route(
            "/v1/targets/{id}/changes",
            get(target_handler::list_target_changes),
        )
        .route(
            "/v1/targets/{id}/snapshots",
            get(target_handler::list_target_snapshots),
        )
        .route(
            "/v1/targets/{id}/summary",
            get(change_handler::summarize_target),
        )
        // 变更与洞察
        .route("/v1/changes", get(change_handler::list_changes))
        .route("/v1/changes/{id}", get(change_handler::get_change))
        .route(
            "/v1/changes/{id}/insight",
            post(change_handler::request_insight),
        )
        .route(
            "/v1/changes/{id}/recommendation",
            post(change_handler::recommend),
        )
        .route("/v1/reports/weekly", post(change_handler::weekly_report))
        // 通知
        .route(
            "/v1/notifications",
            get(notification_handler::list_notifications),
        )
        .route(
            "/v1/notifications/unread-count",
            get(notification_handler::unread_count),
        )
        .route(
            "/v1/notifications/read-all",
            post(notification_handler::mark_all_read),
        )
        .route(
            "/v1/notifications/test",
            post(notification_handler::send_test),
        )
        .route(
            "/v1/notifications/{id}/read",
            post(notification_handler::mark_read),
        );

    Router::new()
        .merge(public_routes)
        .merge(api_routes)
        .layer(Extension(state.scheduler))
        .layer(Extension(state.targets))
        .layer(Extension(state.ledger))
        .layer(Extension(state.insights))
        .layer(Extension(state.notifications))
        .layer(TraceLayer::new_for_http())
}

/// 健康检查端点
///
/// # 返回值
///
/// 返回"OK"字符串
pub async fn health_check() -> &'static str {
    "OK"
}

/// 版本信息端点
///
/// # 返回值
///
/// 返回应用版本号
pub async fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
