// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use metrics::{describe_counter, describe_histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tracing::{info, warn};

/// 安装 Prometheus 导出器并注册流水线指标
///
/// 地址无效或端口被占用时只记录警告，进程继续运行
pub fn init_metrics(address: &str) {
    let addr: SocketAddr = match address.parse() {
        Ok(addr) => addr,
        Err(e) => {
            warn!("Invalid metrics address {}: {}", address, e);
            return;
        }
    };

    if let Err(e) = PrometheusBuilder::new().with_http_listener(addr).install() {
        warn!("Failed to install Prometheus recorder: {}. This might happen if the port is already in use.", e);
        return;
    }

    describe_metrics();
    info!("Metrics exporter listening on {}", addr);
}

fn describe_metrics() {
    describe_counter!("jobs_enqueued_total", "Total number of scrape jobs admitted");
    describe_counter!(
        "jobs_completed_total",
        "Total number of scrape jobs completed"
    );
    describe_counter!(
        "jobs_failed_total",
        "Total number of scrape jobs failed, labelled by reason"
    );
    describe_counter!(
        "fetch_attempts_total",
        "Total number of page fetch attempts including retries"
    );
    describe_counter!(
        "changes_detected_total",
        "Total number of committed changes, labelled by kind"
    );
    describe_counter!(
        "notification_delivery_failed_total",
        "Total number of notification deliveries that failed"
    );
    describe_histogram!(
        "job_duration_seconds",
        "Duration of completed scrape jobs in seconds"
    );
}
