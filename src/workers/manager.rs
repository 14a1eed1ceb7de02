// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::config::settings::WorkerSettings;
use crate::workers::notification_worker::NotificationDispatcher;
use crate::workers::scrape_worker::{ScrapeContext, ScrapeWorker};
use crate::workers::worker::Worker;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// 工作管理器
///
/// 启动固定数量的抓取工作器和一个通知分发器，关闭时统一中止
pub struct WorkerManager {
    context: ScrapeContext,
    settings: WorkerSettings,
    poll_interval: Duration,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerManager {
    pub fn new(context: ScrapeContext, settings: WorkerSettings, poll_interval: Duration) -> Self {
        Self {
            context,
            settings,
            poll_interval,
            handles: Vec::new(),
        }
    }

    /// 启动工作进程
    ///
    /// 创建并启动指定数量的抓取工作器
    ///
    /// # 参数
    ///
    /// * `count` - 要启动的工作进程数量
    pub fn start_workers(&mut self, count: usize) {
        for _ in 0..count.max(1) {
            let worker = ScrapeWorker::new(self.context.clone(), &self.settings, self.poll_interval);
            self.spawn(Arc::new(worker));
        }
        info!("Started {} scrape workers", count.max(1));
    }

    /// 启动通知分发器
    pub fn start_dispatcher(&mut self, dispatcher: NotificationDispatcher) {
        self.spawn(Arc::new(dispatcher));
    }

    /// 正在运行的后台任务数量
    pub fn running(&self) -> usize {
        self.handles.iter().filter(|h| !h.is_finished()).count()
    }

    fn spawn(&mut self, worker: Arc<dyn Worker>) {
        let handle = tokio::spawn(async move {
            if let Err(e) = worker.run().await {
                error!("{} stopped with error: {}", worker.name(), e);
            }
        });
        self.handles.push(handle);
    }

    /// 中止所有后台任务
    ///
    /// 执行中的任务会留在 active 状态，下次启动时由调度器回收
    pub fn shutdown(&mut self) {
        info!("Shutting down workers...");
        for handle in self.handles.drain(..) {
            handle.abort();
        }
        info!("Workers shut down successfully");
    }
}
