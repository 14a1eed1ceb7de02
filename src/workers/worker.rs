// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::utils::errors::WorkerError;
use async_trait::async_trait;

/// 后台工作器
///
/// 抓取工作器与通知分发器都实现此trait，由 `WorkerManager` 统一启动
#[async_trait]
pub trait Worker: Send + Sync {
    /// 运行工作器，直到任务被中止或输入耗尽
    async fn run(&self) -> Result<(), WorkerError>;

    /// 获取工作器名称
    fn name(&self) -> &str;
}
