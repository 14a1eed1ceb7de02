// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 工作器模块
///
/// 提供抓取任务执行、流水线事件分发和工作器生命周期管理
pub mod manager;
pub mod notification_worker;
pub mod scrape_worker;
pub mod worker;

pub use worker::Worker;
