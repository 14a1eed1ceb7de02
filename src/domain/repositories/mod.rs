// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 仓库接口模块
///
/// 该模块定义了领域层的仓库接口，具体实现由基础设施层提供。
///
/// 包含的仓库接口：
/// - 变更仓库（change_repository）：变更记录的读取与洞察附加
/// - 任务仓库（job_repository）：任务的入队、认领与状态推进
/// - 通知仓库（notification_repository）：通知事件及已读状态
/// - 快照仓库（snapshot_repository）：当前快照与原子提交
/// - 目标仓库（target_repository）：监控目标的管理
pub mod change_repository;
pub mod job_repository;
pub mod notification_repository;
pub mod snapshot_repository;
pub mod target_repository;
