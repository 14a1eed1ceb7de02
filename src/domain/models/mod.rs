// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 领域模型模块
///
/// 该模块定义了系统的核心业务实体，包括：
/// - 监控目标（target）：被监控的竞品页面及其调度信息
/// - 快照（snapshot）：目标最近一次成功提取的内容
/// - 变更（change）：两次快照之间被分类的差异
/// - 任务（job）：一次抓取周期的调度单元
/// - 通知（notification）：面向用户的事件
pub mod change;
pub mod job;
pub mod notification;
pub mod snapshot;
pub mod target;
