// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 应用程序模块
///
/// 面向用户操作的用例与请求对象
pub mod application;

/// 配置模块
///
/// 处理应用程序的配置设置和环境变量
pub mod config;

/// 领域模块
///
/// 包含核心业务实体、差异比较、变更账本、通知与洞察服务和仓库接口
pub mod domain;

/// 引擎模块
///
/// 页面抓取与内容提取的协作方
pub mod engines;

/// 基础设施模块
///
/// 提供外部服务集成，如数据库、指标导出、Webhook 投递等
pub mod infrastructure;

/// 表示层模块
///
/// 处理HTTP请求和响应，包括路由、处理器和错误映射
pub mod presentation;

/// 队列模块
///
/// 实现任务队列、按目标准入和调度功能
pub mod queue;

/// 工具模块
///
/// 提供通用的工具函数和辅助功能
pub mod utils;

/// 工作器模块
///
/// 实现抓取任务执行、通知分发和工作器管理
pub mod workers;
