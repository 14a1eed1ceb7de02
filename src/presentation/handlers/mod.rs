// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// HTTP请求处理器模块
///
/// 包含各个API端点的具体处理逻辑
/// 处理器只做参数解析和错误映射，业务逻辑在调度器和领域服务中
pub mod change_handler;
pub mod job_handler;
pub mod notification_handler;
pub mod target_handler;
