// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 领域服务模块
///
/// 包含的服务：
/// - 变更账本（change_ledger）：变更的读取流与一次性洞察附加
/// - 差异比较（differ）：按内容类别比较新旧提取结果
/// - 洞察服务（insight_service）：把变更转换为 AI 洞察请求
/// - LLM服务（llm_service）：OpenAI 兼容的洞察生成器
/// - 通知服务（notification_service）：通知的记录、投递与已读状态
pub mod change_ledger;
pub mod differ;
pub mod insight_service;
pub mod llm_service;
pub mod notification_service;
