// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::target::ContentCategory;
use serde::{Deserialize, Serialize};
use validator::Validate;

/// 默认轮询间隔：24 小时
pub const DEFAULT_INTERVAL_SECS: i64 = 24 * 60 * 60;

/// 创建监控目标请求DTO
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct CreateTargetRequestDto {
    /// 竞品名称
    #[validate(length(min = 1, max = 200))]
    pub name: String,

    /// 来源URL
    #[validate(url)]
    pub url: String,

    /// 平台标签
    #[validate(length(max = 50))]
    pub platform: Option<String>,

    /// 内容类别，默认 text
    #[serde(default)]
    pub category: ContentCategory,

    /// 提取指令
    pub selector: Option<String>,

    /// 轮询间隔（秒），最短 1 分钟，最长 30 天
    #[validate(range(min = 60, max = 2_592_000))]
    pub interval_secs: Option<i64>,
}

/// 更新监控目标请求DTO
///
/// 只包含用户可以修改的字段，未提供的字段保持不变。
/// `selector` 传空字符串表示清除选择器。
#[derive(Debug, Clone, Default, Deserialize, Serialize, Validate)]
pub struct UpdateTargetRequestDto {
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,

    #[validate(length(max = 50))]
    pub platform: Option<String>,

    pub selector: Option<String>,

    #[validate(range(min = 60, max = 2_592_000))]
    pub interval_secs: Option<i64>,

    pub is_active: Option<bool>,
}
