// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// 列表默认返回条数
pub const DEFAULT_LIST_LIMIT: u64 = 50;

/// 列表查询参数
#[derive(Debug, Clone, Default, Deserialize, Serialize, Validate)]
pub struct ListQueryDto {
    /// 最多返回条数
    #[validate(range(min = 1, max = 500))]
    pub limit: Option<u64>,
}

impl ListQueryDto {
    pub fn limit(&self) -> u64 {
        self.limit.unwrap_or(DEFAULT_LIST_LIMIT)
    }
}

/// 周报请求参数
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ReportQueryDto {
    /// 统计起点，默认 7 天前
    pub since: Option<DateTime<Utc>>,
}

impl ReportQueryDto {
    pub fn since(&self) -> DateTime<Utc> {
        self.since
            .unwrap_or_else(|| Utc::now() - chrono::Duration::days(7))
    }
}
