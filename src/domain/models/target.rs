// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// 监控目标实体
///
/// 表示一个被监控的竞品页面：地址、提取指令、轮询间隔和最近一次运行的结果。
/// 目标由用户创建，调度器只修改运行时间戳与运行结果，
/// 用户只能修改轮询间隔、启用状态和提取指令。存在关联变更时只做软停用。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Target {
    /// 目标唯一标识符
    pub id: Uuid,
    /// 展示名称（竞品名称）
    pub name: String,
    /// 来源URL
    pub url: String,
    /// 平台标签，例如 shopify、amazon
    pub platform: Option<String>,
    /// 声明的内容类别，决定差异比较规则
    pub category: ContentCategory,
    /// 提取指令（CSS 选择器）；商品类目标使用 `字段=选择器` 列表
    pub selector: Option<String>,
    /// 轮询间隔（秒）
    pub interval_secs: i64,
    /// 是否启用
    pub is_active: bool,
    /// 最近一次运行时间
    pub last_run_at: Option<DateTime<Utc>>,
    /// 最近一次运行结果
    pub last_outcome: Option<RunOutcome>,
    /// 创建时间
    pub created_at: DateTime<Utc>,
    /// 更新时间
    pub updated_at: DateTime<Utc>,
}

/// 内容类别
///
/// 目标声明的内容类型，差异比较器据此选择对应的比较函数
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ContentCategory {
    /// 价格类内容，按货币数值比较
    Price,
    /// 自由文本，变更类型为 text
    #[default]
    Text,
    /// 自由文本，变更类型为 content
    Content,
    /// 结构化商品字段，逐字段比较
    Product,
    /// URL，精确字符串比较
    Url,
}

impl fmt::Display for ContentCategory {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ContentCategory::Price => write!(f, "price"),
            ContentCategory::Text => write!(f, "text"),
            ContentCategory::Content => write!(f, "content"),
            ContentCategory::Product => write!(f, "product"),
            ContentCategory::Url => write!(f, "url"),
        }
    }
}

impl FromStr for ContentCategory {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "price" => Ok(ContentCategory::Price),
            "text" => Ok(ContentCategory::Text),
            "content" => Ok(ContentCategory::Content),
            "product" => Ok(ContentCategory::Product),
            "url" => Ok(ContentCategory::Url),
            _ => Err(()),
        }
    }
}

/// 最近一次运行结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    /// 运行成功，内容无变化
    Unchanged,
    /// 运行成功，检测到变更
    Changed,
    /// 运行失败
    Failed,
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RunOutcome::Unchanged => write!(f, "unchanged"),
            RunOutcome::Changed => write!(f, "changed"),
            RunOutcome::Failed => write!(f, "failed"),
        }
    }
}

impl FromStr for RunOutcome {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unchanged" => Ok(RunOutcome::Unchanged),
            "changed" => Ok(RunOutcome::Changed),
            "failed" => Ok(RunOutcome::Failed),
            _ => Err(()),
        }
    }
}

impl Target {
    /// 创建一个新的监控目标
    pub fn new(
        name: String,
        url: String,
        category: ContentCategory,
        selector: Option<String>,
        interval_secs: i64,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name,
            url,
            platform: None,
            category,
            selector,
            interval_secs,
            is_active: true,
            last_run_at: None,
            last_outcome: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// 判断目标在 `now` 时刻是否到期
    ///
    /// 从未运行过的目标总是到期；否则要求 `now - last_run_at >= interval`
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        if !self.is_active {
            return false;
        }
        match self.last_run_at {
            None => true,
            Some(last) => now - last >= Duration::seconds(self.interval_secs),
        }
    }
}
