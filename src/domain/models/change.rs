// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// 变更记录实体
///
/// 两次快照之间一次被分类、带置信度的差异。创建后不可变，
/// 唯一的例外是一次性附加的 AI 洞察文本。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Change {
    /// 变更唯一标识符
    pub id: Uuid,
    /// 所属目标ID
    pub target_id: Uuid,
    /// 变更类型
    pub kind: ChangeKind,
    /// 商品类变更对应的字段名
    pub field: Option<String>,
    /// 旧值
    pub old_value: Option<String>,
    /// 新值
    pub new_value: Option<String>,
    /// 分类置信度，取值 [0, 1]
    pub confidence: f64,
    /// 检测时间
    pub detected_at: DateTime<Utc>,
    /// AI 洞察，至多设置一次
    pub insight: Option<String>,
}

/// 变更类型枚举
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Price,
    Content,
    Product,
    Text,
    Url,
    Other,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ChangeKind::Price => write!(f, "price"),
            ChangeKind::Content => write!(f, "content"),
            ChangeKind::Product => write!(f, "product"),
            ChangeKind::Text => write!(f, "text"),
            ChangeKind::Url => write!(f, "url"),
            ChangeKind::Other => write!(f, "other"),
        }
    }
}

impl FromStr for ChangeKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "price" => Ok(ChangeKind::Price),
            "content" => Ok(ChangeKind::Content),
            "product" => Ok(ChangeKind::Product),
            "text" => Ok(ChangeKind::Text),
            "url" => Ok(ChangeKind::Url),
            "other" => Ok(ChangeKind::Other),
            _ => Err(()),
        }
    }
}

impl Change {
    /// 创建一条新的变更记录，置信度会被截断到 [0, 1]
    pub fn new(
        target_id: Uuid,
        kind: ChangeKind,
        old_value: Option<String>,
        new_value: Option<String>,
        confidence: f64,
        detected_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            target_id,
            kind,
            field: None,
            old_value,
            new_value,
            confidence: clamp_confidence(confidence),
            detected_at,
            insight: None,
        }
    }

    /// 指定商品字段名
    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    /// 是否已经附加过洞察
    pub fn is_annotated(&self) -> bool {
        self.insight.is_some()
    }
}

fn clamp_confidence(value: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(0.0, 1.0)
}
