// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// 通知事件实体
///
/// 每个事件拥有独立的已读/未读状态，与任务和变更的状态无关。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Notification {
    /// 事件唯一标识符
    pub id: Uuid,
    /// 事件类型
    pub kind: NotificationKind,
    /// 标题
    pub title: String,
    /// 正文
    pub message: String,
    /// 关联目标
    pub target_id: Option<Uuid>,
    /// 关联变更
    pub change_id: Option<Uuid>,
    /// 是否已读
    pub is_read: bool,
    /// 创建时间
    pub created_at: DateTime<Utc>,
}

/// 通知事件类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// 检测到变更
    Change,
    /// 生成了 AI 洞察
    Insight,
    /// 一次抓取完成
    Scrape,
    /// 抓取失败等需要关注的情况
    Alert,
    /// 周期报告
    Report,
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            NotificationKind::Change => write!(f, "change"),
            NotificationKind::Insight => write!(f, "insight"),
            NotificationKind::Scrape => write!(f, "scrape"),
            NotificationKind::Alert => write!(f, "alert"),
            NotificationKind::Report => write!(f, "report"),
        }
    }
}

impl FromStr for NotificationKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "change" => Ok(NotificationKind::Change),
            "insight" => Ok(NotificationKind::Insight),
            "scrape" => Ok(NotificationKind::Scrape),
            "alert" => Ok(NotificationKind::Alert),
            "report" => Ok(NotificationKind::Report),
            _ => Err(()),
        }
    }
}

impl Notification {
    /// 创建一个未读通知
    pub fn new(kind: NotificationKind, title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            title: title.into(),
            message: message.into(),
            target_id: None,
            change_id: None,
            is_read: false,
            created_at: Utc::now(),
        }
    }

    pub fn for_target(mut self, target_id: Uuid) -> Self {
        self.target_id = Some(target_id);
        self
    }

    pub fn for_change(mut self, change_id: Uuid) -> Self {
        self.change_id = Some(change_id);
        self
    }
}
