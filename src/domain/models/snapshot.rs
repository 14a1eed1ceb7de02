// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use uuid::Uuid;

/// 提取结果
///
/// 单值文本，或商品类目标的字段映射。字段使用有序映射，
/// 保证序列化结果稳定，从而内容哈希稳定。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExtractedValue {
    /// 单个文本值
    Text(String),
    /// 字段名到字段值的映射
    Fields(BTreeMap<String, String>),
}

impl ExtractedValue {
    /// 规范化序列化形式，用于哈希与存储
    pub fn canonical(&self) -> String {
        match self {
            ExtractedValue::Text(text) => text.clone(),
            ExtractedValue::Fields(fields) => {
                serde_json::to_string(fields).unwrap_or_default()
            }
        }
    }

    /// 计算内容哈希（SHA-256 十六进制）
    pub fn content_hash(&self) -> String {
        let mut hasher = Sha256::new();
        // 区分文本与字段映射，避免恰好相同的序列化字符串发生碰撞
        match self {
            ExtractedValue::Text(_) => hasher.update(b"t:"),
            ExtractedValue::Fields(_) => hasher.update(b"f:"),
        }
        hasher.update(self.canonical().as_bytes());
        hex::encode(hasher.finalize())
    }

    /// 以字段映射的形式查看；单值文本视为名为 `value` 的单个字段
    pub fn as_fields(&self) -> BTreeMap<String, String> {
        match self {
            ExtractedValue::Text(text) => {
                let mut fields = BTreeMap::new();
                fields.insert("value".to_string(), text.clone());
                fields
            }
            ExtractedValue::Fields(fields) => fields.clone(),
        }
    }
}

/// 快照实体
///
/// 目标最近一次成功提取的内容。每个目标只有一个当前快照，
/// 只有当前快照会被差异比较器读取。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// 所属目标ID
    pub target_id: Uuid,
    /// 提取到的内容
    pub value: ExtractedValue,
    /// 内容哈希
    pub content_hash: String,
    /// 当前内容首次被捕获的时间
    pub captured_at: DateTime<Utc>,
    /// 最近一次确认内容的时间（无变化的抓取也会刷新）
    pub checked_at: DateTime<Utc>,
}

impl Snapshot {
    /// 根据新提取的内容创建快照
    pub fn capture(target_id: Uuid, value: ExtractedValue, at: DateTime<Utc>) -> Self {
        let content_hash = value.content_hash();
        Self {
            target_id,
            value,
            content_hash,
            captured_at: at,
            checked_at: at,
        }
    }
}
