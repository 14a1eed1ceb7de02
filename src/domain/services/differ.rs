// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::change::{Change, ChangeKind};
use crate::domain::models::snapshot::ExtractedValue;
use crate::domain::models::target::ContentCategory;
use chrono::{DateTime, Utc};
use regex::Regex;
use std::collections::BTreeSet;
use std::sync::LazyLock;
use uuid::Uuid;

static PRICE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"-?\d[\d,]*(?:\.\d+)?").expect("Failed to compile price regex"));

/// 价格数值无法解析、退回文本比较时使用的置信度
const UNPARSED_PRICE_CONFIDENCE: f64 = 0.5;

/// 差异比较器输出的一条差异
///
/// 尚未绑定目标与时间，由调用方转换为 [`Change`]
#[derive(Debug, Clone, PartialEq)]
pub struct Difference {
    pub kind: ChangeKind,
    pub field: Option<String>,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
    pub confidence: f64,
}

impl Difference {
    fn new(kind: ChangeKind, old: &str, new: &str, confidence: f64) -> Self {
        Self {
            kind,
            field: None,
            old_value: Some(old.to_string()),
            new_value: Some(new.to_string()),
            confidence,
        }
    }

    /// 绑定目标与检测时间，生成变更记录
    pub fn into_change(self, target_id: Uuid, detected_at: DateTime<Utc>) -> Change {
        let mut change = Change::new(
            target_id,
            self.kind,
            self.old_value,
            self.new_value,
            self.confidence,
            detected_at,
        );
        change.field = self.field;
        change
    }
}

/// 比较同一目标的新旧提取结果
///
/// 按目标声明的内容类别分派到对应的比较函数。规范化后完全相同的内容
/// 永远不会产生差异；一次比较可以产生多条差异。
pub fn diff(category: ContentCategory, old: &ExtractedValue, new: &ExtractedValue) -> Vec<Difference> {
    match (category, old, new) {
        (ContentCategory::Product, _, _) => diff_product(old, new),
        (_, ExtractedValue::Text(old), ExtractedValue::Text(new)) => match category {
            ContentCategory::Price => diff_price(old, new).into_iter().collect(),
            ContentCategory::Text => diff_text(old, new, ChangeKind::Text).into_iter().collect(),
            ContentCategory::Content => diff_text(old, new, ChangeKind::Content).into_iter().collect(),
            ContentCategory::Url => diff_url(old, new).into_iter().collect(),
            ContentCategory::Product => Vec::new(),
        },
        // 提取结果的形态与类别不符（例如选择器被改成了字段列表）
        _ => diff_shape(old, new).into_iter().collect(),
    }
}

/// 折叠空白并去除首尾空白，保留大小写
pub fn normalize(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// 从文本中解析货币金额，单位为分
pub fn parse_price_cents(value: &str) -> Option<i64> {
    let matched = PRICE_PATTERN.find(value)?;
    let digits = matched.as_str().replace(',', "");
    let amount: f64 = digits.parse().ok()?;
    if !amount.is_finite() {
        return None;
    }
    Some((amount * 100.0).round() as i64)
}

/// 价格类比较
///
/// 两侧都能解析时按数值比较；任一侧无法解析时退回规范化文本比较，置信度降为 0.5
pub fn diff_price(old: &str, new: &str) -> Option<Difference> {
    match (parse_price_cents(old), parse_price_cents(new)) {
        (Some(old_cents), Some(new_cents)) => {
            (old_cents != new_cents).then(|| Difference::new(ChangeKind::Price, old, new, 1.0))
        }
        _ => (normalize(old) != normalize(new))
            .then(|| Difference::new(ChangeKind::Price, old, new, UNPARSED_PRICE_CONFIDENCE)),
    }
}

/// 自由文本比较，置信度为规范化编辑相似度
pub fn diff_text(old: &str, new: &str, kind: ChangeKind) -> Option<Difference> {
    let old_normalized = normalize(old);
    let new_normalized = normalize(new);
    if old_normalized == new_normalized {
        return None;
    }
    let similarity = strsim::normalized_levenshtein(&old_normalized, &new_normalized);
    Some(Difference::new(kind, old, new, similarity.clamp(0.0, 1.0)))
}

/// URL 比较，规范化空白后精确比较（区分大小写）
pub fn diff_url(old: &str, new: &str) -> Option<Difference> {
    (normalize(old) != normalize(new)).then(|| Difference::new(ChangeKind::Url, old, new, 1.0))
}

/// 商品字段逐项比较，每个不同的字段产生一条差异
pub fn diff_product(old: &ExtractedValue, new: &ExtractedValue) -> Vec<Difference> {
    let old_fields = old.as_fields();
    let new_fields = new.as_fields();
    let keys: BTreeSet<&String> = old_fields.keys().chain(new_fields.keys()).collect();

    keys.into_iter()
        .filter_map(|key| {
            let before = old_fields.get(key);
            let after = new_fields.get(key);
            let same = match (before, after) {
                (Some(a), Some(b)) => normalize(a) == normalize(b),
                (None, None) => true,
                _ => false,
            };
            (!same).then(|| Difference {
                kind: ChangeKind::Product,
                field: Some(key.clone()),
                old_value: before.cloned(),
                new_value: after.cloned(),
                confidence: 1.0,
            })
        })
        .collect()
}

fn diff_shape(old: &ExtractedValue, new: &ExtractedValue) -> Option<Difference> {
    let old_canonical = old.canonical();
    let new_canonical = new.canonical();
    (normalize(&old_canonical) != normalize(&new_canonical))
        .then(|| Difference::new(ChangeKind::Other, &old_canonical, &new_canonical, 1.0))
}
