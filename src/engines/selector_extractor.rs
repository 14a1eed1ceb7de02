// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::snapshot::ExtractedValue;
use crate::domain::models::target::ContentCategory;
use crate::engines::traits::{ExtractionDirective, ExtractionError, Extractor};
use scraper::{ElementRef, Html, Selector};
use std::collections::BTreeMap;

/// 基于 CSS 选择器的内容提取器
///
/// 指令格式：
/// - 单值类别：`选择器` 或 `选择器@属性`，例如 `.price`、`a.cta@href`
/// - 商品类别：`字段=选择器` 列表，以 `;` 或换行分隔，例如 `name=h1; price=.price`
///
/// 未提供选择器时取整个文档的可见文本
#[derive(Debug, Default, Clone)]
pub struct SelectorExtractor;

impl SelectorExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl Extractor for SelectorExtractor {
    fn extract(
        &self,
        content: &str,
        directive: &ExtractionDirective,
    ) -> Result<ExtractedValue, ExtractionError> {
        let document = Html::parse_document(content);
        let selector = directive
            .selector
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty());

        match (directive.category, selector) {
            (ContentCategory::Product, Some(spec)) => extract_fields(&document, spec),
            (ContentCategory::Product, None) => Err(ExtractionError::Parse(
                "product targets need `field=selector` pairs".to_string(),
            )),
            (category, Some(spec)) => {
                let (css, attr) = split_attribute(spec);
                let parsed = parse_selector(css)?;
                let take_all = matches!(category, ContentCategory::Text | ContentCategory::Content);
                select_value(&document, &parsed, attr, take_all, category)
                    .map(ExtractedValue::Text)
                    .ok_or_else(|| ExtractionError::NoMatch(spec.to_string()))
            }
            (_, None) => {
                let text = collapse(document.root_element().text());
                if text.is_empty() {
                    Err(ExtractionError::NoMatch("<document>".to_string()))
                } else {
                    Ok(ExtractedValue::Text(text))
                }
            }
        }
    }
}

fn extract_fields(document: &Html, spec: &str) -> Result<ExtractedValue, ExtractionError> {
    let mut fields = BTreeMap::new();
    let mut declared = 0usize;

    for pair in spec.split([';', '\n']).map(str::trim).filter(|p| !p.is_empty()) {
        let (name, css) = pair
            .split_once('=')
            .map(|(n, s)| (n.trim(), s.trim()))
            .filter(|(n, s)| !n.is_empty() && !s.is_empty())
            .ok_or_else(|| ExtractionError::Parse(format!("expected `field=selector`, got `{}`", pair)))?;
        declared += 1;

        let (css, attr) = split_attribute(css);
        let parsed = parse_selector(css)?;
        // 单个字段缺失视为该字段被移除，由差异比较器报告
        if let Some(value) = select_value(document, &parsed, attr, false, ContentCategory::Product) {
            fields.insert(name.to_string(), value);
        }
    }

    if declared == 0 {
        return Err(ExtractionError::Parse("no field selectors declared".to_string()));
    }
    if fields.is_empty() {
        return Err(ExtractionError::NoMatch(spec.to_string()));
    }
    Ok(ExtractedValue::Fields(fields))
}

fn select_value(
    document: &Html,
    selector: &Selector,
    attr: Option<&str>,
    take_all: bool,
    category: ContentCategory,
) -> Option<String> {
    let mut matches = document.select(selector);
    let value = if take_all {
        let parts: Vec<String> = matches
            .filter_map(|element| element_value(element, attr, category))
            .collect();
        (!parts.is_empty()).then(|| parts.join("\n"))
    } else {
        matches.find_map(|element| element_value(element, attr, category))
    };
    value.filter(|v| !v.is_empty())
}

fn element_value(element: ElementRef<'_>, attr: Option<&str>, category: ContentCategory) -> Option<String> {
    match attr {
        Some(name) => element.value().attr(name).map(|v| v.trim().to_string()),
        // URL 类目标默认读取链接地址
        None if category == ContentCategory::Url => element
            .value()
            .attr("href")
            .map(|v| v.trim().to_string())
            .or_else(|| Some(collapse(element.text()))),
        None => Some(collapse(element.text())),
    }
}

fn parse_selector(css: &str) -> Result<Selector, ExtractionError> {
    Selector::parse(css).map_err(|e| ExtractionError::InvalidSelector(format!("{}: {}", css, e)))
}

/// 拆分 `选择器@属性`
fn split_attribute(spec: &str) -> (&str, Option<&str>) {
    match spec.rsplit_once('@') {
        Some((css, attr)) if !css.trim().is_empty() && is_attribute_name(attr) => (css.trim(), Some(attr)),
        _ => (spec, None),
    }
}

fn is_attribute_name(value: &str) -> bool {
    !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == ':')
}

fn collapse<'a>(parts: impl Iterator<Item = &'a str>) -> String {
    parts
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
#[path = "selector_extractor_test.rs"]
mod tests;
