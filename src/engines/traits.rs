// Copyright 2025 Kirky.X
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use crate::domain::models::snapshot::ExtractedValue;
use crate::domain::models::target::ContentCategory;
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// 抓取错误类型
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FetchError {
    /// 网络错误（连接失败、连接被重置等）
    #[error("Network error: {0}")]
    Network(String),
    /// 非成功的 HTTP 状态码
    #[error("Unexpected HTTP status: {0}")]
    Status(u16),
    /// 单次请求超时
    #[error("Timeout")]
    Timeout,
}

impl FetchError {
    /// 判断错误是否可重试
    ///
    /// 网络错误、超时、5xx 与 429 可重试；其余 4xx 说明请求本身有问题
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::Network(_) | FetchError::Timeout => true,
            FetchError::Status(code) => *code >= 500 || *code == 429,
        }
    }
}

/// 提取错误类型
///
/// 提取失败说明提取指令与页面结构不匹配，需要人工修正，不会重试
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExtractionError {
    /// 选择器无法解析
    #[error("Invalid selector: {0}")]
    InvalidSelector(String),
    /// 选择器没有匹配到任何元素
    #[error("Selector matched nothing: {0}")]
    NoMatch(String),
    /// 内容无法解析
    #[error("Parse error: {0}")]
    Parse(String),
}

/// 抓取请求
#[derive(Debug, Clone)]
pub struct FetchRequest {
    /// 目标URL
    pub url: String,
    /// 单次请求超时时间
    pub timeout: Duration,
}

/// 抓取到的原始页面
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// HTTP状态码
    pub status_code: u16,
    /// 响应内容
    pub content: String,
    /// 内容类型
    pub content_type: String,
}

/// 提取指令
#[derive(Debug, Clone)]
pub struct ExtractionDirective {
    /// 目标声明的内容类别
    pub category: ContentCategory,
    /// CSS 选择器；商品类为 `字段=选择器` 列表
    pub selector: Option<String>,
}

/// 页面抓取器特质
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// 抓取页面，调用方提供单次超时
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchedPage, FetchError>;
}

/// 内容提取器特质
pub trait Extractor: Send + Sync {
    /// 按提取指令从原始内容中提取值
    fn extract(
        &self,
        content: &str,
        directive: &ExtractionDirective,
    ) -> Result<ExtractedValue, ExtractionError>;
}
