// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::config::settings::LlmSettings;
use crate::domain::services::insight_service::{
    ChangeContext, GenerationError, InsightGenerator, TargetActivity, WeeklyReport,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

const ANALYST_ROLE: &str =
    "You are a competitive intelligence analyst helping businesses track competitor movements.";

/// LLM服务 - 处理与LLM提供商的交互
///
/// # 功能
///
/// 通过 OpenAI 兼容的 chat completions 接口生成变更洞察、目标摘要、周报和建议
///
/// # 配置
///
/// 通过 `llm` 配置段设置：
/// - `api_key` - API密钥，未配置时所有请求返回 `NotConfigured`
/// - `model` - 使用的模型名称
/// - `api_base_url` - API基础URL
/// - `max_tokens` - 单条洞察的最大 token 数
pub struct LlmService {
    client: reqwest::Client,
    api_key: Option<String>,
    model: String,
    api_base_url: String,
    max_tokens: u32,
}

impl LlmService {
    pub fn new(settings: &LlmSettings) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: settings.api_key.clone().filter(|k| !k.trim().is_empty()),
            model: settings.model.clone(),
            api_base_url: settings.api_base_url.trim_end_matches('/').to_string(),
            max_tokens: settings.max_tokens,
        }
    }

    /// 发送一次对话请求，返回回复文本和令牌使用情况
    ///
    /// # 错误
    /// * 当LLM API密钥未配置时返回 `NotConfigured`
    /// * 当请求失败或返回非成功状态时返回 `Request`
    /// * 当响应中没有可用内容时返回 `InvalidResponse`
    pub async fn chat(
        &self,
        system: &str,
        prompt: &str,
        max_tokens: u32,
        json_mode: bool,
    ) -> Result<(String, TokenUsage), GenerationError> {
        let api_key = self.api_key.as_ref().ok_or(GenerationError::NotConfigured)?;

        let mut request_body = json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": prompt }
            ],
            "temperature": 0.7,
            "max_tokens": max_tokens
        });
        if json_mode {
            request_body["response_format"] = json!({ "type": "json_object" });
        }

        let url = format!("{}/chat/completions", self.api_base_url);
        let response = self
            .client
            .post(url)
            .bearer_auth(api_key)
            .json(&request_body)
            .send()
            .await
            .map_err(|e| GenerationError::Request(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(GenerationError::Request(format!(
                "LLM API returned error: {} - {}",
                status, error_text
            )));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| GenerationError::InvalidResponse(e.to_string()))?;

        let usage = body
            .get("usage")
            .map(|usage_val| TokenUsage {
                prompt_tokens: usage_val["prompt_tokens"].as_u64().unwrap_or(0) as u32,
                completion_tokens: usage_val["completion_tokens"].as_u64().unwrap_or(0) as u32,
                total_tokens: usage_val["total_tokens"].as_u64().unwrap_or(0) as u32,
            })
            .unwrap_or_default();

        match body["choices"][0]["message"]["content"].as_str().map(str::trim) {
            Some(content) if !content.is_empty() => Ok((content.to_string(), usage)),
            _ => Err(GenerationError::InvalidResponse(
                "response has no message content".to_string(),
            )),
        }
    }

    async fn text(&self, prompt: &str, max_tokens: u32) -> Result<String, GenerationError> {
        let (content, usage) = self.chat(ANALYST_ROLE, prompt, max_tokens, false).await?;
        tracing::debug!(total_tokens = usage.total_tokens, "LLM call completed");
        Ok(content)
    }
}

fn describe_change(change: &ChangeContext) -> String {
    let subject = match &change.field {
        Some(field) => format!("{} ({})", change.kind, field),
        None => change.kind.to_string(),
    };
    format!("- {}: {} -> {}", subject, change.old_value, change.new_value)
}

#[async_trait]
impl InsightGenerator for LlmService {
    async fn change_insight(&self, context: &ChangeContext) -> Result<String, GenerationError> {
        let prompt = format!(
            "Competitor: {}\nDetected at: {}\nChange:\n{}\n\n\
             In two or three sentences, say what changed, why it may matter to us, \
             and what to watch next.",
            context.target_name,
            context.detected_at.to_rfc3339(),
            describe_change(context),
        );
        self.text(&prompt, self.max_tokens).await
    }

    async fn target_summary(
        &self,
        target_name: &str,
        changes: &[ChangeContext],
    ) -> Result<String, GenerationError> {
        let lines: Vec<String> = changes.iter().map(describe_change).collect();
        let prompt = format!(
            "Competitor: {}\nRecent changes:\n{}\n\n\
             Summarize in two or three sentences what this competitor has been doing.",
            target_name,
            lines.join("\n"),
        );
        self.text(&prompt, self.max_tokens.min(150)).await
    }

    async fn weekly_report(&self, activity: &[TargetActivity]) -> Result<WeeklyReport, GenerationError> {
        let sections: Vec<String> = activity
            .iter()
            .map(|a| {
                let lines: Vec<String> = a.changes.iter().map(describe_change).collect();
                format!("{}:\n{}", a.target_name, lines.join("\n"))
            })
            .collect();
        let prompt = format!(
            "Competitor activity this week:\n\n{}\n\n\
             Reply with a JSON object with keys \"summary\" (3-4 sentences), \
             \"keyChanges\" (3-5 strings) and \"recommendations\" (3-5 strings).",
            sections.join("\n\n"),
        );

        let (content, _) = self
            .chat(
                "You are a competitive intelligence analyst. Always respond with valid JSON.",
                &prompt,
                1000,
                true,
            )
            .await?;
        let cleaned = content
            .trim()
            .trim_start_matches("```json")
            .trim_start_matches("```")
            .trim_end_matches("```");
        serde_json::from_str(cleaned).map_err(|e| GenerationError::InvalidResponse(e.to_string()))
    }

    async fn recommendation(&self, context: &ChangeContext) -> Result<String, GenerationError> {
        let prompt = format!(
            "Change:\n{}\n\nGive exactly one specific, actionable recommendation in one sentence.",
            describe_change(context),
        );
        self.text(&prompt, self.max_tokens.min(100)).await
    }
}
