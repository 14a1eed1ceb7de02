// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::notification::Notification;
use crate::domain::services::notification_service::{DeliveryError, NotificationDelivery};
use async_trait::async_trait;
use hmac::{Hmac, Mac};
use serde_json::json;
use sha2::Sha256;
use std::time::Duration;

type HmacSha256 = Hmac<Sha256>;

/// 签名请求头
pub const SIGNATURE_HEADER: &str = "X-Rivalwatch-Signature";
/// 时间戳请求头
pub const TIMESTAMP_HEADER: &str = "X-Rivalwatch-Timestamp";

/// Webhook通知投递
///
/// 以 JSON POST 投递通知，请求体使用 HMAC-SHA256 签名
pub struct WebhookDelivery {
    /// HTTP 客户端
    client: reqwest::Client,
    /// 接收地址
    url: String,
    /// 签名密钥
    secret: String,
}

impl WebhookDelivery {
    /// 创建新的 Webhook 投递实现
    pub fn new(url: String, secret: String, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            url,
            secret,
        })
    }

    /// 为负载生成签名
    pub fn generate_signature(&self, payload: &str, timestamp: i64) -> String {
        sign(&self.secret, payload, timestamp)
    }
}

/// 对 `{timestamp}.{payload}` 计算十六进制签名
pub fn sign(secret: &str, payload: &str, timestamp: i64) -> String {
    let message = format!("{}.{}", timestamp, payload);
    // HMAC 接受任意长度的密钥
    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return String::new(),
    };
    mac.update(message.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

#[async_trait]
impl NotificationDelivery for WebhookDelivery {
    async fn deliver(&self, notification: &Notification) -> Result<(), DeliveryError> {
        let timestamp = chrono::Utc::now().timestamp();
        let payload = json!({
            "event": notification.kind,
            "id": notification.id,
            "title": notification.title,
            "message": notification.message,
            "target_id": notification.target_id,
            "change_id": notification.change_id,
            "created_at": notification.created_at,
        })
        .to_string();
        let signature = self.generate_signature(&payload, timestamp);

        let response = self
            .client
            .post(&self.url)
            .header("Content-Type", "application/json")
            .header(SIGNATURE_HEADER, signature)
            .header(TIMESTAMP_HEADER, timestamp.to_string())
            .body(payload)
            .send()
            .await
            .map_err(|e| DeliveryError::Request(e.to_string()))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(DeliveryError::Rejected(response.status().as_u16()))
        }
    }
}
