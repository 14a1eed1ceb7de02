use chrono::Utc;
use rivalwatch::config::settings::LlmSettings;
use rivalwatch::domain::models::change::ChangeKind;
use rivalwatch::domain::models::notification::{Notification, NotificationKind};
use rivalwatch::domain::services::insight_service::{
    ChangeContext, GenerationError, InsightGenerator, TargetActivity,
};
use rivalwatch::domain::services::llm_service::LlmService;
use rivalwatch::domain::services::notification_service::{DeliveryError, NotificationDelivery};
use rivalwatch::engines::http_fetcher::HttpFetcher;
use rivalwatch::engines::traits::{FetchError, FetchRequest, Fetcher};
use rivalwatch::infrastructure::services::webhook_delivery::{
    sign, WebhookDelivery, SIGNATURE_HEADER, TIMESTAMP_HEADER,
};
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{header, header_exists, method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

fn llm_settings(base_url: &str, api_key: Option<&str>) -> LlmSettings {
    LlmSettings {
        api_key: api_key.map(str::to_string),
        model: "gpt-4o-mini".to_string(),
        api_base_url: base_url.to_string(),
        max_tokens: 200,
    }
}

fn context() -> ChangeContext {
    ChangeContext {
        target_name: "Acme".to_string(),
        kind: ChangeKind::Price,
        field: None,
        old_value: "$10".to_string(),
        new_value: "$12".to_string(),
        detected_at: Utc::now(),
    }
}

fn header_value(request: &Request, name: &str) -> String {
    request
        .headers
        .iter()
        .find(|(key, _)| key.as_str().eq_ignore_ascii_case(name))
        .map(|(_, values)| values.last().as_str().to_string())
        .unwrap()
}

fn completion(content: &str) -> serde_json::Value {
    json!({
        "choices": [{ "message": { "role": "assistant", "content": content } }],
        "usage": { "prompt_tokens": 40, "completion_tokens": 12, "total_tokens": 52 }
    })
}

#[tokio::test]
async fn test_http_fetcher_returns_page() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/pricing"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(
                "<span class=\"price\">$10</span>",
                "text/html; charset=utf-8",
            ),
        )
        .mount(&server)
        .await;

    let fetcher = HttpFetcher::new().unwrap();
    let page = fetcher
        .fetch(&FetchRequest {
            url: format!("{}/pricing", server.uri()),
            timeout: Duration::from_secs(5),
        })
        .await
        .unwrap();

    assert_eq!(page.status_code, 200);
    assert!(page.content.contains("$10"));
    assert!(page.content_type.starts_with("text/html"));
}

#[tokio::test]
async fn test_http_fetcher_classifies_status_errors() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/busy"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/gone"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let fetcher = HttpFetcher::new().unwrap();
    let request = |p: &str| FetchRequest {
        url: format!("{}{}", server.uri(), p),
        timeout: Duration::from_secs(5),
    };

    let busy = fetcher.fetch(&request("/busy")).await.unwrap_err();
    assert_eq!(busy, FetchError::Status(503));
    assert!(busy.is_retryable());

    let gone = fetcher.fetch(&request("/gone")).await.unwrap_err();
    assert_eq!(gone, FetchError::Status(404));
    assert!(!gone.is_retryable());
}

#[tokio::test]
async fn test_http_fetcher_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
        .mount(&server)
        .await;

    let fetcher = HttpFetcher::new().unwrap();
    let result = fetcher
        .fetch(&FetchRequest {
            url: server.uri(),
            timeout: Duration::from_millis(200),
        })
        .await;
    assert_eq!(result.unwrap_err(), FetchError::Timeout);
}

#[tokio::test]
async fn test_llm_change_insight() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer test-key"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(completion("  Acme raised prices by 20%.  ")),
        )
        .expect(1)
        .mount(&server)
        .await;

    let llm = LlmService::new(&llm_settings(&server.uri(), Some("test-key")));
    let insight = llm.change_insight(&context()).await.unwrap();
    assert_eq!(insight, "Acme raised prices by 20%.");
}

#[tokio::test]
async fn test_llm_weekly_report_parses_fenced_json() {
    let server = MockServer::start().await;
    let content = "```json\n{\"summary\":\"Busy week\",\"keyChanges\":[\"Acme price up\"],\"recommendations\":[\"Match pricing\"]}\n```";
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion(content)))
        .mount(&server)
        .await;

    let llm = LlmService::new(&llm_settings(&server.uri(), Some("test-key")));
    let report = llm
        .weekly_report(&[TargetActivity {
            target_name: "Acme".to_string(),
            changes: vec![context()],
        }])
        .await
        .unwrap();

    assert_eq!(report.summary, "Busy week");
    assert_eq!(report.key_changes, vec!["Acme price up".to_string()]);
    assert_eq!(report.recommendations, vec!["Match pricing".to_string()]);
}

#[tokio::test]
async fn test_llm_errors() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
        .mount(&server)
        .await;

    let unconfigured = LlmService::new(&llm_settings(&server.uri(), Some("   ")));
    assert!(matches!(
        unconfigured.change_insight(&context()).await,
        Err(GenerationError::NotConfigured)
    ));

    let llm = LlmService::new(&llm_settings(&server.uri(), Some("test-key")));
    assert!(matches!(
        llm.recommendation(&context()).await,
        Err(GenerationError::Request(_))
    ));
}

#[tokio::test]
async fn test_llm_empty_content_is_invalid() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("   ")))
        .mount(&server)
        .await;

    let llm = LlmService::new(&llm_settings(&server.uri(), Some("test-key")));
    assert!(matches!(
        llm.target_summary("Acme", &[context()]).await,
        Err(GenerationError::InvalidResponse(_))
    ));
}

#[tokio::test]
async fn test_webhook_delivery_signs_payload() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hook"))
        .and(header_exists(SIGNATURE_HEADER))
        .and(header_exists(TIMESTAMP_HEADER))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let delivery = WebhookDelivery::new(
        format!("{}/hook", server.uri()),
        "shared-secret".to_string(),
        Duration::from_secs(5),
    )
    .unwrap();
    let notification = Notification::new(NotificationKind::Change, "Acme: price change detected", "$10 -> $12");
    delivery.deliver(&notification).await.unwrap();

    let requests = server.received_requests().await.unwrap();
    let request = &requests[0];
    let body = String::from_utf8(request.body.clone()).unwrap();
    let timestamp: i64 = header_value(request, TIMESTAMP_HEADER).parse().unwrap();
    let signature = header_value(request, SIGNATURE_HEADER);
    assert_eq!(signature, sign("shared-secret", &body, timestamp));

    let payload: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(payload["event"], "change");
    assert_eq!(payload["id"], notification.id.to_string());
}

#[tokio::test]
async fn test_webhook_delivery_reports_rejection() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let delivery =
        WebhookDelivery::new(server.uri(), "shared-secret".to_string(), Duration::from_secs(5)).unwrap();
    let result = delivery
        .deliver(&Notification::new(NotificationKind::Alert, "title", "message"))
        .await;
    assert!(matches!(result, Err(DeliveryError::Rejected(500))));
}
