use super::helpers::{create_test_app, TestApp};
use axum::http::StatusCode;
use axum_test::TestServer;
use rivalwatch::domain::models::change::Change;
use rivalwatch::domain::models::job::{Job, JobStatus};
use rivalwatch::domain::models::notification::Notification;
use rivalwatch::domain::models::target::Target;
use rivalwatch::presentation::routes;
use serde_json::{json, Value};

fn server(app: &TestApp) -> TestServer {
    TestServer::new(routes::routes(app.app_state())).unwrap()
}

#[tokio::test]
async fn test_health_check() {
    let app = create_test_app().await;
    let server = server(&app);

    let response = server.get("/health").await;
    response.assert_status_ok();
    response.assert_text("OK");
}

#[tokio::test]
async fn test_create_and_fetch_target() {
    let app = create_test_app().await;
    let server = server(&app);

    let response = server
        .post("/v1/targets")
        .json(&json!({
            "name": "Acme",
            "url": "https://acme.example.com/pricing",
            "category": "price",
            "selector": ".price"
        }))
        .await;
    response.assert_status(StatusCode::CREATED);
    let created: Target = response.json();
    assert_eq!(created.name, "Acme");
    assert_eq!(created.interval_secs, 86_400);

    let fetched: Target = server.get(&format!("/v1/targets/{}", created.id)).await.json();
    assert_eq!(fetched.id, created.id);

    let listed: Vec<Target> = server.get("/v1/targets").await.json();
    assert_eq!(listed.len(), 1);
}

#[tokio::test]
async fn test_create_target_validation() {
    let app = create_test_app().await;
    let server = server(&app);

    let bad_url = server
        .post("/v1/targets")
        .json(&json!({ "name": "Acme", "url": "not a url" }))
        .await;
    bad_url.assert_status(StatusCode::BAD_REQUEST);

    let short_interval = server
        .post("/v1/targets")
        .json(&json!({
            "name": "Acme",
            "url": "https://acme.example.com",
            "interval_secs": 10
        }))
        .await;
    short_interval.assert_status(StatusCode::BAD_REQUEST);

    let product_without_fields = server
        .post("/v1/targets")
        .json(&json!({
            "name": "Acme",
            "url": "https://acme.example.com",
            "category": "product"
        }))
        .await;
    product_without_fields.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = product_without_fields.json();
    assert!(body["error"].as_str().unwrap().contains("field=selector"));
}

#[tokio::test]
async fn test_unknown_target_is_not_found() {
    let app = create_test_app().await;
    let server = server(&app);

    server
        .get(&format!("/v1/targets/{}", uuid::Uuid::new_v4()))
        .await
        .assert_status_not_found();
    server
        .post(&format!("/v1/targets/{}/scrape", uuid::Uuid::new_v4()))
        .await
        .assert_status_not_found();
}

#[tokio::test]
async fn test_duplicate_scrape_is_conflict() {
    let app = create_test_app().await;
    let target = app.seed_price_target().await;
    let server = server(&app);

    let first = server.post(&format!("/v1/targets/{}/scrape", target.id)).await;
    first.assert_status(StatusCode::ACCEPTED);
    let job: Job = first.json();
    assert_eq!(job.status, JobStatus::Waiting);

    server
        .post(&format!("/v1/targets/{}/scrape", target.id))
        .await
        .assert_status(StatusCode::CONFLICT);

    let cancelled: Job = server.post(&format!("/v1/jobs/{}/cancel", job.id)).await.json();
    assert_eq!(cancelled.status, JobStatus::Failed);

    server
        .post(&format!("/v1/jobs/{}/cancel", job.id))
        .await
        .assert_status(StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_scrape_inactive_target_is_conflict() {
    let app = create_test_app().await;
    let target = app.seed_price_target().await;
    let server = server(&app);

    let deactivated: Target = server
        .post(&format!("/v1/targets/{}/deactivate", target.id))
        .await
        .json();
    assert!(!deactivated.is_active);

    server
        .post(&format!("/v1/targets/{}/scrape", target.id))
        .await
        .assert_status(StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_job_listing_and_stats() {
    let app = create_test_app().await;
    let server = server(&app);
    app.seed_price_target().await;
    app.seed_price_target().await;

    let scheduled: Value = server.post("/v1/jobs/schedule").await.json();
    assert_eq!(scheduled["enqueued"].as_array().unwrap().len(), 2);

    let jobs: Vec<Job> = server.get("/v1/jobs").add_query_param("limit", 1).await.json();
    assert_eq!(jobs.len(), 1);

    server
        .get("/v1/jobs")
        .add_query_param("limit", 0)
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    let stats: Value = server.get("/v1/jobs/stats").await.json();
    assert_eq!(stats["waiting"], 2);
    assert_eq!(stats["completed"], 0);
}

#[tokio::test]
async fn test_insight_endpoint_is_idempotent() {
    let app = create_test_app().await;
    let target = app.seed_price_target().await;
    let change = app.seed_change(&target, "$10", "$12").await;
    let server = server(&app);

    let first: Change = server
        .post(&format!("/v1/changes/{}/insight", change.id))
        .await
        .json();
    let second = server.post(&format!("/v1/changes/{}/insight", change.id)).await;
    second.assert_status_ok();
    let second: Change = second.json();

    assert_eq!(first.insight, second.insight);
    assert_eq!(app.generator.calls(), 1);

    let listed: Vec<Change> = server
        .get(&format!("/v1/targets/{}/changes", target.id))
        .await
        .json();
    assert_eq!(listed.len(), 1);
    assert!(listed[0].insight.is_some());
}

#[tokio::test]
async fn test_delete_target_with_history_is_conflict() {
    let app = create_test_app().await;
    let target = app.seed_price_target().await;
    app.seed_change(&target, "$10", "$12").await;
    let server = server(&app);

    server
        .delete(&format!("/v1/targets/{}", target.id))
        .await
        .assert_status(StatusCode::CONFLICT);

    let empty = app.seed_price_target().await;
    server
        .delete(&format!("/v1/targets/{}", empty.id))
        .await
        .assert_status(StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_notification_endpoints() {
    let app = create_test_app().await;
    let target = app.seed_price_target().await;
    let change = app.seed_change(&target, "$10", "$12").await;
    let server = server(&app);

    server
        .post(&format!("/v1/changes/{}/insight", change.id))
        .await
        .assert_status_ok();

    let unread: Value = server.get("/v1/notifications/unread-count").await.json();
    assert_eq!(unread["unread"], 1);

    let listed: Vec<Notification> = server.get("/v1/notifications").await.json();
    server
        .post(&format!("/v1/notifications/{}/read", listed[0].id))
        .await
        .assert_status(StatusCode::NO_CONTENT);

    let unread: Value = server.get("/v1/notifications/unread-count").await.json();
    assert_eq!(unread["unread"], 0);

    server
        .post("/v1/notifications/test")
        .await
        .assert_status(StatusCode::NO_CONTENT);
    assert_eq!(app.delivery.delivered().len(), 2);
}
