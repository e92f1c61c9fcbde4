//! HTTP 重试 / 限流行为

mod common;

use common::*;
use pmsync::http::AuthScheme;
use pmsync::PmSyncError;
use serde_json::{json, Value};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn rate_limited_request_is_retried_after_retry_after() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/items"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "0"))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/items"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": true })))
        .expect(1)
        .mount(&server)
        .await;

    let client = api_client(&server, AuthScheme::Bearer("t".to_string()));
    let body: Value = client.get_json("items", &[]).await.unwrap();
    assert_eq!(body["ok"], true);
}

#[tokio::test]
async fn exhausted_rate_limit_reports_attempts() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/items"))
        .respond_with(ResponseTemplate::new(429))
        .expect(3)
        .mount(&server)
        .await;

    let client = api_client(&server, AuthScheme::Bearer("t".to_string()));
    let err = client.get_json::<Value>("items", &[]).await.unwrap_err();
    assert!(matches!(err, PmSyncError::RateLimited { attempts: 3 }));
}

#[tokio::test]
async fn server_errors_back_off_then_succeed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(502))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "results": [] })))
        .expect(1)
        .mount(&server)
        .await;

    let client = api_client(&server, AuthScheme::Bearer("t".to_string()));
    let body: Value = client.post_json("search", &json!({})).await.unwrap();
    assert_eq!(body["results"], json!([]));
}

#[tokio::test]
async fn client_errors_are_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/pages/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_string("object_not_found"))
        .expect(1)
        .mount(&server)
        .await;

    let client = api_client(&server, AuthScheme::Bearer("t".to_string()));
    let err = client.get_json::<Value>("/pages/missing", &[]).await.unwrap_err();
    assert_eq!(err.http_status(), Some(404));
    assert!(matches!(err, PmSyncError::Http { body, .. } if body == "object_not_found"));
}

#[tokio::test]
async fn auth_and_extra_headers_are_sent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/me"))
        .and(header("Authorization", "Bearer secret"))
        .and(header("Notion-Version", "2022-06-28"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "me" })))
        .expect(1)
        .mount(&server)
        .await;

    let client = api_client(&server, AuthScheme::Bearer("secret".to_string()))
        .with_header("Notion-Version", "2022-06-28");
    let body: Value = client.get_json("me", &[]).await.unwrap();
    assert_eq!(body["id"], "me");
}

#[tokio::test]
async fn test_subscriber_survives_repeated_setup() {
    init_tracing();
    init_tracing();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/items"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/items"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": true })))
        .mount(&server)
        .await;

    // 重试路径上的 warn 日志经由测试 subscriber 输出
    let client = api_client(&server, AuthScheme::Bearer("t".to_string()));
    let body: Value = client.get_json("items", &[]).await.unwrap();
    assert_eq!(body["ok"], true);
    assert!(tracing::dispatcher::has_been_set());
}
