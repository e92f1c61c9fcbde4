//! 集成测试公共工具：指向 wiremock 的客户端与配置

#![allow(dead_code)]

use std::path::Path;

use pmsync::config::{HttpClientConfig, NOTION_VERSION};
use pmsync::http::{ApiHttpClient, AuthScheme, RetryPolicy};
use pmsync::sources::linear::LinearClient;
use pmsync::sources::notion::NotionClient;
use pmsync::SyncConfig;
use serde_json::{json, Value};
use tracing_subscriber::EnvFilter;
use wiremock::MockServer;

/// 测试日志输出到 libtest 捕获区，`RUST_LOG=pmsync=debug` 可看重试与合并细节
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// 不节流、短超时
pub fn http_config() -> HttpClientConfig {
    HttpClientConfig {
        connect_timeout_secs: Some(5),
        request_timeout_secs: Some(10),
        max_retries: 2,
        rate_limit_fallback_secs: 0,
        min_request_interval_ms: 0,
    }
}

/// 毫秒级退避，测试不用真等
pub fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        max_retries: 2,
        base_delay_ms: 1,
        max_delay_ms: 5,
        backoff_factor: 2.0,
        jitter_factor: 0.0,
        rate_limit_fallback_secs: 0,
    }
}

pub fn api_client(server: &MockServer, auth: AuthScheme) -> ApiHttpClient {
    init_tracing();
    ApiHttpClient::new(&http_config(), server.uri(), auth)
        .unwrap()
        .with_retry_policy(fast_retry())
}

pub fn linear_client(server: &MockServer) -> LinearClient {
    init_tracing();
    let http = ApiHttpClient::new(
        &http_config(),
        format!("{}/graphql", server.uri()),
        AuthScheme::Raw("lin_test_key".to_string()),
    )
    .unwrap()
    .with_retry_policy(fast_retry());
    LinearClient::from_http(http)
}

pub fn notion_client(server: &MockServer) -> NotionClient {
    let http = api_client(server, AuthScheme::Bearer("secret_test".to_string()))
        .with_header("Notion-Version", NOTION_VERSION);
    NotionClient::from_http(http)
}

pub fn sync_config(root: &Path) -> SyncConfig {
    init_tracing();
    SyncConfig::builder()
        .linear_api_key("lin_test_key")
        .linear_team_name("Engineering")
        .linear_output_dir(root.join("Linear"))
        .notion_api_secret("secret_test")
        .notion_output_dir(root.join("Notion"))
        .http_config(http_config())
        .build()
}

pub fn linear_issue(identifier: &str, title: &str, updated_at: &str) -> Value {
    json!({
        "id": format!("uuid-{}", identifier),
        "identifier": identifier,
        "title": title,
        "description": format!("Details for {}", identifier),
        "url": format!("https://linear.app/acme/issue/{}", identifier),
        "state": { "name": "Todo" },
        "priority": 3,
        "createdAt": "2024-01-01T00:00:00.000Z",
        "updatedAt": updated_at,
        "team": { "name": "Engineering" },
        "labels": { "nodes": [] }
    })
}

pub fn issues_page(issues: Vec<Value>, next_cursor: Option<&str>) -> Value {
    json!({
        "data": {
            "issues": {
                "pageInfo": { "hasNextPage": next_cursor.is_some(), "endCursor": next_cursor },
                "nodes": issues
            }
        }
    })
}

pub fn rich_text(text: &str) -> Value {
    json!([{ "type": "text", "plain_text": text, "text": { "content": text } }])
}

pub fn notion_page(id: &str, title: &str, parent: Value, edited: &str) -> Value {
    json!({
        "object": "page",
        "id": id,
        "url": format!("https://www.notion.so/{}", id.replace('-', "")),
        "created_time": "2024-01-01T00:00:00.000Z",
        "last_edited_time": edited,
        "parent": parent,
        "properties": { "title": { "type": "title", "title": rich_text(title) } }
    })
}

pub fn paragraph(id: &str, text: &str) -> Value {
    json!({ "object": "block", "id": id, "type": "paragraph", "has_children": false, "paragraph": { "rich_text": rich_text(text) } })
}

pub fn list(results: Vec<Value>) -> Value {
    json!({ "object": "list", "results": results, "has_more": false, "next_cursor": null })
}
