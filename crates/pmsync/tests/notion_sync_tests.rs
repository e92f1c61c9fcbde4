//! Notion 同步与审计端到端测试

mod common;

use std::fs;

use common::*;
use pmsync::audit::audit_notion_with;
use pmsync::sources::notion::sync_notion_with;
use pmsync::SyncMode;
use serde_json::{json, Value};
use tempfile::TempDir;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const DB: &str = "dbdbdbdb-0000-4000-8000-000000000001";
const TASK: &str = "11111111-1111-4111-8111-111111111111";
const ROOT: &str = "22222222-2222-4222-8222-222222222222";
const CHILD: &str = "33333333-3333-4333-8333-333333333333";

fn database() -> Value {
    json!({
        "object": "database",
        "id": DB,
        "title": rich_text("Tasks"),
        "url": format!("https://www.notion.so/{}", DB.replace('-', "")),
        "last_edited_time": "2024-03-01T00:00:00.000Z",
        "parent": { "type": "workspace", "workspace": true }
    })
}

fn task_page() -> Value {
    notion_page(
        TASK,
        "Ship v2",
        json!({ "type": "database_id", "database_id": DB }),
        "2024-03-01T00:00:00.000Z",
    )
}

fn root_page(title: &str, edited: &str) -> Value {
    notion_page(ROOT, title, json!({ "type": "workspace", "workspace": true }), edited)
}

fn child_page() -> Value {
    notion_page(
        CHILD,
        "Onboarding",
        json!({ "type": "page_id", "page_id": ROOT }),
        "2024-03-01T00:00:00.000Z",
    )
}

async fn mount_search(server: &MockServer, object: &str, results: Vec<Value>) {
    Mock::given(method("POST"))
        .and(path("/search"))
        .and(body_string_contains(format!("\"value\":\"{}\"", object)))
        .respond_with(ResponseTemplate::new(200).set_body_json(list(results)))
        .mount(server)
        .await;
}

async fn mount_get(server: &MockServer, endpoint: String, body: Value) {
    Mock::given(method("GET"))
        .and(path(endpoint))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

async fn mount_database_query(server: &MockServer, results: Vec<Value>) {
    Mock::given(method("POST"))
        .and(path(format!("/databases/{}/query", DB)))
        .respond_with(ResponseTemplate::new(200).set_body_json(list(results)))
        .mount(server)
        .await;
}

async fn mount_root_content(server: &MockServer, root: Value) {
    mount_get(server, format!("/pages/{}", ROOT), root).await;
    mount_get(
        server,
        format!("/blocks/{}/children", ROOT),
        list(vec![
            paragraph("b-root", "Welcome to the handbook"),
            json!({ "object": "block", "id": CHILD, "type": "child_page", "has_children": false, "child_page": { "title": "Onboarding" } }),
        ]),
    )
    .await;
}

#[tokio::test]
async fn full_sync_writes_one_directory_per_collection() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = sync_config(dir.path());
    let client = notion_client(&server);

    mount_search(&server, "database", vec![database()]).await;
    mount_search(
        &server,
        "page",
        vec![task_page(), root_page("Handbook", "2024-03-01T00:00:00.000Z"), child_page()],
    )
    .await;
    mount_database_query(&server, vec![task_page()]).await;
    mount_get(&server, format!("/pages/{}", TASK), task_page()).await;
    mount_get(
        &server,
        format!("/blocks/{}/children", TASK),
        list(vec![paragraph("b-task", "Cut the release branch")]),
    )
    .await;
    mount_root_content(&server, root_page("Handbook", "2024-03-01T00:00:00.000Z")).await;
    mount_get(&server, format!("/pages/{}", CHILD), child_page()).await;
    mount_get(
        &server,
        format!("/blocks/{}/children", CHILD),
        list(vec![paragraph("b-child", "Day one checklist")]),
    )
    .await;

    let report = sync_notion_with(&client, &config, SyncMode::Full).await.unwrap();
    assert_eq!(report.new_ids.len(), 3);

    let notion_dir = dir.path().join("Notion");
    let tasks = fs::read_to_string(notion_dir.join("Tasks/Pages-Batch-1.md")).unwrap();
    assert!(tasks.starts_with("# Tasks - Page Batch 1\n"));
    assert!(tasks.contains("# Ship v2\n"));
    assert!(tasks.contains("Cut the release branch"));

    let roots = fs::read_to_string(notion_dir.join("Root Pages/Pages-Batch-1.md")).unwrap();
    assert!(roots.starts_with("# Root Pages - Page Batch 1\n"));
    let handbook = roots.find("# Handbook\n").unwrap();
    let onboarding = roots.find("# Onboarding\n").unwrap();
    assert!(handbook < onboarding, "pages are ordered by title");
    assert!(roots.contains("Day one checklist"));
    assert!(!notion_dir.join("Wiki").exists());

    let status = fs::read_to_string(config.notion.status_path()).unwrap();
    assert!(!status.contains("`lastFullSyncTimestamp`: None"));
    assert!(!status.contains("`nextFullSync`: None"));
    assert!(!status.contains("`lastIncrementalSyncTimestamp`: None"));
    assert!(status.contains(&report.summary_line));
}

#[tokio::test]
async fn incremental_sync_only_rewrites_changed_collections() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = sync_config(dir.path());
    let client = notion_client(&server);

    mount_search(&server, "database", vec![database()]).await;
    mount_search(&server, "page", vec![root_page("Handbook", "2024-03-01T00:00:00.000Z")]).await;
    mount_database_query(&server, vec![task_page()]).await;
    mount_get(&server, format!("/pages/{}", TASK), task_page()).await;
    mount_get(
        &server,
        format!("/blocks/{}/children", TASK),
        list(vec![paragraph("b-task", "Cut the release branch")]),
    )
    .await;
    mount_root_content(&server, root_page("Handbook", "2024-03-01T00:00:00.000Z")).await;
    mount_get(&server, format!("/pages/{}", CHILD), child_page()).await;
    mount_get(&server, format!("/blocks/{}/children", CHILD), list(vec![])).await;

    sync_notion_with(&client, &config, SyncMode::Full).await.unwrap();
    let notion_dir = dir.path().join("Notion");
    let tasks_path = notion_dir.join("Tasks/Pages-Batch-1.md");
    let tasks_before = fs::read_to_string(&tasks_path).unwrap();

    server.reset().await;
    let edited = "2099-01-01T00:00:00.000Z";
    mount_search(&server, "database", vec![database()]).await;
    mount_search(&server, "page", vec![root_page("Handbook 2", edited)]).await;
    mount_database_query(&server, vec![]).await;
    mount_root_content(&server, root_page("Handbook 2", edited)).await;

    let report = sync_notion_with(&client, &config, SyncMode::Incremental)
        .await
        .unwrap();
    assert_eq!(report.updated_ids, vec![ROOT.to_string()]);
    assert!(report.new_ids.is_empty());
    assert_eq!(report.rewritten, vec![notion_dir.join("Root Pages/Pages-Batch-1.md")]);

    let roots = fs::read_to_string(notion_dir.join("Root Pages/Pages-Batch-1.md")).unwrap();
    assert!(roots.contains("# Handbook 2\n"));
    assert!(roots.contains("# Onboarding\n"));
    assert_eq!(fs::read_to_string(&tasks_path).unwrap(), tasks_before);

    let status = fs::read_to_string(config.notion.status_path()).unwrap();
    assert!(status.contains("## Incremental Summaries"));
    assert!(status.contains(&report.summary_line));
}

async fn mount_full_workspace(server: &MockServer, task_available: bool) {
    mount_search(server, "database", vec![database()]).await;
    mount_search(
        server,
        "page",
        vec![root_page("Handbook", "2024-03-01T00:00:00.000Z"), child_page()],
    )
    .await;
    mount_database_query(server, vec![task_page()]).await;
    if task_available {
        mount_get(server, format!("/pages/{}", TASK), task_page()).await;
    } else {
        Mock::given(method("GET"))
            .and(path(format!("/pages/{}", TASK)))
            .respond_with(ResponseTemplate::new(500))
            .mount(server)
            .await;
    }
    mount_get(
        server,
        format!("/blocks/{}/children", TASK),
        list(vec![paragraph("b-task", "Cut the release branch")]),
    )
    .await;
    mount_root_content(server, root_page("Handbook", "2024-03-01T00:00:00.000Z")).await;
    mount_get(server, format!("/pages/{}", CHILD), child_page()).await;
    mount_get(server, format!("/blocks/{}/children", CHILD), list(vec![])).await;
}

#[tokio::test]
async fn full_sync_keeps_pages_that_failed_to_load() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = sync_config(dir.path());
    let client = notion_client(&server);

    mount_full_workspace(&server, true).await;
    sync_notion_with(&client, &config, SyncMode::Full).await.unwrap();
    let tasks_path = dir.path().join("Notion/Tasks/Pages-Batch-1.md");
    let tasks_before = fs::read_to_string(&tasks_path).unwrap();
    assert!(tasks_before.contains("# Ship v2\n"));

    server.reset().await;
    mount_full_workspace(&server, false).await;
    let report = sync_notion_with(&client, &config, SyncMode::Full).await.unwrap();

    assert!(report.removed_ids.is_empty());
    assert!(report.removed.is_empty());
    assert_eq!(fs::read_to_string(&tasks_path).unwrap(), tasks_before);
}

#[tokio::test]
async fn incremental_sync_without_status_doc_fails() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = sync_config(dir.path());

    let err = sync_notion_with(&notion_client(&server), &config, SyncMode::Incremental)
        .await
        .unwrap_err();
    assert!(err.is_structural());
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn audit_lists_pages_missing_locally() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = sync_config(dir.path());

    let notion_dir = dir.path().join("Notion");
    fs::create_dir_all(notion_dir.join("Root Pages")).unwrap();
    fs::write(
        notion_dir.join("Root Pages/Pages-Batch-1.md"),
        format!(
            "# Handbook\n\n**Notion URL:** https://www.notion.so/Handbook-{}\n",
            ROOT.replace('-', "")
        ),
    )
    .unwrap();

    mount_search(&server, "database", vec![database()]).await;
    mount_search(
        &server,
        "page",
        vec![root_page("Handbook", "2024-03-01T00:00:00.000Z"), child_page()],
    )
    .await;
    mount_database_query(&server, vec![task_page()]).await;

    let report = audit_notion_with(&notion_client(&server), &config).await.unwrap();
    let result = &report.result;
    assert_eq!(result.remote_count, 3);
    assert_eq!(result.local_files.len(), 1);
    assert_eq!(
        result.missing_pages.iter().map(|p| p.title.as_str()).collect::<Vec<_>>(),
        vec!["Onboarding"]
    );
    assert_eq!(result.missing_databases.len(), 1);
    assert!(report.text.contains("Contains: 1 pages"));

    assert!(report.text_path.exists());
    let json: Value = serde_json::from_str(&fs::read_to_string(&report.json_path).unwrap()).unwrap();
    assert_eq!(json["missing_pages"][0]["title"], "Onboarding");
    assert_eq!(json["missing_by_category"]["Child Pages"][0], "Onboarding");
}
