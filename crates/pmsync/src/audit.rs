//! Notion 本地导出审计
//!
//! 扫描 Notion 输出目录里的 markdown，收集其中的 `**Notion URL:**`，
//! 与工作区里实际可访问的页面 / 数据库对比，列出本地缺失的条目。

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Serialize;
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::config::SyncConfig;
use crate::error::Result;
use crate::sources::notion::{
    clean_page_id, database_title, extract_page_id_from_url, page_title, NotionClient, NotionDatabase,
    NotionPage, SearchObject,
};
use crate::utils::{format_generated, write_atomic};

pub const TEXT_REPORT: &str = "comparison_report.txt";
pub const JSON_REPORT: &str = "comparison_report.json";

/// 每个分类最多列出的条目数
const CATEGORY_LIST_LIMIT: usize = 20;
/// 完整清单中最多列出的页面数
const FULL_LIST_LIMIT: usize = 100;

/// 本地 markdown 文件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalFile {
    pub relative_path: PathBuf,
    /// 文件中出现的全部 Notion URL（批文件里有多条）
    pub notion_urls: Vec<String>,
}

/// 远端条目类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RemoteKind {
    Page,
    Database,
}

/// 远端页面或数据库
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteItem {
    pub id: String,
    pub title: String,
    pub url: String,
    pub kind: RemoteKind,
    /// parent.type
    pub parent_kind: String,
}

impl RemoteItem {
    pub fn from_page(page: &NotionPage) -> Self {
        Self {
            id: clean_page_id(&page.id),
            title: page_title(page),
            url: page.url.clone().unwrap_or_default(),
            kind: RemoteKind::Page,
            parent_kind: page.parent.kind.clone(),
        }
    }

    pub fn from_database(database: &NotionDatabase) -> Self {
        Self {
            id: clean_page_id(&database.id),
            title: database_title(database),
            url: database.url.clone().unwrap_or_default(),
            kind: RemoteKind::Database,
            parent_kind: database.parent.kind.clone(),
        }
    }

    /// 按父级类型归类
    pub fn category(&self) -> &'static str {
        match self.parent_kind.as_str() {
            "workspace" => "Root Level",
            "page_id" => "Child Pages",
            "database_id" => "Database Entries",
            _ => "Other",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MissingItem {
    pub id: String,
    pub title: String,
    pub url: String,
    #[serde(rename = "type")]
    pub kind: RemoteKind,
}

/// 对比结果
#[derive(Debug, Clone, Default)]
pub struct AuditResult {
    pub remote_count: usize,
    pub local_files: Vec<LocalFile>,
    pub missing_pages: Vec<MissingItem>,
    pub missing_databases: Vec<MissingItem>,
    pub by_category: BTreeMap<&'static str, Vec<MissingItem>>,
}

#[derive(Debug, Serialize)]
struct JsonReport<'a> {
    timestamp: String,
    notion_count: usize,
    local_count: usize,
    missing_pages: &'a [MissingItem],
    missing_databases: &'a [MissingItem],
    missing_by_category: BTreeMap<&'static str, Vec<&'a str>>,
}

/// 扫描目录下所有 `.md` 文件
pub fn scan_local_files(root: &Path) -> Result<Vec<LocalFile>> {
    if !root.exists() {
        warn!("⚠️ 本地 Notion 目录不存在: {}", root.display());
        return Ok(Vec::new());
    }
    let url_re = Regex::new(r"\*\*Notion URL:\*\* (.+)")?;

    let mut files = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("⚠️ 遍历目录出错: {}", e);
                continue;
            }
        };
        let path = entry.path();
        if !entry.file_type().is_file() || path.extension().and_then(|e| e.to_str()) != Some("md") {
            continue;
        }
        let notion_urls = match fs::read(path) {
            Ok(bytes) => url_re
                .captures_iter(&String::from_utf8_lossy(&bytes))
                .map(|c| c[1].trim().to_string())
                .collect(),
            Err(e) => {
                warn!("⚠️ 读取 {} 失败: {}", path.display(), e);
                Vec::new()
            }
        };
        files.push(LocalFile {
            relative_path: path.strip_prefix(root).unwrap_or(path).to_path_buf(),
            notion_urls,
        });
    }
    Ok(files)
}

/// 找出本地没有的远端条目（按 id 或 URL 匹配）
pub fn find_missing(remote: &[RemoteItem], local: &[LocalFile]) -> AuditResult {
    let mut local_ids: HashSet<String> = HashSet::new();
    let mut local_urls: HashSet<&str> = HashSet::new();
    for file in local {
        for url in &file.notion_urls {
            local_urls.insert(url.as_str());
            let id = clean_page_id(&extract_page_id_from_url(url));
            if !id.is_empty() {
                local_ids.insert(id);
            }
        }
    }

    let mut result = AuditResult {
        remote_count: remote.len(),
        local_files: local.to_vec(),
        ..AuditResult::default()
    };
    for item in remote {
        if local_ids.contains(&item.id) || local_urls.contains(item.url.as_str()) {
            continue;
        }
        let missing = MissingItem {
            id: item.id.clone(),
            title: item.title.clone(),
            url: item.url.clone(),
            kind: item.kind,
        };
        match item.kind {
            RemoteKind::Database => result.missing_databases.push(missing.clone()),
            RemoteKind::Page => result.missing_pages.push(missing.clone()),
        }
        result.by_category.entry(item.category()).or_default().push(missing);
    }
    result
}

/// 文本报告
///
/// `database_sizes` 是缺失数据库的页面数（查询失败的不列）。
pub fn render_text_report(
    result: &AuditResult,
    generated: &DateTime<Utc>,
    database_sizes: &BTreeMap<String, usize>,
) -> String {
    let rule = "=".repeat(80);
    let thin = "-".repeat(80);
    let mut lines: Vec<String> = vec![
        rule.clone(),
        "NOTION LOCAL COMPARISON REPORT".to_string(),
        rule,
        format!("Generated: {}\n", format_generated(generated)),
        "SUMMARY".to_string(),
        thin.clone(),
        format!("Total Notion pages/databases: {}", result.remote_count),
        format!("Total local files: {}", result.local_files.len()),
        format!("Missing pages: {}", result.missing_pages.len()),
        format!("Missing databases: {}", result.missing_databases.len()),
        String::new(),
        "LOCAL FILES BREAKDOWN".to_string(),
        thin.clone(),
    ];

    let mut by_dir: BTreeMap<String, usize> = BTreeMap::new();
    for file in &result.local_files {
        let dir = file
            .relative_path
            .parent()
            .map(|p| p.display().to_string())
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| ".".to_string());
        *by_dir.entry(dir).or_default() += 1;
    }
    for (dir, count) in &by_dir {
        lines.push(format!("  {}: {} files", dir, count));
    }
    lines.push(String::new());

    if !result.missing_databases.is_empty() {
        lines.push("MISSING DATABASES".to_string());
        lines.push(thin.clone());
        for db in &result.missing_databases {
            lines.push(format!("  - {}", db.title));
            lines.push(format!("    URL: {}", db.url));
            lines.push(format!("    ID: {}", db.id));
            if let Some(count) = database_sizes.get(&db.id) {
                lines.push(format!("    Contains: {} pages", count));
            }
            lines.push(String::new());
        }
    }

    if result.missing_pages.is_empty() && result.missing_databases.is_empty() {
        lines.push("\n✓ NO MISSING PAGES - All Notion content is synced locally!".to_string());
        return lines.join("\n");
    }

    lines.push("MISSING PAGES BY CATEGORY".to_string());
    lines.push(thin.clone());
    for (category, items) in &result.by_category {
        lines.push(format!("\n{} ({} items):", category, items.len()));
        for item in items.iter().take(CATEGORY_LIST_LIMIT) {
            lines.push(format!("  - {}", item.title));
            lines.push(format!("    URL: {}", item.url));
        }
        if items.len() > CATEGORY_LIST_LIMIT {
            lines.push(format!("    ... and {} more", items.len() - CATEGORY_LIST_LIMIT));
        }
        lines.push(String::new());
    }

    lines.push("\nFULL LIST OF MISSING ITEMS".to_string());
    lines.push(thin);
    lines.push("\nDatabases:".to_string());
    for db in &result.missing_databases {
        lines.push(format!("  {} | {}", db.title, db.url));
    }
    lines.push("\nPages:".to_string());
    for page in result.missing_pages.iter().take(FULL_LIST_LIMIT) {
        lines.push(format!("  {} | {}", page.title, page.url));
    }
    if result.missing_pages.len() > FULL_LIST_LIMIT {
        lines.push(format!(
            "\n  ... and {} more pages",
            result.missing_pages.len() - FULL_LIST_LIMIT
        ));
    }
    lines.join("\n")
}

pub fn render_json_report(result: &AuditResult, generated: &DateTime<Utc>) -> Result<String> {
    let report = JsonReport {
        timestamp: generated.to_rfc3339(),
        notion_count: result.remote_count,
        local_count: result.local_files.len(),
        missing_pages: &result.missing_pages,
        missing_databases: &result.missing_databases,
        missing_by_category: result
            .by_category
            .iter()
            .map(|(k, items)| (*k, items.iter().map(|i| i.title.as_str()).collect()))
            .collect(),
    };
    Ok(serde_json::to_string_pretty(&report)?)
}

/// 审计输出
#[derive(Debug, Clone)]
pub struct AuditReport {
    pub result: AuditResult,
    pub text_path: PathBuf,
    pub json_path: PathBuf,
    pub text: String,
}

/// 拉取远端清单、扫描本地、写出两份报告
pub async fn audit_notion(config: &SyncConfig) -> Result<AuditReport> {
    config.validate_notion()?;
    let client = NotionClient::new(&config.notion, &config.http)?;
    audit_notion_with(&client, config).await
}

pub async fn audit_notion_with(client: &NotionClient, config: &SyncConfig) -> Result<AuditReport> {
    let root = &config.notion.output_dir;

    info!("[1/4] 拉取 Notion 页面与数据库");
    let pages: Vec<NotionPage> = client.search(SearchObject::Page, None).await?;
    let databases: Vec<NotionDatabase> = client.search(SearchObject::Database, None).await?;

    info!("[2/4] 建立远端清单");
    let remote: Vec<RemoteItem> = pages
        .iter()
        .map(RemoteItem::from_page)
        .chain(databases.iter().map(RemoteItem::from_database))
        .collect();

    info!("[3/4] 扫描本地文件 {}", root.display());
    let local = scan_local_files(root)?;

    info!("[4/4] 对比");
    let result = find_missing(&remote, &local);

    let mut database_sizes = BTreeMap::new();
    for db in &result.missing_databases {
        match client.query_database(&db.id, None).await {
            Ok(pages) => {
                database_sizes.insert(db.id.clone(), pages.len());
            }
            Err(e) => warn!("⚠️ 查询缺失数据库 {} 失败: {}", db.title, e),
        }
    }

    let now = Utc::now();
    let text = render_text_report(&result, &now, &database_sizes);
    let json = render_json_report(&result, &now)?;
    let text_path = root.join(TEXT_REPORT);
    let json_path = root.join(JSON_REPORT);
    write_atomic(&text_path, &text)?;
    write_atomic(&json_path, &json)?;

    info!(
        "✅ 审计完成: 远端 {} 个, 本地 {} 个文件, 缺失页面 {} 个, 缺失数据库 {} 个",
        result.remote_count,
        result.local_files.len(),
        result.missing_pages.len(),
        result.missing_databases.len()
    );
    Ok(AuditReport {
        result,
        text_path,
        json_path,
        text,
    })
}
