//! Notion 数据源
//!
//! 页面按来源分组成集合：每个数据库一个目录，工作区顶层页面及其子页面
//! 放在 `Root Pages`，全量同步时配置了 wiki 根页面的话再加一个 `Wiki`。
//! 每个集合在各自目录下以 `Pages-Batch-N.md` 分批存放。

pub mod client;
pub mod ids;
pub mod markdown;

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use tracing::{info, warn};

pub use client::{BlockNode, LastEdited, NotionBlock, NotionClient, NotionDatabase, NotionPage, SearchObject};
pub use ids::{clean_page_id, extract_page_id_from_url, format_page_id_with_dashes, sanitize_filename};
pub use markdown::{blocks_to_markdown, database_title, extract_text, format_page_markdown, page_title};

use crate::config::SyncConfig;
use crate::error::Result;
use crate::sync::{
    Collection, ReconciliationEngine, Record, SortKey, SourceAdapter, StatusDocument, StatusLayout,
    SyncMode, SyncReport,
};
use crate::utils::parse_iso_datetime;

pub const ROOT_PAGES_DIR: &str = "Root Pages";
pub const WIKI_DIR: &str = "Wiki";

/// 页面及其内容
#[derive(Debug, Clone)]
pub struct PageDocument {
    pub page: NotionPage,
    pub blocks: Vec<BlockNode>,
    pub url: String,
}

/// 没有 url 字段时按 id 拼出来
pub fn page_url(page: &NotionPage) -> String {
    page.url
        .clone()
        .filter(|u| !u.is_empty())
        .unwrap_or_else(|| format!("https://www.notion.so/{}", clean_page_id(&page.id)))
}

/// Notion 页面 → `Record`，按标题排序
#[derive(Debug, Clone, Copy, Default)]
pub struct NotionAdapter;

impl SourceAdapter for NotionAdapter {
    type Item = PageDocument;

    fn id(&self, item: &PageDocument) -> String {
        format_page_id_with_dashes(&item.page.id)
    }

    fn sort_key(&self, item: &PageDocument) -> SortKey {
        SortKey::Text(page_title(&item.page).to_lowercase())
    }

    fn updated_at(&self, item: &PageDocument) -> Option<DateTime<Utc>> {
        item.page
            .last_edited_time
            .as_deref()
            .and_then(|v| parse_iso_datetime(v).ok())
    }

    fn render(&self, item: &PageDocument) -> String {
        format_page_markdown(&item.page, &item.blocks, &item.url)
    }

    fn legacy_sort_key(id: &str, body: &str) -> SortKey {
        let title = body
            .lines()
            .find_map(|line| line.strip_prefix("# "))
            .map(|t| t.trim().to_string())
            .unwrap_or_else(|| id.to_string());
        SortKey::Text(title.to_lowercase())
    }
}

/// 导出结果；`failed` 是内容拉取失败的页面 id
struct ExportedPages {
    records: Vec<Record>,
    failed: Vec<String>,
}

/// 拉取页面内容并转换成记录；单个页面失败只记警告并跳过
async fn export_pages(client: &NotionClient, pages: Vec<NotionPage>) -> ExportedPages {
    let adapter = NotionAdapter;
    let mut seen: HashSet<String> = HashSet::new();
    let mut unique = Vec::with_capacity(pages.len());
    // 同一页面出现多次时保留最后一次
    for page in pages.into_iter().rev() {
        if seen.insert(clean_page_id(&page.id)) {
            unique.push(page);
        }
    }
    unique.reverse();

    let mut records = Vec::with_capacity(unique.len());
    let mut failed = Vec::new();
    for listed in unique {
        let url = page_url(&listed);
        match client.page_content(&listed.id).await {
            Ok((page, blocks)) => {
                records.push(adapter.to_record(&PageDocument { page, blocks, url }));
            }
            Err(e) => {
                warn!("⚠️ 页面 {} ({}) 拉取失败，已跳过: {}", page_title(&listed), listed.id, e);
                failed.push(format_page_id_with_dashes(&listed.id));
            }
        }
    }
    ExportedPages { records, failed }
}

fn page_collection(config: &SyncConfig, name: &str, dir_name: &str, pages: ExportedPages) -> Collection {
    let notion = &config.notion;
    Collection::new::<NotionAdapter>(
        name,
        notion.output_dir.join(dir_name),
        notion.batch_prefix.clone(),
        format!("{} - Page Batch", name),
        pages.records,
    )
    .with_retained(pages.failed)
}

/// 每个数据库的目录名
///
/// 同名数据库里 id 最小的用原名，其余加 `__<id 前 8 位>`，与 search 返回顺序无关。
pub fn database_dir_names(databases: &[NotionDatabase]) -> Vec<String> {
    let bases: Vec<(String, String)> = databases
        .iter()
        .map(|database| {
            let clean_id = clean_page_id(&database.id);
            let mut base = sanitize_filename(&database_title(database));
            if base.is_empty() {
                base = clean_id.clone();
            }
            (base, clean_id)
        })
        .collect();

    let mut owner: HashMap<&str, &str> = HashMap::new();
    for (base, clean_id) in &bases {
        let entry = owner.entry(base.as_str()).or_insert(clean_id.as_str());
        if clean_id.as_str() < *entry {
            *entry = clean_id.as_str();
        }
    }

    bases
        .iter()
        .map(|(base, clean_id)| {
            if owner.get(base.as_str()) == Some(&clean_id.as_str()) {
                base.clone()
            } else {
                let suffix: String = clean_id.chars().take(8).collect();
                format!("{}__{}", base, suffix)
            }
        })
        .collect()
}

/// 每个数据库一个集合
async fn database_collections(
    client: &NotionClient,
    config: &SyncConfig,
    since: Option<&DateTime<Utc>>,
) -> Result<Vec<Collection>> {
    let databases: Vec<NotionDatabase> = client.search(SearchObject::Database, None).await?;
    info!("📚 发现 {} 个数据库", databases.len());

    let dir_names = database_dir_names(&databases);
    let mut collections = Vec::new();
    for (database, dir_name) in databases.iter().zip(dir_names) {
        let title = database_title(database);
        let pages = match client.query_database(&database.id, since).await {
            Ok(pages) => pages,
            Err(e) => {
                warn!("⚠️ 查询数据库 {} 失败，本次不改动其文件: {}", title, e);
                continue;
            }
        };
        if since.is_some() && pages.is_empty() {
            continue;
        }
        info!("📄 数据库 {}: {} 个页面", title, pages.len());
        let exported = export_pages(client, pages).await;
        collections.push(page_collection(config, &title, &dir_name, exported));
    }
    Ok(collections)
}

/// 不属于数据库的页面
///
/// 增量：最近编辑过且父级不是数据库的页面。全量：工作区顶层页面及其全部子页面。
async fn root_pages_collection(
    client: &NotionClient,
    config: &SyncConfig,
    since: Option<&DateTime<Utc>>,
) -> Result<Option<Collection>> {
    let pages: Vec<NotionPage> = client.search(SearchObject::Page, since).await?;

    let selected: Vec<NotionPage> = match since {
        Some(_) => pages
            .into_iter()
            .filter(|p| p.parent.kind != "database_id")
            .collect(),
        None => {
            let roots: Vec<NotionPage> = pages
                .into_iter()
                .filter(|p| p.parent.kind == "workspace")
                .collect();
            info!("🏠 发现 {} 个顶层页面", roots.len());
            let mut all = Vec::new();
            for root in roots {
                let children = client.discover_child_pages(&root.id).await;
                all.push(root);
                all.extend(children);
            }
            all
        }
    };

    if since.is_some() && selected.is_empty() {
        return Ok(None);
    }
    let exported = export_pages(client, selected).await;
    Ok(Some(page_collection(config, ROOT_PAGES_DIR, ROOT_PAGES_DIR, exported)))
}

/// wiki 根：先按数据库查询，不是数据库则按页面递归子页面
async fn wiki_collection(client: &NotionClient, config: &SyncConfig, wiki_id: &str) -> Option<Collection> {
    let id = format_page_id_with_dashes(&extract_page_id_from_url(wiki_id));
    let pages = match client.database(&id).await {
        Ok(database) => {
            info!("📖 Wiki 数据库: {}", database_title(&database));
            match client.query_database(&id, None).await {
                Ok(pages) => pages,
                Err(e) => {
                    warn!("⚠️ 查询 wiki 数据库失败，本次跳过: {}", e);
                    return None;
                }
            }
        }
        Err(e) => {
            info!("Wiki {} 不是数据库 ({}), 按页面处理", id, e);
            match client.page(&id).await {
                Ok(root) => {
                    let children = client.discover_child_pages(&root.id).await;
                    let mut pages = vec![root];
                    pages.extend(children);
                    pages
                }
                Err(e) => {
                    warn!("⚠️ 读取 wiki 页面失败，本次跳过: {}", e);
                    return None;
                }
            }
        }
    };

    info!("📖 Wiki: {} 个页面", pages.len());
    let exported = export_pages(client, pages).await;
    Some(page_collection(config, WIKI_DIR, WIKI_DIR, exported))
}

/// 执行一次 Notion 同步
pub async fn sync_notion(config: &SyncConfig, mode: SyncMode) -> Result<SyncReport> {
    config.validate_notion()?;
    let client = NotionClient::new(&config.notion, &config.http)?;
    sync_notion_with(&client, config, mode).await
}

pub async fn sync_notion_with(client: &NotionClient, config: &SyncConfig, mode: SyncMode) -> Result<SyncReport> {
    let notion = &config.notion;
    let status_path = notion.status_path();
    let status = match mode {
        SyncMode::Incremental => StatusDocument::load(&status_path, StatusLayout::NOTION_INCREMENTAL)?,
        SyncMode::Full => StatusDocument::load_or_bootstrap(&status_path, StatusLayout::NOTION_FULL)?,
    };

    let watermark = status.watermark();
    let since = match mode {
        SyncMode::Incremental => watermark.as_ref(),
        SyncMode::Full => None,
    };

    let mut collections = database_collections(client, config, since).await?;
    if let Some(root_pages) = root_pages_collection(client, config, since).await? {
        collections.push(root_pages);
    }
    if mode == SyncMode::Full {
        match notion.wiki_page_id.as_deref() {
            Some(wiki_id) => {
                if let Some(wiki) = wiki_collection(client, config, wiki_id).await {
                    collections.push(wiki);
                }
            }
            None => info!("未配置 NOTION_WIKI_PAGE_ID，跳过 wiki"),
        }
    }

    let engine =
        ReconciliationEngine::new(config.batch_capacity).with_display_root(notion.output_dir.clone());
    let report = engine.run(&status, collections, mode, Utc::now())?;
    info!("🏁 Notion 同步完成: {}", report.summary_line);
    Ok(report)
}
