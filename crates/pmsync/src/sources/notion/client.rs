//! Notion REST 客户端

use std::collections::{BTreeMap, HashSet, VecDeque};

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};

use super::ids::{clean_page_id, format_page_id_with_dashes};
use crate::config::{HttpClientConfig, NotionConfig, NOTION_VERSION};
use crate::error::{PmSyncError, Result};
use crate::http::{ApiHttpClient, AuthScheme};
use crate::utils::{format_iso_timestamp, parse_iso_datetime};

const PAGE_SIZE: u32 = 100;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TextContent {
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Mention {
    #[serde(rename = "type", default)]
    pub kind: String,
}

/// rich text 片段
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RichText {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub plain_text: String,
    #[serde(default)]
    pub text: Option<TextContent>,
    #[serde(default)]
    pub mention: Option<Mention>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Parent {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub page_id: Option<String>,
    #[serde(default)]
    pub database_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PropertyValue {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub title: Vec<RichText>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotionPage {
    pub id: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub created_time: Option<String>,
    #[serde(default)]
    pub last_edited_time: Option<String>,
    #[serde(default)]
    pub parent: Parent,
    #[serde(default)]
    pub properties: BTreeMap<String, PropertyValue>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotionDatabase {
    pub id: String,
    #[serde(default)]
    pub title: Vec<RichText>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub last_edited_time: Option<String>,
    #[serde(default)]
    pub parent: Parent,
}

/// block 对象；类型相关的内容留在 `content[kind]` 里
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotionBlock {
    pub id: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub has_children: bool,
    #[serde(flatten)]
    pub content: Map<String, Value>,
}

impl NotionBlock {
    /// 当前类型的内容对象
    pub fn payload(&self) -> Option<&Value> {
        self.content.get(&self.kind)
    }
}

/// 带子节点的 block
#[derive(Debug, Clone)]
pub struct BlockNode {
    pub block: NotionBlock,
    pub children: Vec<BlockNode>,
}

#[derive(Debug, Deserialize)]
struct ListResponse<T> {
    #[serde(default = "Vec::new")]
    results: Vec<T>,
    #[serde(default)]
    has_more: bool,
    #[serde(default)]
    next_cursor: Option<String>,
}

/// search 接口的对象类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchObject {
    Page,
    Database,
}

impl SearchObject {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchObject::Page => "page",
            SearchObject::Database => "database",
        }
    }
}

/// 有最后编辑时间的对象
pub trait LastEdited {
    fn last_edited(&self) -> Option<DateTime<Utc>>;
}

impl LastEdited for NotionPage {
    fn last_edited(&self) -> Option<DateTime<Utc>> {
        self.last_edited_time
            .as_deref()
            .and_then(|v| parse_iso_datetime(v).ok())
    }
}

impl LastEdited for NotionDatabase {
    fn last_edited(&self) -> Option<DateTime<Utc>> {
        self.last_edited_time
            .as_deref()
            .and_then(|v| parse_iso_datetime(v).ok())
    }
}

pub struct NotionClient {
    http: ApiHttpClient,
}

impl NotionClient {
    pub fn new(config: &NotionConfig, http: &HttpClientConfig) -> Result<Self> {
        let secret = config
            .api_secret
            .clone()
            .ok_or_else(|| PmSyncError::Configuration("NOTION_API_SECRET is not configured.".to_string()))?;
        let http = ApiHttpClient::new(http, config.api_url.clone(), AuthScheme::Bearer(secret))?
            .with_header("Notion-Version", NOTION_VERSION);
        Ok(Self { http })
    }

    pub fn from_http(http: ApiHttpClient) -> Self {
        Self { http }
    }

    /// 按最后编辑时间倒序搜索页面或数据库
    ///
    /// 给定 `since` 时只保留其后编辑过的对象，某一页里一个都没有就提前结束。
    pub async fn search<T>(&self, object: SearchObject, since: Option<&DateTime<Utc>>) -> Result<Vec<T>>
    where
        T: DeserializeOwned + LastEdited,
    {
        let mut results = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let mut payload = json!({
                "filter": { "value": object.as_str(), "property": "object" },
                "sort": { "direction": "descending", "timestamp": "last_edited_time" },
                "page_size": PAGE_SIZE,
            });
            if let Some(c) = &cursor {
                payload["start_cursor"] = Value::String(c.clone());
            }

            let response: ListResponse<T> = self.http.post_json("search", &payload).await?;
            let mut newer = 0usize;
            for item in response.results {
                match since {
                    Some(threshold) => {
                        if item.last_edited().is_some_and(|t| t > *threshold) {
                            newer += 1;
                            results.push(item);
                        }
                    }
                    None => {
                        newer += 1;
                        results.push(item);
                    }
                }
            }
            debug!("search {}: 已找到 {} 个", object.as_str(), results.len());

            if since.is_some() && newer == 0 {
                break;
            }
            match (response.has_more, response.next_cursor) {
                (true, Some(next)) => cursor = Some(next),
                _ => break,
            }
        }

        info!("🔎 search {} 完成: {} 个", object.as_str(), results.len());
        Ok(results)
    }

    pub async fn database(&self, database_id: &str) -> Result<NotionDatabase> {
        let id = format_page_id_with_dashes(database_id);
        self.http.get_json(&format!("databases/{}", id), &[]).await
    }

    /// 查询数据库里的页面；给定 `since` 时按 `last_edited_time` 过滤
    pub async fn query_database(
        &self,
        database_id: &str,
        since: Option<&DateTime<Utc>>,
    ) -> Result<Vec<NotionPage>> {
        let id = format_page_id_with_dashes(database_id);
        let endpoint = format!("databases/{}/query", id);
        let mut pages = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let mut payload = json!({ "page_size": PAGE_SIZE });
            if let Some(after) = since {
                payload["filter"] = json!({
                    "timestamp": "last_edited_time",
                    "last_edited_time": { "after": format_iso_timestamp(after) },
                });
            }
            if let Some(c) = &cursor {
                payload["start_cursor"] = Value::String(c.clone());
            }

            let response: ListResponse<NotionPage> = self.http.post_json(&endpoint, &payload).await?;
            pages.extend(response.results);
            debug!("数据库 {} 已拉取 {} 个页面", &id, pages.len());
            match (response.has_more, response.next_cursor) {
                (true, Some(next)) => cursor = Some(next),
                _ => break,
            }
        }

        Ok(pages)
    }

    pub async fn page(&self, page_id: &str) -> Result<NotionPage> {
        let id = format_page_id_with_dashes(page_id);
        self.http.get_json(&format!("pages/{}", id), &[]).await
    }

    /// 一层子 block（分页拉全）
    pub async fn block_children(&self, block_id: &str) -> Result<Vec<NotionBlock>> {
        let id = format_page_id_with_dashes(block_id);
        let endpoint = format!("blocks/{}/children", id);
        let mut blocks = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let mut query = vec![("page_size", PAGE_SIZE.to_string())];
            if let Some(c) = &cursor {
                query.push(("start_cursor", c.clone()));
            }
            let response: ListResponse<NotionBlock> = self.http.get_json(&endpoint, &query).await?;
            blocks.extend(response.results);
            match (response.has_more, response.next_cursor) {
                (true, Some(next)) => cursor = Some(next),
                _ => break,
            }
        }

        Ok(blocks)
    }

    /// 页面的完整 block 树
    ///
    /// 用显式工作队列展开 `has_children`，深度不受调用栈限制。
    pub async fn block_tree(&self, page_id: &str) -> Result<Vec<BlockNode>> {
        // arena 下标大于父节点下标，倒序组装即可
        let mut arena: Vec<Option<NotionBlock>> = Vec::new();
        let mut child_indices: Vec<Vec<usize>> = Vec::new();
        let mut roots: Vec<usize> = Vec::new();
        let mut queue: VecDeque<(Option<usize>, String)> = VecDeque::new();
        queue.push_back((None, page_id.to_string()));

        while let Some((parent, block_id)) = queue.pop_front() {
            for block in self.block_children(&block_id).await? {
                let index = arena.len();
                if block.has_children {
                    queue.push_back((Some(index), block.id.clone()));
                }
                arena.push(Some(block));
                child_indices.push(Vec::new());
                match parent {
                    Some(p) => child_indices[p].push(index),
                    None => roots.push(index),
                }
            }
        }

        let mut built: Vec<Option<BlockNode>> = (0..arena.len()).map(|_| None).collect();
        for index in (0..arena.len()).rev() {
            let children = child_indices[index]
                .iter()
                .filter_map(|c| built[*c].take())
                .collect();
            if let Some(block) = arena[index].take() {
                built[index] = Some(BlockNode { block, children });
            }
        }

        Ok(roots.into_iter().filter_map(|r| built[r].take()).collect())
    }

    /// 页面元数据与 block 树
    pub async fn page_content(&self, page_id: &str) -> Result<(NotionPage, Vec<BlockNode>)> {
        let page = self.page(page_id).await?;
        let blocks = self.block_tree(page_id).await?;
        Ok((page, blocks))
    }

    /// 递归发现 `root` 之下的全部子页面（不含 root 自身）
    ///
    /// 只看每个页面的顶层 `child_page` block；已访问的页面不会重复展开。
    pub async fn discover_child_pages(&self, root_id: &str) -> Vec<NotionPage> {
        let mut visited: HashSet<String> = HashSet::new();
        let mut found = Vec::new();
        let mut queue: VecDeque<String> = VecDeque::new();
        visited.insert(clean_page_id(root_id));
        queue.push_back(format_page_id_with_dashes(root_id));

        while let Some(parent_id) = queue.pop_front() {
            let blocks = match self.block_children(&parent_id).await {
                Ok(blocks) => blocks,
                Err(e) => {
                    warn!("⚠️ 读取页面 {} 的子 block 失败: {}", parent_id, e);
                    continue;
                }
            };
            for block in blocks.into_iter().filter(|b| b.kind == "child_page") {
                if !visited.insert(clean_page_id(&block.id)) {
                    continue;
                }
                match self.page(&block.id).await {
                    Ok(page) => {
                        queue.push_back(format_page_id_with_dashes(&page.id));
                        found.push(page);
                    }
                    Err(e) => warn!("⚠️ 读取子页面 {} 失败: {}", block.id, e),
                }
            }
        }

        debug!("页面 {} 下发现 {} 个子页面", root_id, found.len());
        found
    }
}
