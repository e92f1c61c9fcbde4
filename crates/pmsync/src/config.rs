//! 运行配置
//!
//! 进程启动时构造一次 `SyncConfig`（环境变量或 builder），随函数调用显式传递，
//! 不存在模块级全局可变配置。

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{PmSyncError, Result};

/// 默认每个批文件的记录数
pub const DEFAULT_BATCH_CAPACITY: usize = 50;

pub const LINEAR_API_URL: &str = "https://api.linear.app/graphql";
pub const NOTION_API_URL: &str = "https://api.notion.com/v1";
pub const NOTION_VERSION: &str = "2022-06-28";

/// HTTP 客户端配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpClientConfig {
    /// 连接超时（秒）
    pub connect_timeout_secs: Option<u64>,
    /// 请求超时（秒）
    pub request_timeout_secs: Option<u64>,
    /// 429 / 5xx 的最大重试次数
    pub max_retries: u32,
    /// 429 未携带 Retry-After 时的固定等待（秒）
    pub rate_limit_fallback_secs: u64,
    /// 分页请求之间的最小间隔（毫秒）
    pub min_request_interval_ms: u64,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: Some(30),
            request_timeout_secs: Some(120),
            max_retries: 5,
            rate_limit_fallback_secs: 1,
            min_request_interval_ms: 350,
        }
    }
}

/// Linear 配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearConfig {
    /// API key（原样放进 Authorization 头）
    pub api_key: Option<String>,
    pub api_url: String,
    pub team_name: String,
    /// 批文件名前缀：`<prefix>-<n>.md`
    pub batch_prefix: String,
    pub output_dir: PathBuf,
}

impl Default for LinearConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_url: LINEAR_API_URL.to_string(),
            team_name: "My Team".to_string(),
            batch_prefix: "Issues-Batch".to_string(),
            output_dir: PathBuf::from("output/Linear"),
        }
    }
}

impl LinearConfig {
    pub fn status_path(&self) -> PathBuf {
        self.output_dir.join("Linear-Sync-Status.md")
    }
}

/// Notion 配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotionConfig {
    pub api_secret: Option<String>,
    pub api_url: String,
    pub output_dir: PathBuf,
    pub batch_prefix: String,
    /// 全量同步时额外抓取的 wiki 根页面（及其全部子页面）
    pub wiki_page_id: Option<String>,
}

impl Default for NotionConfig {
    fn default() -> Self {
        Self {
            api_secret: None,
            api_url: NOTION_API_URL.to_string(),
            output_dir: PathBuf::from("output/Notion"),
            batch_prefix: "Pages-Batch".to_string(),
            wiki_page_id: None,
        }
    }
}

impl NotionConfig {
    pub fn status_path(&self) -> PathBuf {
        self.output_dir.join("SYNC_STATUS.md")
    }
}

/// NDDF Plus 数据集配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NddfConfig {
    /// "Descriptive and Pricing" 数据目录
    pub root: PathBuf,
}

impl Default for NddfConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("./nddf_data"),
        }
    }
}

/// pmsync 配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncConfig {
    pub linear: LinearConfig,
    pub notion: NotionConfig,
    pub nddf: NddfConfig,
    pub http: HttpClientConfig,
    /// 每个批文件的记录数上限
    pub batch_capacity: usize,
}

impl SyncConfig {
    pub fn builder() -> SyncConfigBuilder {
        SyncConfigBuilder::new()
    }

    /// 从进程环境变量构造
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 从任意 key → value 查找函数构造（测试用）
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let mut builder = SyncConfigBuilder::new();
        if let Some(key) = get("LINEAR_API_KEY") {
            builder = builder.linear_api_key(key);
        }
        if let Some(team) = get("LINEAR_TEAM_NAME") {
            builder = builder.linear_team_name(team);
        }
        if let Some(prefix) = get("LINEAR_BATCH_PREFIX") {
            builder = builder.linear_batch_prefix(prefix);
        }
        if let Some(dir) = get("LINEAR_OUTPUT_DIR") {
            builder = builder.linear_output_dir(dir);
        }
        if let Some(secret) = get("NOTION_API_SECRET") {
            builder = builder.notion_api_secret(secret);
        }
        if let Some(dir) = get("NOTION_OUTPUT_DIR") {
            builder = builder.notion_output_dir(dir);
        }
        if let Some(prefix) = get("NOTION_BATCH_PREFIX") {
            builder = builder.notion_batch_prefix(prefix);
        }
        if let Some(page) = get("NOTION_WIKI_PAGE_ID") {
            builder = builder.notion_wiki_page_id(page);
        }
        if let Some(root) = get("NDDF_ROOT") {
            builder = builder.nddf_root(root);
        }
        builder.build()
    }

    /// Linear 同步前置校验：API key 必须存在
    pub fn validate_linear(&self) -> Result<()> {
        if self.linear.api_key.is_none() {
            return Err(PmSyncError::Configuration("LINEAR_API_KEY is not set.".to_string()));
        }
        self.validate_common()
    }

    /// Notion 同步前置校验：integration secret 必须存在
    pub fn validate_notion(&self) -> Result<()> {
        if self.notion.api_secret.is_none() {
            return Err(PmSyncError::Configuration(
                "NOTION_API_SECRET is not configured.".to_string(),
            ));
        }
        self.validate_common()
    }

    fn validate_common(&self) -> Result<()> {
        if self.batch_capacity == 0 {
            return Err(PmSyncError::Configuration("batch capacity must be at least 1".to_string()));
        }
        Ok(())
    }
}

pub struct SyncConfigBuilder {
    config: SyncConfig,
}

impl SyncConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: SyncConfig {
                batch_capacity: DEFAULT_BATCH_CAPACITY,
                ..SyncConfig::default()
            },
        }
    }

    pub fn linear_api_key<S: Into<String>>(mut self, key: S) -> Self {
        self.config.linear.api_key = Some(key.into());
        self
    }

    pub fn linear_api_url<S: Into<String>>(mut self, url: S) -> Self {
        self.config.linear.api_url = url.into();
        self
    }

    pub fn linear_team_name<S: Into<String>>(mut self, team: S) -> Self {
        self.config.linear.team_name = team.into();
        self
    }

    pub fn linear_batch_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.config.linear.batch_prefix = prefix.into();
        self
    }

    pub fn linear_output_dir<P: AsRef<Path>>(mut self, dir: P) -> Self {
        self.config.linear.output_dir = dir.as_ref().to_path_buf();
        self
    }

    pub fn notion_api_secret<S: Into<String>>(mut self, secret: S) -> Self {
        self.config.notion.api_secret = Some(secret.into());
        self
    }

    pub fn notion_api_url<S: Into<String>>(mut self, url: S) -> Self {
        self.config.notion.api_url = url.into();
        self
    }

    pub fn notion_output_dir<P: AsRef<Path>>(mut self, dir: P) -> Self {
        self.config.notion.output_dir = dir.as_ref().to_path_buf();
        self
    }

    pub fn notion_batch_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.config.notion.batch_prefix = prefix.into();
        self
    }

    pub fn notion_wiki_page_id<S: Into<String>>(mut self, page_id: S) -> Self {
        self.config.notion.wiki_page_id = Some(page_id.into());
        self
    }

    pub fn nddf_root<P: AsRef<Path>>(mut self, root: P) -> Self {
        self.config.nddf.root = root.as_ref().to_path_buf();
        self
    }

    pub fn http_config(mut self, http: HttpClientConfig) -> Self {
        self.config.http = http;
        self
    }

    pub fn batch_capacity(mut self, capacity: usize) -> Self {
        self.config.batch_capacity = capacity;
        self
    }

    pub fn build(self) -> SyncConfig {
        self.config
    }
}

impl Default for SyncConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
