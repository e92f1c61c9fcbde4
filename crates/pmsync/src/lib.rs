//! pmsync - Linear / Notion 增量 markdown 同步
//!
//! 把远端项目管理数据镜像为本地固定大小的 markdown 批文件，供检索系统使用：
//! - 🔄 增量对账：只重写内容变化的批文件，水位记录在状态文档里
//! - 📥 数据源：Linear issue（含评论）、Notion 数据库与页面树
//! - 🔍 审计：对比本地导出与 Notion 工作区，列出缺失页面
//! - 💊 NDDF Plus 价格提取，输出 JSON 报告
//!
//! # 快速开始
//!
//! ```rust,no_run
//! use pmsync::{sync_linear, SyncConfig, SyncMode};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = SyncConfig::builder()
//!         .linear_api_key("lin_api_xxx")
//!         .linear_team_name("Engineering")
//!         .linear_output_dir("output/Linear")
//!         .build();
//!
//!     let report = sync_linear(&config, SyncMode::Incremental).await?;
//!     println!("{}", report.summary_line);
//!     Ok(())
//! }
//! ```

pub mod audit;
pub mod config;
pub mod error;
pub mod http;
pub mod nddf;
pub mod sources;
pub mod sync;
pub mod utils;
pub mod version;

pub use audit::{audit_notion, AuditReport};
pub use config::{HttpClientConfig, LinearConfig, NddfConfig, NotionConfig, SyncConfig, SyncConfigBuilder};
pub use error::{PmSyncError, Result};
pub use nddf::{extract_pricing, PricingReport};
pub use sources::{sync_linear, sync_notion};
pub use sync::{
    Collection, ReconciliationEngine, Record, SortKey, SourceAdapter, StatusDocument, StatusLayout,
    SyncMode, SyncReport,
};
pub use version::{version_line, PMSYNC_VERSION};
