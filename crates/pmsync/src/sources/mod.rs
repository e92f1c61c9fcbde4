//! 远端数据源
//!
//! 每个数据源负责拉取、渲染成 markdown，并通过 `SourceAdapter` 转成记录，
//! 落盘交给 `sync::ReconciliationEngine`。

pub mod linear;
pub mod notion;

pub use linear::{sync_linear, LinearAdapter, LinearClient};
pub use notion::{sync_notion, NotionAdapter, NotionClient};
