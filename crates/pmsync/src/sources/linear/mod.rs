//! Linear 数据源
//!
//! 拉取团队 issue（增量按 `updatedAt` 过滤，全量拉全部），附上评论后
//! 渲染成 markdown，交给对账引擎写入 `Issues-Batch-N.md`。

pub mod client;
pub mod format;

use chrono::{DateTime, Utc};
use tracing::info;

pub use client::{LinearClient, LinearComment, LinearIssue};
pub use format::{format_issue, numeric_identifier};

use crate::config::SyncConfig;
use crate::error::Result;
use crate::sync::{
    Collection, ReconciliationEngine, SortKey, SourceAdapter, StatusDocument, StatusLayout,
    SyncMode, SyncReport,
};
use crate::utils::parse_iso_datetime;

/// issue 及其评论
#[derive(Debug, Clone)]
pub struct IssueDocument {
    pub issue: LinearIssue,
    pub comments: Vec<LinearComment>,
}

/// Linear issue → `Record`
#[derive(Debug, Clone, Copy, Default)]
pub struct LinearAdapter;

impl SourceAdapter for LinearAdapter {
    type Item = IssueDocument;

    fn id(&self, item: &IssueDocument) -> String {
        item.issue.identifier.clone()
    }

    fn sort_key(&self, item: &IssueDocument) -> SortKey {
        SortKey::Numeric(numeric_identifier(&item.issue.identifier))
    }

    fn updated_at(&self, item: &IssueDocument) -> Option<DateTime<Utc>> {
        item.issue
            .updated_at
            .as_deref()
            .and_then(|v| parse_iso_datetime(v).ok())
    }

    fn render(&self, item: &IssueDocument) -> String {
        format_issue(&item.issue, &item.comments)
    }

    fn legacy_sort_key(id: &str, _body: &str) -> SortKey {
        SortKey::Numeric(numeric_identifier(id))
    }
}

/// 执行一次 Linear 同步
pub async fn sync_linear(config: &SyncConfig, mode: SyncMode) -> Result<SyncReport> {
    config.validate_linear()?;
    let linear = &config.linear;
    let client = LinearClient::new(linear, &config.http)?;
    sync_linear_with(&client, config, mode).await
}

/// 使用给定客户端执行同步（测试里指向 mock 服务）
pub async fn sync_linear_with(
    client: &LinearClient,
    config: &SyncConfig,
    mode: SyncMode,
) -> Result<SyncReport> {
    let linear = &config.linear;
    let status_path = linear.status_path();
    let status = match mode {
        SyncMode::Incremental => StatusDocument::load(&status_path, StatusLayout::LINEAR)?,
        SyncMode::Full => StatusDocument::load_or_bootstrap(&status_path, StatusLayout::LINEAR)?,
    };

    info!("🔍 查找团队 {}", linear.team_name);
    let team_id = client.team_id(&linear.team_name).await?;

    let issues = match (mode, status.watermark()) {
        (SyncMode::Incremental, Some(since)) => {
            info!("📥 拉取 {} 之后更新的 issue", since);
            client.issues_updated_since(&team_id, &since).await?
        }
        _ => {
            info!("📥 拉取团队全部 issue");
            client.all_issues(&team_id).await?
        }
    };

    let adapter = LinearAdapter;
    let mut records = Vec::with_capacity(issues.len());
    for issue in issues {
        let comments = client.comments(&issue.id).await;
        let document = IssueDocument { issue, comments };
        records.push(adapter.to_record(&document));
    }

    let collection = Collection::new::<LinearAdapter>(
        "Linear",
        linear.output_dir.clone(),
        linear.batch_prefix.clone(),
        format!("{} - Issue Batch", linear.team_name),
        records,
    );

    let engine =
        ReconciliationEngine::new(config.batch_capacity).with_display_root(linear.output_dir.clone());
    let report = engine.run(&status, vec![collection], mode, Utc::now())?;
    info!("🏁 Linear 同步完成: {}", report.summary_line);
    Ok(report)
}
