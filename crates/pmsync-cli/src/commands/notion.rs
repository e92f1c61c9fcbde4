//! `pmsync notion sync` / `pmsync notion audit`

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use pmsync::SyncConfig;
use tracing::info;

use crate::{override_dir, sync_mode};

#[derive(Debug, Args)]
pub struct NotionSyncArgs {
    /// 全量同步（包含 wiki，并推进下一次全量日期）
    #[arg(long)]
    pub full: bool,

    /// 批文件与状态文档所在目录
    #[arg(long, env = "NOTION_OUTPUT_DIR")]
    pub output_dir: Option<PathBuf>,

    /// wiki 根页面或数据库（id 或 URL）
    #[arg(long, env = "NOTION_WIKI_PAGE_ID")]
    pub wiki_page_id: Option<String>,
}

#[derive(Debug, Args)]
pub struct NotionAuditArgs {
    /// 本地导出目录，报告也写在这里
    #[arg(long, env = "NOTION_OUTPUT_DIR")]
    pub output_dir: Option<PathBuf>,
}

pub async fn sync(args: NotionSyncArgs, mut config: SyncConfig) -> Result<()> {
    override_dir(&mut config.notion.output_dir, &args.output_dir);
    if let Some(wiki) = args.wiki_page_id {
        config.notion.wiki_page_id = Some(wiki);
    }

    let mode = sync_mode(args.full);
    info!(
        "🚀 Notion {} 同步: 目录 {}",
        mode.as_str(),
        config.notion.output_dir.display()
    );
    let report = pmsync::sync_notion(&config, mode)
        .await
        .context("Notion sync failed")?;
    println!("{}", report.summary_line);
    Ok(())
}

pub async fn audit(args: NotionAuditArgs, mut config: SyncConfig) -> Result<()> {
    override_dir(&mut config.notion.output_dir, &args.output_dir);

    let report = pmsync::audit_notion(&config)
        .await
        .context("Notion audit failed")?;
    println!("{}", report.text);
    println!("Reports written to:");
    println!("  {}", report.text_path.display());
    println!("  {}", report.json_path.display());
    Ok(())
}
