//! `pmsync linear sync`

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use pmsync::SyncConfig;
use tracing::info;

use crate::{override_dir, sync_mode};

#[derive(Debug, Args)]
pub struct LinearSyncArgs {
    /// 全量同步（替换本地快照，删除远端已不存在的 issue）
    #[arg(long)]
    pub full: bool,

    /// 团队名
    #[arg(long, env = "LINEAR_TEAM_NAME")]
    pub team: Option<String>,

    /// 批文件与状态文档所在目录
    #[arg(long, env = "LINEAR_OUTPUT_DIR")]
    pub output_dir: Option<PathBuf>,
}

pub async fn execute(args: LinearSyncArgs, mut config: SyncConfig) -> Result<()> {
    if let Some(team) = args.team {
        config.linear.team_name = team;
    }
    override_dir(&mut config.linear.output_dir, &args.output_dir);

    let mode = sync_mode(args.full);
    info!(
        "🚀 Linear {} 同步: 团队 {}, 目录 {}",
        mode.as_str(),
        config.linear.team_name,
        config.linear.output_dir.display()
    );
    let report = pmsync::sync_linear(&config, mode)
        .await
        .context("Linear sync failed")?;
    println!("{}", report.summary_line);
    Ok(())
}
