//! `pmsync nddf pricing`

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use pmsync::SyncConfig;
use tracing::info;

use crate::override_dir;

#[derive(Debug, Args)]
pub struct PricingArgs {
    /// 目标药品清单（JSON）
    #[arg(long)]
    pub targets: PathBuf,

    /// 输出文件；不给则打印到 stdout
    #[arg(long, short)]
    pub output: Option<PathBuf>,

    /// "Descriptive and Pricing" 数据目录
    #[arg(long, env = "NDDF_ROOT")]
    pub nddf_root: Option<PathBuf>,
}

pub fn execute(args: PricingArgs, mut config: SyncConfig) -> Result<()> {
    override_dir(&mut config.nddf.root, &args.nddf_root);

    let report = pmsync::extract_pricing(&config.nddf, &args.targets)
        .with_context(|| format!("pricing extraction from {} failed", config.nddf.root.display()))?;
    info!(
        "💊 价格提取完成: {} 行明细, {} 行汇总",
        report.detail_rows.len(),
        report.condensed_rows.len()
    );

    match args.output {
        Some(path) => {
            report
                .write_to(&path)
                .with_context(|| format!("writing {}", path.display()))?;
            info!("📝 已写入 {}", path.display());
        }
        None => println!("{}", report.to_json_pretty()?),
    }
    Ok(())
}
