//! # pmsync-cli
//!
//! pmsync 命令行入口。
//!
//! ## 命令
//!
//! - `pmsync linear sync [--full]` - 同步 Linear issue
//! - `pmsync notion sync [--full]` - 同步 Notion 数据库与页面
//! - `pmsync notion audit` - 对比本地导出与 Notion 工作区
//! - `pmsync nddf pricing --targets <json>` - 提取 NDDF 价格
//!
//! 凭据与目录从环境变量读取（`LINEAR_API_KEY`、`NOTION_API_SECRET` 等），
//! 命令行参数优先。

pub mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use pmsync::{SyncConfig, SyncMode};

/// pmsync - Linear / Notion 增量 markdown 同步
#[derive(Debug, Parser)]
#[command(name = "pmsync")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// 每个批文件的记录数上限
    #[arg(long, global = true, default_value_t = 50)]
    pub batch_capacity: usize,

    /// 输出 debug 日志
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Linear issue 同步
    Linear {
        #[command(subcommand)]
        command: LinearCommand,
    },
    /// Notion 同步与审计
    Notion {
        #[command(subcommand)]
        command: NotionCommand,
    },
    /// NDDF Plus 数据集工具
    Nddf {
        #[command(subcommand)]
        command: NddfCommand,
    },
}

#[derive(Debug, Subcommand)]
pub enum LinearCommand {
    /// 同步团队的 issue 到批文件
    Sync(commands::linear::LinearSyncArgs),
}

#[derive(Debug, Subcommand)]
pub enum NotionCommand {
    /// 同步数据库与页面到批文件
    Sync(commands::notion::NotionSyncArgs),
    /// 列出本地缺失的页面与数据库
    Audit(commands::notion::NotionAuditArgs),
}

#[derive(Debug, Subcommand)]
pub enum NddfCommand {
    /// 按目标药品清单提取价格
    Pricing(commands::nddf::PricingArgs),
}

impl Cli {
    /// 环境变量打底，再叠加全局参数
    pub fn base_config(&self) -> SyncConfig {
        let mut config = SyncConfig::from_env();
        config.batch_capacity = self.batch_capacity;
        config
    }

    /// 日志级别：`RUST_LOG` 优先，否则 info（`-v` 时 debug）
    pub fn default_log_filter(&self) -> &'static str {
        if self.verbose {
            "debug"
        } else {
            "info"
        }
    }
}

pub(crate) fn sync_mode(full: bool) -> SyncMode {
    if full {
        SyncMode::Full
    } else {
        SyncMode::Incremental
    }
}

pub(crate) fn override_dir(target: &mut PathBuf, value: &Option<PathBuf>) {
    if let Some(dir) = value {
        *target = dir.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_global_flags_after_subcommand() {
        let cli = Cli::parse_from(["pmsync", "linear", "sync", "--full", "--batch-capacity", "10", "-v"]);
        assert_eq!(cli.batch_capacity, 10);
        assert!(cli.verbose);
        assert_eq!(cli.default_log_filter(), "debug");
        match cli.command {
            Commands::Linear {
                command: LinearCommand::Sync(args),
            } => assert!(args.full),
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn incremental_is_the_default_mode() {
        let cli = Cli::parse_from(["pmsync", "notion", "sync"]);
        assert_eq!(cli.batch_capacity, 50);
        match cli.command {
            Commands::Notion {
                command: NotionCommand::Sync(args),
            } => assert_eq!(sync_mode(args.full), SyncMode::Incremental),
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn pricing_requires_targets() {
        assert!(Cli::try_parse_from(["pmsync", "nddf", "pricing"]).is_err());
        let cli = Cli::parse_from(["pmsync", "nddf", "pricing", "--targets", "targets.json"]);
        match cli.command {
            Commands::Nddf {
                command: NddfCommand::Pricing(args),
            } => {
                assert_eq!(args.targets, PathBuf::from("targets.json"));
                assert!(args.output.is_none());
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
