//! pmsync 命令行二进制入口

use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use tracing::{debug, error};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pmsync_cli::{commands, Cli, Commands, LinearCommand, NddfCommand, NotionCommand};

fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(cli.default_log_filter())),
        )
        .init();
    debug!("{}", pmsync::version_line());

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Sync failed: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = cli.base_config();
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async {
        match cli.command {
            Commands::Linear {
                command: LinearCommand::Sync(args),
            } => commands::linear::execute(args, config).await,
            Commands::Notion {
                command: NotionCommand::Sync(args),
            } => commands::notion::sync(args, config).await,
            Commands::Notion {
                command: NotionCommand::Audit(args),
            } => commands::notion::audit(args, config).await,
            Commands::Nddf {
                command: NddfCommand::Pricing(args),
            } => commands::nddf::execute(args, config),
        }
    })
}
