//! # tg-relay CLI
//!
//! 命令行接口入口点。
//!
//! 提供：
//! - 配置加载与验证（文件 + 环境变量/命令行覆盖）
//! - 转发管道编排与生命周期管理
//! - 优雅关闭处理

mod cli;
mod commands;
mod error;
mod pipeline;

use anyhow::Result;
use clap::Parser;
use observability::ObservabilityConfig;
use tracing::info;

use cli::{Cli, Commands};
use commands::{run_info, run_relay, run_validate};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // Initialize logging based on CLI options
    let mut observability_config = ObservabilityConfig::from_verbosity(cli.verbose, cli.quiet);
    observability_config.log_format = cli.log_format.into();
    if let Commands::Run(args) = &cli.command {
        observability_config.metrics_port = (args.metrics_port > 0).then_some(args.metrics_port);
    }
    observability::init_with_config(observability_config)?;

    info!(version = env!("CARGO_PKG_VERSION"), "tg-relay starting");

    // Execute command
    let result = match &cli.command {
        Commands::Run(args) => run_relay(args).await,
        Commands::Validate(args) => run_validate(args),
        Commands::Info(args) => run_info(args).await,
    };

    if let Err(ref e) = result {
        if e.is_fatal_config() {
            tracing::error!(error = %e, "Fatal configuration error, nothing was started");
        } else {
            tracing::error!(error = %e, "Command failed");
        }
    }

    result.map_err(Into::into)
}
