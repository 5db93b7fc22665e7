//! `run` command implementation.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use contracts::RelayConfig;
use dispatcher::LogSender;
use ingestion::{LocalFileReader, ReplaySource};
use telegram::{BotTransport, HttpBotApi};
use tracing::{info, warn};

use super::load_config;
use crate::cli::RunArgs;
use crate::error::{CliError, Result};
use crate::pipeline::{Pipeline, PipelineConfig, PipelineStats};

/// Execute the `run` command
pub async fn run_relay(args: &RunArgs) -> Result<()> {
    let config = load_config(&args.config)?;

    let uses_bot_api = args.replay.is_none() || !args.log_only;
    if uses_bot_api {
        config_loader::validate_credentials(&config)
            .map_err(|e| CliError::credentials(e.to_string()))?;
    }

    info!(
        source = ?config.source.channel_id,
        destinations = config.destinations.len(),
        mode = ?config.delivery.mode,
        max_attempts = config.delivery.max_attempts,
        staging = %config.staging.dir.display(),
        "Configuration loaded"
    );

    // Dry run - just validate and exit
    if args.dry_run {
        info!("Dry run mode - configuration is valid, exiting");
        print_config_summary(&config);
        return Ok(());
    }

    let pipeline = Pipeline::new(PipelineConfig {
        relay: config.clone(),
        max_messages: (args.max_messages > 0).then_some(args.max_messages),
        buffer_size: args.buffer_size,
    });

    info!("Starting relay...");
    let stats = match &args.replay {
        Some(path) if args.log_only => {
            info!(path = %path.display(), "Running in REPLAY mode, deliveries are only logged");
            pipeline
                .run(
                    ReplaySource::new(path.clone()),
                    Arc::new(replay_reader(args, path)),
                    Arc::new(LogSender::new("log_only")),
                    shutdown_signal(),
                )
                .await?
        }
        _ => run_with_bot_api(pipeline, args, &config).await?,
    };

    stats.print_summary();
    info!("tg-relay finished");
    Ok(())
}

async fn run_with_bot_api(
    pipeline: Pipeline,
    args: &RunArgs,
    config: &RelayConfig,
) -> Result<PipelineStats> {
    let client = HttpBotApi::from_config(&config.telegram)
        .map_err(|e| CliError::credentials(e.to_string()))?;
    let transport = Arc::new(BotTransport::new(Arc::new(client)));
    info!(api_base = %config.telegram.api_base, "Bot API client ready");

    if let Some(path) = &args.replay {
        info!(path = %path.display(), "Running in REPLAY mode");
        return pipeline
            .run(
                ReplaySource::new(path.clone()),
                Arc::new(replay_reader(args, path)),
                transport,
                shutdown_signal(),
            )
            .await;
    }

    let poller = transport
        .poller(config.telegram.poll_timeout_secs)
        .with_skip_backlog(!args.include_backlog);

    if args.log_only {
        info!("Deliveries are only logged");
        pipeline
            .run(
                poller,
                transport,
                Arc::new(LogSender::new("log_only")),
                shutdown_signal(),
            )
            .await
    } else {
        pipeline
            .run(poller, transport.clone(), transport, shutdown_signal())
            .await
    }
}

fn replay_reader(args: &RunArgs, replay: &Path) -> LocalFileReader {
    let base: Option<PathBuf> = args
        .media_dir
        .clone()
        .or_else(|| replay.parent().map(Path::to_path_buf));
    match base {
        Some(dir) => LocalFileReader::with_base_dir(dir),
        None => LocalFileReader::new(),
    }
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Print configuration summary for dry-run mode
fn print_config_summary(config: &RelayConfig) {
    println!("\n=== Configuration Summary ===\n");
    match &config.source.channel_id {
        Some(channel) => println!("Source channel: {channel}"),
        None => println!("Source channel: (not set)"),
    }

    println!("\nDestinations ({}):", config.destinations.len());
    for destination in &config.destinations {
        match &destination.label {
            Some(label) => println!("  - {} ({label})", destination.id),
            None => println!("  - {}", destination.id),
        }
    }

    let delivery = &config.delivery;
    println!("\nDelivery:");
    println!("  Max attempts: {}", delivery.max_attempts);
    println!(
        "  Backoff: {:?} {}ms (max {}ms)",
        delivery.backoff, delivery.backoff_ms, delivery.max_backoff_ms
    );
    println!(
        "  Mode: {:?} (max concurrency {})",
        delivery.mode, delivery.max_concurrency
    );

    println!("\nBot API: {}", config.telegram.api_base);
    println!("Staging dir: {}", config.staging.dir.display());
    println!("Escape text: {}", config.markup.escape_text);
    println!();
}
