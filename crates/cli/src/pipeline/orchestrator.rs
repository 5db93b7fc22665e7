//! Pipeline orchestrator - coordinates all components.
//!
//! Source, reader and sender are injected, so the same loop drives the live
//! Bot API, replay files and log-only runs.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use contracts::{ChatId, ContractError, MessageSender, MessageSource, PayloadReader, RelayConfig};
use dispatcher::{Destination, RelayBuilder, RelayError};
use ingestion::IngestionPipeline;
use tracing::{info, warn};

use super::PipelineStats;
use crate::error::{CliError, Result};

/// Pipeline configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Validated relay configuration
    pub relay: RelayConfig,

    /// Maximum number of messages to handle (None = unlimited)
    pub max_messages: Option<u64>,

    /// Channel buffer size
    pub buffer_size: usize,
}

/// Main pipeline orchestrator
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    /// Create a new pipeline with the given configuration
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Run until the source is exhausted, `max_messages` is reached or
    /// `shutdown` resolves
    ///
    /// Configuration is checked before the source is subscribed; a fatal
    /// configuration error leaves the source untouched.
    pub async fn run<Src, R, S, F>(
        self,
        source: Src,
        reader: Arc<R>,
        sender: Arc<S>,
        shutdown: F,
    ) -> Result<PipelineStats>
    where
        Src: MessageSource + 'static,
        R: PayloadReader + Send + Sync + 'static,
        S: MessageSender + Send + Sync + 'static,
        F: Future<Output = ()>,
    {
        let start_time = Instant::now();
        let relay_config = &self.config.relay;

        config_loader::ConfigLoader::validate(relay_config)?;
        let channel = relay_config.source.channel_id.clone().ok_or_else(|| {
            ContractError::config_validation("source.channel_id", "source channel is required")
        })?;

        let orchestrator = RelayBuilder::from_config(reader, sender, relay_config)
            .build()
            .map_err(|e| match e {
                RelayError::Config(e) => CliError::from(e),
                other => CliError::Other(other.into()),
            })?;

        // Subscribe
        let mut ingestion = IngestionPipeline::new(self.config.buffer_size);
        let rx = ingestion
            .take_receiver()
            .context("Failed to get ingestion receiver")?;
        let pump = ingestion
            .start(source, &channel)
            .await
            .map_err(|e| CliError::subscribe(e.to_string()))?;

        print_banner(&channel, orchestrator.destinations());
        info!(
            source = %channel,
            destinations = orchestrator.destinations().len(),
            mode = ?orchestrator.mode(),
            max_messages = ?self.config.max_messages,
            "Relay running"
        );

        let mut stats = PipelineStats {
            destinations: orchestrator.destinations().len(),
            ..Default::default()
        };

        tokio::pin!(shutdown);
        loop {
            let message = tokio::select! {
                biased;
                _ = &mut shutdown => {
                    warn!("Received shutdown signal, stopping relay...");
                    break;
                }
                received = rx.recv() => match received {
                    Ok(message) => message,
                    Err(_) => {
                        info!("Source exhausted");
                        break;
                    }
                },
            };

            let summary = orchestrator.handle(message).await;
            stats.record(&summary);

            if let Some(max) = self.config.max_messages {
                if stats.messages_handled >= max {
                    info!(messages = stats.messages_handled, "Reached max messages limit");
                    break;
                }
            }
        }

        // Shutdown
        info!("Shutting down relay...");
        ingestion.stop();
        drop(rx);
        let report = pump.join().await;

        stats.source_errors = report.errors;
        stats.staged_outstanding = orchestrator.stager_counters().outstanding();
        stats.duration = start_time.elapsed();

        info!(
            duration_secs = stats.duration.as_secs_f64(),
            handled = stats.messages_handled,
            dropped = stats.messages_dropped,
            pump_end = ?report.end,
            "Relay shutdown complete"
        );

        Ok(stats)
    }
}

fn print_banner(channel: &ChatId, destinations: &[Destination]) {
    println!("Monitoring source channel {channel} for new messages...");
    println!("Forwarding to {} destination(s):", destinations.len());
    for destination in destinations {
        println!("  - {}", destination.display_name());
    }
    println!();
}
