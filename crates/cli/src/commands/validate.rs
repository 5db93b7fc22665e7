//! `validate` command implementation.

use anyhow::Context;
use contracts::{BackoffStrategy, DispatchMode, RelayConfig};
use serde::Serialize;
use tracing::info;

use super::load_config;
use crate::cli::ValidateArgs;
use crate::error::{CliError, Result};

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    version: String,
    source_channel: String,
    destination_count: usize,
    mode: DispatchMode,
    max_attempts: u32,
    bot_token_set: bool,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!("Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        Err(anyhow::anyhow!("Configuration validation failed").into())
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args
        .config
        .config
        .as_ref()
        .map_or_else(|| "(defaults)".to_string(), |p| p.display().to_string());

    match load_config(&args.config) {
        Ok(config) => {
            let warnings = collect_warnings(&config);
            ValidationResult {
                valid: true,
                config_path,
                error: None,
                warnings: (!warnings.is_empty()).then_some(warnings),
                summary: Some(ConfigSummary {
                    version: format!("{:?}", config.version),
                    source_channel: config
                        .source
                        .channel_id
                        .as_ref()
                        .map(ToString::to_string)
                        .unwrap_or_default(),
                    destination_count: config.destinations.len(),
                    mode: config.delivery.mode,
                    max_attempts: config.delivery.max_attempts,
                    bot_token_set: config.telegram.bot_token.is_some(),
                }),
            }
        }
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(describe_error(&e)),
            warnings: None,
            summary: None,
        },
    }
}

fn describe_error(err: &CliError) -> String {
    match err {
        CliError::ConfigurationFatal(inner) => inner.to_string(),
        other => other.to_string(),
    }
}

/// Collect configuration warnings (non-fatal issues)
fn collect_warnings(config: &RelayConfig) -> Vec<String> {
    let mut warnings = Vec::new();

    if config_loader::validate_credentials(config).is_err() {
        warnings.push(
            "No usable bot token - only `run --replay <file> --log-only` will work".to_string(),
        );
    }

    let delivery = &config.delivery;
    if delivery.backoff_ms == 0 && delivery.max_attempts > 1 {
        warnings.push("delivery.backoff_ms is 0 - retries fire immediately".to_string());
    }

    if delivery.mode == DispatchMode::Sequential
        && config.destinations.len() > 1
        && delivery.max_attempts > 1
    {
        let worst_case_ms = match delivery.backoff {
            BackoffStrategy::Fixed => delivery.backoff_ms,
            BackoffStrategy::Exponential => delivery.max_backoff_ms,
        }
        .saturating_mul(u64::from(delivery.max_attempts - 1));
        warnings.push(format!(
            "Sequential mode: one failing destination can delay the next by up to {worst_case_ms}ms"
        ));
    }

    if !config.staging.dir.exists() {
        warnings.push(format!(
            "Staging directory {} does not exist yet - it will be created",
            config.staging.dir.display()
        ));
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Version: {}", summary.version);
            println!("  Source channel: {}", summary.source_channel);
            println!("  Destinations: {}", summary.destination_count);
            println!("  Mode: {:?}", summary.mode);
            println!("  Max attempts: {}", summary.max_attempts);
            println!("  Bot token: {}", if summary.bot_token_set { "set" } else { "missing" });
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}
