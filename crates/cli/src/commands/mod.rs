//! Command implementations.

mod info;
mod run;
mod validate;

pub use info::run_info;
pub use run::run_relay;
pub use validate::run_validate;

use config_loader::ConfigOverrides;
use contracts::RelayConfig;
use tracing::{debug, info};

use crate::cli::ConfigArgs;
use crate::error::{CliError, Result};

/// Load the config file (if any), apply overrides and validate
///
/// Every error here belongs to the fatal configuration class.
pub(crate) fn load_config(args: &ConfigArgs) -> Result<RelayConfig> {
    let overrides = prepare_overrides(args)?;
    let config = config_loader::ConfigLoader::load(args.config.as_deref(), &overrides)?;
    Ok(config)
}

/// Load the config file (if any) and apply overrides, skipping validation
pub(crate) fn load_config_unvalidated(args: &ConfigArgs) -> Result<RelayConfig> {
    let overrides = prepare_overrides(args)?;
    let config =
        config_loader::ConfigLoader::load_unvalidated(args.config.as_deref(), &overrides)?;
    Ok(config)
}

fn prepare_overrides(args: &ConfigArgs) -> Result<ConfigOverrides> {
    match &args.config {
        Some(path) if !path.exists() => {
            return Err(CliError::config_not_found(path.display().to_string()));
        }
        Some(path) => info!(config = %path.display(), "Loading configuration"),
        None => info!("No configuration file, using defaults and overrides"),
    }

    let overrides = args.overrides()?;
    if !overrides.is_empty() {
        debug!(
            source_channel = ?overrides.source_channel,
            destinations = ?overrides.destinations.as_ref().map(Vec::len),
            api_base = ?overrides.api_base,
            bot_token = overrides.bot_token.is_some(),
            "Applying overrides"
        );
    }
    Ok(overrides)
}
