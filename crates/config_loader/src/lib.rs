//! # Config Loader
//!
//! Configuration loading and parsing module.
//!
//! Responsibilities:
//! - Parse TOML/JSON configuration files
//! - Apply command-line / environment overrides
//! - Validate configuration legality
//! - Generate `RelayConfig`
//!
//! # Example
//!
//! ```no_run
//! use config_loader::ConfigLoader;
//! use std::path::Path;
//!
//! let config = ConfigLoader::load_from_path(Path::new("relay.toml")).unwrap();
//! println!("Destinations: {}", config.destinations.len());
//! ```

mod overrides;
mod parser;
mod validator;

pub use contracts::RelayConfig;
pub use overrides::{parse_destination_list, ConfigOverrides};
pub use parser::ConfigFormat;
pub use validator::validate_credentials;

use contracts::ContractError;
use std::path::Path;

/// Configuration loader
///
/// Provides static methods to load configuration from files or strings.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from file path
    ///
    /// Automatically detects format from file extension (.toml / .json).
    ///
    /// # Errors
    /// - File read failure
    /// - Unsupported format
    /// - Parse failure
    /// - Validation failure
    pub fn load_from_path(path: &Path) -> Result<RelayConfig, ContractError> {
        Self::load(Some(path), &ConfigOverrides::default())
    }

    /// Load configuration from string
    ///
    /// # Errors
    /// - Parse failure
    /// - Validation failure
    pub fn load_from_str(content: &str, format: ConfigFormat) -> Result<RelayConfig, ContractError> {
        let config = parser::parse(content, format)?;
        validator::validate(&config)?;
        Ok(config)
    }

    /// Load an optional file, apply overrides, then validate
    ///
    /// Without a file the defaults are used, so a deployment configured purely
    /// through the environment works.
    ///
    /// # Errors
    /// Same as [`ConfigLoader::load_from_path`]
    pub fn load(
        path: Option<&Path>,
        overrides: &ConfigOverrides,
    ) -> Result<RelayConfig, ContractError> {
        let config = Self::load_unvalidated(path, overrides)?;
        validator::validate(&config)?;
        Ok(config)
    }

    /// Like [`ConfigLoader::load`] but without validation
    ///
    /// For commands that run before the relay is fully configured, such as
    /// chat discovery, which only needs the Bot API section.
    pub fn load_unvalidated(
        path: Option<&Path>,
        overrides: &ConfigOverrides,
    ) -> Result<RelayConfig, ContractError> {
        let mut config = match path {
            Some(path) => {
                let format = ConfigFormat::from_path(path)?;
                let content = Self::read_file(path)?;
                parser::parse(&content, format)?
            }
            None => RelayConfig::default(),
        };
        overrides.apply(&mut config);
        Ok(config)
    }

    /// Validate an already-built configuration
    pub fn validate(config: &RelayConfig) -> Result<(), ContractError> {
        validator::validate(config)
    }

    /// Serialize RelayConfig to TOML string
    pub fn to_toml(config: &RelayConfig) -> Result<String, ContractError> {
        toml::to_string_pretty(config)
            .map_err(|e| ContractError::config_parse(format!("TOML serialize error: {e}")))
    }

    /// Serialize RelayConfig to JSON string
    pub fn to_json(config: &RelayConfig) -> Result<String, ContractError> {
        serde_json::to_string_pretty(config)
            .map_err(|e| ContractError::config_parse(format!("JSON serialize error: {e}")))
    }
}

impl ConfigLoader {
    /// Read configuration file content
    fn read_file(path: &Path) -> Result<String, ContractError> {
        Ok(std::fs::read_to_string(path)?)
    }
}
