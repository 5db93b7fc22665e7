//! Error types for CLI operations.

use contracts::ContractError;
use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// Configuration is unusable; nothing was subscribed
    #[error("Configuration error: {0}")]
    ConfigurationFatal(#[source] ContractError),

    /// Bot API credentials missing or malformed
    #[error("Invalid credentials: {message}")]
    Credentials { message: String },

    /// The source refused the subscription
    #[error("Failed to subscribe to source channel: {message}")]
    Subscribe { message: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error wrapper
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl CliError {
    pub fn config_not_found(path: impl Into<String>) -> Self {
        Self::ConfigNotFound { path: path.into() }
    }

    pub fn credentials(message: impl Into<String>) -> Self {
        Self::Credentials {
            message: message.into(),
        }
    }

    pub fn subscribe(message: impl Into<String>) -> Self {
        Self::Subscribe {
            message: message.into(),
        }
    }

    /// Whether the process should stop before touching the network
    pub fn is_fatal_config(&self) -> bool {
        matches!(
            self,
            Self::ConfigNotFound { .. } | Self::ConfigurationFatal(_) | Self::Credentials { .. }
        )
    }
}

impl From<ContractError> for CliError {
    fn from(err: ContractError) -> Self {
        if err.is_config() {
            Self::ConfigurationFatal(err)
        } else {
            Self::Other(anyhow::Error::new(err))
        }
    }
}

/// Result type alias for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;
