//! Layered error definitions
//!
//! Categorized by source: config / transport / payload / send / source

use thiserror::Error;

/// Unified error type
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== Transport Errors =====
    /// Transport-level failure (HTTP, API envelope)
    #[error("transport error during {operation}: {message}")]
    Transport { operation: String, message: String },

    // ===== Payload Errors =====
    /// Payload could not be fetched
    #[error("payload fetch error for '{file_id}': {message}")]
    PayloadFetch { file_id: String, message: String },

    // ===== Send Errors =====
    /// Send to a destination failed
    #[error("send to '{destination}' failed: {message}")]
    SendFailed {
        destination: String,
        message: String,
    },

    // ===== Source Errors =====
    /// Upstream subscription error
    #[error("source '{source_name}' error: {message}")]
    Source {
        source_name: String,
        message: String,
    },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl ContractError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create transport error
    pub fn transport(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transport {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Create payload fetch error
    pub fn payload_fetch(file_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::PayloadFetch {
            file_id: file_id.into(),
            message: message.into(),
        }
    }

    /// Create send error
    pub fn send_failed(destination: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SendFailed {
            destination: destination.into(),
            message: message.into(),
        }
    }

    /// Create source error
    pub fn source(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Source {
            source_name: source_name.into(),
            message: message.into(),
        }
    }

    /// Whether this error belongs to the startup-fatal configuration class
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            Self::ConfigParse { .. } | Self::ConfigValidation { .. }
        )
    }
}
