//! Relay error types

use contracts::{ContractError, MessageId};
use markup::MarkupError;
use thiserror::Error;

/// Relay-specific errors
///
/// Never escapes `RelayOrchestrator::handle`; surfaced as a drop reason.
#[derive(Debug, Error)]
pub enum RelayError {
    /// Annotation spans do not fit the text
    #[error("malformed markup: {0}")]
    Markup(#[from] MarkupError),

    /// Payload could not be staged, nothing was sent
    #[error("payload fetch failed for message {message_id}: {source}")]
    PayloadFetchFailed {
        message_id: MessageId,
        #[source]
        source: ContractError,
    },

    /// Invalid relay construction (e.g. no destinations)
    #[error("configuration error: {0}")]
    Config(#[from] ContractError),
}

impl RelayError {
    /// Create a payload fetch error
    pub fn payload_fetch_failed(message_id: MessageId, source: ContractError) -> Self {
        Self::PayloadFetchFailed { message_id, source }
    }

    /// Metric label for the drop this error causes
    pub fn drop_reason(&self) -> &'static str {
        match self {
            Self::Markup(_) => "malformed_markup",
            Self::PayloadFetchFailed { .. } => "payload_fetch_failed",
            Self::Config(_) => "config",
        }
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, RelayError>;
