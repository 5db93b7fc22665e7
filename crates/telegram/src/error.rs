//! Telegram transport error types

use std::time::Duration;

use contracts::ContractError;
use teloxide::{DownloadError, RequestError};
use thiserror::Error;

/// Telegram-specific error
#[derive(Debug, Error)]
pub enum TelegramError {
    /// Flood control: the server asked to wait before the next request
    #[error("rate limited by the bot api, retry after {}s", .0.as_secs())]
    RetryAfter(Duration),

    /// Bot API request failed (network, API error, bad response)
    #[error("bot api request failed: {0}")]
    Request(#[source] RequestError),

    /// File download failed
    #[error("file download failed: {0}")]
    Download(#[from] DownloadError),

    /// Request refused without a teloxide error (mock client)
    #[error("{method} failed: {message}")]
    Rejected { method: String, message: String },

    /// `api_base` is not a valid URL
    #[error("invalid bot api base '{url}': {message}")]
    InvalidApiBase { url: String, message: String },

    /// HTTP client could not be built
    #[error("failed to build http client: {0}")]
    Client(String),

    /// Update stream ended (mock only)
    #[error("update stream closed")]
    Closed,

    /// Missing bot token
    #[error("bot token is not configured")]
    MissingToken,

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl TelegramError {
    /// Create a rejection error
    pub fn rejected(method: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Rejected {
            method: method.into(),
            message: message.into(),
        }
    }

    /// Server-requested wait, if this is a flood-control error
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RetryAfter(wait) => Some(*wait),
            _ => None,
        }
    }
}

impl From<RequestError> for TelegramError {
    fn from(err: RequestError) -> Self {
        match err {
            RequestError::RetryAfter(wait) => Self::RetryAfter(wait.duration()),
            other => Self::Request(other),
        }
    }
}

impl From<TelegramError> for ContractError {
    fn from(err: TelegramError) -> Self {
        match err {
            TelegramError::Io(e) => ContractError::Io(e),
            TelegramError::MissingToken => {
                ContractError::config_validation("telegram.bot_token", "bot token is not configured")
            }
            TelegramError::InvalidApiBase { url, message } => ContractError::config_validation(
                "telegram.api_base",
                format!("'{url}': {message}"),
            ),
            other => ContractError::transport("bot_api", other.to_string()),
        }
    }
}

/// Result alias
pub type Result<T> = std::result::Result<T, TelegramError>;
