//! MessageSender trait - Dispatcher output interface
//!
//! Defines the abstract interface for pushing text and files to a destination.

use crate::{Attachment, ChatId, ContractError};

/// Markup dialect of outgoing text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FormatMode {
    /// HTML subset (`<a href="...">` only, as produced by the markup crate)
    #[default]
    Html,
    /// No parsing on the destination side
    Plain,
}

impl FormatMode {
    /// Telegram `parse_mode` value, if any
    pub fn parse_mode(&self) -> Option<&'static str> {
        match self {
            Self::Html => Some("HTML"),
            Self::Plain => None,
        }
    }
}

/// Destination-side sending trait
///
/// One call is one delivery attempt; retries are the dispatcher's concern.
/// Implementations must not mutate or consume the attachment, it is shared
/// read-only by every destination of a message.
#[trait_variant::make(MessageSender: Send)]
pub trait LocalMessageSender {
    /// Sender name (used for logging/metrics)
    fn name(&self) -> &str;

    /// Send a text message
    ///
    /// # Errors
    /// Any failure of the send operation; the caller treats it as transient
    async fn send_text(
        &self,
        destination: &ChatId,
        text: &str,
        format: FormatMode,
    ) -> Result<(), ContractError>;

    /// Send a local file with a caption
    ///
    /// # Errors
    /// Any failure of the send operation; the caller treats it as transient
    async fn send_file(
        &self,
        destination: &ChatId,
        attachment: &Attachment,
        caption: &str,
        format: FormatMode,
    ) -> Result<(), ContractError>;
}
