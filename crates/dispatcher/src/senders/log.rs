//! LogSender - logs deliveries via tracing instead of sending them

use std::sync::atomic::{AtomicU64, Ordering};

use contracts::{Attachment, ChatId, ContractError, FormatMode, MessageSender};
use tracing::{info, instrument};

/// Sender that logs message summaries, for dry runs and debugging
pub struct LogSender {
    name: String,
    sent: AtomicU64,
}

impl LogSender {
    /// Create a new LogSender with the given name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sent: AtomicU64::new(0),
        }
    }

    /// Number of messages "sent" so far
    pub fn sent(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }
}

impl MessageSender for LogSender {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "log_sender_send_text",
        skip(self, text),
        fields(sender = %self.name, destination = %destination)
    )]
    async fn send_text(
        &self,
        destination: &ChatId,
        text: &str,
        format: FormatMode,
    ) -> Result<(), ContractError> {
        self.sent.fetch_add(1, Ordering::Relaxed);
        info!(
            chars = text.chars().count(),
            parse_mode = format.parse_mode().unwrap_or("none"),
            text = %text,
            "Text message"
        );
        Ok(())
    }

    #[instrument(
        name = "log_sender_send_file",
        skip(self, attachment, caption),
        fields(sender = %self.name, destination = %destination)
    )]
    async fn send_file(
        &self,
        destination: &ChatId,
        attachment: &Attachment,
        caption: &str,
        format: FormatMode,
    ) -> Result<(), ContractError> {
        self.sent.fetch_add(1, Ordering::Relaxed);
        info!(
            kind = attachment.kind.as_str(),
            file = %attachment.upload_name(),
            parse_mode = format.parse_mode().unwrap_or("none"),
            caption = %caption,
            "File message"
        );
        Ok(())
    }
}
