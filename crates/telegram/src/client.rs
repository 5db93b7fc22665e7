//! Bot API client abstraction
//!
//! The slice of the Bot API the relay uses, expressed over teloxide types.
//! `HttpBotApi` talks to Telegram, `MockBotApi` serves tests and offline runs.

use std::future::Future;
use std::path::{Path, PathBuf};

use teloxide::types::{Chat, ParseMode, Recipient, Update};

use contracts::{ChatId, FormatMode, MediaKind};

use crate::error::Result;

/// Local file to upload with a `send*` call
#[derive(Debug, Clone)]
pub struct Upload {
    pub path: PathBuf,
    pub file_name: String,
}

/// Bot API client trait
pub trait BotApi: Send + Sync {
    /// Long-poll for updates starting at `offset`
    ///
    /// An offset confirms every earlier update; `None` leaves the queue as is.
    /// Returns an empty batch when `timeout_secs` passes without updates.
    fn get_updates(
        &self,
        offset: Option<i32>,
        timeout_secs: u32,
    ) -> impl Future<Output = Result<Vec<Update>>> + Send;

    /// Resolve a `file_id` into its server-side `file_path` (`getFile`)
    fn get_file_path(&self, file_id: &str) -> impl Future<Output = Result<String>> + Send;

    /// Download `file_path` into `destination`, returning the number of bytes written
    fn download_file(
        &self,
        file_path: &str,
        destination: &Path,
    ) -> impl Future<Output = Result<u64>> + Send;

    /// `sendMessage`
    fn send_message(
        &self,
        chat: &ChatId,
        text: &str,
        parse_mode: Option<ParseMode>,
    ) -> impl Future<Output = Result<()>> + Send;

    /// `sendPhoto` / `sendVideo` / ... depending on `kind`
    fn send_media(
        &self,
        chat: &ChatId,
        kind: MediaKind,
        upload: Upload,
        caption: &str,
        parse_mode: Option<ParseMode>,
    ) -> impl Future<Output = Result<()>> + Send;

    /// `getChat`
    fn get_chat(&self, chat: &ChatId) -> impl Future<Output = Result<Chat>> + Send;
}

/// Bot API method used to re-send a media kind
pub fn send_method(kind: MediaKind) -> &'static str {
    match kind {
        MediaKind::Photo => "sendPhoto",
        MediaKind::Video => "sendVideo",
        MediaKind::Animation => "sendAnimation",
        MediaKind::Audio => "sendAudio",
        MediaKind::Voice => "sendVoice",
        MediaKind::Document => "sendDocument",
    }
}

/// teloxide parse mode for a format
pub fn parse_mode(format: FormatMode) -> Option<ParseMode> {
    match format {
        FormatMode::Html => Some(ParseMode::Html),
        FormatMode::Plain => None,
    }
}

/// Numeric ids go out as ids, anything else as a `@username`
pub fn recipient(chat: &ChatId) -> Recipient {
    match chat.as_i64() {
        Some(id) => Recipient::Id(teloxide::types::ChatId(id)),
        None => Recipient::ChannelUsername(chat.to_string()),
    }
}
