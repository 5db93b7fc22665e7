//! Collaborator adapters over a [`BotApi`] client
//!
//! `BotTransport` reads payloads and sends messages, `UpdatePoller` turns
//! `getUpdates` long polling into a message source. Both share one client.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use contracts::{
    Attachment, ChatId, ContractError, FormatMode, Message, MessageSender, MessageSource,
    PayloadReader, PayloadRef,
};

use crate::client::{parse_mode, BotApi, Upload};
use crate::convert::{chat_matches, post_of, to_message, ChatSummary};
use crate::error::TelegramError;

/// Payload reader and message sender backed by the Bot API
pub struct BotTransport<C> {
    client: Arc<C>,
}

impl<C: BotApi> BotTransport<C> {
    pub fn new(client: Arc<C>) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &Arc<C> {
        &self.client
    }

    /// Update poller sharing this transport's client
    pub fn poller(&self, timeout_secs: u64) -> UpdatePoller<C> {
        UpdatePoller::new(Arc::clone(&self.client), timeout_secs)
    }

    /// Look up a chat (`getChat`)
    pub async fn resolve_chat(&self, chat: &ChatId) -> Result<ChatSummary, ContractError> {
        let chat = self.client.get_chat(chat).await?;
        Ok(ChatSummary::from_chat(&chat))
    }

    /// Chats that appear in pending updates, in first-seen order
    ///
    /// Reads without an offset, so nothing is confirmed and a later
    /// `run` still receives every update.
    #[instrument(name = "bot_transport_discover", skip(self))]
    pub async fn discover_chats(&self) -> Result<Vec<ChatSummary>, ContractError> {
        let updates = match self.client.get_updates(None, 0).await {
            Ok(updates) => updates,
            Err(TelegramError::Closed) => Vec::new(),
            Err(e) => return Err(e.into()),
        };

        let mut chats: Vec<ChatSummary> = Vec::new();
        for chat in updates.iter().filter_map(|u| u.chat()) {
            if !chats.iter().any(|seen| seen.id == chat.id.0) {
                chats.push(ChatSummary::from_chat(chat));
            }
        }
        debug!(updates = updates.len(), chats = chats.len(), "Discovered chats");
        Ok(chats)
    }
}

/// Remove what an interrupted download left behind
async fn discard_partial(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(path = %path.display(), error = %e, "Failed to remove partial download");
        }
    }
}

impl<C: BotApi> PayloadReader for BotTransport<C> {
    fn name(&self) -> &str {
        "bot_api"
    }

    #[instrument(
        name = "bot_transport_fetch",
        skip(self, payload, dir),
        fields(file_id = %payload.file_id, kind = payload.kind.as_str())
    )]
    async fn fetch(
        &self,
        payload: &PayloadRef,
        dir: &Path,
        stem: &str,
    ) -> Result<PathBuf, ContractError> {
        let fetch_error = |e: TelegramError| ContractError::payload_fetch(&payload.file_id, e.to_string());

        let file_path = self
            .client
            .get_file_path(&payload.file_id)
            .await
            .map_err(fetch_error)?;

        let path = match Path::new(&file_path).extension().and_then(|e| e.to_str()) {
            Some(ext) => dir.join(format!("{stem}.{ext}")),
            None => dir.join(stem),
        };
        match self.client.download_file(&file_path, &path).await {
            Ok(bytes) => {
                debug!(path = %path.display(), bytes, "Payload downloaded");
                Ok(path)
            }
            Err(e) => {
                discard_partial(&path).await;
                Err(fetch_error(e))
            }
        }
    }
}

impl<C: BotApi> MessageSender for BotTransport<C> {
    fn name(&self) -> &str {
        "bot_api"
    }

    async fn send_text(
        &self,
        destination: &ChatId,
        text: &str,
        format: FormatMode,
    ) -> Result<(), ContractError> {
        self.client
            .send_message(destination, text, parse_mode(format))
            .await
            .map_err(|e| ContractError::send_failed(destination.as_str(), e.to_string()))
    }

    async fn send_file(
        &self,
        destination: &ChatId,
        attachment: &Attachment,
        caption: &str,
        format: FormatMode,
    ) -> Result<(), ContractError> {
        let upload = Upload {
            path: attachment.path().to_path_buf(),
            file_name: attachment.upload_name(),
        };

        self.client
            .send_media(
                destination,
                attachment.kind,
                upload,
                caption,
                parse_mode(format),
            )
            .await
            .map_err(|e| ContractError::send_failed(destination.as_str(), e.to_string()))
    }
}

/// Long-polling message source for one channel
pub struct UpdatePoller<C> {
    client: Arc<C>,
    timeout_secs: u32,
    skip_backlog: bool,
    offset: Option<i32>,
    channel: Option<ChatId>,
    pending: VecDeque<Message>,
    skipped: u64,
}

impl<C: BotApi> UpdatePoller<C> {
    pub fn new(client: Arc<C>, timeout_secs: u64) -> Self {
        Self {
            client,
            timeout_secs: u32::try_from(timeout_secs).unwrap_or(u32::MAX),
            skip_backlog: true,
            offset: None,
            channel: None,
            pending: VecDeque::new(),
            skipped: 0,
        }
    }

    /// Whether updates queued before `subscribe` are discarded (default: yes)
    pub fn with_skip_backlog(mut self, skip: bool) -> Self {
        self.skip_backlog = skip;
        self
    }

    /// Updates seen that were not posts of the subscribed channel
    pub fn skipped(&self) -> u64 {
        self.skipped
    }

    /// Confirm everything queued so far; the Bot API returns the newest update for offset -1
    async fn drop_backlog(&mut self) -> Result<(), ContractError> {
        let latest = match self.client.get_updates(Some(-1), 0).await {
            Ok(latest) => latest,
            Err(TelegramError::Closed) => Vec::new(),
            Err(e) => return Err(ContractError::source("bot_api_poller", e.to_string())),
        };
        if let Some(update) = latest.last() {
            let offset = update.id.as_offset();
            self.offset = Some(offset);
            info!(offset, "Skipped update backlog");
        }
        Ok(())
    }
}

impl<C: BotApi> MessageSource for UpdatePoller<C> {
    fn name(&self) -> &str {
        "bot_api_poller"
    }

    #[instrument(name = "update_poller_subscribe", skip(self), fields(channel = %channel))]
    async fn subscribe(&mut self, channel: &ChatId) -> Result<(), ContractError> {
        if self.skip_backlog {
            self.drop_backlog().await?;
        }
        self.channel = Some(channel.clone());
        info!(timeout_secs = self.timeout_secs, "Subscribed to channel");
        Ok(())
    }

    async fn next_message(&mut self) -> Result<Option<Message>, ContractError> {
        let Some(channel) = self.channel.clone() else {
            return Err(ContractError::source("bot_api_poller", "not subscribed"));
        };

        loop {
            if let Some(message) = self.pending.pop_front() {
                return Ok(Some(message));
            }

            let updates = match self.client.get_updates(self.offset, self.timeout_secs).await {
                Ok(updates) => updates,
                Err(TelegramError::Closed) => return Ok(None),
                Err(TelegramError::RetryAfter(wait)) => {
                    warn!(retry_after_ms = wait.as_millis() as u64, "Polling rate limited");
                    tokio::time::sleep(wait).await;
                    continue;
                }
                Err(e) => return Err(ContractError::source("bot_api_poller", e.to_string())),
            };

            for update in updates {
                self.offset = Some(update.id.as_offset());
                match post_of(&update) {
                    Some(post) if chat_matches(&post.chat, &channel) => {
                        self.pending.push_back(to_message(post));
                    }
                    _ => {
                        self.skipped += 1;
                        debug!("Ignoring update outside the source channel");
                    }
                }
            }
        }
    }
}
