//! Bot API client over teloxide

use std::path::Path;
use std::time::Duration;

use teloxide::net::Download;
use teloxide::payloads::{
    GetUpdatesSetters, SendAnimationSetters, SendAudioSetters, SendDocumentSetters,
    SendMessageSetters, SendPhotoSetters, SendVideoSetters, SendVoiceSetters,
};
use teloxide::prelude::*;
use teloxide::types::{AllowedUpdate, Chat, InputFile, ParseMode, Update};
use tokio::io::AsyncWriteExt;
use tracing::{debug, instrument};

use contracts::{ChatId, MediaKind, TelegramConfig};

use crate::client::{recipient, BotApi, Upload};
use crate::error::{Result, TelegramError};

/// Real Bot API client
#[derive(Clone)]
pub struct HttpBotApi {
    bot: Bot,
    api_base: String,
}

impl std::fmt::Debug for HttpBotApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpBotApi")
            .field("api_base", &self.api_base)
            .field("token", &"[REDACTED]")
            .finish()
    }
}

impl HttpBotApi {
    /// Create a client for `token`
    pub fn new(api_base: &str, token: &str, request_timeout: Duration) -> Result<Self> {
        let token = token.trim();
        if token.is_empty() {
            return Err(TelegramError::MissingToken);
        }
        let api_url = reqwest::Url::parse(api_base).map_err(|e| TelegramError::InvalidApiBase {
            url: api_base.to_string(),
            message: e.to_string(),
        })?;
        let client = teloxide::net::default_reqwest_settings()
            .timeout(request_timeout)
            .build()
            .map_err(|e| TelegramError::Client(e.to_string()))?;

        Ok(Self {
            bot: Bot::with_client(token, client).set_api_url(api_url),
            api_base: api_base.to_string(),
        })
    }

    /// Create a client from the `[telegram]` config section
    pub fn from_config(config: &TelegramConfig) -> Result<Self> {
        let token = config
            .bot_token
            .as_deref()
            .ok_or(TelegramError::MissingToken)?;
        Self::new(
            &config.api_base,
            token,
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    /// Underlying teloxide bot
    pub fn bot(&self) -> &Bot {
        &self.bot
    }
}

/// Apply caption and parse mode to any `send*` media request
///
/// Telegram rejects a parse mode without text, so both are skipped for an
/// empty caption.
macro_rules! captioned {
    ($request:expr, $caption:expr, $parse_mode:expr) => {{
        let mut request = $request;
        if !$caption.is_empty() {
            request = request.caption($caption.to_string());
            if let Some(mode) = $parse_mode {
                request = request.parse_mode(mode);
            }
        }
        request.await.map(drop)
    }};
}

impl BotApi for HttpBotApi {
    #[instrument(name = "bot_api_get_updates", skip(self))]
    async fn get_updates(&self, offset: Option<i32>, timeout_secs: u32) -> Result<Vec<Update>> {
        let mut request = self.bot.get_updates().timeout(timeout_secs).allowed_updates(vec![
            AllowedUpdate::Message,
            AllowedUpdate::ChannelPost,
            AllowedUpdate::MyChatMember,
        ]);
        if let Some(offset) = offset {
            request = request.offset(offset);
        }
        let updates = request.await?;
        debug!(count = updates.len(), "Updates received");
        Ok(updates)
    }

    #[instrument(name = "bot_api_get_file", skip(self))]
    async fn get_file_path(&self, file_id: &str) -> Result<String> {
        let file = self.bot.get_file(file_id).await?;
        Ok(file.path)
    }

    #[instrument(name = "bot_api_download_file", skip(self, destination))]
    async fn download_file(&self, file_path: &str, destination: &Path) -> Result<u64> {
        let mut file = tokio::fs::File::create(destination).await?;
        self.bot.download_file(file_path, &mut file).await?;
        file.flush().await?;
        Ok(file.metadata().await?.len())
    }

    #[instrument(name = "bot_api_send_message", skip(self, text), fields(chat = %chat))]
    async fn send_message(
        &self,
        chat: &ChatId,
        text: &str,
        parse_mode: Option<ParseMode>,
    ) -> Result<()> {
        let mut request = self.bot.send_message(recipient(chat), text.to_string());
        if let Some(mode) = parse_mode {
            request = request.parse_mode(mode);
        }
        request.await?;
        Ok(())
    }

    #[instrument(
        name = "bot_api_send_media",
        skip(self, upload, caption),
        fields(chat = %chat, kind = kind.as_str(), file = %upload.file_name)
    )]
    async fn send_media(
        &self,
        chat: &ChatId,
        kind: MediaKind,
        upload: Upload,
        caption: &str,
        parse_mode: Option<ParseMode>,
    ) -> Result<()> {
        let to = recipient(chat);
        let input = InputFile::file(upload.path).file_name(upload.file_name);
        let bot = &self.bot;

        match kind {
            MediaKind::Photo => captioned!(bot.send_photo(to, input), caption, parse_mode),
            MediaKind::Video => captioned!(bot.send_video(to, input), caption, parse_mode),
            MediaKind::Animation => {
                captioned!(bot.send_animation(to, input), caption, parse_mode)
            }
            MediaKind::Audio => captioned!(bot.send_audio(to, input), caption, parse_mode),
            MediaKind::Voice => captioned!(bot.send_voice(to, input), caption, parse_mode),
            MediaKind::Document => {
                captioned!(bot.send_document(to, input), caption, parse_mode)
            }
        }?;
        Ok(())
    }

    #[instrument(name = "bot_api_get_chat", skip(self), fields(chat = %chat))]
    async fn get_chat(&self, chat: &ChatId) -> Result<Chat> {
        Ok(self.bot.get_chat(recipient(chat)).await?)
    }
}
