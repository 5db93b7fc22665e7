//! Offline replay
//!
//! `ReplaySource` reads one JSON-encoded [`Message`] per line. `LocalFileReader`
//! resolves payload refs as paths on the local filesystem, so a replay file can
//! carry media without a Bot API.

use std::path::{Path, PathBuf};

use contracts::{ChatId, ContractError, Message, MessageSource, PayloadReader, PayloadRef};
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader, Lines};
use tracing::{debug, info, instrument};

use crate::error::IngestionError;

/// JSON-lines message source
///
/// Blank lines and lines starting with `#` are skipped. Messages whose
/// `chat_id` is not the subscribed channel are ignored.
pub struct ReplaySource {
    path: PathBuf,
    lines: Option<Lines<BufReader<File>>>,
    line_no: usize,
    channel: Option<ChatId>,
}

impl ReplaySource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lines: None,
            line_no: 0,
            channel: None,
        }
    }

    /// Replay file path
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl MessageSource for ReplaySource {
    fn name(&self) -> &str {
        "replay"
    }

    #[instrument(name = "replay_subscribe", skip(self), fields(path = %self.path.display()))]
    async fn subscribe(&mut self, channel: &ChatId) -> Result<(), ContractError> {
        let file = File::open(&self.path).await.map_err(|e| {
            ContractError::source("replay", format!("cannot open {}: {e}", self.path.display()))
        })?;
        self.lines = Some(BufReader::new(file).lines());
        self.line_no = 0;
        self.channel = Some(channel.clone());
        info!(channel = %channel, "Replaying messages from file");
        Ok(())
    }

    async fn next_message(&mut self) -> Result<Option<Message>, ContractError> {
        let (Some(lines), Some(channel)) = (self.lines.as_mut(), self.channel.as_ref()) else {
            return Err(ContractError::source("replay", "not subscribed"));
        };

        while let Some(line) = lines.next_line().await.map_err(IngestionError::from)? {
            self.line_no += 1;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let message: Message = serde_json::from_str(line)
                .map_err(|e| IngestionError::replay_parse(self.line_no, e.to_string()))?;

            if message.chat_id != *channel {
                debug!(
                    line = self.line_no,
                    chat_id = %message.chat_id,
                    "skipping message from another chat"
                );
                continue;
            }
            return Ok(Some(message));
        }

        Ok(None)
    }
}

/// Payload reader over the local filesystem
///
/// `PayloadRef::file_id` is a path. Relative paths are resolved against the
/// base directory when one is set.
#[derive(Debug, Clone, Default)]
pub struct LocalFileReader {
    base_dir: Option<PathBuf>,
}

impl LocalFileReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve relative payload paths against `dir`
    pub fn with_base_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: Some(dir.into()),
        }
    }

    fn resolve(&self, file_id: &str) -> PathBuf {
        let path = Path::new(file_id);
        match &self.base_dir {
            Some(base) if path.is_relative() => base.join(path),
            _ => path.to_path_buf(),
        }
    }
}

impl PayloadReader for LocalFileReader {
    fn name(&self) -> &str {
        "local_file"
    }

    async fn fetch(
        &self,
        payload: &PayloadRef,
        dir: &Path,
        stem: &str,
    ) -> Result<PathBuf, ContractError> {
        let source = self.resolve(&payload.file_id);
        let target = match source.extension().and_then(|e| e.to_str()) {
            Some(ext) => dir.join(format!("{stem}.{ext}")),
            None => dir.join(stem),
        };

        tokio::fs::copy(&source, &target).await.map_err(|e| {
            ContractError::payload_fetch(
                &payload.file_id,
                format!("cannot copy {}: {e}", source.display()),
            )
        })?;
        debug!(from = %source.display(), to = %target.display(), "payload copied");
        Ok(target)
    }
}
