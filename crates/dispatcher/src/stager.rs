//! PayloadStager - materializes a message's media once per relay
//!
//! The staged file lives exactly as long as the [`StagedPayload`] that owns it.
//! `release` consumes the value, so a second release does not type-check; the
//! `Drop` impl only removes files that were never released (cancelled relay).

use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::{debug, instrument, warn};

use contracts::{Attachment, Message, MessageId, PayloadReader, PayloadRef};

use crate::error::{RelayError, Result};

/// Outcome of releasing a staged payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseOutcome {
    /// File deleted
    Removed,
    /// File was already absent (warning only)
    AlreadyGone,
    /// Deletion failed (warning only)
    Failed,
}

impl ReleaseOutcome {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Removed => "removed",
            Self::AlreadyGone => "already_gone",
            Self::Failed => "failed",
        }
    }
}

/// Stage/release counters shared by a stager and its payloads
#[derive(Debug, Default)]
pub struct StagerCounters {
    staged: AtomicU64,
    released: AtomicU64,
    dropped_unreleased: AtomicU64,
}

impl StagerCounters {
    /// Payloads staged so far
    pub fn staged(&self) -> u64 {
        self.staged.load(Ordering::Relaxed)
    }

    /// Explicit releases so far
    pub fn released(&self) -> u64 {
        self.released.load(Ordering::Relaxed)
    }

    /// Payloads cleaned up by the drop guard
    pub fn dropped_unreleased(&self) -> u64 {
        self.dropped_unreleased.load(Ordering::Relaxed)
    }

    /// Staged payloads not yet released or dropped
    pub fn outstanding(&self) -> u64 {
        self.staged()
            .saturating_sub(self.released() + self.dropped_unreleased())
    }
}

/// Fetches payloads through a [`PayloadReader`] into a staging directory
pub struct PayloadStager<R> {
    reader: Arc<R>,
    dir: PathBuf,
    counters: Arc<StagerCounters>,
}

impl<R: PayloadReader + Sync> PayloadStager<R> {
    /// Create a stager writing into `dir`
    pub fn new(reader: Arc<R>, dir: impl Into<PathBuf>) -> Self {
        Self {
            reader,
            dir: dir.into(),
            counters: Arc::new(StagerCounters::default()),
        }
    }

    /// Staging directory
    pub fn dir(&self) -> &std::path::Path {
        &self.dir
    }

    /// Shared counters
    pub fn counters(&self) -> &Arc<StagerCounters> {
        &self.counters
    }

    /// Stage the message's payload, if it has one
    ///
    /// # Errors
    /// `PayloadFetchFailed` when the directory cannot be created or the
    /// reader fails. Nothing is staged in that case.
    #[instrument(
        name = "payload_stage",
        skip(self, message),
        fields(message_id = message.id, reader = %self.reader.name())
    )]
    pub async fn stage(&self, message: &Message) -> Result<Option<StagedPayload>> {
        let Some(payload) = &message.payload else {
            return Ok(None);
        };

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| RelayError::payload_fetch_failed(message.id, e.into()))?;

        let stem = staging_stem(message.id, payload);
        let path = self
            .reader
            .fetch(payload, &self.dir, &stem)
            .await
            .map_err(|e| RelayError::payload_fetch_failed(message.id, e))?;

        self.counters.staged.fetch_add(1, Ordering::Relaxed);
        observability::record_payload_staged(payload.kind.as_str());
        debug!(path = %path.display(), kind = payload.kind.as_str(), "Payload staged");

        let attachment = Attachment {
            path,
            kind: payload.kind,
            file_name: payload.file_name.clone(),
        };
        Ok(Some(StagedPayload {
            attachment: Arc::new(attachment),
            message_id: message.id,
            counters: Arc::clone(&self.counters),
            released: false,
        }))
    }
}

/// Unique, filesystem-safe base name for a staged payload
fn staging_stem(message_id: MessageId, payload: &PayloadRef) -> String {
    let file_id: String = payload
        .file_id
        .chars()
        .take(64)
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("{message_id}_{file_id}")
}

/// A payload materialized on local disk
#[derive(Debug)]
pub struct StagedPayload {
    attachment: Arc<Attachment>,
    message_id: MessageId,
    counters: Arc<StagerCounters>,
    released: bool,
}

impl StagedPayload {
    /// Shared read-only handle for destination tasks
    pub fn attachment(&self) -> &Arc<Attachment> {
        &self.attachment
    }

    /// Message this payload belongs to
    pub fn message_id(&self) -> MessageId {
        self.message_id
    }

    /// Delete the local file
    ///
    /// A missing file is logged as a warning and never fails the relay.
    #[instrument(
        name = "payload_release",
        skip(self),
        fields(message_id = self.message_id, path = %self.attachment.path.display())
    )]
    pub async fn release(mut self) -> ReleaseOutcome {
        self.released = true;
        self.counters.released.fetch_add(1, Ordering::Relaxed);

        let outcome = match tokio::fs::remove_file(&self.attachment.path).await {
            Ok(()) => {
                debug!("Staged payload removed");
                ReleaseOutcome::Removed
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!("Staged payload already gone at release");
                ReleaseOutcome::AlreadyGone
            }
            Err(e) => {
                warn!(error = %e, "Failed to remove staged payload");
                ReleaseOutcome::Failed
            }
        };
        observability::record_payload_released(outcome.as_str());
        outcome
    }
}

impl Drop for StagedPayload {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        self.counters
            .dropped_unreleased
            .fetch_add(1, Ordering::Relaxed);
        warn!(
            message_id = self.message_id,
            path = %self.attachment.path.display(),
            "Staged payload dropped without release, removing"
        );
        if let Err(e) = std::fs::remove_file(&self.attachment.path) {
            if e.kind() != ErrorKind::NotFound {
                warn!(error = %e, "Failed to remove dropped payload");
            }
        }
    }
}
