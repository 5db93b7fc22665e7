//! Message - Source output
//!
//! A single upstream post: text, formatting annotations, optional media.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::ChatId;

/// Upstream message id
pub type MessageId = i64;

/// Relayed message
///
/// Immutable once received from the source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Message id within the source chat
    pub id: MessageId,

    /// Source chat
    pub chat_id: ChatId,

    /// Plain text (or media caption); empty when the post has none
    #[serde(default)]
    pub text: String,

    /// Formatting annotations over `text`
    #[serde(default)]
    pub annotations: Vec<Annotation>,

    /// Attached media, if any
    #[serde(default)]
    pub payload: Option<PayloadRef>,
}

impl Message {
    /// Text-only message without annotations
    pub fn text(id: MessageId, chat_id: impl Into<ChatId>, text: impl Into<String>) -> Self {
        Self {
            id,
            chat_id: chat_id.into(),
            text: text.into(),
            annotations: Vec::new(),
            payload: None,
        }
    }

    /// Builder-style annotation setter
    pub fn with_annotations(mut self, annotations: Vec<Annotation>) -> Self {
        self.annotations = annotations;
        self
    }

    /// Builder-style payload setter
    pub fn with_payload(mut self, payload: PayloadRef) -> Self {
        self.payload = Some(payload);
        self
    }

    /// Whether the message carries media
    pub fn has_payload(&self) -> bool {
        self.payload.is_some()
    }
}

/// Formatting annotation
///
/// `offset` and `length` count UTF-16 code units, the platform's native
/// indexing unit. They are not byte or `char` offsets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Annotation {
    /// Start, in UTF-16 code units
    pub offset: usize,

    /// Length, in UTF-16 code units
    pub length: usize,

    /// Annotation kind
    pub kind: AnnotationKind,
}

impl Annotation {
    /// Hyperlink annotation
    pub fn link(offset: usize, length: usize, target: impl Into<String>) -> Self {
        Self {
            offset,
            length,
            kind: AnnotationKind::Link {
                target: target.into(),
            },
        }
    }

    /// Annotation of any other kind
    pub fn new(offset: usize, length: usize, kind: AnnotationKind) -> Self {
        Self {
            offset,
            length,
            kind,
        }
    }

    /// Link target, if this is a link
    pub fn link_target(&self) -> Option<&str> {
        match &self.kind {
            AnnotationKind::Link { target } => Some(target),
            _ => None,
        }
    }
}

/// Annotation kind
///
/// Only `Link` is rendered into markup; the rest leave their span as plain text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnnotationKind {
    /// Hyperlink over the span
    Link { target: String },
    Bold,
    Italic,
    Underline,
    Strikethrough,
    Code,
    Pre,
    /// Anything else the platform may send
    #[serde(other)]
    Other,
}

/// Reference to remote media
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayloadRef {
    /// Opaque id understood by the reader
    pub file_id: String,

    /// Media kind (decides how it is re-sent)
    #[serde(default)]
    pub kind: MediaKind,

    /// Original file name, if known
    #[serde(default)]
    pub file_name: Option<String>,

    /// Size in bytes, if known
    #[serde(default)]
    pub file_size: Option<u64>,
}

impl PayloadRef {
    /// Create a payload reference
    pub fn new(file_id: impl Into<String>, kind: MediaKind) -> Self {
        Self {
            file_id: file_id.into(),
            kind,
            file_name: None,
            file_size: None,
        }
    }
}

/// Media kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Photo,
    Video,
    Animation,
    Audio,
    Voice,
    #[default]
    Document,
}

impl MediaKind {
    /// Stable lowercase name (used in logs and metric labels)
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Photo => "photo",
            Self::Video => "video",
            Self::Animation => "animation",
            Self::Audio => "audio",
            Self::Voice => "voice",
            Self::Document => "document",
        }
    }
}

/// Locally materialized payload, as handed to the sender
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    /// Local file
    pub path: PathBuf,

    /// Media kind
    pub kind: MediaKind,

    /// Name to present to the destination
    pub file_name: Option<String>,
}

impl Attachment {
    /// Create an attachment for a local file
    pub fn new(path: impl Into<PathBuf>, kind: MediaKind) -> Self {
        Self {
            path: path.into(),
            kind,
            file_name: None,
        }
    }

    /// Local file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Upload name: explicit name, else the local file name
    pub fn upload_name(&self) -> String {
        self.file_name
            .clone()
            .or_else(|| {
                self.path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
            })
            .unwrap_or_else(|| self.kind.as_str().to_string())
    }
}
