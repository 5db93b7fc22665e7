//! teloxide types into relay types
//!
//! Channel posts become [`contracts::Message`]: media posts carry the caption
//! and its entities, photos keep only their largest size, and `text_link`
//! entities become link annotations with their UTF-16 offsets untouched.

use teloxide::types::{Chat, FileMeta, MessageEntity, MessageEntityKind, PhotoSize, Update};

use contracts::{Annotation, AnnotationKind, ChatId, MediaKind, Message, PayloadRef};

/// Convert a channel post into a relay message
pub fn to_message(post: &teloxide::types::Message) -> Message {
    let payload = payload(post);
    let (text, entities) = if payload.is_some() {
        (post.caption(), post.caption_entities())
    } else {
        (post.text(), post.entities())
    };

    let annotations = entities
        .unwrap_or_default()
        .iter()
        .map(to_annotation)
        .collect();
    let message = Message::text(
        i64::from(post.id.0),
        post.chat.id.0,
        text.unwrap_or_default(),
    )
    .with_annotations(annotations);

    match payload {
        Some(payload) => message.with_payload(payload),
        None => message,
    }
}

/// The post inside an update, for both channel posts and chat messages
pub fn post_of(update: &Update) -> Option<&teloxide::types::Message> {
    use teloxide::types::UpdateKind;

    match &update.kind {
        UpdateKind::ChannelPost(post) | UpdateKind::Message(post) => Some(post),
        _ => None,
    }
}

/// Whether `chat` is the chat addressed by `id` (numeric id or `@username`)
pub fn chat_matches(chat: &Chat, id: &ChatId) -> bool {
    match id.as_i64() {
        Some(n) => chat.id.0 == n,
        None => match (chat.username(), id.strip_prefix('@')) {
            (Some(username), Some(wanted)) => username.eq_ignore_ascii_case(wanted),
            _ => false,
        },
    }
}

/// Largest size of a photo (Telegram lists several renditions)
pub fn largest_photo(sizes: &[PhotoSize]) -> Option<&PhotoSize> {
    sizes
        .iter()
        .max_by_key(|p| (u64::from(p.width) * u64::from(p.height), p.file.size))
}

fn payload(post: &teloxide::types::Message) -> Option<PayloadRef> {
    if let Some(photo) = post.photo().and_then(largest_photo) {
        return Some(media_ref(&photo.file, None, MediaKind::Photo));
    }
    // animations are also delivered as documents; check them first
    if let Some(animation) = post.animation() {
        return Some(media_ref(
            &animation.file,
            animation.file_name.clone(),
            MediaKind::Animation,
        ));
    }
    if let Some(video) = post.video() {
        return Some(media_ref(&video.file, video.file_name.clone(), MediaKind::Video));
    }
    if let Some(audio) = post.audio() {
        return Some(media_ref(&audio.file, audio.file_name.clone(), MediaKind::Audio));
    }
    if let Some(voice) = post.voice() {
        return Some(media_ref(&voice.file, None, MediaKind::Voice));
    }
    post.document().map(|document| {
        media_ref(
            &document.file,
            document.file_name.clone(),
            MediaKind::Document,
        )
    })
}

fn media_ref(file: &FileMeta, file_name: Option<String>, kind: MediaKind) -> PayloadRef {
    PayloadRef {
        file_id: file.id.to_string(),
        kind,
        file_name,
        file_size: Some(u64::from(file.size)),
    }
}

fn to_annotation(entity: &MessageEntity) -> Annotation {
    let kind = match &entity.kind {
        MessageEntityKind::TextLink { url } => AnnotationKind::Link {
            target: url.to_string(),
        },
        MessageEntityKind::Bold => AnnotationKind::Bold,
        MessageEntityKind::Italic => AnnotationKind::Italic,
        MessageEntityKind::Underline => AnnotationKind::Underline,
        MessageEntityKind::Strikethrough => AnnotationKind::Strikethrough,
        MessageEntityKind::Code => AnnotationKind::Code,
        MessageEntityKind::Pre { .. } => AnnotationKind::Pre,
        _ => AnnotationKind::Other,
    };
    Annotation::new(entity.offset, entity.length, kind)
}

/// Chat as reported by `getChat` or seen in pending updates
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatSummary {
    pub id: i64,
    pub kind: &'static str,
    pub title: Option<String>,
    pub username: Option<String>,
}

impl ChatSummary {
    pub fn from_chat(chat: &Chat) -> Self {
        let kind = if chat.is_channel() {
            "channel"
        } else if chat.is_supergroup() {
            "supergroup"
        } else if chat.is_group() {
            "group"
        } else {
            "private"
        };
        Self {
            id: chat.id.0,
            kind,
            title: chat.title().map(str::to_string),
            username: chat.username().map(str::to_string),
        }
    }

    /// Title, `@username` or the numeric id, whichever is known first
    pub fn display_name(&self) -> String {
        match (&self.title, &self.username) {
            (Some(title), _) => title.clone(),
            (None, Some(username)) => format!("@{username}"),
            (None, None) => self.id.to_string(),
        }
    }
}
