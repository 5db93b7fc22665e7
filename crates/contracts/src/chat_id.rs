//! ChatId - Cheap-to-clone chat identifier
//!
//! Uses Arc<str> internally for O(1) clone operations.

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::borrow::Borrow;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Deref;
use std::sync::Arc;

/// Chat identifier with cheap cloning.
///
/// Telegram addresses a chat either by its numeric id (channels and supergroups
/// are negative, e.g. `-1001234567890`) or by a public `@username`. Both forms
/// are kept as text so the id can be handed to the transport unchanged.
///
/// Cloning only increments a reference count, which matters because one id is
/// cloned into every dispatch task of every relayed message.
///
/// # Examples
/// ```
/// use contracts::ChatId;
///
/// let id: ChatId = "-1001234567890".into();
/// assert!(id.is_well_formed());
/// assert_eq!(id.as_i64(), Some(-1001234567890));
///
/// let named: ChatId = "@relay_mirror".into();
/// assert!(named.is_well_formed());
/// assert_eq!(named.as_i64(), None);
/// ```
#[derive(Clone, Default)]
pub struct ChatId(Arc<str>);

impl ChatId {
    /// Create a new ChatId from a string slice.
    #[inline]
    pub fn new(s: &str) -> Self {
        Self(Arc::from(s.trim()))
    }

    /// Get the underlying string slice.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Numeric form of the id, if it is one.
    pub fn as_i64(&self) -> Option<i64> {
        self.0.parse().ok()
    }

    /// Whether the id is a non-zero integer or a public `@username`.
    pub fn is_well_formed(&self) -> bool {
        if let Some(n) = self.as_i64() {
            return n != 0;
        }
        match self.0.strip_prefix('@') {
            Some(name) => {
                !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
            }
            None => false,
        }
    }
}

// Deref to &str for easy string operations
impl Deref for ChatId {
    type Target = str;

    #[inline]
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<str> for ChatId {
    #[inline]
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for ChatId {
    #[inline]
    fn borrow(&self) -> &str {
        &self.0
    }
}

// Conversions
impl From<&str> for ChatId {
    #[inline]
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for ChatId {
    #[inline]
    fn from(s: String) -> Self {
        Self::new(&s)
    }
}

impl From<i64> for ChatId {
    #[inline]
    fn from(n: i64) -> Self {
        Self(Arc::from(n.to_string()))
    }
}

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ChatId({:?})", self.0)
    }
}

impl PartialEq for ChatId {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0) || self.0 == other.0
    }
}

impl Eq for ChatId {}

impl PartialEq<str> for ChatId {
    #[inline]
    fn eq(&self, other: &str) -> bool {
        self.0.as_ref() == other
    }
}

impl PartialEq<&str> for ChatId {
    #[inline]
    fn eq(&self, other: &&str) -> bool {
        self.0.as_ref() == *other
    }
}

impl PartialEq<String> for ChatId {
    #[inline]
    fn eq(&self, other: &String) -> bool {
        self.0.as_ref() == other
    }
}

impl Hash for ChatId {
    #[inline]
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.hash(state)
    }
}

// Serde: numeric ids are written back as integers, usernames as strings.
impl Serialize for ChatId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self.as_i64() {
            Some(n) => serializer.serialize_i64(n),
            None => serializer.serialize_str(&self.0),
        }
    }
}

struct ChatIdVisitor;

impl Visitor<'_> for ChatIdVisitor {
    type Value = ChatId;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a numeric chat id or an @username")
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
        Ok(ChatId::from(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
        i64::try_from(v)
            .map(ChatId::from)
            .map_err(|_| E::custom(format!("chat id {v} out of range")))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
        Ok(ChatId::from(v))
    }
}

impl<'de> Deserialize<'de> for ChatId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(ChatIdVisitor)
    }
}
