//! Markup error types

use thiserror::Error;

/// Malformed reconstruction input
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MarkupError {
    /// Span reaches past the end of the UTF-16 encoded text
    #[error("annotation [{offset}, +{length}) exceeds text of {text_len} UTF-16 units")]
    OffsetOutOfBounds {
        offset: usize,
        length: usize,
        text_len: usize,
    },

    /// Span boundary falls between the two halves of a surrogate pair
    #[error("span boundary at UTF-16 unit {position} splits a surrogate pair")]
    SplitSurrogate { position: usize },
}

/// Result alias
pub type Result<T> = std::result::Result<T, MarkupError>;
