//! HTML escaping for the Telegram HTML subset

use std::borrow::Cow;

use teloxide::utils::html;

/// Escape text content (`&`, `<`, `>`)
pub fn escape_text(text: &str) -> Cow<'_, str> {
    if text.contains(['&', '<', '>']) {
        Cow::Owned(html::escape(text))
    } else {
        Cow::Borrowed(text)
    }
}

/// Escape a double-quoted attribute value (`&`, `<`, `>`, `"`)
pub fn escape_attr(value: &str) -> Cow<'_, str> {
    if !value.contains('"') {
        return escape_text(value);
    }
    Cow::Owned(html::escape(value).replace('"', "&quot;"))
}
