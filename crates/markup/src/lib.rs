//! # Markup
//!
//! Rebuilds platform-native rich text into the HTML subset accepted by the
//! destination (`<a href="...">` only).
//!
//! Responsibilities:
//! - Apply `Link` annotations given in UTF-16 code units
//! - Escape link targets (and optionally text) for safe embedding
//! - Report malformed spans instead of truncating them
//!
//! # Example
//!
//! ```
//! use contracts::Annotation;
//!
//! let html = markup::reconstruct("See docs here", &[Annotation::link(4, 4, "https://x")]).unwrap();
//! assert_eq!(html, r#"See <a href="https://x">docs</a> here"#);
//! ```

mod error;
mod escape;
mod reconstruct;

pub use error::{MarkupError, Result};
pub use escape::{escape_attr, escape_text};
pub use reconstruct::{reconstruct, reconstruct_with, MarkupOptions};
