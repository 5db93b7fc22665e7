//! # Contracts
//!
//! Frozen interface contracts, defining inter-module data structures and traits.
//! All business crates can only depend on this crate, reverse dependencies are prohibited.
//!
//! ## Text Model
//! - Message text is a Rust `String`; annotation offsets are UTF-16 code units
//! - Collaborators (source, reader, sender) are traits injected at construction

mod chat_id;
mod config;
mod error;
mod message;
mod reader;
mod sender;
mod source;

pub use chat_id::ChatId;
pub use config::*;
pub use error::*;
pub use message::*;
pub use reader::{LocalPayloadReader, PayloadReader};
pub use sender::{FormatMode, LocalMessageSender, MessageSender};
pub use source::{LocalMessageSource, MessageSource};
