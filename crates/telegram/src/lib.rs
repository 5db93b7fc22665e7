//! # Telegram
//!
//! Telegram Bot API transport, built on teloxide.
//!
//! Responsibilities:
//! - Subscribe to a channel via `getUpdates` long polling (`MessageSource`)
//! - Download media via `getFile` (`PayloadReader`)
//! - Send text and media with HTML captions (`MessageSender`)
//! - Convert Bot API entities into UTF-16 annotations
//! - List chats seen in pending updates (discovery)
//! - Support Mock mode for tests and offline runs

pub mod client;
pub mod convert;
pub mod error;
pub mod http_client;
pub mod mock_client;
pub mod transport;

pub use client::{send_method, BotApi, Upload};
pub use convert::{to_message, ChatSummary};
pub use error::{Result, TelegramError};
pub use http_client::HttpBotApi;
pub use mock_client::{channel_post, text_post, MockBotApi, MockConfig, SentRecord};
pub use transport::{BotTransport, UpdatePoller};
