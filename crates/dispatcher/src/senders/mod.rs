//! Sender implementations that need no transport
//!
//! Contains LogSender.

mod log;

pub use self::log::LogSender;
