//! MessageSource trait - upstream subscription abstraction
//!
//! Unifies the live Bot API poller, the replay file and test mocks behind one
//! pull-based interface consumed by the ingestion pump.

use crate::{ChatId, ContractError, Message};

/// Upstream message source
///
/// # Lifecycle
///
/// 1. `subscribe` once with the source channel
/// 2. `next_message` until it yields `Ok(None)` (source exhausted)
///
/// Errors from `next_message` are not terminal: the pump logs them and polls
/// again after a backoff.
#[trait_variant::make(MessageSource: Send)]
pub trait LocalMessageSource {
    /// Source name (used for logging)
    fn name(&self) -> &str;

    /// Start receiving messages posted to `channel`
    ///
    /// # Errors
    /// The subscription could not be established
    async fn subscribe(&mut self, channel: &ChatId) -> Result<(), ContractError>;

    /// Next message from the subscribed channel, `None` once exhausted
    async fn next_message(&mut self) -> Result<Option<Message>, ContractError>;
}
