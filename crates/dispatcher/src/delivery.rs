//! DestinationDispatcher - bounded retry loop for one destination
//!
//! Each call to [`DestinationDispatcher::deliver`] runs the state machine
//! `Attempting(n) -> Delivered | Attempting(n + 1) | Exhausted` and always
//! ends in a terminal [`DeliveryReport`]. Send errors never leave this module.

use std::sync::Arc;

use tracing::{error, info, instrument, warn};

use contracts::{Attachment, ChatId, ContractError, FormatMode, MessageId, MessageSender};

use crate::metrics::DestinationMetrics;
use crate::policy::RetryPolicy;

/// A configured destination
#[derive(Debug, Clone)]
pub struct Destination {
    id: ChatId,
    label: Option<String>,
    metrics: Arc<DestinationMetrics>,
}

impl Destination {
    pub fn new(id: impl Into<ChatId>) -> Self {
        Self {
            id: id.into(),
            label: None,
            metrics: Arc::new(DestinationMetrics::new()),
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn id(&self) -> &ChatId {
        &self.id
    }

    /// Label if set, else the id
    pub fn display_name(&self) -> &str {
        self.label.as_deref().unwrap_or(self.id.as_str())
    }

    pub fn metrics(&self) -> &Arc<DestinationMetrics> {
        &self.metrics
    }
}

impl From<&contracts::DestinationConfig> for Destination {
    fn from(config: &contracts::DestinationConfig) -> Self {
        Self {
            id: config.id.clone(),
            label: config.label.clone(),
            metrics: Arc::new(DestinationMetrics::new()),
        }
    }
}

impl From<ChatId> for Destination {
    fn from(id: ChatId) -> Self {
        Destination::new(id)
    }
}

/// Markup and optional staged file, shared read-only by every destination
#[derive(Debug, Clone)]
pub struct PreparedMessage {
    pub message_id: MessageId,
    pub markup: Arc<str>,
    pub attachment: Option<Arc<Attachment>>,
}

/// Outcome of one send attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    Success,
    /// Failed, another attempt follows
    TransientFailure(String),
    /// Failed, no attempts left
    Exhausted(String),
}

/// One send attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryAttempt {
    pub destination: ChatId,
    /// 1-indexed
    pub attempt: u32,
    pub outcome: AttemptOutcome,
}

/// Terminal state of a dispatch loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered { attempts: u32 },
    Exhausted { attempts: u32, last_error: String },
}

/// Everything that happened for one destination
#[derive(Debug, Clone)]
pub struct DeliveryReport {
    pub destination: ChatId,
    pub attempts: Vec<DeliveryAttempt>,
    pub outcome: DeliveryOutcome,
}

impl DeliveryReport {
    /// Report for a dispatch loop that never reached a terminal state itself
    pub fn aborted(destination: ChatId, reason: impl Into<String>) -> Self {
        Self {
            destination,
            attempts: Vec::new(),
            outcome: DeliveryOutcome::Exhausted {
                attempts: 0,
                last_error: reason.into(),
            },
        }
    }

    pub fn is_delivered(&self) -> bool {
        matches!(self.outcome, DeliveryOutcome::Delivered { .. })
    }

    pub fn attempt_count(&self) -> u32 {
        match self.outcome {
            DeliveryOutcome::Delivered { attempts } | DeliveryOutcome::Exhausted { attempts, .. } => {
                attempts
            }
        }
    }
}

/// Drives delivery of prepared messages with a retry policy
pub struct DestinationDispatcher<S> {
    sender: Arc<S>,
    policy: RetryPolicy,
    format: FormatMode,
}

impl<S> Clone for DestinationDispatcher<S> {
    fn clone(&self) -> Self {
        Self {
            sender: Arc::clone(&self.sender),
            policy: self.policy,
            format: self.format,
        }
    }
}

impl<S: MessageSender + Sync> DestinationDispatcher<S> {
    pub fn new(sender: Arc<S>, policy: RetryPolicy) -> Self {
        Self {
            sender,
            policy,
            format: FormatMode::Html,
        }
    }

    pub fn with_format(mut self, format: FormatMode) -> Self {
        self.format = format;
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Deliver `prepared` to `destination`, retrying per the policy
    #[instrument(
        name = "destination_deliver",
        skip(self, destination, prepared),
        fields(
            message_id = prepared.message_id,
            destination = %destination.display_name(),
            sender = %self.sender.name()
        )
    )]
    pub async fn deliver(
        &self,
        destination: &Destination,
        prepared: &PreparedMessage,
    ) -> DeliveryReport {
        let label = destination.display_name();
        let mut attempts = Vec::new();
        let mut attempt = 1;

        loop {
            destination.metrics.inc_attempt_count();

            let error = match self.send_once(&destination.id, prepared).await {
                Ok(()) => {
                    observability::record_delivery_attempt(label, "success");
                    observability::record_delivery_outcome(label, true, attempt);
                    destination.metrics.inc_delivered_count();
                    attempts.push(DeliveryAttempt {
                        destination: destination.id.clone(),
                        attempt,
                        outcome: AttemptOutcome::Success,
                    });
                    info!(attempt, "Delivered");
                    return DeliveryReport {
                        destination: destination.id.clone(),
                        attempts,
                        outcome: DeliveryOutcome::Delivered { attempts: attempt },
                    };
                }
                Err(e) => e.to_string(),
            };

            if !self.policy.should_retry(attempt) {
                observability::record_delivery_attempt(label, "exhausted");
                observability::record_delivery_outcome(label, false, attempt);
                destination.metrics.inc_exhausted_count();
                error!(attempt, error = %error, "Delivery exhausted");
                attempts.push(DeliveryAttempt {
                    destination: destination.id.clone(),
                    attempt,
                    outcome: AttemptOutcome::Exhausted(error.clone()),
                });
                return DeliveryReport {
                    destination: destination.id.clone(),
                    attempts,
                    outcome: DeliveryOutcome::Exhausted {
                        attempts: attempt,
                        last_error: error,
                    },
                };
            }

            let delay = self.policy.delay_for_attempt(attempt);
            observability::record_delivery_attempt(label, "transient_failure");
            destination.metrics.inc_retry_count();
            warn!(
                attempt,
                max_attempts = self.policy.max_attempts,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "Delivery attempt failed, retrying"
            );
            attempts.push(DeliveryAttempt {
                destination: destination.id.clone(),
                attempt,
                outcome: AttemptOutcome::TransientFailure(error),
            });

            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    async fn send_once(
        &self,
        destination: &ChatId,
        prepared: &PreparedMessage,
    ) -> Result<(), ContractError> {
        match &prepared.attachment {
            Some(attachment) => {
                self.sender
                    .send_file(destination, attachment, &prepared.markup, self.format)
                    .await
            }
            None => {
                self.sender
                    .send_text(destination, &prepared.markup, self.format)
                    .await
            }
        }
    }
}
