//! Ingestion Pipeline main entry

use std::sync::Arc;

use async_channel::{bounded, Receiver, Sender, TrySendError};
use contracts::{ChatId, Message, MessageSource};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use crate::config::{IngestionConfig, IngestionMetrics, OverflowPolicy};
use crate::error::{IngestionError, Result};

/// Why the pump stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PumpEnd {
    /// The source yielded `None`
    #[default]
    Exhausted,
    /// `stop()` was called or the pipeline was dropped
    Stopped,
    /// Every receiver was dropped
    ReceiverClosed,
    /// The pump task panicked
    Aborted,
}

/// Result of one pump run
#[derive(Debug, Clone, Default)]
pub struct PumpReport {
    /// Messages forwarded into the channel
    pub forwarded: u64,
    /// Errors returned by the source
    pub errors: u64,
    /// How the pump ended
    pub end: PumpEnd,
}

/// Handle to a running pump
pub struct PumpHandle {
    task: JoinHandle<PumpReport>,
}

impl PumpHandle {
    /// Wait for the pump to finish
    pub async fn join(self) -> PumpReport {
        match self.task.await {
            Ok(report) => report,
            Err(e) => {
                warn!(error = %e, "ingestion pump task failed");
                PumpReport {
                    end: PumpEnd::Aborted,
                    ..Default::default()
                }
            }
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

/// Ingestion Pipeline
///
/// Subscribes a [`MessageSource`] to the source channel and pumps its messages
/// into a bounded channel, one at a time and in order. Source errors are
/// logged and retried after a backoff; they never end the pump.
pub struct IngestionPipeline {
    config: IngestionConfig,

    /// Shared metrics
    metrics: Arc<IngestionMetrics>,

    /// Taken by the pump; the channel closes once the pump ends
    tx: Option<Sender<Message>>,

    /// Data receiver
    rx: Option<Receiver<Message>>,

    shutdown: watch::Sender<bool>,
}

impl IngestionPipeline {
    /// Create new Ingestion Pipeline
    ///
    /// # Arguments
    /// * `channel_capacity` - Channel capacity
    pub fn new(channel_capacity: usize) -> Self {
        Self::with_config(IngestionConfig::new(channel_capacity, OverflowPolicy::Block))
    }

    /// Create with custom configuration
    pub fn with_config(config: IngestionConfig) -> Self {
        let (tx, rx) = bounded(config.channel_capacity.max(1));
        let (shutdown, _) = watch::channel(false);

        Self {
            config,
            metrics: Arc::new(IngestionMetrics::new()),
            tx: Some(tx),
            rx: Some(rx),
            shutdown,
        }
    }

    /// Subscribe `source` to `channel` and spawn the pump
    ///
    /// # Errors
    /// - `AlreadyStarted` if a pump was already spawned
    /// - `Subscribe` if the source refused the subscription; nothing is spawned
    #[instrument(
        name = "ingestion_start",
        skip(self, source),
        fields(source = source.name(), channel = %channel)
    )]
    pub async fn start<S>(&mut self, mut source: S, channel: &ChatId) -> Result<PumpHandle>
    where
        S: MessageSource + 'static,
    {
        if self.tx.is_none() {
            return Err(IngestionError::AlreadyStarted);
        }

        source
            .subscribe(channel)
            .await
            .map_err(|e| IngestionError::subscribe(source.name(), e))?;

        let tx = self.tx.take().ok_or(IngestionError::AlreadyStarted)?;
        let pump = Pump {
            tx,
            metrics: self.metrics.clone(),
            config: self.config.clone(),
            shutdown: self.shutdown.subscribe(),
        };

        info!("ingestion pump started");
        Ok(PumpHandle {
            task: tokio::spawn(pump.run(source)),
        })
    }

    /// Ask the pump to stop after the message in flight
    pub fn stop(&self) {
        self.shutdown.send_replace(true);
    }

    /// Get data stream receiver
    ///
    /// Note: Can only be called once, subsequent calls return None
    pub fn take_receiver(&mut self) -> Option<Receiver<Message>> {
        self.rx.take()
    }

    /// Get metrics reference
    pub fn metrics(&self) -> Arc<IngestionMetrics> {
        self.metrics.clone()
    }
}

struct Pump {
    tx: Sender<Message>,
    metrics: Arc<IngestionMetrics>,
    config: IngestionConfig,
    shutdown: watch::Receiver<bool>,
}

impl Pump {
    async fn run<S: MessageSource>(mut self, mut source: S) -> PumpReport {
        let mut report = PumpReport::default();
        let mut consecutive_errors = 0u32;

        report.end = loop {
            if *self.shutdown.borrow() {
                break PumpEnd::Stopped;
            }

            let next = tokio::select! {
                biased;
                _ = self.shutdown.changed() => break PumpEnd::Stopped,
                next = source.next_message() => next,
            };

            match next {
                Ok(Some(message)) => {
                    consecutive_errors = 0;
                    self.metrics.record_received();
                    if !self.forward(message).await {
                        break PumpEnd::ReceiverClosed;
                    }
                    report.forwarded += 1;
                }
                Ok(None) => break PumpEnd::Exhausted,
                Err(e) => {
                    consecutive_errors = consecutive_errors.saturating_add(1);
                    report.errors += 1;
                    self.metrics.record_source_error();

                    let delay = self.config.error_delay(consecutive_errors);
                    warn!(
                        source = source.name(),
                        error = %e,
                        consecutive = consecutive_errors,
                        delay_ms = delay.as_millis() as u64,
                        "source error, polling again after backoff"
                    );

                    tokio::select! {
                        biased;
                        _ = self.shutdown.changed() => break PumpEnd::Stopped,
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
        };

        info!(
            forwarded = report.forwarded,
            errors = report.errors,
            end = ?report.end,
            "ingestion pump finished"
        );
        report
    }

    /// Returns `false` once the channel is closed
    async fn forward(&self, message: Message) -> bool {
        let message_id = message.id;
        let delivered = match self.config.overflow {
            OverflowPolicy::Block => self.tx.send(message).await.is_ok(),
            OverflowPolicy::DropNewest => match self.tx.try_send(message) {
                Ok(()) => true,
                Err(TrySendError::Full(_)) => {
                    self.metrics.record_dropped();
                    warn!(message_id, "ingestion channel full, message dropped");
                    true
                }
                Err(TrySendError::Closed(_)) => false,
            },
        };

        if delivered {
            self.metrics.update_queue_len(self.tx.len());
            debug!(message_id, "message queued");
        } else {
            warn!(message_id, "ingestion channel closed");
        }
        delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockMessageSource;
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    fn channel() -> ChatId {
        ChatId::from("-100")
    }

    fn messages(n: i64) -> Vec<Message> {
        (1..=n)
            .map(|id| Message::text(id, "-100", format!("m{id}")))
            .collect()
    }

    fn fast_config(capacity: usize, overflow: OverflowPolicy) -> IngestionConfig {
        IngestionConfig::new(capacity, overflow)
            .with_error_backoff(Duration::from_millis(1), Duration::from_millis(5))
    }

    #[tokio::test]
    async fn test_pumps_in_order_then_closes() {
        let mut pipeline = IngestionPipeline::new(10);
        let rx = pipeline.take_receiver().unwrap();
        let handle = pipeline
            .start(MockMessageSource::new(messages(3)), &channel())
            .await
            .unwrap();

        let mut ids = Vec::new();
        while let Ok(message) = rx.recv().await {
            ids.push(message.id);
        }
        assert_eq!(ids, vec![1, 2, 3]);

        let report = handle.join().await;
        assert_eq!(report.forwarded, 3);
        assert_eq!(report.end, PumpEnd::Exhausted);
        assert_eq!(pipeline.metrics().snapshot().messages_received, 3);
    }

    #[tokio::test]
    async fn test_source_errors_are_not_terminal() {
        let mut source = MockMessageSource::new(messages(1));
        source.push_error("network down");
        source.push_error("still down");
        source.push_message(Message::text(2, "-100", "after"));

        let mut pipeline = IngestionPipeline::with_config(fast_config(10, OverflowPolicy::Block));
        let rx = pipeline.take_receiver().unwrap();
        let handle = pipeline.start(source, &channel()).await.unwrap();

        let report = handle.join().await;
        assert_eq!(report.forwarded, 2);
        assert_eq!(report.errors, 2);
        assert_eq!(rx.len(), 2);
        assert_eq!(pipeline.metrics().snapshot().source_errors, 2);
    }

    #[tokio::test]
    async fn test_subscribe_failure_spawns_nothing() {
        let source = MockMessageSource::new(messages(2)).failing_subscribe();
        let counter = source.subscription_counter();

        let mut pipeline = IngestionPipeline::new(10);
        let err = pipeline.start(source, &channel()).await.err().unwrap();

        assert!(matches!(err, IngestionError::Subscribe { .. }));
        assert_eq!(counter.load(Ordering::SeqCst), 0);

        // The pipeline can still be started with another source.
        assert!(pipeline
            .start(MockMessageSource::new(messages(1)), &channel())
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_start_twice_rejected() {
        let mut pipeline = IngestionPipeline::new(10);
        let _handle = pipeline
            .start(MockMessageSource::new(messages(1)), &channel())
            .await
            .unwrap();
        let err = pipeline
            .start(MockMessageSource::new(messages(1)), &channel())
            .await
            .err()
            .unwrap();
        assert!(matches!(err, IngestionError::AlreadyStarted));
    }

    #[tokio::test]
    async fn test_stop_ends_open_source() {
        let mut pipeline = IngestionPipeline::new(10);
        let rx = pipeline.take_receiver().unwrap();
        let handle = pipeline
            .start(MockMessageSource::new(messages(2)).hold_open(), &channel())
            .await
            .unwrap();

        assert_eq!(rx.recv().await.unwrap().id, 1);
        assert_eq!(rx.recv().await.unwrap().id, 2);
        pipeline.stop();

        let report = tokio::time::timeout(Duration::from_secs(1), handle.join())
            .await
            .unwrap();
        assert_eq!(report.end, PumpEnd::Stopped);
        assert!(rx.recv().await.is_err());
    }

    #[tokio::test]
    async fn test_drop_newest_on_overflow() {
        let mut pipeline =
            IngestionPipeline::with_config(fast_config(1, OverflowPolicy::DropNewest));
        let rx = pipeline.take_receiver().unwrap();
        let handle = pipeline
            .start(MockMessageSource::new(messages(3)), &channel())
            .await
            .unwrap();

        let report = handle.join().await;
        assert_eq!(report.end, PumpEnd::Exhausted);
        assert_eq!(pipeline.metrics().snapshot().messages_dropped, 2);
        assert_eq!(rx.recv().await.unwrap().id, 1);
        assert!(rx.recv().await.is_err());
    }

    #[tokio::test]
    async fn test_receiver_dropped_ends_pump() {
        let mut pipeline = IngestionPipeline::new(1);
        drop(pipeline.take_receiver());
        let handle = pipeline
            .start(MockMessageSource::new(messages(3)).hold_open(), &channel())
            .await
            .unwrap();

        let report = handle.join().await;
        assert_eq!(report.end, PumpEnd::ReceiverClosed);
        assert_eq!(report.forwarded, 0);
    }
}
