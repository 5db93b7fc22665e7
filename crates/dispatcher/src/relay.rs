//! RelayOrchestrator - one message in, N deliveries out
//!
//! Sequence per message: reconstruct markup, stage the payload once, fan out
//! to every destination, join, release the payload once. `handle` never
//! fails; every error becomes a dropped [`RelaySummary`] with a log line.

use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::FutureExt;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info, instrument};

use contracts::{
    ContractError, DispatchMode, FormatMode, Message, MessageId, MessageSender,
    PayloadReader, RelayConfig,
};
use markup::MarkupOptions;

use crate::delivery::{DeliveryReport, Destination, DestinationDispatcher, PreparedMessage};
use crate::error::{RelayError, Result};
use crate::policy::RetryPolicy;
use crate::stager::{PayloadStager, StagerCounters};

/// Final status of one message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayStatus {
    /// Every destination reached a terminal state
    Relayed,
    /// Nothing was sent
    Dropped { reason: String },
}

/// What happened to one message
#[derive(Debug, Clone)]
pub struct RelaySummary {
    pub message_id: MessageId,
    pub status: RelayStatus,
    /// One report per destination, in configuration order (empty if dropped)
    pub reports: Vec<DeliveryReport>,
    pub elapsed: Duration,
}

impl RelaySummary {
    pub fn is_dropped(&self) -> bool {
        matches!(self.status, RelayStatus::Dropped { .. })
    }

    pub fn delivered_count(&self) -> usize {
        self.reports.iter().filter(|r| r.is_delivered()).count()
    }

    pub fn exhausted_count(&self) -> usize {
        self.reports.len() - self.delivered_count()
    }
}

/// Builder for [`RelayOrchestrator`]
pub struct RelayBuilder<R, S> {
    reader: Arc<R>,
    sender: Arc<S>,
    destinations: Vec<Destination>,
    policy: RetryPolicy,
    mode: DispatchMode,
    max_concurrency: usize,
    staging_dir: PathBuf,
    markup: MarkupOptions,
    format: FormatMode,
}

impl<R, S> RelayBuilder<R, S>
where
    R: PayloadReader + Send + Sync + 'static,
    S: MessageSender + Send + Sync + 'static,
{
    pub fn new(reader: Arc<R>, sender: Arc<S>) -> Self {
        Self {
            reader,
            sender,
            destinations: Vec::new(),
            policy: RetryPolicy::default(),
            mode: DispatchMode::default(),
            max_concurrency: 8,
            staging_dir: std::env::temp_dir().join("tg-relay"),
            markup: MarkupOptions::default(),
            format: FormatMode::Html,
        }
    }

    /// Take destinations, delivery policy, staging dir and markup options
    /// from a loaded config
    pub fn from_config(reader: Arc<R>, sender: Arc<S>, config: &RelayConfig) -> Self {
        Self::new(reader, sender)
            .destinations(config.destinations.iter().map(Destination::from))
            .policy(RetryPolicy::from_config(&config.delivery))
            .mode(config.delivery.mode)
            .max_concurrency(config.delivery.max_concurrency)
            .staging_dir(config.staging.dir.clone())
            .markup(MarkupOptions {
                escape_text: config.markup.escape_text,
            })
    }

    pub fn destination(mut self, destination: impl Into<Destination>) -> Self {
        self.destinations.push(destination.into());
        self
    }

    pub fn destinations(mut self, destinations: impl IntoIterator<Item = Destination>) -> Self {
        self.destinations.extend(destinations);
        self
    }

    pub fn policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn mode(mut self, mode: DispatchMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency;
        self
    }

    pub fn staging_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.staging_dir = dir.into();
        self
    }

    pub fn markup(mut self, options: MarkupOptions) -> Self {
        self.markup = options;
        self
    }

    pub fn format(mut self, format: FormatMode) -> Self {
        self.format = format;
        self
    }

    /// Build the orchestrator
    ///
    /// # Errors
    /// `RelayError::Config` when no destination is configured
    pub fn build(self) -> Result<RelayOrchestrator<R, S>> {
        if self.destinations.is_empty() {
            return Err(ContractError::config_validation(
                "destinations",
                "at least one destination is required",
            )
            .into());
        }

        let max_concurrency = self.max_concurrency.max(1);
        Ok(RelayOrchestrator {
            stager: PayloadStager::new(self.reader, self.staging_dir),
            dispatcher: DestinationDispatcher::new(self.sender, self.policy)
                .with_format(self.format),
            destinations: self.destinations,
            mode: self.mode,
            semaphore: Arc::new(Semaphore::new(max_concurrency)),
            markup: self.markup,
        })
    }
}

/// Relays messages to a fixed set of destinations
pub struct RelayOrchestrator<R, S> {
    stager: PayloadStager<R>,
    dispatcher: DestinationDispatcher<S>,
    destinations: Vec<Destination>,
    mode: DispatchMode,
    semaphore: Arc<Semaphore>,
    markup: MarkupOptions,
}

impl<R, S> RelayOrchestrator<R, S>
where
    R: PayloadReader + Send + Sync + 'static,
    S: MessageSender + Send + Sync + 'static,
{
    pub fn destinations(&self) -> &[Destination] {
        &self.destinations
    }

    pub fn mode(&self) -> DispatchMode {
        self.mode
    }

    pub fn stager_counters(&self) -> &Arc<StagerCounters> {
        self.stager.counters()
    }

    /// Relay one message to every destination
    #[instrument(
        name = "relay_handle",
        skip(self, message),
        fields(
            message_id = message.id,
            chat = %message.chat_id,
            has_payload = message.has_payload(),
            annotations = message.annotations.len()
        )
    )]
    pub async fn handle(&self, message: Message) -> RelaySummary {
        let started = Instant::now();
        observability::record_message_received(message.has_payload());

        match self.relay(&message).await {
            Ok(reports) => {
                let elapsed = started.elapsed();
                observability::record_message_relayed(elapsed.as_secs_f64() * 1000.0);
                let summary = RelaySummary {
                    message_id: message.id,
                    status: RelayStatus::Relayed,
                    reports,
                    elapsed,
                };
                info!(
                    delivered = summary.delivered_count(),
                    exhausted = summary.exhausted_count(),
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Message relayed"
                );
                summary
            }
            Err(e) => {
                observability::record_message_dropped(e.drop_reason());
                error!(error = %e, reason = e.drop_reason(), "Message dropped");
                RelaySummary {
                    message_id: message.id,
                    status: RelayStatus::Dropped {
                        reason: e.to_string(),
                    },
                    reports: Vec::new(),
                    elapsed: started.elapsed(),
                }
            }
        }
    }

    async fn relay(&self, message: &Message) -> Result<Vec<DeliveryReport>> {
        let markup = markup::reconstruct_with(&message.text, &message.annotations, self.markup)?;

        let staged = self.stager.stage(message).await?;
        let prepared = PreparedMessage {
            message_id: message.id,
            markup: Arc::from(markup),
            attachment: staged.as_ref().map(|s| Arc::clone(s.attachment())),
        };

        let reports = match self.mode {
            DispatchMode::Sequential => self.fan_out_sequential(&prepared).await,
            DispatchMode::Concurrent => self.fan_out_concurrent(prepared).await,
        };

        if let Some(staged) = staged {
            staged.release().await;
        }
        Ok(reports)
    }

    /// Destinations one after another; a panicking delivery still lets the rest run
    async fn fan_out_sequential(&self, prepared: &PreparedMessage) -> Vec<DeliveryReport> {
        let mut reports = Vec::with_capacity(self.destinations.len());
        for destination in &self.destinations {
            let delivery = AssertUnwindSafe(self.dispatcher.deliver(destination, prepared))
                .catch_unwind()
                .await;
            let report = delivery.unwrap_or_else(|_| {
                error!(destination = %destination.id(), "Delivery panicked");
                aborted(destination)
            });
            reports.push(report);
        }
        reports
    }

    /// Every destination in its own task; returns after all of them finished
    async fn fan_out_concurrent(&self, prepared: PreparedMessage) -> Vec<DeliveryReport> {
        let prepared = Arc::new(prepared);
        let mut tasks = JoinSet::new();

        for (index, destination) in self.destinations.iter().enumerate() {
            let dispatcher = self.dispatcher.clone();
            let destination = destination.clone();
            let prepared = Arc::clone(&prepared);
            let semaphore = Arc::clone(&self.semaphore);

            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await;
                (index, dispatcher.deliver(&destination, &prepared).await)
            });
        }

        let mut slots: Vec<Option<DeliveryReport>> = vec![None; self.destinations.len()];
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, report)) => slots[index] = Some(report),
                Err(e) => error!(error = %e, "Delivery task failed"),
            }
        }

        slots
            .into_iter()
            .zip(&self.destinations)
            .map(|(slot, destination)| slot.unwrap_or_else(|| aborted(destination)))
            .collect()
    }
}

/// Terminal report for a delivery that panicked, counted as exhausted
fn aborted(destination: &Destination) -> DeliveryReport {
    observability::record_delivery_outcome(destination.display_name(), false, 0);
    destination.metrics().inc_exhausted_count();
    DeliveryReport::aborted(destination.id().clone(), "delivery task panicked")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delivery::DeliveryOutcome;
    use crate::testing::{FakeReader, FakeSender};
    use contracts::{Annotation, MediaKind, PayloadRef};
    use tempfile::TempDir;

    const DESTINATIONS: [&str; 3] = ["-101", "-102", "-103"];

    fn orchestrator(
        reader: FakeReader,
        sender: FakeSender,
        mode: DispatchMode,
        dir: &TempDir,
    ) -> (
        RelayOrchestrator<FakeReader, FakeSender>,
        Arc<FakeReader>,
        Arc<FakeSender>,
    ) {
        let reader = Arc::new(reader);
        let sender = Arc::new(sender);
        let relay = RelayBuilder::new(Arc::clone(&reader), Arc::clone(&sender))
            .destinations(DESTINATIONS.iter().map(|d| Destination::new(*d)))
            .policy(RetryPolicy::fixed(3, Duration::from_millis(1)))
            .mode(mode)
            .staging_dir(dir.path())
            .build()
            .unwrap();
        (relay, reader, sender)
    }

    fn media_message(id: MessageId) -> Message {
        Message::text(id, "-100", "See docs here")
            .with_annotations(vec![Annotation::link(4, 4, "https://x")])
            .with_payload(PayloadRef::new("file-1", MediaKind::Video))
    }

    #[test]
    fn test_build_rejects_empty_destinations() {
        let result = RelayBuilder::new(Arc::new(FakeReader::default()), Arc::new(FakeSender::new()))
            .build();
        match result {
            Err(RelayError::Config(e)) => assert!(e.is_config()),
            _ => panic!("expected configuration error"),
        }
    }

    #[tokio::test]
    async fn test_resource_law_under_both_modes() {
        for mode in [DispatchMode::Sequential, DispatchMode::Concurrent] {
            // every mix of delivered and exhausted destinations
            for scenario in 0..4 {
                let dir = TempDir::new().unwrap();
                let mut sender = FakeSender::new();
                if scenario & 1 == 1 {
                    sender = sender.always_failing("-101");
                }
                if scenario & 2 == 2 {
                    sender = sender.failing("-102", 1).always_failing("-103");
                }
                let (relay, reader, sender) =
                    orchestrator(FakeReader::default(), sender, mode, &dir);

                let summary = relay.handle(media_message(1)).await;
                assert_eq!(summary.status, RelayStatus::Relayed);
                assert_eq!(summary.reports.len(), 3);

                let counters = relay.stager_counters();
                assert_eq!(reader.fetches(), 1, "{mode:?}/{scenario}");
                assert_eq!(counters.staged(), 1);
                assert_eq!(counters.released(), 1);
                assert_eq!(counters.dropped_unreleased(), 0);

                // the file existed for every send and is gone afterwards
                let records = sender.records();
                assert!(!records.is_empty());
                assert!(records.iter().all(|r| r.file_present));
                let path = records[0].attachment.clone().unwrap();
                assert!(records.iter().all(|r| r.attachment.as_ref() == Some(&path)));
                assert!(!path.exists());
            }
        }
    }

    #[tokio::test]
    async fn test_markup_reaches_every_destination() {
        let dir = TempDir::new().unwrap();
        let (relay, _, sender) = orchestrator(
            FakeReader::default(),
            FakeSender::new(),
            DispatchMode::Concurrent,
            &dir,
        );

        let summary = relay.handle(media_message(2)).await;
        assert_eq!(summary.delivered_count(), 3);

        let records = sender.records();
        assert_eq!(records.len(), 3);
        for record in records {
            assert_eq!(record.text, "See <a href=\"https://x\">docs</a> here");
        }
    }

    #[tokio::test]
    async fn test_reports_follow_config_order() {
        let dir = TempDir::new().unwrap();
        let (relay, _, _) = orchestrator(
            FakeReader::default(),
            FakeSender::new().failing("-101", 2),
            DispatchMode::Concurrent,
            &dir,
        );

        let summary = relay.handle(Message::text(3, "-100", "hi")).await;
        let order: Vec<&str> = summary
            .reports
            .iter()
            .map(|r| r.destination.as_str())
            .collect();
        assert_eq!(order, DESTINATIONS);
    }

    #[tokio::test]
    async fn test_isolation_law() {
        for mode in [DispatchMode::Sequential, DispatchMode::Concurrent] {
            let dir = TempDir::new().unwrap();
            let (relay, _, sender) = orchestrator(
                FakeReader::default(),
                FakeSender::new().always_failing("-101"),
                mode,
                &dir,
            );

            let summary = relay.handle(Message::text(4, "-100", "hello")).await;
            assert!(matches!(
                summary.reports[0].outcome,
                DeliveryOutcome::Exhausted { attempts: 3, .. }
            ));
            assert!(summary.reports[1].is_delivered());
            assert!(summary.reports[2].is_delivered());
            assert_eq!(sender.attempts("-101"), 3);
            assert_eq!(sender.attempts("-102"), 1);
        }
    }

    #[tokio::test]
    async fn test_panicking_destination_is_isolated() {
        let dir = TempDir::new().unwrap();
        let (relay, _, _) = orchestrator(
            FakeReader::default(),
            FakeSender::new().panicking("-102"),
            DispatchMode::Concurrent,
            &dir,
        );

        let summary = relay.handle(media_message(5)).await;
        assert!(summary.reports[0].is_delivered());
        assert!(!summary.reports[1].is_delivered());
        assert!(summary.reports[2].is_delivered());
        assert_eq!(relay.stager_counters().released(), 1);
    }

    #[tokio::test]
    async fn test_sequential_panicking_destination_is_isolated() {
        let dir = TempDir::new().unwrap();
        let (relay, _, sender) = orchestrator(
            FakeReader::default(),
            FakeSender::new().panicking("-102"),
            DispatchMode::Sequential,
            &dir,
        );

        // a panic escaping `handle` would fail the test here
        let summary = relay.handle(media_message(7)).await;

        assert_eq!(summary.status, RelayStatus::Relayed);
        assert_eq!(summary.reports.len(), 3);
        assert!(summary.reports[0].is_delivered());
        assert!(matches!(
            summary.reports[1].outcome,
            DeliveryOutcome::Exhausted { attempts: 0, .. }
        ));
        assert!(summary.reports[2].is_delivered());
        assert_eq!(sender.attempts("-103"), 1);
        assert_eq!(relay.stager_counters().released(), 1);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_payload_fetch_failure_attempts_no_destination() {
        let dir = TempDir::new().unwrap();
        let (relay, reader, sender) = orchestrator(
            FakeReader::failing(),
            FakeSender::new(),
            DispatchMode::Concurrent,
            &dir,
        );

        let summary = relay.handle(media_message(6)).await;
        assert!(summary.is_dropped());
        assert_eq!(reader.fetches(), 1);
        assert!(sender.records().is_empty());
        assert_eq!(relay.stager_counters().staged(), 0);
    }

    #[tokio::test]
    async fn test_text_message_skips_staging() {
        let dir = TempDir::new().unwrap();
        let (relay, reader, sender) = orchestrator(
            FakeReader::failing(),
            FakeSender::new(),
            DispatchMode::Sequential,
            &dir,
        );

        let summary = relay.handle(Message::text(7, "-100", "no media")).await;
        assert_eq!(summary.status, RelayStatus::Relayed);
        assert_eq!(reader.fetches(), 0);
        assert_eq!(sender.records().len(), 3);
    }

    #[tokio::test]
    async fn test_malformed_markup_is_dropped_before_staging() {
        let dir = TempDir::new().unwrap();
        let (relay, reader, sender) = orchestrator(
            FakeReader::default(),
            FakeSender::new(),
            DispatchMode::Concurrent,
            &dir,
        );

        let message = Message::text(8, "-100", "short")
            .with_annotations(vec![Annotation::link(3, 10, "https://x")])
            .with_payload(PayloadRef::new("file-2", MediaKind::Photo));
        let summary = relay.handle(message).await;

        match &summary.status {
            RelayStatus::Dropped { reason } => assert!(reason.contains("exceeds")),
            other => panic!("unexpected status {other:?}"),
        }
        assert_eq!(reader.fetches(), 0);
        assert!(sender.records().is_empty());
    }

    #[tokio::test]
    async fn test_concurrency_limit_of_one_still_reaches_all() {
        let dir = TempDir::new().unwrap();
        let reader = Arc::new(FakeReader::default());
        let sender = Arc::new(FakeSender::new());
        let relay = RelayBuilder::new(reader, Arc::clone(&sender))
            .destinations(DESTINATIONS.iter().map(|d| Destination::new(*d)))
            .max_concurrency(0)
            .staging_dir(dir.path())
            .build()
            .unwrap();

        let summary = relay.handle(Message::text(9, "-100", "x")).await;
        assert_eq!(summary.delivered_count(), 3);
        assert_eq!(sender.records().len(), 3);
    }
}
