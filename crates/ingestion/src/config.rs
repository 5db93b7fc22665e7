//! Pump configuration and metrics

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

/// What the pump does when the channel is full
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverflowPolicy {
    /// Wait for the consumer
    #[default]
    Block,
    /// Drop the incoming message and log it
    DropNewest,
}

/// Ingestion configuration
#[derive(Debug, Clone)]
pub struct IngestionConfig {
    /// Channel capacity
    pub channel_capacity: usize,

    /// Policy when full
    pub overflow: OverflowPolicy,

    /// Delay after the first consecutive source error
    pub error_backoff: Duration,

    /// Upper bound for the doubling error delay
    pub max_error_backoff: Duration,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 100,
            overflow: OverflowPolicy::Block,
            error_backoff: Duration::from_secs(1),
            max_error_backoff: Duration::from_secs(30),
        }
    }
}

impl IngestionConfig {
    /// Create configuration with the given capacity and default backoff
    pub fn new(channel_capacity: usize, overflow: OverflowPolicy) -> Self {
        Self {
            channel_capacity: channel_capacity.max(1),
            overflow,
            ..Default::default()
        }
    }

    /// Builder-style error backoff setter
    pub fn with_error_backoff(mut self, base: Duration, max: Duration) -> Self {
        self.error_backoff = base;
        self.max_error_backoff = max.max(base);
        self
    }

    /// Delay before polling again after `consecutive` errors (1-based)
    pub fn error_delay(&self, consecutive: u32) -> Duration {
        let shift = consecutive.saturating_sub(1);
        1u32.checked_shl(shift)
            .and_then(|factor| self.error_backoff.checked_mul(factor))
            .map_or(self.max_error_backoff, |delay| {
                delay.min(self.max_error_backoff)
            })
    }
}

/// Ingestion metrics
#[derive(Debug, Default)]
pub struct IngestionMetrics {
    /// Messages pulled from the source
    pub messages_received: AtomicU64,

    /// Messages dropped on overflow
    pub messages_dropped: AtomicU64,

    /// Errors returned by the source
    pub source_errors: AtomicU64,

    /// Current queue length
    pub queue_len: AtomicUsize,
}

impl IngestionMetrics {
    /// Create new metrics instance
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_received(&self) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dropped(&self) {
        self.messages_dropped.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("tg_relay_ingestion_dropped_total").increment(1);
    }

    pub fn record_source_error(&self) {
        self.source_errors.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("tg_relay_source_errors_total").increment(1);
    }

    pub fn update_queue_len(&self, len: usize) {
        self.queue_len.store(len, Ordering::Relaxed);
        metrics::gauge!("tg_relay_ingestion_queue_len").set(len as f64);
    }

    /// Get snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            messages_received: self.messages_received.load(Ordering::Relaxed),
            messages_dropped: self.messages_dropped.load(Ordering::Relaxed),
            source_errors: self.source_errors.load(Ordering::Relaxed),
            queue_len: self.queue_len.load(Ordering::Relaxed),
        }
    }
}

/// Metrics snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub messages_received: u64,
    pub messages_dropped: u64,
    pub source_errors: u64,
    pub queue_len: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_delay_doubles_and_caps() {
        let config = IngestionConfig::default()
            .with_error_backoff(Duration::from_millis(100), Duration::from_millis(350));
        assert_eq!(config.error_delay(1), Duration::from_millis(100));
        assert_eq!(config.error_delay(2), Duration::from_millis(200));
        assert_eq!(config.error_delay(3), Duration::from_millis(350));
        assert_eq!(config.error_delay(64), Duration::from_millis(350));
    }

    #[test]
    fn test_capacity_clamped() {
        assert_eq!(IngestionConfig::new(0, OverflowPolicy::Block).channel_capacity, 1);
    }
}
