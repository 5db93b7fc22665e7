//! Per-destination delivery metrics

use std::sync::atomic::{AtomicU64, Ordering};

/// Metrics for a single destination
#[derive(Debug, Default)]
pub struct DestinationMetrics {
    /// Total send attempts
    attempt_count: AtomicU64,
    /// Attempts that failed and were retried
    retry_count: AtomicU64,
    /// Messages delivered
    delivered_count: AtomicU64,
    /// Messages that exhausted their retries
    exhausted_count: AtomicU64,
}

impl DestinationMetrics {
    /// Create new metrics instance
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attempt_count(&self) -> u64 {
        self.attempt_count.load(Ordering::Relaxed)
    }

    pub fn inc_attempt_count(&self) {
        self.attempt_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn retry_count(&self) -> u64 {
        self.retry_count.load(Ordering::Relaxed)
    }

    pub fn inc_retry_count(&self) {
        self.retry_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn delivered_count(&self) -> u64 {
        self.delivered_count.load(Ordering::Relaxed)
    }

    pub fn inc_delivered_count(&self) {
        self.delivered_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn exhausted_count(&self) -> u64 {
        self.exhausted_count.load(Ordering::Relaxed)
    }

    pub fn inc_exhausted_count(&self) {
        self.exhausted_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Get snapshot of all metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            attempt_count: self.attempt_count(),
            retry_count: self.retry_count(),
            delivered_count: self.delivered_count(),
            exhausted_count: self.exhausted_count(),
        }
    }
}

/// Snapshot of destination metrics (for reporting)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub attempt_count: u64,
    pub retry_count: u64,
    pub delivered_count: u64,
    pub exhausted_count: u64,
}
