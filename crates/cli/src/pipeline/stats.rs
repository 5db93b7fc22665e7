//! Pipeline statistics and metrics.

use std::time::Duration;

use dispatcher::RelaySummary;
use observability::RelayStatsAggregator;

/// Statistics from a relay run
#[derive(Debug, Clone, Default)]
pub struct PipelineStats {
    /// Messages taken from the source
    pub messages_handled: u64,

    /// Messages that reached every destination's terminal state
    pub messages_relayed: u64,

    /// Messages dropped before any send
    pub messages_dropped: u64,

    /// Errors the source reported while polling
    pub source_errors: u64,

    /// Staged files neither released nor cleaned up (expected 0)
    pub staged_outstanding: u64,

    /// Total duration of the run
    pub duration: Duration,

    /// Number of configured destinations
    pub destinations: usize,

    /// Latency and attempt statistics
    pub relay_stats: RelayStatsAggregator,
}

impl PipelineStats {
    /// Fold one relay summary into the totals
    pub fn record(&mut self, summary: &RelaySummary) {
        self.messages_handled += 1;
        self.relay_stats.record_received();

        if summary.is_dropped() {
            self.messages_dropped += 1;
            self.relay_stats.record_dropped();
            return;
        }

        self.messages_relayed += 1;
        self.relay_stats
            .record_relayed(summary.elapsed.as_secs_f64() * 1000.0);
        for report in &summary.reports {
            self.relay_stats.record_delivery(
                report.destination.as_str(),
                report.is_delivered(),
                report.attempt_count(),
            );
        }
    }

    /// Messages handled per second
    pub fn throughput(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.messages_handled as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Print detailed summary
    pub fn print_summary(&self) {
        println!("\n╔══════════════════════════════════════════════════════════════╗");
        println!("║                       Relay Statistics                       ║");
        println!("╚══════════════════════════════════════════════════════════════╝\n");

        println!("📊 Overview");
        println!("   ├─ Duration: {:.2}s", self.duration.as_secs_f64());
        println!("   ├─ Messages handled: {}", self.messages_handled);
        println!("   ├─ Relayed: {}", self.messages_relayed);
        println!("   ├─ Dropped: {}", self.messages_dropped);
        println!("   ├─ Source errors: {}", self.source_errors);
        println!("   ├─ Throughput: {:.2} msg/s", self.throughput());
        println!("   └─ Destinations: {}", self.destinations);

        let summary = self.relay_stats.summary();

        println!("\n📈 Delivery");
        println!("   ├─ Delivered: {}", summary.deliveries_ok);
        println!(
            "   ├─ Exhausted: {} ({:.2}%)",
            summary.deliveries_exhausted, summary.exhausted_rate
        );
        println!("   ├─ Attempts per delivery: {}", summary.attempts);
        println!("   └─ Relay latency (ms): {}", summary.latency_ms);

        if !summary.destination_exhausted_counts.is_empty() {
            println!("\n⚠️  Exhausted Destinations");
            for (destination, count) in &summary.destination_exhausted_counts {
                println!("   ├─ {}: {}", destination, count);
            }
        }

        if self.staged_outstanding > 0 {
            println!("\n⚠️  Staged files not released: {}", self.staged_outstanding);
        }

        println!();
    }
}
