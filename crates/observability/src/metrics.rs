//! Relay 指标收集模块
//!
//! 以 Prometheus 计数器记录每条消息、每次投递尝试和暂存文件的生命周期，
//! 并在内存中聚合统计供运行结束时输出。

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};

/// 注册指标描述（安装 Prometheus 导出器后调用一次）
pub fn describe_metrics() {
    describe_counter!("tg_relay_messages_received_total", "上游消息数");
    describe_counter!("tg_relay_messages_relayed_total", "完成分发的消息数");
    describe_counter!("tg_relay_messages_dropped_total", "丢弃的消息数（按原因）");
    describe_counter!("tg_relay_delivery_attempts_total", "投递尝试次数（按目标与结果）");
    describe_counter!("tg_relay_deliveries_total", "投递终态（按目标）");
    describe_counter!("tg_relay_payloads_staged_total", "暂存的媒体文件数");
    describe_counter!("tg_relay_payloads_released_total", "释放的暂存文件数");
    describe_histogram!(
        "tg_relay_relay_latency_ms",
        Unit::Milliseconds,
        "单条消息从接收到全部目标结束的耗时"
    );
    describe_histogram!("tg_relay_attempts_per_delivery", "每个目标的尝试次数");
}

/// 记录收到的上游消息
pub fn record_message_received(has_payload: bool) {
    let kind = if has_payload { "media" } else { "text" };
    counter!("tg_relay_messages_received_total", "kind" => kind).increment(1);
}

/// 记录完成分发的消息（不论各目标成功与否）
pub fn record_message_relayed(latency_ms: f64) {
    counter!("tg_relay_messages_relayed_total").increment(1);
    histogram!("tg_relay_relay_latency_ms").record(latency_ms);
}

/// 记录被丢弃的消息
///
/// `reason` 取值: `malformed_markup` / `payload_fetch_failed`
pub fn record_message_dropped(reason: &'static str) {
    counter!("tg_relay_messages_dropped_total", "reason" => reason).increment(1);
}

/// 记录单次投递尝试
///
/// `outcome` 取值: `success` / `transient_failure` / `exhausted`
pub fn record_delivery_attempt(destination: &str, outcome: &'static str) {
    counter!(
        "tg_relay_delivery_attempts_total",
        "destination" => destination.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}

/// 记录单个目标的终态
pub fn record_delivery_outcome(destination: &str, delivered: bool, attempts: u32) {
    let status = if delivered { "delivered" } else { "exhausted" };
    counter!(
        "tg_relay_deliveries_total",
        "destination" => destination.to_string(),
        "status" => status
    )
    .increment(1);
    histogram!("tg_relay_attempts_per_delivery").record(attempts as f64);
}

/// 记录媒体暂存
pub fn record_payload_staged(media_kind: &'static str) {
    counter!("tg_relay_payloads_staged_total", "media_kind" => media_kind).increment(1);
}

/// 记录暂存文件释放
///
/// `outcome` 取值: `removed` / `already_gone` / `failed`
pub fn record_payload_released(outcome: &'static str) {
    counter!("tg_relay_payloads_released_total", "outcome" => outcome).increment(1);
}

/// 转发统计聚合器
///
/// 在内存中聚合指标，便于统计和输出摘要。
#[derive(Debug, Clone, Default)]
pub struct RelayStatsAggregator {
    /// 收到的消息数
    pub messages_received: u64,

    /// 完成分发的消息数
    pub messages_relayed: u64,

    /// 丢弃的消息数
    pub messages_dropped: u64,

    /// 成功投递数（目标维度）
    pub deliveries_ok: u64,

    /// 重试耗尽数（目标维度）
    pub deliveries_exhausted: u64,

    /// 单条消息转发耗时统计（毫秒）
    pub latency_stats: RunningStats,

    /// 每次投递的尝试次数统计
    pub attempt_stats: RunningStats,

    /// 各目标重试耗尽次数
    pub exhausted_counts: std::collections::HashMap<String, u64>,
}

impl RelayStatsAggregator {
    /// 创建新的聚合器
    pub fn new() -> Self {
        Self::default()
    }

    /// 记录收到的消息
    pub fn record_received(&mut self) {
        self.messages_received += 1;
    }

    /// 记录丢弃的消息
    pub fn record_dropped(&mut self) {
        self.messages_dropped += 1;
    }

    /// 记录完成分发的消息
    pub fn record_relayed(&mut self, latency_ms: f64) {
        self.messages_relayed += 1;
        self.latency_stats.push(latency_ms);
    }

    /// 记录单个目标的终态
    pub fn record_delivery(&mut self, destination: &str, delivered: bool, attempts: u32) {
        if delivered {
            self.deliveries_ok += 1;
        } else {
            self.deliveries_exhausted += 1;
            *self
                .exhausted_counts
                .entry(destination.to_string())
                .or_insert(0) += 1;
        }
        self.attempt_stats.push(attempts as f64);
    }

    /// 生成摘要报告
    pub fn summary(&self) -> MetricsSummary {
        let deliveries = self.deliveries_ok + self.deliveries_exhausted;
        MetricsSummary {
            messages_received: self.messages_received,
            messages_relayed: self.messages_relayed,
            messages_dropped: self.messages_dropped,
            deliveries_ok: self.deliveries_ok,
            deliveries_exhausted: self.deliveries_exhausted,
            drop_rate: if self.messages_received > 0 {
                self.messages_dropped as f64 / self.messages_received as f64 * 100.0
            } else {
                0.0
            },
            exhausted_rate: if deliveries > 0 {
                self.deliveries_exhausted as f64 / deliveries as f64 * 100.0
            } else {
                0.0
            },
            latency_ms: StatsSummary::from(&self.latency_stats),
            attempts: StatsSummary::from(&self.attempt_stats),
            destination_exhausted_counts: self.exhausted_counts.clone(),
        }
    }

    /// 重置统计
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// 指标摘要
#[derive(Debug, Clone, Default)]
pub struct MetricsSummary {
    pub messages_received: u64,
    pub messages_relayed: u64,
    pub messages_dropped: u64,
    pub deliveries_ok: u64,
    pub deliveries_exhausted: u64,
    pub drop_rate: f64,
    pub exhausted_rate: f64,
    pub latency_ms: StatsSummary,
    pub attempts: StatsSummary,
    pub destination_exhausted_counts: std::collections::HashMap<String, u64>,
}

impl std::fmt::Display for MetricsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Relay Metrics Summary ===")?;
        writeln!(f, "Messages received: {}", self.messages_received)?;
        writeln!(f, "Messages relayed: {}", self.messages_relayed)?;
        writeln!(
            f,
            "Messages dropped: {} ({:.2}%)",
            self.messages_dropped, self.drop_rate
        )?;
        writeln!(
            f,
            "Deliveries: {} ok, {} exhausted ({:.2}%)",
            self.deliveries_ok, self.deliveries_exhausted, self.exhausted_rate
        )?;
        writeln!(f, "Relay latency (ms): {}", self.latency_ms)?;
        writeln!(f, "Attempts per delivery: {}", self.attempts)?;

        if !self.destination_exhausted_counts.is_empty() {
            writeln!(f, "Exhausted per destination:")?;
            for (destination, count) in &self.destination_exhausted_counts {
                writeln!(f, "  {}: {}", destination, count)?;
            }
        }

        Ok(())
    }
}

/// 统计摘要
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.3}, max={:.3}, mean={:.3}, std={:.3} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// 在线统计计算器 (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    /// 添加新值
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            let delta2 = value - self.mean;
            self.m2 += delta * delta2;
        }
    }

    /// 样本数量
    pub fn count(&self) -> u64 {
        self.count
    }

    /// 均值
    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// 方差
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    /// 标准差
    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    /// 最小值
    pub fn min(&self) -> f64 {
        self.min
    }

    /// 最大值
    pub fn max(&self) -> f64 {
        self.max
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_running_stats() {
        let mut stats = RunningStats::default();
        for v in [1.0, 2.0, 3.0, 4.0, 5.0] {
            stats.push(v);
        }

        assert_eq!(stats.count(), 5);
        assert!((stats.mean() - 3.0).abs() < 1e-10);
        assert!((stats.min() - 1.0).abs() < 1e-10);
        assert!((stats.max() - 5.0).abs() < 1e-10);
        assert!((stats.variance() - 2.5).abs() < 1e-10);
    }

    #[test]
    fn test_aggregator_deliveries() {
        let mut aggregator = RelayStatsAggregator::new();
        aggregator.record_received();
        aggregator.record_relayed(12.0);
        aggregator.record_delivery("-100", true, 1);
        aggregator.record_delivery("-200", false, 3);
        aggregator.record_received();
        aggregator.record_dropped();

        let summary = aggregator.summary();
        assert_eq!(summary.messages_received, 2);
        assert_eq!(summary.messages_dropped, 1);
        assert_eq!(summary.deliveries_ok, 1);
        assert_eq!(summary.deliveries_exhausted, 1);
        assert!((summary.drop_rate - 50.0).abs() < 1e-10);
        assert_eq!(summary.destination_exhausted_counts.get("-200"), Some(&1));
        assert!((summary.attempts.mean - 2.0).abs() < 1e-10);
    }

    #[test]
    fn test_summary_display() {
        let summary = MetricsSummary {
            messages_received: 100,
            messages_relayed: 95,
            messages_dropped: 5,
            deliveries_ok: 190,
            deliveries_exhausted: 0,
            drop_rate: 5.0,
            exhausted_rate: 0.0,
            latency_ms: StatsSummary {
                count: 95,
                min: 20.0,
                max: 80.0,
                mean: 50.0,
                std_dev: 15.0,
            },
            attempts: StatsSummary::default(),
            destination_exhausted_counts: Default::default(),
        };

        let output = format!("{}", summary);
        assert!(output.contains("Messages received: 100"));
        assert!(output.contains("5.00%"));
    }
}
