//! # Dispatcher
//!
//! 消息转发核心。
//!
//! 负责：
//! - 重建标记并暂存媒体（每条消息一次）
//! - Fan-out 到所有目标，每个目标独立重试
//! - 所有目标结束后释放暂存文件，且只释放一次

pub mod delivery;
pub mod error;
pub mod metrics;
pub mod policy;
pub mod relay;
pub mod senders;
pub mod stager;

#[cfg(test)]
pub(crate) mod testing;

pub use contracts::{Message, MessageSender, PayloadReader};
pub use delivery::{
    AttemptOutcome, DeliveryAttempt, DeliveryOutcome, DeliveryReport, Destination,
    DestinationDispatcher, PreparedMessage,
};
pub use error::{RelayError, Result};
pub use metrics::{DestinationMetrics, MetricsSnapshot};
pub use policy::{Backoff, RetryPolicy};
pub use relay::{RelayBuilder, RelayOrchestrator, RelayStatus, RelaySummary};
pub use senders::LogSender;
pub use stager::{PayloadStager, ReleaseOutcome, StagedPayload, StagerCounters};
