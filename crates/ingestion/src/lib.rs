//! # Ingestion Pipeline
//!
//! Upstream message ingestion.
//!
//! Responsibilities:
//! - Subscribe a `MessageSource` to the source channel
//! - Pump messages into a bounded async-channel, in arrival order
//! - Log and back off on source errors without stopping
//! - Offline sources for replay runs and tests
//!
//! ## Usage Example
//!
//! ```ignore
//! use ingestion::{IngestionPipeline, ReplaySource};
//!
//! let mut pipeline = IngestionPipeline::new(100);
//! let rx = pipeline.take_receiver().unwrap();
//! let pump = pipeline.start(ReplaySource::new("posts.jsonl"), &channel).await?;
//!
//! while let Ok(message) = rx.recv().await {
//!     orchestrator.handle(message).await;
//! }
//! let report = pump.join().await;
//! ```

mod config;
mod error;
mod mock;
mod pipeline;
mod replay;

// Re-exports
pub use config::{IngestionConfig, IngestionMetrics, MetricsSnapshot, OverflowPolicy};
pub use contracts::Message;
pub use error::{IngestionError, Result};
pub use mock::MockMessageSource;
pub use pipeline::{IngestionPipeline, PumpEnd, PumpHandle, PumpReport};
pub use replay::{LocalFileReader, ReplaySource};
