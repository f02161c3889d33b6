//! # Ingestion
//!
//! Broker subscription and EVE decoding.
//!
//! Responsibilities:
//! - Subscribe to the sensor topic (Redis, or a mock for tests and dry runs)
//! - Pump raw messages into a bounded multi-consumer work queue
//! - Decode EVE JSON payloads into `SecurityEvent`
//!
//! ## Usage Example
//!
//! ```ignore
//! use ingestion::{EveDecoder, RedisSource, Subscription, SubscriptionConfig};
//! use contracts::EventDecoder;
//!
//! let source = RedisSource::connect("redis://localhost:6379/0", "suricata").await?;
//! let subscription = Subscription::spawn(source, SubscriptionConfig::new(1024));
//!
//! let rx = subscription.receiver();
//! while let Ok(message) = rx.recv().await {
//!     let event = EveDecoder::new().decode(&message.payload)?;
//! }
//! ```

mod config;
mod decoder;
mod error;
mod mock;
mod redis_source;
mod subscription;

// Re-exports
pub use config::{IngestionMetrics, MetricsSnapshot, SubscriptionConfig};
pub use contracts::RawMessage;
pub use decoder::{parse_event_time, EveDecoder};
pub use error::{IngestionError, Result};
pub use mock::MockSource;
pub use redis_source::RedisSource;
pub use subscription::Subscription;
