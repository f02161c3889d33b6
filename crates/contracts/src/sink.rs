//! BulkSink / AlertSink traits - Dispatcher output interfaces
//!
//! Defines the abstract interface for both sinks.

use crate::{AlertNotification, BulkDocument, DispatchError};

/// Batched document-indexing sink
///
/// Shared by every worker and the flush scheduler, so all methods take `&self`
/// and implementations synchronize internally. Failures are reported through
/// the sink's own asynchronous error channel, never returned.
#[trait_variant::make(BulkSink: Send)]
pub trait LocalBulkSink {
    /// Sink name (used for logging/metrics)
    fn name(&self) -> &str;

    /// Buffer a document; must not block on I/O
    fn add_document(&self, document: BulkDocument);

    /// Send everything buffered so far
    ///
    /// Safe to call concurrently with `add_document`. Returns the number of
    /// documents taken from the buffer.
    async fn flush(&self) -> usize;

    /// Documents currently buffered
    fn pending(&self) -> usize;
}

/// Alert-management endpoint
#[trait_variant::make(AlertSink: Send)]
pub trait LocalAlertSink {
    /// Sink name (used for logging/metrics)
    fn name(&self) -> &str;

    /// Submit one notification, single attempt
    ///
    /// # Errors
    /// Any non-success response or transport failure.
    async fn send(&self, notification: &AlertNotification) -> Result<(), DispatchError>;
}
