//! EventDispatcher - one decoded event -> bulk document + optional alert

use std::sync::Arc;

use contracts::{AlertSink, BulkDocument, BulkSink, DispatchError, SecurityEvent};
use metrics::counter;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::enrichment::Enricher;
use crate::metrics::DispatchCounters;

/// What happened to one event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Indexed, no alert needed
    Indexed,
    /// Indexed and the alert was accepted
    AlertSent,
    /// Indexed, but the alert submission failed
    AlertFailed,
    /// Event could not be serialized; nothing was sent
    Skipped,
}

/// Fan-out of one event to both sinks
///
/// Cheap to clone; every worker holds its own handle.
pub struct EventDispatcher<B, A> {
    bulk: Arc<B>,
    alerts: Arc<A>,
    counters: Arc<DispatchCounters>,
    index_prefix: String,
}

impl<B, A> Clone for EventDispatcher<B, A> {
    fn clone(&self) -> Self {
        Self {
            bulk: Arc::clone(&self.bulk),
            alerts: Arc::clone(&self.alerts),
            counters: Arc::clone(&self.counters),
            index_prefix: self.index_prefix.clone(),
        }
    }
}

impl<B, A> EventDispatcher<B, A>
where
    B: BulkSink + Send + Sync + 'static,
    A: AlertSink + Send + Sync + 'static,
{
    pub fn new(
        bulk: Arc<B>,
        alerts: Arc<A>,
        counters: Arc<DispatchCounters>,
        index_prefix: impl Into<String>,
    ) -> Self {
        Self {
            bulk,
            alerts,
            counters,
            index_prefix: index_prefix.into(),
        }
    }

    pub fn bulk(&self) -> &Arc<B> {
        &self.bulk
    }

    pub fn counters(&self) -> &Arc<DispatchCounters> {
        &self.counters
    }

    /// Index the event, then raise an alert if it carries one
    ///
    /// The alert call is raced against `cancel`; a cancelled call counts as
    /// failed.
    pub async fn dispatch(
        &self,
        worker_id: usize,
        event: &SecurityEvent,
        enricher: &Enricher,
        cancel: &CancellationToken,
    ) -> DispatchOutcome {
        let document = match BulkDocument::from_event(&self.index_prefix, event) {
            Ok(document) => document,
            Err(e) => {
                error!(worker_id, error = %e, "Failed to encode event");
                return DispatchOutcome::Skipped;
            }
        };
        self.bulk.add_document(document);
        self.counters.inc_all();
        counter!("eve_relay_events_indexed_total").increment(1);

        let Some(ctx) = event.alert_context() else {
            return DispatchOutcome::Indexed;
        };

        let notification = enricher.build_notification(&ctx);
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(DispatchError::Cancelled),
            result = self.alerts.send(&notification) => result,
        };

        match result {
            Ok(()) => {
                self.counters.inc_sent(worker_id);
                counter!("eve_relay_alerts_sent_total").increment(1);
                debug!(worker_id, resource = %notification.resource, "Alert sent");
                DispatchOutcome::AlertSent
            }
            Err(e) => {
                counter!("eve_relay_alerts_failed_total").increment(1);
                warn!(
                    worker_id,
                    sink = %self.alerts.name(),
                    resource = %notification.resource,
                    error = %e,
                    "Alert submission failed"
                );
                DispatchOutcome::AlertFailed
            }
        }
    }
}
