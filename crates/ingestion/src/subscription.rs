//! Subscription - broker source -> shared work queue

use std::sync::Arc;

use async_channel::{bounded, Receiver, Sender};
use contracts::{MessageSource, RawMessage};
use metrics::{counter, gauge};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::config::{IngestionMetrics, SubscriptionConfig};
use crate::error::{IngestionError, Result};

/// Running subscription
///
/// A background pump drains the source into a bounded multi-consumer queue.
/// Every worker holds a clone of the receiver, so each message reaches exactly
/// one worker. The queue closes when the pump exits.
pub struct Subscription {
    topic: String,
    rx: Receiver<RawMessage>,
    metrics: Arc<IngestionMetrics>,
    cancel: CancellationToken,
    done: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl Subscription {
    /// Start pumping `source` into a fresh work queue
    #[instrument(name = "subscription_spawn", skip(source, config), fields(topic = %source.topic()))]
    pub fn spawn<S>(source: S, config: SubscriptionConfig) -> Self
    where
        S: MessageSource + Send + 'static,
    {
        let topic = source.topic().to_string();
        let (tx, rx) = bounded(config.channel_capacity.max(1));
        let metrics = Arc::new(IngestionMetrics::new());
        let cancel = CancellationToken::new();
        let done = CancellationToken::new();

        let handle = tokio::spawn(pump(
            source,
            tx,
            metrics.clone(),
            cancel.clone(),
            done.clone(),
        ));

        info!(
            topic = %topic,
            capacity = config.channel_capacity,
            "subscription started"
        );

        Self {
            topic,
            rx,
            metrics,
            cancel,
            done,
            handle: Some(handle),
        }
    }

    /// A receiver handle for one worker
    pub fn receiver(&self) -> Receiver<RawMessage> {
        self.rx.clone()
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn metrics(&self) -> Arc<IngestionMetrics> {
        self.metrics.clone()
    }

    /// Messages waiting in the work queue
    pub fn queue_len(&self) -> usize {
        self.rx.len()
    }

    /// Whether the pump has exited
    pub fn is_finished(&self) -> bool {
        self.done.is_cancelled()
    }

    /// Resolves once the source ends or the subscription is closed
    pub async fn ended(&self) {
        self.done.cancelled().await;
    }

    /// Stop the pump, unsubscribe and close the work queue
    ///
    /// Messages already queued stay readable until drained.
    #[instrument(name = "subscription_close", skip(self), fields(topic = %self.topic))]
    pub async fn close(&mut self) -> Result<()> {
        let handle = self.handle.take().ok_or_else(|| IngestionError::AlreadyClosed {
            topic: self.topic.clone(),
        })?;

        self.cancel.cancel();
        handle.await.map_err(|e| IngestionError::PumpFailed {
            topic: self.topic.clone(),
            message: e.to_string(),
        })?;

        let snapshot = self.metrics.snapshot();
        info!(
            topic = %self.topic,
            received = snapshot.messages_received,
            stream_errors = snapshot.stream_errors,
            "subscription closed"
        );
        Ok(())
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn pump<S: MessageSource>(
    mut source: S,
    tx: Sender<RawMessage>,
    metrics: Arc<IngestionMetrics>,
    cancel: CancellationToken,
    done: CancellationToken,
) {
    let _done = done.drop_guard();

    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            next = source.next_message() => next,
        };

        let message = match next {
            Some(Ok(message)) => message,
            Some(Err(e)) => {
                metrics.record_stream_error();
                counter!("eve_relay_stream_errors_total").increment(1);
                warn!(topic = %source.topic(), error = %e, "subscription stream error");
                continue;
            }
            None => {
                info!(topic = %source.topic(), "subscription ended by source");
                break;
            }
        };

        metrics.record_received();
        counter!("eve_relay_messages_received_total").increment(1);

        let sent = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            sent = tx.send(message) => sent,
        };
        if sent.is_err() {
            debug!(topic = %source.topic(), "work queue closed, stopping pump");
            break;
        }

        metrics.update_queue_len(tx.len());
        gauge!("eve_relay_queue_len").set(tx.len() as f64);
    }

    source.close().await;
    // Dropping the last sender closes the queue for every worker
    drop(tx);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockSource;
    use std::time::Duration;

    #[tokio::test]
    async fn test_messages_reach_receiver_in_order() {
        let source = MockSource::new("suricata", vec!["one", "two", "three"]);
        let mut subscription = Subscription::spawn(source, SubscriptionConfig::new(8));
        let rx = subscription.receiver();

        let mut payloads = Vec::new();
        while let Ok(message) = rx.recv().await {
            payloads.push(message.payload);
        }
        assert_eq!(payloads, vec!["one", "two", "three"]);

        subscription.ended().await;
        assert!(subscription.is_finished());
        assert_eq!(subscription.metrics().snapshot().messages_received, 3);
        subscription.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_each_message_goes_to_one_receiver() {
        let payloads: Vec<String> = (0..50).map(|i| i.to_string()).collect();
        let subscription = Subscription::spawn(
            MockSource::new("suricata", payloads),
            SubscriptionConfig::new(4),
        );

        let mut tasks = Vec::new();
        for _ in 0..3 {
            let rx = subscription.receiver();
            tasks.push(tokio::spawn(async move {
                let mut n = 0usize;
                while rx.recv().await.is_ok() {
                    n += 1;
                }
                n
            }));
        }

        let mut total = 0;
        for task in tasks {
            total += task.await.unwrap();
        }
        assert_eq!(total, 50);
    }

    #[tokio::test]
    async fn test_close_stops_open_source() {
        let mut subscription =
            Subscription::spawn(MockSource::idle("suricata"), SubscriptionConfig::default());
        let rx = subscription.receiver();

        tokio::time::timeout(Duration::from_secs(5), subscription.close())
            .await
            .expect("close should not hang")
            .unwrap();

        assert!(rx.recv().await.is_err());
        assert!(subscription.is_finished());
    }

    #[tokio::test]
    async fn test_double_close_is_an_error() {
        let mut subscription =
            Subscription::spawn(MockSource::idle("suricata"), SubscriptionConfig::default());
        subscription.close().await.unwrap();
        let err = subscription.close().await.unwrap_err();
        assert!(matches!(err, IngestionError::AlreadyClosed { .. }));
    }
}
