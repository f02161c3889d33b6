//! RedisSource - Redis pub/sub subscription

use contracts::{ContractError, MessageSource, RawMessage};
use futures::stream::{BoxStream, StreamExt};
use tracing::{debug, info, instrument};

/// Subscription to one Redis pub/sub channel
pub struct RedisSource {
    url: String,
    topic: String,
    stream: Option<BoxStream<'static, redis::Msg>>,
}

impl RedisSource {
    /// Connect, verify the broker answers PING, and subscribe
    ///
    /// # Errors
    /// `ContractError::BrokerConnection` on any failure; fatal at startup.
    #[instrument(name = "redis_source_connect", skip(url), fields(topic = %topic))]
    pub async fn connect(url: &str, topic: &str) -> Result<Self, ContractError> {
        let client = redis::Client::open(url)
            .map_err(|e| ContractError::broker_connection(url, e.to_string()))?;

        let mut conn = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| ContractError::broker_connection(url, e.to_string()))?;
        let pong: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| ContractError::broker_connection(url, e.to_string()))?;
        debug!(reply = %pong, "Broker reachable");

        let mut pubsub = client
            .get_async_pubsub()
            .await
            .map_err(|e| ContractError::broker_connection(url, e.to_string()))?;
        pubsub
            .subscribe(topic)
            .await
            .map_err(|e| ContractError::broker_connection(url, e.to_string()))?;

        info!(topic = %topic, "Subscribed to broker topic");

        Ok(Self {
            url: url.to_string(),
            topic: topic.to_string(),
            stream: Some(pubsub.into_on_message().boxed()),
        })
    }

    /// Broker URL this source is connected to
    pub fn url(&self) -> &str {
        &self.url
    }
}

impl MessageSource for RedisSource {
    fn topic(&self) -> &str {
        &self.topic
    }

    async fn next_message(&mut self) -> Option<Result<RawMessage, ContractError>> {
        let stream = self.stream.as_mut()?;
        let msg = stream.next().await?;
        Some(Ok(RawMessage::new(
            msg.get_channel_name(),
            msg.get_payload_bytes().to_vec(),
        )))
    }

    #[instrument(name = "redis_source_close", skip(self), fields(topic = %self.topic))]
    async fn close(&mut self) {
        // Dropping the stream drops the pub/sub connection, which unsubscribes
        if self.stream.take().is_some() {
            info!(topic = %self.topic, "Unsubscribed from broker topic");
        }
    }
}
