//! Mock 消息源
//!
//! 用于无 broker 环境的测试与演练。

use std::collections::VecDeque;
use std::time::Duration;

use bytes::Bytes;
use contracts::{ContractError, MessageSource, RawMessage};
use tracing::{debug, trace};

/// Mock 消息源
///
/// 依次返回预设的 payload；耗尽后结束订阅，或在 `hold_open` 时保持订阅直到关闭。
pub struct MockSource {
    topic: String,
    payloads: VecDeque<Bytes>,
    hold_open: bool,
    interval: Option<Duration>,
    closed: bool,
}

impl MockSource {
    /// 创建新的 Mock 消息源
    pub fn new<I, P>(topic: &str, payloads: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<Bytes>,
    {
        Self {
            topic: topic.to_string(),
            payloads: payloads.into_iter().map(Into::into).collect(),
            hold_open: false,
            interval: None,
            closed: false,
        }
    }

    /// 空的 Mock 源，保持订阅直到关闭
    pub fn idle(topic: &str) -> Self {
        Self::new::<_, Bytes>(topic, Vec::new()).hold_open()
    }

    /// payload 耗尽后保持订阅
    pub fn hold_open(mut self) -> Self {
        self.hold_open = true;
        self
    }

    /// 每条消息之间的间隔
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = Some(interval);
        self
    }

    /// 剩余 payload 数量
    pub fn remaining(&self) -> usize {
        self.payloads.len()
    }
}

impl MessageSource for MockSource {
    fn topic(&self) -> &str {
        &self.topic
    }

    async fn next_message(&mut self) -> Option<Result<RawMessage, ContractError>> {
        if self.closed {
            return None;
        }
        if let Some(interval) = self.interval {
            tokio::time::sleep(interval).await;
        }
        match self.payloads.pop_front() {
            Some(payload) => {
                trace!(topic = %self.topic, bytes = payload.len(), "mock message");
                Some(Ok(RawMessage::new(self.topic.clone(), payload)))
            }
            None if self.hold_open => std::future::pending().await,
            None => {
                debug!(topic = %self.topic, "mock source exhausted");
                None
            }
        }
    }

    async fn close(&mut self) {
        self.closed = true;
        self.payloads.clear();
    }
}
