//! Event bus interface and the in-process broadcast implementation.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::broadcast;

/// Errors reported by an [`EventBus`].
#[derive(Debug, Clone, thiserror::Error)]
pub enum BusError {
    /// Nobody is listening on the topic, so the message would be dropped.
    #[error("no subscribers on topic '{0}'")]
    NoSubscribers(String),

    /// The publish call did not complete within the allowed time.
    #[error("publish timed out after {0:?}")]
    Timeout(Duration),

    /// The transport rejected the message or is unreachable.
    #[error("bus unavailable: {0}")]
    Unavailable(String),
}

/// Publish side of the message bus. One message per record.
#[async_trait]
pub trait EventBus: Send + Sync {
    async fn publish(&self, topic: &str, payload: &str) -> Result<(), BusError>;
}

/// A bus backed by one `tokio::sync::broadcast` channel per topic.
///
/// Subscribers that fall more than `capacity` messages behind lose the
/// oldest messages and observe a lag error on their receiver.
#[derive(Debug)]
pub struct BroadcastBus {
    capacity: usize,
    topics: Mutex<HashMap<String, broadcast::Sender<String>>>,
}

impl BroadcastBus {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            topics: Mutex::new(HashMap::new()),
        }
    }

    /// Subscribes to `topic`, creating the channel on first use.
    pub fn subscribe(&self, topic: &str) -> broadcast::Receiver<String> {
        self.sender(topic).subscribe()
    }

    fn sender(&self, topic: &str) -> broadcast::Sender<String> {
        let mut topics = self.topics.lock().unwrap_or_else(PoisonError::into_inner);
        topics
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .clone()
    }
}

#[async_trait]
impl EventBus for BroadcastBus {
    async fn publish(&self, topic: &str, payload: &str) -> Result<(), BusError> {
        self.sender(topic)
            .send(payload.to_string())
            .map(|_| ())
            .map_err(|_| BusError::NoSubscribers(topic.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribers_receive_published_messages() {
        let bus = BroadcastBus::new(16);
        let mut rx = bus.subscribe("logs");
        bus.publish("logs", "{\"id\":\"1\"}")
            .await
            .expect("publish should succeed");
        assert_eq!(rx.recv().await.expect("message"), "{\"id\":\"1\"}");
    }

    #[tokio::test]
    async fn publishing_without_subscribers_fails() {
        let bus = BroadcastBus::new(16);
        let err = bus.publish("logs", "x").await.expect_err("no subscribers");
        assert!(matches!(err, BusError::NoSubscribers(topic) if topic == "logs"));
    }

    #[tokio::test]
    async fn topics_are_isolated() {
        let bus = BroadcastBus::new(16);
        let mut audit = bus.subscribe("audit");
        let _other = bus.subscribe("other");
        bus.publish("other", "x").await.expect("publish");
        bus.publish("audit", "y").await.expect("publish");
        assert_eq!(audit.recv().await.expect("message"), "y");
    }
}
