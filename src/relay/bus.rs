//! Event Bus
//!
//! Transport for raw event envelopes between server instances. Every
//! instance publishes to and subscribes from a single channel; filtering by
//! origin happens one layer up in the relay.

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use redis::aio::ConnectionManager;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;

/// Name of the shared pub/sub channel carrying event envelopes.
pub const EVENT_CHANNEL: &str = "game-events";

/// Bus failures.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// Publishing an envelope failed.
    #[error("publish failed: {0}")]
    Publish(String),

    /// The subscription could not be established.
    #[error("subscribe failed: {0}")]
    Subscribe(String),

    /// An envelope could not be encoded or decoded.
    #[error("bad envelope: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Fan-out channel shared by all server instances.
///
/// Messages are opaque strings; the bus does not interpret envelopes.
#[async_trait]
pub trait EventBus: Send + Sync {
    /// Publish one envelope to every subscriber, including this instance.
    async fn publish(&self, message: String) -> Result<(), RelayError>;

    /// Open a stream of incoming envelopes.
    async fn subscribe(&self) -> Result<BoxStream<'static, String>, RelayError>;
}

/// In-process bus over a tokio broadcast channel, for tests and single-node
/// runs.
pub struct BroadcastBus {
    tx: broadcast::Sender<String>,
}

impl BroadcastBus {
    /// Create a bus buffering up to `capacity` in-flight messages.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }
}

impl Default for BroadcastBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[async_trait]
impl EventBus for BroadcastBus {
    async fn publish(&self, message: String) -> Result<(), RelayError> {
        // send errors only when nobody is subscribed, which is fine.
        let _ = self.tx.send(message);
        Ok(())
    }

    async fn subscribe(&self) -> Result<BoxStream<'static, String>, RelayError> {
        let rx = self.tx.subscribe();
        // Lagged receivers drop the missed messages and continue.
        Ok(BroadcastStream::new(rx)
            .filter_map(|item| async move { item.ok() })
            .boxed())
    }
}

/// Redis pub/sub bus, the production transport.
pub struct RedisBus {
    client: redis::Client,
    publisher: ConnectionManager,
}

impl RedisBus {
    /// Connect to Redis at `url` and prepare the publishing connection.
    pub async fn connect(url: &str) -> Result<Self, RelayError> {
        let client = redis::Client::open(url).map_err(|e| RelayError::Subscribe(e.to_string()))?;
        let publisher = ConnectionManager::new(client.clone())
            .await
            .map_err(|e| RelayError::Subscribe(e.to_string()))?;
        Ok(Self { client, publisher })
    }
}

#[async_trait]
impl EventBus for RedisBus {
    async fn publish(&self, message: String) -> Result<(), RelayError> {
        let mut conn = self.publisher.clone();
        let _: () = redis::cmd("PUBLISH")
            .arg(EVENT_CHANNEL)
            .arg(message)
            .query_async(&mut conn)
            .await
            .map_err(|e| RelayError::Publish(e.to_string()))?;
        Ok(())
    }

    async fn subscribe(&self) -> Result<BoxStream<'static, String>, RelayError> {
        let mut pubsub = self
            .client
            .get_async_pubsub()
            .await
            .map_err(|e| RelayError::Subscribe(e.to_string()))?;
        pubsub
            .subscribe(EVENT_CHANNEL)
            .await
            .map_err(|e| RelayError::Subscribe(e.to_string()))?;
        Ok(pubsub
            .into_on_message()
            .filter_map(|msg| async move { msg.get_payload::<String>().ok() })
            .boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_broadcast_delivers_to_all_subscribers() {
        let bus = BroadcastBus::default();
        let mut a = bus.subscribe().await.unwrap();
        let mut b = bus.subscribe().await.unwrap();

        bus.publish("hello".to_string()).await.unwrap();

        assert_eq!(a.next().await.as_deref(), Some("hello"));
        assert_eq!(b.next().await.as_deref(), Some("hello"));
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_is_ok() {
        let bus = BroadcastBus::default();
        bus.publish("nobody listening".to_string()).await.unwrap();
    }
}
