//! Event Relay
//!
//! Fan-out of game events to every server instance. An event produced on
//! one instance is delivered to that instance's local rooms immediately,
//! then published on the shared bus; the subscriber task on every other
//! instance decodes incoming envelopes and delivers them to its own rooms.
//! Each relay tags outgoing envelopes with its instance id and skips its
//! own messages on the way back in.

pub mod bus;

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::StreamExt;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::game::events::{
    decode_channel_message, encode_channel_message, DecodedEvent, GameEvent,
};

pub use bus::{BroadcastBus, EventBus, RedisBus, RelayError, EVENT_CHANNEL};

/// Delivery seam toward connected clients of one room.
///
/// The real server hangs its connection layer off this trait; tests hang a
/// capture buffer off it.
#[async_trait]
pub trait RoomTransport: Send + Sync {
    /// Deliver one event to the clients of `room_id` on this instance.
    async fn deliver(&self, room_id: &str, event: &GameEvent);
}

/// Transport that only logs deliveries, for headless runs.
pub struct LoggingTransport;

#[async_trait]
impl RoomTransport for LoggingTransport {
    async fn deliver(&self, room_id: &str, event: &GameEvent) {
        debug!(room_id, event_type = event.event_type(), "deliver");
    }
}

/// Bridges local event production with the cross-instance bus.
pub struct EventRelay {
    bus: Arc<dyn EventBus>,
    transport: Arc<dyn RoomTransport>,
    origin: Uuid,
}

impl EventRelay {
    /// Create a relay with a fresh instance id.
    pub fn new(bus: Arc<dyn EventBus>, transport: Arc<dyn RoomTransport>) -> Self {
        Self {
            bus,
            transport,
            origin: Uuid::new_v4(),
        }
    }

    /// This relay's instance id, stamped on outgoing envelopes.
    pub fn origin(&self) -> Uuid {
        self.origin
    }

    /// Forward one locally produced event: deliver to local rooms first,
    /// then publish for the other instances. A failed publish is logged and
    /// swallowed; local clients already got the event.
    pub async fn forward(&self, event: &GameEvent) {
        self.transport.deliver(event.room_id(), event).await;

        match encode_channel_message(event, self.origin) {
            Ok(message) => {
                if let Err(err) = self.bus.publish(message).await {
                    warn!(room_id = event.room_id(), %err, "event publish failed");
                }
            }
            Err(err) => warn!(room_id = event.room_id(), %err, "event encode failed"),
        }
    }

    /// Run the subscriber loop until `shutdown` fires, delivering events
    /// published by other instances.
    pub fn spawn_subscriber(
        self: Arc<Self>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut stream = match self.bus.subscribe().await {
                Ok(stream) => stream,
                Err(err) => {
                    error!(%err, "event subscription failed");
                    return;
                }
            };
            info!(origin = %self.origin, "event subscriber running");

            loop {
                tokio::select! {
                    _ = shutdown.recv() => break,
                    next = stream.next() => match next {
                        Some(raw) => self.handle_message(&raw).await,
                        None => {
                            error!("event stream closed");
                            break;
                        }
                    },
                }
            }
            info!("event subscriber stopped");
        })
    }

    async fn handle_message(&self, raw: &str) {
        match decode_channel_message(raw) {
            Ok(DecodedEvent::Known { origin, event }) => {
                if origin == Some(self.origin) {
                    return;
                }
                self.transport.deliver(event.room_id(), &event).await;
            }
            Ok(DecodedEvent::Unrecognized { event_type }) => {
                warn!(event_type, "ignoring unrecognized channel event");
            }
            Err(err) => error!(%err, "undecodable channel message"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::events::BoardEventKind;
    use crate::game::state::{BoardState, GameMode};
    use tokio::sync::Mutex;

    struct CaptureTransport {
        seen: Mutex<Vec<(String, String)>>,
    }

    impl CaptureTransport {
        fn new() -> Self {
            Self {
                seen: Mutex::new(Vec::new()),
            }
        }

        async fn take(&self) -> Vec<(String, String)> {
            std::mem::take(&mut *self.seen.lock().await)
        }
    }

    #[async_trait]
    impl RoomTransport for CaptureTransport {
        async fn deliver(&self, room_id: &str, event: &GameEvent) {
            self.seen
                .lock()
                .await
                .push((room_id.to_string(), event.event_type().to_string()));
        }
    }

    fn sample_event() -> GameEvent {
        let board = BoardState::new(
            "room-7",
            &["ada".to_string(), "grace".to_string()],
            GameMode::Competitive,
            100,
            3,
        );
        GameEvent::board(BoardEventKind::Update, None, board)
    }

    #[tokio::test]
    async fn test_forward_delivers_locally_and_publishes() {
        let bus: Arc<dyn EventBus> = Arc::new(BroadcastBus::default());
        let transport = Arc::new(CaptureTransport::new());
        let relay = EventRelay::new(bus.clone(), transport.clone());

        let mut stream = bus.subscribe().await.unwrap();
        relay.forward(&sample_event()).await;

        assert_eq!(
            transport.take().await,
            vec![("room-7".to_string(), "GameEvent".to_string())]
        );
        let raw = stream.next().await.unwrap();
        assert!(raw.contains("\"eventType\":\"GameEvent\""));
    }

    #[tokio::test]
    async fn test_own_messages_are_skipped() {
        let bus: Arc<dyn EventBus> = Arc::new(BroadcastBus::default());
        let transport = Arc::new(CaptureTransport::new());
        let relay = EventRelay::new(bus, transport.clone());

        let own = encode_channel_message(&sample_event(), relay.origin()).unwrap();
        relay.handle_message(&own).await;
        assert!(transport.take().await.is_empty());

        let other = encode_channel_message(&sample_event(), Uuid::new_v4()).unwrap();
        relay.handle_message(&other).await;
        assert_eq!(transport.take().await.len(), 1);
    }

    #[tokio::test]
    async fn test_legacy_messages_are_delivered() {
        let bus: Arc<dyn EventBus> = Arc::new(BroadcastBus::default());
        let transport = Arc::new(CaptureTransport::new());
        let relay = EventRelay::new(bus, transport.clone());

        // No origin field, so it can never match ours.
        relay
            .handle_message(r#"{"type":"SCORE_UPDATE","roomId":"room-2","players":[]}"#)
            .await;
        assert_eq!(
            transport.take().await,
            vec![("room-2".to_string(), "ScoreEvent".to_string())]
        );
    }

    #[tokio::test]
    async fn test_garbage_and_unknown_are_swallowed() {
        let bus: Arc<dyn EventBus> = Arc::new(BroadcastBus::default());
        let transport = Arc::new(CaptureTransport::new());
        let relay = EventRelay::new(bus, transport.clone());

        relay.handle_message("not json").await;
        relay
            .handle_message(r#"{"eventType":"RoomEvent","timestamp":0,"payload":{}}"#)
            .await;
        assert!(transport.take().await.is_empty());
    }

    #[tokio::test]
    async fn test_subscriber_loop_end_to_end() {
        let bus: Arc<dyn EventBus> = Arc::new(BroadcastBus::default());
        let transport = Arc::new(CaptureTransport::new());
        let relay = Arc::new(EventRelay::new(bus.clone(), transport.clone()));

        let (shutdown_tx, _) = broadcast::channel(1);
        let handle = relay.clone().spawn_subscriber(shutdown_tx.subscribe());
        tokio::task::yield_now().await;

        // Simulate a peer instance publishing.
        let raw = encode_channel_message(&sample_event(), Uuid::new_v4()).unwrap();
        bus.publish(raw).await.unwrap();

        // Give the subscriber task a chance to run.
        for _ in 0..50 {
            tokio::task::yield_now().await;
            if !transport.seen.lock().await.is_empty() {
                break;
            }
        }
        assert_eq!(transport.take().await.len(), 1);

        shutdown_tx.send(()).unwrap();
        handle.await.unwrap();
    }
}
