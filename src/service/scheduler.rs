//! Room Scheduler
//!
//! Drives every active room on a fixed cadence. Each cycle the scheduler
//! enumerates the store, takes a per-room tick lease, and advances the
//! rooms it won. Because the lease lives in the shared store, a fleet of
//! instances runs the same loop and each room still ticks exactly once per
//! window.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::game::state::RoomStatus;
use crate::game::tick;
use crate::relay::EventRelay;
use crate::store::{StateStore, StoreError, TickLock};
use crate::TICK_PERIOD_MS;

/// Scheduler cadence settings.
#[derive(Clone, Copy, Debug)]
pub struct SchedulerConfig {
    /// Interval between cycles.
    pub tick_period: Duration,
    /// Tick-lease TTL. Equal to the tick period so a room can be advanced
    /// at most once per window across the whole fleet.
    pub lock_lease: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_period: Duration::from_millis(TICK_PERIOD_MS),
            lock_lease: Duration::from_millis(TICK_PERIOD_MS),
        }
    }
}

/// Periodic driver for all rooms in the store.
pub struct RoomScheduler {
    store: Arc<dyn StateStore>,
    lock: Arc<dyn TickLock>,
    relay: Arc<EventRelay>,
    config: SchedulerConfig,
}

impl RoomScheduler {
    /// Create a scheduler over the given store, lock table, and relay.
    pub fn new(
        store: Arc<dyn StateStore>,
        lock: Arc<dyn TickLock>,
        relay: Arc<EventRelay>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            store,
            lock,
            relay,
            config,
        }
    }

    /// Run the tick loop until `shutdown` fires.
    pub fn spawn(self: Arc<Self>, mut shutdown: broadcast::Receiver<()>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.config.tick_period);
            // A slow cycle should not be followed by a burst of catch-up
            // ticks.
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!(period_ms = self.config.tick_period.as_millis() as u64, "room scheduler running");

            loop {
                tokio::select! {
                    _ = shutdown.recv() => break,
                    _ = interval.tick() => self.run_cycle().await,
                }
            }
            info!("room scheduler stopped");
        })
    }

    /// Run one scheduling cycle: advance every room this instance wins the
    /// lease for. Rooms are independent, so they are advanced concurrently.
    pub async fn run_cycle(&self) {
        let rooms = match self.store.active_rooms().await {
            Ok(rooms) => rooms,
            Err(err) => {
                warn!(%err, "room enumeration failed, skipping cycle");
                return;
            }
        };

        join_all(rooms.iter().map(|room_id| async move {
            if let Err(err) = self.try_advance(room_id).await {
                // The snapshot was not overwritten, so the room retries
                // next cycle from the same state.
                warn!(room_id, %err, "tick failed");
            }
        }))
        .await;
    }

    async fn try_advance(&self, room_id: &str) -> Result<(), StoreError> {
        if !self.lock.try_acquire(room_id, self.config.lock_lease).await? {
            debug!(room_id, "lease held elsewhere, skipping");
            return Ok(());
        }

        let Some(mut board) = self.store.load(room_id).await? else {
            // Deleted between enumeration and load.
            return Ok(());
        };

        // A finished snapshot can only be left over from a crash between
        // emit and delete; finish the cleanup.
        if board.status == RoomStatus::Finished {
            error!(room_id, "removing stale finished snapshot");
            self.store.delete(room_id).await?;
            return Ok(());
        }
        if board.status != RoomStatus::InGame {
            return Ok(());
        }

        let outcome = tick::advance(&mut board);

        if outcome.finished {
            // Emit before delete: a crash here leaves a Finished snapshot
            // for the next cycle to clean up, never a resurrected room.
            for event in &outcome.events {
                self.relay.forward(event).await;
            }
            info!(room_id, "match finished");
            self.store.delete(room_id).await?;
        } else {
            // Persist before emit so subscribers never see a state ahead
            // of the store.
            self.store.save(&board).await?;
            for event in &outcome.events {
                self.relay.forward(event).await;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::events::GameEvent;
    use crate::game::state::{BoardState, GameMode};
    use crate::relay::{BroadcastBus, RoomTransport};
    use async_trait::async_trait;
    use tokio::sync::Mutex;

    struct CaptureTransport {
        seen: Mutex<Vec<(String, String)>>,
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

    fn fixture() -> (Arc<crate::store::memory::MemoryStore>, Arc<CaptureTransport>, RoomScheduler) {
        let store = Arc::new(crate::store::memory::MemoryStore::new());
        let transport = Arc::new(CaptureTransport {
            seen: Mutex::new(Vec::new()),
        });
        let relay = Arc::new(EventRelay::new(
            Arc::new(BroadcastBus::default()),
            transport.clone(),
        ));
        let scheduler = RoomScheduler::new(
            store.clone(),
            store.clone(),
            relay,
            SchedulerConfig::default(),
        );
        (store, transport, scheduler)
    }

    fn sample_board(room_id: &str) -> BoardState {
        BoardState::new(
            room_id,
            &["ada".to_string(), "grace".to_string()],
            GameMode::Competitive,
            1000,
            5,
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_cycle_advances_and_persists() {
        let (store, transport, scheduler) = fixture();
        let board = sample_board("s-1");
        let heads_before: Vec<_> = board.players.values().filter_map(|p| p.head()).collect();
        store.save(&board).await.unwrap();

        scheduler.run_cycle().await;

        let after = store.load("s-1").await.unwrap().unwrap();
        let heads_after: Vec<_> = after.players.values().filter_map(|p| p.head()).collect();
        assert_ne!(heads_before, heads_after);

        // Every tick produces at least the board update.
        let seen = transport.seen.lock().await;
        assert!(seen.iter().any(|(room, ty)| room == "s-1" && ty == "GameEvent"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_lease_prevents_double_advance_within_window() {
        let (store, _, scheduler) = fixture();
        store.save(&sample_board("s-1")).await.unwrap();

        scheduler.run_cycle().await;
        let first = store.load("s-1").await.unwrap().unwrap();

        // Second cycle inside the same lease window must not re-advance.
        scheduler.run_cycle().await;
        let second = store.load("s-1").await.unwrap().unwrap();
        assert_eq!(first, second);

        tokio::time::advance(Duration::from_millis(250)).await;
        scheduler.run_cycle().await;
        let third = store.load("s-1").await.unwrap().unwrap();
        assert_ne!(first, third);
    }

    #[tokio::test(start_paused = true)]
    async fn test_finished_match_is_deleted() {
        let (store, transport, scheduler) = fixture();
        // A lone survivor finishes a competitive match on the next tick.
        let mut board = sample_board("s-1");
        let grace = board.players.get_mut("grace").unwrap();
        grace.eliminate();
        store.save(&board).await.unwrap();

        scheduler.run_cycle().await;

        assert!(store.load("s-1").await.unwrap().is_none());
        let seen = transport.seen.lock().await;
        assert!(seen
            .iter()
            .any(|(_, ty)| ty == "GameFinishedEvent"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_finished_snapshot_is_cleaned_up() {
        let (store, transport, scheduler) = fixture();
        let mut board = sample_board("s-1");
        board.status = RoomStatus::Finished;
        store.save(&board).await.unwrap();

        scheduler.run_cycle().await;

        assert!(store.load("s-1").await.unwrap().is_none());
        assert!(transport.seen.lock().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_store_cycle_is_quiet() {
        let (_, transport, scheduler) = fixture();
        scheduler.run_cycle().await;
        assert!(transport.seen.lock().await.is_empty());
    }
}
