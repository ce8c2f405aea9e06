//! Room Service
//!
//! Match lifecycle and player input on top of the shared store. Everything
//! here is a read-modify-write of one room snapshot, so any instance can
//! serve any request.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use crate::core::grid::Direction;
use crate::game::events::{BoardEventKind, GameEvent};
use crate::game::state::{BoardState, GameMode, RoomStatus};
use crate::relay::EventRelay;
use crate::store::{PresenceStore, StateStore, StoreError};

/// Match lifecycle, direction intake, and presence bookkeeping.
#[derive(Clone)]
pub struct RoomService {
    store: Arc<dyn StateStore>,
    presence: Arc<dyn PresenceStore>,
    relay: Arc<EventRelay>,
}

impl RoomService {
    /// Create a service over the given store, presence map, and relay.
    pub fn new(
        store: Arc<dyn StateStore>,
        presence: Arc<dyn PresenceStore>,
        relay: Arc<EventRelay>,
    ) -> Self {
        Self {
            store,
            presence,
            relay,
        }
    }

    /// Start a match: build the initial snapshot, persist it, and announce
    /// the start. The roster order is the authoritative player order for
    /// spawn rows and team assignment.
    pub async fn start_match(
        &self,
        room_id: &str,
        roster: &[String],
        mode: GameMode,
        target_score: u32,
    ) -> Result<BoardState, StoreError> {
        let seed = Utc::now().timestamp_millis() as u64;
        let board = BoardState::new(room_id, roster, mode, target_score, seed);
        self.store.save(&board).await?;
        info!(room_id, players = roster.len(), ?mode, "match started");

        self.relay
            .forward(&GameEvent::board(BoardEventKind::Start, None, board.clone()))
            .await;
        Ok(board)
    }

    /// Apply a player's direction change, effective from the next tick.
    ///
    /// Fire-and-forget: a missing room, an unknown or dead player, or a
    /// room that is not in play all drop the input silently, and store
    /// failures are logged rather than surfaced. Stale inputs are normal
    /// around match end.
    pub async fn set_direction(&self, room_id: &str, username: &str, direction: Direction) {
        let board = match self.store.load(room_id).await {
            Ok(Some(board)) => board,
            Ok(None) => return,
            Err(err) => {
                warn!(room_id, username, %err, "direction load failed");
                return;
            }
        };
        if board.status != RoomStatus::InGame {
            return;
        }

        let mut board = board;
        match board.players.get_mut(username) {
            Some(player) if player.alive => player.direction = direction,
            _ => return,
        }

        if let Err(err) = self.store.save(&board).await {
            warn!(room_id, username, %err, "direction save failed");
        }
    }

    /// Current snapshot of a room, if it exists.
    pub async fn board(&self, room_id: &str) -> Result<Option<BoardState>, StoreError> {
        self.store.load(room_id).await
    }

    /// Delete every room snapshot (admin wipe).
    pub async fn clear_all_games(&self) -> Result<(), StoreError> {
        self.store.clear().await?;
        info!("all room snapshots cleared");
        Ok(())
    }

    /// Record which room a connected user is in.
    pub async fn track_presence(&self, username: &str, room_id: &str) -> Result<(), StoreError> {
        self.presence.set_room(username, room_id).await
    }

    /// Handle a user disconnect: drop the presence entry and report which
    /// room the user was in, so the caller can notify the room.
    pub async fn handle_disconnect(&self, username: &str) -> Result<Option<String>, StoreError> {
        let room = self.presence.room_of(username).await?;
        if let Some(room_id) = &room {
            self.presence.clear_user(username).await?;
            info!(username, room_id, "user disconnected");
        }
        Ok(room)
    }
}
