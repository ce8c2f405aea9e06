//! In-Memory Store
//!
//! Single-process implementation of the store seams, used by tests and
//! single-node development runs. Records are kept as JSON strings so the
//! snapshot is just as opaque to this store as it is to Redis.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;

use crate::game::state::BoardState;
use crate::store::{PresenceStore, StateStore, StoreError, TickLock, GAME_KEY_PREFIX};

/// In-process store, presence map, and tick-lease table.
///
/// Leases are tracked on [`tokio::time::Instant`] so tests can pause and
/// advance time deterministically.
#[derive(Default)]
pub struct MemoryStore {
    rooms: RwLock<BTreeMap<String, String>>,
    presence: RwLock<BTreeMap<String, String>>,
    leases: Mutex<BTreeMap<String, Instant>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StateStore for MemoryStore {
    async fn load(&self, room_id: &str) -> Result<Option<BoardState>, StoreError> {
        let rooms = self.rooms.read().await;
        match rooms.get(room_id) {
            None => Ok(None),
            Some(raw) => serde_json::from_str(raw)
                .map(Some)
                .map_err(|source| StoreError::Corrupt {
                    key: format!("{GAME_KEY_PREFIX}{room_id}"),
                    source,
                }),
        }
    }

    async fn save(&self, board: &BoardState) -> Result<(), StoreError> {
        let raw = serde_json::to_string(board)
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        self.rooms.write().await.insert(board.room_id.clone(), raw);
        Ok(())
    }

    async fn delete(&self, room_id: &str) -> Result<(), StoreError> {
        self.rooms.write().await.remove(room_id);
        Ok(())
    }

    async fn active_rooms(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.rooms.read().await.keys().cloned().collect())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        self.rooms.write().await.clear();
        Ok(())
    }
}

#[async_trait]
impl PresenceStore for MemoryStore {
    async fn set_room(&self, username: &str, room_id: &str) -> Result<(), StoreError> {
        self.presence
            .write()
            .await
            .insert(username.to_string(), room_id.to_string());
        Ok(())
    }

    async fn room_of(&self, username: &str) -> Result<Option<String>, StoreError> {
        Ok(self.presence.read().await.get(username).cloned())
    }

    async fn clear_user(&self, username: &str) -> Result<(), StoreError> {
        self.presence.write().await.remove(username);
        Ok(())
    }
}

#[async_trait]
impl TickLock for MemoryStore {
    async fn try_acquire(&self, room_id: &str, lease: Duration) -> Result<bool, StoreError> {
        let mut leases = self.leases.lock().await;
        let now = Instant::now();
        if let Some(expiry) = leases.get(room_id) {
            if *expiry > now {
                return Ok(false);
            }
        }
        leases.insert(room_id.to_string(), now + lease);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::state::{GameMode, RoomStatus};

    fn sample_board(room_id: &str) -> BoardState {
        BoardState::new(
            room_id,
            &["ada".to_string(), "grace".to_string()],
            GameMode::Competitive,
            100,
            77,
        )
    }

    #[tokio::test]
    async fn test_save_load_round_trip() {
        let store = MemoryStore::new();
        let board = sample_board("m-1");

        store.save(&board).await.unwrap();
        let loaded = store.load("m-1").await.unwrap().unwrap();
        assert_eq!(loaded, board);
        assert_eq!(loaded.status, RoomStatus::InGame);

        assert!(store.load("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_enumerate_and_delete() {
        let store = MemoryStore::new();
        store.save(&sample_board("m-1")).await.unwrap();
        store.save(&sample_board("m-2")).await.unwrap();

        let mut rooms = store.active_rooms().await.unwrap();
        rooms.sort();
        assert_eq!(rooms, vec!["m-1", "m-2"]);

        store.delete("m-1").await.unwrap();
        assert!(store.load("m-1").await.unwrap().is_none());

        // Deleting a missing room is a no-op.
        store.delete("m-1").await.unwrap();

        store.clear().await.unwrap();
        assert!(store.active_rooms().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_presence_round_trip() {
        let store = MemoryStore::new();
        store.set_room("ada", "m-1").await.unwrap();
        assert_eq!(store.room_of("ada").await.unwrap().as_deref(), Some("m-1"));

        store.clear_user("ada").await.unwrap();
        assert!(store.room_of("ada").await.unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_lease_excludes_until_expiry() {
        let store = MemoryStore::new();
        let lease = Duration::from_millis(200);

        assert!(store.try_acquire("m-1", lease).await.unwrap());
        // Second taker inside the window is fenced out.
        assert!(!store.try_acquire("m-1", lease).await.unwrap());
        // Other rooms are independent.
        assert!(store.try_acquire("m-2", lease).await.unwrap());

        tokio::time::advance(Duration::from_millis(250)).await;
        assert!(store.try_acquire("m-1", lease).await.unwrap());
    }
}
