//! External State Adapters
//!
//! The store is the sole source of truth for room state: every mutation is
//! a read-modify-write of one snapshot keyed by room id, so any server
//! instance can serve any room. Three seams, each with an in-memory and a
//! Redis implementation:
//!
//! - [`StateStore`] — authoritative room snapshots (`game:` keys)
//! - [`PresenceStore`] — connected user -> room map (`user_room:` keys)
//! - [`TickLock`] — short-lease mutual exclusion so exactly one instance
//!   advances a room per tick window (`lock:game:` keys)

pub mod memory;
pub mod redis;

use std::time::Duration;

use async_trait::async_trait;

use crate::game::state::BoardState;

/// Key prefix for room snapshots.
pub const GAME_KEY_PREFIX: &str = "game:";

/// Key prefix for presence entries.
pub const PRESENCE_KEY_PREFIX: &str = "user_room:";

/// Key prefix for tick leases.
pub const LOCK_KEY_PREFIX: &str = "lock:game:";

/// Store failures.
///
/// Transient unavailability is absorbed by callers (the room simply retries
/// next cycle); corrupt records make the scheduler skip the room.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The backend could not be reached or rejected the operation.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// A record exists but does not deserialize as a snapshot.
    #[error("corrupt record for {key}: {source}")]
    Corrupt {
        /// The store key holding the bad record.
        key: String,
        /// Decode failure.
        #[source]
        source: serde_json::Error,
    },
}

/// Authoritative snapshot storage, one record per active room.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Load a room snapshot, `None` when the room does not exist.
    async fn load(&self, room_id: &str) -> Result<Option<BoardState>, StoreError>;

    /// Persist a snapshot under its room id.
    async fn save(&self, board: &BoardState) -> Result<(), StoreError>;

    /// Delete a room's snapshot. Deleting a missing room is not an error.
    async fn delete(&self, room_id: &str) -> Result<(), StoreError>;

    /// Ids of every room currently in the store.
    async fn active_rooms(&self) -> Result<Vec<String>, StoreError>;

    /// Delete every room snapshot (admin wipe).
    async fn clear(&self) -> Result<(), StoreError>;
}

/// Connected user -> current room, used for disconnect cleanup only.
#[async_trait]
pub trait PresenceStore: Send + Sync {
    /// Associate a user with a room.
    async fn set_room(&self, username: &str, room_id: &str) -> Result<(), StoreError>;

    /// Room the user is currently in, if any.
    async fn room_of(&self, username: &str) -> Result<Option<String>, StoreError>;

    /// Drop the user's association.
    async fn clear_user(&self, username: &str) -> Result<(), StoreError>;
}

/// Distributed per-room tick lease.
///
/// The lease is never released early: its TTL is the exclusion window, so a
/// second instance cannot re-advance the same room within one tick cycle.
/// A crashed holder is fenced out only until the lease expires, after which
/// another instance takes over.
#[async_trait]
pub trait TickLock: Send + Sync {
    /// Try to take the room's tick lease. `true` means this instance may
    /// advance the room this cycle.
    async fn try_acquire(&self, room_id: &str, lease: Duration) -> Result<bool, StoreError>;
}
