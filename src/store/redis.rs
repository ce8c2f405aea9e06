//! Redis Store
//!
//! Production implementation of the store seams on a single Redis
//! deployment reachable by every server instance. Key layout matches the
//! original system: `game:<roomId>` snapshot blobs, `user_room:<user>`
//! presence strings, `lock:game:<roomId>` tick leases via `SET NX PX`.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

use crate::game::state::BoardState;
use crate::store::{
    PresenceStore, StateStore, StoreError, TickLock, GAME_KEY_PREFIX, LOCK_KEY_PREFIX,
    PRESENCE_KEY_PREFIX,
};

fn backend(err: redis::RedisError) -> StoreError {
    StoreError::Unavailable(err.to_string())
}

/// Redis-backed store, presence map, and tick-lease table.
///
/// `ConnectionManager` multiplexes and reconnects under the hood; cloning
/// it is cheap, so each operation works on its own handle.
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
}

impl RedisStore {
    /// Connect to Redis at `url` (e.g. `redis://127.0.0.1/`).
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let client = redis::Client::open(url).map_err(backend)?;
        let conn = ConnectionManager::new(client).await.map_err(backend)?;
        Ok(Self { conn })
    }

    /// Build from an existing managed connection.
    pub fn with_connection(conn: ConnectionManager) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl StateStore for RedisStore {
    async fn load(&self, room_id: &str) -> Result<Option<BoardState>, StoreError> {
        let key = format!("{GAME_KEY_PREFIX}{room_id}");
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.get(&key).await.map_err(backend)?;
        match raw {
            None => Ok(None),
            Some(raw) => serde_json::from_str(&raw)
                .map(Some)
                .map_err(|source| StoreError::Corrupt { key, source }),
        }
    }

    async fn save(&self, board: &BoardState) -> Result<(), StoreError> {
        let key = format!("{GAME_KEY_PREFIX}{}", board.room_id);
        let raw = serde_json::to_string(board)
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        let mut conn = self.conn.clone();
        let _: () = conn.set(&key, raw).await.map_err(backend)?;
        Ok(())
    }

    async fn delete(&self, room_id: &str) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let _: () = conn
            .del(format!("{GAME_KEY_PREFIX}{room_id}"))
            .await
            .map_err(backend)?;
        Ok(())
    }

    async fn active_rooms(&self) -> Result<Vec<String>, StoreError> {
        let mut conn = self.conn.clone();
        let keys: Vec<String> = conn
            .keys(format!("{GAME_KEY_PREFIX}*"))
            .await
            .map_err(backend)?;
        Ok(keys
            .into_iter()
            .filter_map(|k| k.strip_prefix(GAME_KEY_PREFIX).map(str::to_string))
            .collect())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let keys: Vec<String> = conn
            .keys(format!("{GAME_KEY_PREFIX}*"))
            .await
            .map_err(backend)?;
        if !keys.is_empty() {
            let _: () = conn.del(keys).await.map_err(backend)?;
        }
        Ok(())
    }
}

#[async_trait]
impl PresenceStore for RedisStore {
    async fn set_room(&self, username: &str, room_id: &str) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let _: () = conn
            .set(format!("{PRESENCE_KEY_PREFIX}{username}"), room_id)
            .await
            .map_err(backend)?;
        Ok(())
    }

    async fn room_of(&self, username: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.conn.clone();
        conn.get(format!("{PRESENCE_KEY_PREFIX}{username}"))
            .await
            .map_err(backend)
    }

    async fn clear_user(&self, username: &str) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let _: () = conn
            .del(format!("{PRESENCE_KEY_PREFIX}{username}"))
            .await
            .map_err(backend)?;
        Ok(())
    }
}

#[async_trait]
impl TickLock for RedisStore {
    async fn try_acquire(&self, room_id: &str, lease: Duration) -> Result<bool, StoreError> {
        let mut conn = self.conn.clone();
        // SET NX PX: take the lease only if free, expiring on its own.
        let reply: Option<String> = redis::cmd("SET")
            .arg(format!("{LOCK_KEY_PREFIX}{room_id}"))
            .arg("held")
            .arg("NX")
            .arg("PX")
            .arg(lease.as_millis() as u64)
            .query_async(&mut conn)
            .await
            .map_err(backend)?;
        Ok(reply.is_some())
    }
}
