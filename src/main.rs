//! Serpent Arena Server
//!
//! Runs the room scheduler and event relay over either Redis (when
//! `REDIS_URL` is set, so a fleet of instances shares state) or an
//! in-process store for single-node development. Starts a demo match so a
//! bare run has something to tick.

use std::sync::Arc;

use anyhow::Context;
use tokio::sync::broadcast;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use serpent_arena::relay::{BroadcastBus, EventBus, EventRelay, LoggingTransport, RedisBus};
use serpent_arena::service::{RoomScheduler, RoomService, SchedulerConfig};
use serpent_arena::store::memory::MemoryStore;
use serpent_arena::store::redis::RedisStore;
use serpent_arena::store::{PresenceStore, StateStore, TickLock};
use serpent_arena::{Direction, GameMode, TICK_PERIOD_MS, VERSION};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(Level::INFO.to_string()));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    info!("Serpent Arena Server v{}", VERSION);
    info!("Tick period: {} ms", TICK_PERIOD_MS);

    let (store, presence, lock, bus): (
        Arc<dyn StateStore>,
        Arc<dyn PresenceStore>,
        Arc<dyn TickLock>,
        Arc<dyn EventBus>,
    ) = match std::env::var("REDIS_URL") {
        Ok(url) => {
            info!("using Redis backend at {url}");
            let redis = Arc::new(
                RedisStore::connect(&url)
                    .await
                    .context("redis connection failed")?,
            );
            let bus = Arc::new(RedisBus::connect(&url).await.context("redis bus failed")?);
            (redis.clone(), redis.clone(), redis, bus)
        }
        Err(_) => {
            info!("REDIS_URL not set, using in-memory backend");
            let memory = Arc::new(MemoryStore::new());
            (
                memory.clone(),
                memory.clone(),
                memory,
                Arc::new(BroadcastBus::default()),
            )
        }
    };

    let relay = Arc::new(EventRelay::new(bus, Arc::new(LoggingTransport)));
    let (shutdown_tx, _) = broadcast::channel(1);

    let subscriber_task = relay.clone().spawn_subscriber(shutdown_tx.subscribe());
    let scheduler = Arc::new(RoomScheduler::new(
        store.clone(),
        lock,
        relay.clone(),
        SchedulerConfig::default(),
    ));
    let scheduler_task = scheduler.spawn(shutdown_tx.subscribe());

    let rooms = RoomService::new(store, presence, relay);
    demo_match(&rooms).await?;

    tokio::signal::ctrl_c().await.context("signal wait failed")?;
    info!("shutting down");
    let _ = shutdown_tx.send(());
    subscriber_task.await.context("subscriber task panicked")?;
    scheduler_task.await.context("scheduler task panicked")?;
    Ok(())
}

/// Start a two-player demo match and feed it inputs that keep both snakes
/// circling forever, so the scheduler has a live room to drive.
async fn demo_match(rooms: &RoomService) -> anyhow::Result<()> {
    info!("=== Starting Demo Match ===");

    let roster = vec!["alice".to_string(), "bob".to_string()];
    let board = rooms
        .start_match("demo", &roster, GameMode::Competitive, 1000)
        .await?;
    for (name, player) in &board.players {
        let head = player.head();
        info!("player {name} spawned at {head:?}");
    }

    // Each player loops a 2x2 square in its own spawn rows: one step in
    // each heading per tick period.
    let rooms = rooms.clone();
    tokio::spawn(async move {
        let cycle = [
            Direction::Right,
            Direction::Down,
            Direction::Left,
            Direction::Up,
        ];
        let mut interval =
            tokio::time::interval(std::time::Duration::from_millis(TICK_PERIOD_MS));
        let mut step = 0usize;
        loop {
            interval.tick().await;
            let heading = cycle[step % cycle.len()];
            rooms.set_direction("demo", "alice", heading).await;
            rooms.set_direction("demo", "bob", heading).await;
            step += 1;
        }
    });
    Ok(())
}
