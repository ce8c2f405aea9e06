//! # Serpent Arena Server
//!
//! Authoritative simulation core for multiplayer snake matches, built to
//! run as a fleet of interchangeable instances over a shared store.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   SERPENT ARENA SERVER                       │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/           - Deterministic primitives                  │
//! │  ├── grid.rs     - Board points and headings                 │
//! │  └── rng.rs      - Deterministic Xorshift128+ PRNG           │
//! │                                                              │
//! │  game/           - Simulation (deterministic)                │
//! │  ├── state.rs    - Room snapshot, players, teams, fruit      │
//! │  ├── tick.rs     - Authoritative per-tick state transition   │
//! │  └── events.rs   - Events and the channel envelope           │
//! │                                                              │
//! │  store/          - Shared state (Redis or in-memory)         │
//! │  ├── memory.rs   - Single-process backend                    │
//! │  └── redis.rs    - Production backend                        │
//! │                                                              │
//! │  relay/          - Cross-instance event fan-out              │
//! │  └── bus.rs      - Pub/sub transport                         │
//! │                                                              │
//! │  service/        - Orchestration (non-deterministic)         │
//! │  ├── scheduler.rs- Fixed-cadence tick driver with leases     │
//! │  └── rooms.rs    - Match lifecycle and direction intake      │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Determinism Guarantee
//!
//! The `core/` and `game/` modules are **100% deterministic**:
//! - No HashMap or HashSet (BTree collections for sorted iteration)
//! - No system time dependencies
//! - All randomness from a seeded Xorshift128+ carried in the snapshot
//!
//! Advancing the same persisted snapshot therefore produces identical
//! results on every instance, which is what lets any instance in the
//! fleet tick any room.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod core;
pub mod game;
pub mod relay;
pub mod service;
pub mod store;

// Re-export commonly used types
pub use crate::core::grid::{Direction, Point};
pub use crate::core::rng::DeterministicRng;
pub use game::events::GameEvent;
pub use game::state::{BoardState, GameMode, Player, RoomStatus};
pub use relay::{EventBus, EventRelay, RoomTransport};
pub use service::{RoomScheduler, RoomService, SchedulerConfig};
pub use store::{PresenceStore, StateStore, TickLock};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Simulation tick period (milliseconds)
pub const TICK_PERIOD_MS: u64 = 200;
