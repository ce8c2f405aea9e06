//! Game Simulation
//!
//! Pure, deterministic room simulation. [`state`] holds the snapshot model,
//! [`tick`] advances it by one step, [`events`] describes what happened and
//! how it travels between server instances. Nothing in here touches the
//! store or the network.

pub mod events;
pub mod state;
pub mod tick;

pub use events::{BoardEvent, BoardEventKind, GameEvent};
pub use state::{BoardState, GameMode, Player, RoomStatus};
pub use tick::{advance, TickResult};
