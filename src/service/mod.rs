//! Room Services
//!
//! The orchestration layer between the pure simulation and the outside
//! world: [`scheduler`] drives every active room on a fixed cadence,
//! [`rooms`] handles match lifecycle and player input.

pub mod rooms;
pub mod scheduler;

pub use rooms::RoomService;
pub use scheduler::{RoomScheduler, SchedulerConfig};
