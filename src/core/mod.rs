//! Deterministic Primitives
//!
//! Shared building blocks of the simulation: integer grid math and a
//! seedable PRNG. Nothing in this module touches the clock, the OS, or
//! floating point.

pub mod grid;
pub mod rng;

pub use grid::{Direction, Point};
pub use rng::DeterministicRng;
