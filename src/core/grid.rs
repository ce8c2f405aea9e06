//! Grid Primitives
//!
//! Integer cell coordinates and movement directions for the bounded board.
//! Everything here is plain integer math so the simulation stays
//! deterministic on every platform.

use serde::{Deserialize, Serialize};

/// A single cell on the board grid.
///
/// `(0, 0)` is the top-left corner; `x` grows rightwards, `y` grows
/// downwards. Implements `Ord` so cell sets iterate deterministically.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Point {
    /// Column index.
    pub x: i32,
    /// Row index.
    pub y: i32,
}

impl Point {
    /// Create a new point.
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Check that this point lies inside `[0, width) x [0, height)`.
    #[inline]
    pub fn in_bounds(&self, width: i32, height: i32) -> bool {
        self.x >= 0 && self.x < width && self.y >= 0 && self.y < height
    }
}

/// Movement direction of a snake head.
///
/// A closed enum: there is no "unknown" direction on the wire, so the
/// original system's fallback of "continue straight on unparsable input"
/// cannot occur here. Serialized in the original's uppercase format.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    /// Decreasing `y`.
    Up,
    /// Increasing `y`.
    Down,
    /// Decreasing `x`.
    Left,
    /// Increasing `x`. Default heading at room start.
    #[default]
    Right,
}

impl Direction {
    /// The cell one step from `from` in this direction.
    ///
    /// No wrapping: the caller checks bounds, a step off the board is an
    /// elimination, not a torus move.
    #[inline]
    pub fn step(self, from: Point) -> Point {
        match self {
            Direction::Up => Point::new(from.x, from.y - 1),
            Direction::Down => Point::new(from.x, from.y + 1),
            Direction::Left => Point::new(from.x - 1, from.y),
            Direction::Right => Point::new(from.x + 1, from.y),
        }
    }

    /// All four directions in a fixed order.
    pub const ALL: [Direction; 4] = [
        Direction::Up,
        Direction::Down,
        Direction::Left,
        Direction::Right,
    ];
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_moves_one_cell() {
        let origin = Point::new(5, 5);
        assert_eq!(Direction::Up.step(origin), Point::new(5, 4));
        assert_eq!(Direction::Down.step(origin), Point::new(5, 6));
        assert_eq!(Direction::Left.step(origin), Point::new(4, 5));
        assert_eq!(Direction::Right.step(origin), Point::new(6, 5));
    }

    #[test]
    fn test_in_bounds() {
        assert!(Point::new(0, 0).in_bounds(40, 30));
        assert!(Point::new(39, 29).in_bounds(40, 30));
        assert!(!Point::new(40, 0).in_bounds(40, 30));
        assert!(!Point::new(0, 30).in_bounds(40, 30));
        assert!(!Point::new(-1, 5).in_bounds(40, 30));
        assert!(!Point::new(5, -1).in_bounds(40, 30));
    }

    #[test]
    fn test_direction_wire_format() {
        let json = serde_json::to_string(&Direction::Left).unwrap();
        assert_eq!(json, "\"LEFT\"");
        let parsed: Direction = serde_json::from_str("\"DOWN\"").unwrap();
        assert_eq!(parsed, Direction::Down);
    }
}
