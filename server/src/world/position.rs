//! Positions on an area plane.

use std::fmt;

/// Point on an area plane.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Returns the distance to the other position.
    pub fn distance(&self, other: &Position) -> f64 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        (dx * dx + dy * dy).sqrt()
    }

    /// Returns the position reached after moving at most `step` towards
    /// `target`. Never overshoots the target.
    pub fn step_toward(&self, target: &Position, step: f64) -> Position {
        let distance = self.distance(target);
        if distance <= step || distance == 0.0 {
            return *target;
        }
        let scale = step / distance;
        Position {
            x: self.x + (target.x - self.x) * scale,
            y: self.y + (target.y - self.y) * scale,
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.x, self.y)
    }
}
