//! Math types.
//!
//! This module intentionally stays small and deterministic.
//! Server integration and client prediction both move entities through
//! [`step_toward`], so the two sides advance by exactly the same rule.

use serde::{Deserialize, Serialize};

/// 2D vector / point in arena space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Self = Self { x: 0.0, y: 0.0 };

    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn len_sq(self) -> f32 {
        self.x * self.x + self.y * self.y
    }

    pub fn len(self) -> f32 {
        self.len_sq().sqrt()
    }

    pub fn offset(self, dx: f32, dy: f32) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }
}

impl std::ops::Sub for Vec2 {
    type Output = Vec2;

    fn sub(self, rhs: Self) -> Self::Output {
        Vec2::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl std::ops::Add for Vec2 {
    type Output = Vec2;

    fn add(self, rhs: Self) -> Self::Output {
        Vec2::new(self.x + rhs.x, self.y + rhs.y)
    }
}

/// Euclidean distance between two points.
pub fn distance(a: Vec2, b: Vec2) -> f32 {
    (b - a).len()
}

/// Moves `from` a fixed `speed` toward `to`.
///
/// The step length does not depend on the remaining distance; when the target
/// is at most one step away the target itself is returned, so repeated calls
/// never overshoot.
pub fn step_toward(from: Vec2, to: Vec2, speed: f32) -> Vec2 {
    let delta = to - from;
    let dist = delta.len();
    if dist <= speed || dist == 0.0 {
        return to;
    }
    let k = speed / dist;
    Vec2::new(from.x + delta.x * k, from.y + delta.y * k)
}

/// Coordinate equality within `epsilon` (distance, not per-axis).
pub fn approx_eq(a: Vec2, b: Vec2, epsilon: f32) -> bool {
    distance(a, b) <= epsilon
}
