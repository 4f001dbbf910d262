//! Player intents.
//!
//! Each variant maps 1:1 to a server action handler. Connect and disconnect
//! are not intents; they follow the reliable connection lifecycle.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::{entity::EntityId, math::Vec2};

/// Client -> server request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Intent {
    Move { target: Vec2 },
    MoveKeys(KeyState),
    Attack { target: EntityId },
    Cancel,
    StatUpdate(StatPatch),
}

/// Raw directional key payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct KeyState {
    pub left: bool,
    pub right: bool,
    pub up: bool,
    pub down: bool,
}

bitflags! {
    /// Pressed directions.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Direction: u8 {
        const LEFT = 1 << 0;
        const RIGHT = 1 << 1;
        const UP = 1 << 2;
        const DOWN = 1 << 3;
    }
}

impl From<KeyState> for Direction {
    fn from(keys: KeyState) -> Self {
        let mut dir = Direction::empty();
        dir.set(Direction::LEFT, keys.left);
        dir.set(Direction::RIGHT, keys.right);
        dir.set(Direction::UP, keys.up);
        dir.set(Direction::DOWN, keys.down);
        dir
    }
}

impl From<Direction> for KeyState {
    fn from(dir: Direction) -> Self {
        KeyState {
            left: dir.contains(Direction::LEFT),
            right: dir.contains(Direction::RIGHT),
            up: dir.contains(Direction::UP),
            down: dir.contains(Direction::DOWN),
        }
    }
}

impl Direction {
    /// One discrete step of `step` per axis. Opposing keys cancel their axis.
    ///
    /// Returns `None` when the pressed keys produce no movement.
    pub fn offset(self, step: f32) -> Option<(f32, f32)> {
        let axis = |neg: Direction, pos: Direction| {
            match (self.contains(neg), self.contains(pos)) {
                (false, true) => step,
                (true, false) => -step,
                (true, true) | (false, false) => 0.0,
            }
        };
        let dx = axis(Direction::LEFT, Direction::RIGHT);
        let dy = axis(Direction::UP, Direction::DOWN);
        if dx == 0.0 && dy == 0.0 {
            None
        } else {
            Some((dx, dy))
        }
    }
}

/// Attribute patch for the stat-update intent. Absent fields stay untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatPatch {
    pub name: Option<String>,
    pub color: Option<u32>,
    pub level: Option<u32>,
    pub hp: Option<i32>,
    pub max_hp: Option<i32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(left: bool, right: bool, up: bool, down: bool) -> Direction {
        KeyState {
            left,
            right,
            up,
            down,
        }
        .into()
    }

    #[test]
    fn single_keys_step_one_unit() {
        assert_eq!(keys(false, true, false, false).offset(16.0), Some((16.0, 0.0)));
        assert_eq!(keys(true, false, false, false).offset(16.0), Some((-16.0, 0.0)));
        assert_eq!(keys(false, false, true, false).offset(16.0), Some((0.0, -16.0)));
        assert_eq!(keys(false, false, false, true).offset(16.0), Some((0.0, 16.0)));
        assert_eq!(keys(false, true, false, true).offset(16.0), Some((16.0, 16.0)));
    }

    #[test]
    fn opposing_keys_cancel() {
        assert_eq!(keys(true, true, false, false).offset(16.0), None);
        assert_eq!(keys(false, false, true, true).offset(16.0), None);
        assert_eq!(keys(true, true, false, true).offset(16.0), Some((0.0, 16.0)));
        assert_eq!(Direction::empty().offset(16.0), None);
    }

    #[test]
    fn intent_wire_shape() {
        let json = serde_json::to_string(&Intent::Attack {
            target: EntityId(9),
        })
        .unwrap();
        assert_eq!(json, r#"{"kind":"attack","target":9}"#);

        let patch: Intent =
            serde_json::from_str(r#"{"kind":"stat_update","level":3}"#).unwrap();
        assert_eq!(
            patch,
            Intent::StatUpdate(StatPatch {
                level: Some(3),
                ..Default::default()
            })
        );
    }
}
