//! Gameplay events.
//!
//! Handlers record what they resolved; the driver drains the log after each
//! pass and traces it. Tests use it to assert outcomes without scraping state.

use arena_shared::entity::EntityId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameEvent {
    Spawned {
        id: EntityId,
    },
    Removed {
        id: EntityId,
    },
    /// Target out of range; attacker now walks toward it.
    Chased {
        attacker: EntityId,
        target: EntityId,
    },
    Missed {
        attacker: EntityId,
        target: EntityId,
        roll: u32,
    },
    Hit {
        attacker: EntityId,
        target: EntityId,
        damage: u32,
        hp_left: i32,
    },
    Killed {
        attacker: EntityId,
        target: EntityId,
        damage: u32,
    },
    Absorbed {
        attacker: EntityId,
        corpse: EntityId,
    },
    Respawned {
        id: EntityId,
    },
}

impl GameEvent {
    /// Logs the event at the level its kind deserves.
    pub fn trace(&self) {
        match self {
            GameEvent::Spawned { id } => tracing::debug!(entity = %id, "Entity spawned"),
            GameEvent::Removed { id } => tracing::debug!(entity = %id, "Entity removed"),
            GameEvent::Killed {
                attacker,
                target,
                damage,
            } => tracing::info!(%attacker, %target, damage, "Kill"),
            GameEvent::Respawned { id } => tracing::info!(entity = %id, "Entity respawned"),
            GameEvent::Chased { attacker, target } => {
                tracing::debug!(%attacker, %target, "Out of range, chasing")
            }
            GameEvent::Missed {
                attacker,
                target,
                roll,
            } => tracing::debug!(%attacker, %target, roll, "Miss"),
            GameEvent::Hit {
                attacker,
                target,
                damage,
                hp_left,
            } => tracing::debug!(%attacker, %target, damage, hp_left, "Hit"),
            GameEvent::Absorbed { attacker, corpse } => {
                tracing::debug!(%attacker, %corpse, "Absorb")
            }
        }
    }
}
