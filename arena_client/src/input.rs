//! Input handling.
//!
//! A windowed client would sample mouse clicks and keys here. This layer only
//! turns an already-decided [`LocalInput`] into the wire intent and seeds
//! local prediction for it.

use arena_shared::{
    config::Rules,
    entity::EntityId,
    intent::{Direction, Intent, KeyState, StatPatch},
    math::{distance, Vec2},
};

use crate::prediction::ClientView;

/// One player action, as decided by the local player.
#[derive(Debug, Clone, PartialEq)]
pub enum LocalInput {
    /// Click on the ground.
    MoveTo(Vec2),
    Keys(KeyState),
    /// Click on another entity.
    Attack(EntityId),
    Cancel,
    Stats(StatPatch),
}

impl LocalInput {
    pub fn to_intent(&self) -> Intent {
        match self {
            LocalInput::MoveTo(target) => Intent::Move { target: *target },
            LocalInput::Keys(keys) => Intent::MoveKeys(*keys),
            LocalInput::Attack(target) => Intent::Attack { target: *target },
            LocalInput::Cancel => Intent::Cancel,
            LocalInput::Stats(patch) => Intent::StatUpdate(patch.clone()),
        }
    }

    /// Updates the local entity's prediction the way the server will react
    /// to this input.
    pub fn seed_prediction(&self, view: &mut ClientView, rules: &Rules) {
        let local = view.local_id();
        let Some(me) = view.local_entity().cloned() else {
            return;
        };
        if me.is_dead() {
            return;
        }

        let seed = match self {
            LocalInput::MoveTo(target) => Some((*target, false)),
            LocalInput::Keys(keys) => Direction::from(*keys)
                .offset(rules.key_step)
                .map(|(dx, dy)| (me.position.offset(dx, dy), false)),
            LocalInput::Attack(target) => view
                .entity(*target)
                .filter(|enemy| *target != local && distance(me.position, enemy.position) > rules.attack_range)
                .map(|enemy| (enemy.position, true)),
            LocalInput::Cancel => {
                if let Some(p) = view.predictor_mut(local) {
                    p.abandon();
                }
                None
            }
            LocalInput::Stats(_) => None,
        };

        if let (Some((target, enemy)), Some(p)) = (seed, view.predictor_mut(local)) {
            p.predict(target, enemy);
        }
    }
}
