//! Action handlers.
//!
//! Every handler is a silent no-op when an id is unknown or the entity's
//! state rules the action out. Outcomes land in the event log.

use arena_shared::{
    entity::{sanitize_name, EntityId, EntityState},
    intent::{Direction, KeyState, StatPatch},
    math::{distance, Vec2},
};

use crate::{events::GameEvent, simulation::Simulation, transitions::Deferred};

pub const MAX_LEVEL: u32 = 99;
pub const MAX_HP_CEILING: i32 = 999;

impl Simulation {
    pub fn create_entity(&mut self, id: EntityId, name: Option<&str>) {
        if self.world.create(id, name, &self.rules) {
            self.events.push(GameEvent::Spawned { id });
        }
    }

    pub fn remove_entity(&mut self, id: EntityId) {
        if self.world.remove(id).is_some() {
            self.events.push(GameEvent::Removed { id });
        }
    }

    pub fn set_move_target(&mut self, id: EntityId, position: Vec2) {
        let Some(entity) = self.world.get_mut(id) else {
            tracing::debug!(entity = %id, "Move for unknown entity");
            return;
        };
        if entity.is_dead() {
            return;
        }
        entity.target_position = Some(position);
    }

    /// One discrete key step from the current position.
    pub fn set_move_target_from_keys(&mut self, id: EntityId, keys: KeyState) {
        let Some((dx, dy)) = Direction::from(keys).offset(self.rules.key_step) else {
            return;
        };
        let Some(position) = self.world.get(id).map(|e| e.position) else {
            return;
        };
        self.set_move_target(id, position.offset(dx, dy));
    }

    pub fn cancel_move(&mut self, id: EntityId) {
        if let Some(entity) = self.world.get_mut(id) {
            entity.target_position = None;
        }
    }

    pub fn update_stats(&mut self, id: EntityId, patch: StatPatch) {
        let Some(entity) = self.world.get_mut(id) else {
            return;
        };
        if let Some(name) = patch.name.as_deref() {
            if !name.trim().is_empty() {
                entity.name = sanitize_name(Some(name));
            }
        }
        if let Some(color) = patch.color {
            entity.color = color & 0x00ff_ffff;
        }
        if let Some(level) = patch.level {
            entity.level = level.clamp(1, MAX_LEVEL);
        }
        if let Some(max_hp) = patch.max_hp {
            entity.set_max_hp(max_hp.clamp(1, MAX_HP_CEILING));
        }
        if let Some(hp) = patch.hp {
            if !entity.is_dead() {
                entity.hp = hp.clamp(1, entity.max_hp);
            }
        }
    }

    pub fn attack(&mut self, attacker: EntityId, target: EntityId) {
        let transient = self.rules.transient();
        let range = self.rules.attack_range;
        let Some((atk, tgt)) = self.world.pair_mut(attacker, target) else {
            return;
        };
        match atk.state() {
            EntityState::Dead | EntityState::Attack => return,
            EntityState::Idle | EntityState::Walk | EntityState::Hurt | EntityState::Absorb => {}
        }

        if distance(atk.position, tgt.position) > range {
            atk.target_position = Some(tgt.position);
            self.events.push(GameEvent::Chased { attacker, target });
            return;
        }

        if tgt.is_dead() {
            let epoch = atk.set_state(EntityState::Absorb);
            atk.heal(1);
            self.events.push(GameEvent::Absorbed {
                attacker,
                corpse: target,
            });
            self.schedule(attacker, Deferred::Revert { epoch }, transient);
            return;
        }

        let roll = self.dice.throw(1, 20);
        if roll < self.rules.hit_roll {
            self.events.push(GameEvent::Missed {
                attacker,
                target,
                roll,
            });
            return;
        }

        let attack_epoch = atk.set_state(EntityState::Attack);
        let damage = self.dice.throw(2, 8);
        let alive = tgt.apply_damage(damage as i32);
        let mut deferred = vec![(attacker, Deferred::Revert { epoch: attack_epoch }, transient)];
        if alive {
            let hurt_epoch = tgt.set_state(EntityState::Hurt);
            atk.add_score(self.rules.hit_score);
            deferred.push((target, Deferred::Revert { epoch: hurt_epoch }, transient));
            self.events.push(GameEvent::Hit {
                attacker,
                target,
                damage,
                hp_left: tgt.hp,
            });
        } else {
            let dead_epoch = tgt.set_state(EntityState::Dead);
            tgt.target_position = None;
            atk.add_score(self.rules.kill_score);
            if let Some(after) = self.rules.respawn_after() {
                deferred.push((target, Deferred::Respawn { epoch: dead_epoch }, after));
            }
            self.events.push(GameEvent::Killed {
                attacker,
                target,
                damage,
            });
        }
        for (id, action, after) in deferred {
            self.schedule(id, action, after);
        }
    }

    /// Revives a dead entity at the spawn point. Score is kept.
    pub fn respawn(&mut self, id: EntityId) -> bool {
        let spawn = self.rules.spawn;
        let Some(entity) = self.world.get_mut(id) else {
            return false;
        };
        if !entity.is_dead() {
            return false;
        }
        entity.revive(spawn);
        self.events.push(GameEvent::Respawned { id });
        true
    }
}
