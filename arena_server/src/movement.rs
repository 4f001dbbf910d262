//! Tick integrator.
//!
//! Moves every entity one constant-speed step toward its target. After each
//! pass, an entity has a target exactly when it is walking.

use arena_shared::{
    entity::{Entity, EntityState},
    math::{distance, step_toward},
};

use crate::simulation::Simulation;

impl Simulation {
    pub(crate) fn integrate(&mut self) {
        let speed = self.rules.move_speed;
        for entity in self.world.iter_mut() {
            integrate_entity(entity, speed);
        }
    }
}

/// Advances one entity by a single tick.
pub fn integrate_entity(entity: &mut Entity, speed: f32) {
    match entity.state() {
        EntityState::Dead => {
            entity.target_position = None;
            return;
        }
        EntityState::Idle
        | EntityState::Walk
        | EntityState::Attack
        | EntityState::Hurt
        | EntityState::Absorb => {}
    }

    match entity.target_position {
        Some(target) => {
            entity.set_state(EntityState::Walk);
            entity.position = step_toward(entity.position, target, speed);
            if distance(entity.position, target) < speed {
                entity.position = target;
                entity.target_position = None;
                entity.set_state(EntityState::Idle);
            }
        }
        None => {
            if entity.state() == EntityState::Walk {
                entity.set_state(EntityState::Idle);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arena_shared::{
        config::Rules,
        dice::ScriptedDice,
        entity::EntityId,
        intent::{Intent, KeyState},
        math::Vec2,
    };
    use std::time::Duration;

    fn walker(at: Vec2, to: Vec2) -> Entity {
        let mut e = Entity::spawn(EntityId(1), None, &Rules::default());
        e.position = at;
        e.target_position = Some(to);
        e
    }

    #[test]
    fn steps_at_constant_speed() {
        let mut e = walker(Vec2::new(0.0, 0.0), Vec2::new(100.0, 0.0));
        integrate_entity(&mut e, 4.0);
        assert_eq!(e.position, Vec2::new(4.0, 0.0));
        assert_eq!(e.state(), EntityState::Walk);
        integrate_entity(&mut e, 4.0);
        assert_eq!(e.position, Vec2::new(8.0, 0.0));
    }

    #[test]
    fn arrival_is_exact() {
        let mut e = walker(Vec2::new(0.0, 0.0), Vec2::new(10.0, 0.0));
        integrate_entity(&mut e, 4.0);
        assert_eq!(e.position, Vec2::new(4.0, 0.0));
        assert_eq!(e.state(), EntityState::Walk);
        // 8 is within one step of 10, so the second tick lands exactly.
        integrate_entity(&mut e, 4.0);
        assert_eq!(e.position, Vec2::new(10.0, 0.0));
        assert!(e.target_position.is_none());
        assert_eq!(e.state(), EntityState::Idle);
    }

    #[test]
    fn dead_entities_stay_put() {
        let mut e = walker(Vec2::new(0.0, 0.0), Vec2::new(10.0, 0.0));
        e.set_state(EntityState::Dead);
        integrate_entity(&mut e, 4.0);
        assert_eq!(e.position, Vec2::new(0.0, 0.0));
        assert!(e.target_position.is_none());
        assert!(e.is_dead());
    }

    #[test]
    fn transient_without_target_is_left_alone() {
        let mut e = Entity::spawn(EntityId(1), None, &Rules::default());
        e.set_state(EntityState::Hurt);
        integrate_entity(&mut e, 4.0);
        assert_eq!(e.state(), EntityState::Hurt);
    }

    #[test]
    fn target_iff_walking_after_every_tick() {
        let mut sim = Simulation::new(Rules::default(), Box::new(ScriptedDice::new([10, 2, 3])));
        for id in 1..=3 {
            sim.create_entity(EntityId(id), None);
        }
        let script: Vec<(u32, Intent)> = vec![
            (1, Intent::Move { target: Vec2::new(360.0, 240.0) }),
            (2, Intent::Attack { target: EntityId(3) }),
            (3, Intent::MoveKeys(KeyState { up: true, ..KeyState::default() })),
            (1, Intent::Cancel),
            (2, Intent::Move { target: Vec2::new(300.0, 200.0) }),
            (3, Intent::Attack { target: EntityId(2) }),
        ];
        let mut script = script.into_iter();
        for _ in 0..40 {
            if let Some((id, intent)) = script.next() {
                sim.apply_intent(EntityId(id), intent);
            }
            sim.advance_clock(Duration::from_millis(33));
            let snap = sim.tick();
            for e in &snap.entities {
                assert_eq!(
                    e.target_position.is_some(),
                    e.state() == EntityState::Walk,
                    "entity {} in {:?}",
                    e.id,
                    e.state()
                );
            }
        }
    }

    #[test]
    fn opposing_keys_do_not_move() {
        let mut sim = Simulation::new(Rules::default(), Box::new(ScriptedDice::default()));
        sim.create_entity(EntityId(1), None);
        let keys = KeyState {
            left: true,
            right: true,
            ..KeyState::default()
        };
        sim.apply_intent(EntityId(1), Intent::MoveKeys(keys));
        let snap = sim.tick();
        let e = snap.entity(EntityId(1)).unwrap();
        assert_eq!(e.position, Rules::default().spawn);
        assert_eq!(e.state(), EntityState::Idle);
    }
}
