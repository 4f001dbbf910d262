//! Simulation: the single owner of world state.
//!
//! The driver feeds it three kinds of input, one at a time:
//! - intents, applied immediately in arrival order ([`Simulation::apply_intent`])
//! - clock updates, which fire due deferred transitions
//! - ticks, which run the movement integrator and yield a snapshot
//!
//! Nothing here performs IO or waits, so every call is atomic with respect to
//! the tick.

use std::time::Duration;

use arena_shared::{
    config::Rules,
    dice::Dice,
    entity::EntityId,
    intent::Intent,
    net::Snapshot,
};

use crate::{
    events::GameEvent,
    transitions::{Deferred, DeferredTransitions},
    world::WorldState,
};

pub struct Simulation {
    pub(crate) world: WorldState,
    pub(crate) transitions: DeferredTransitions,
    pub(crate) rules: Rules,
    pub(crate) dice: Box<dyn Dice>,
    pub(crate) events: Vec<GameEvent>,
    now: Duration,
    tick: u32,
}

impl Simulation {
    pub fn new(rules: Rules, dice: Box<dyn Dice>) -> Self {
        Self {
            world: WorldState::new(),
            transitions: DeferredTransitions::new(),
            rules,
            dice,
            events: Vec::new(),
            now: Duration::ZERO,
            tick: 0,
        }
    }

    pub fn world(&self) -> &WorldState {
        &self.world
    }

    pub fn rules(&self) -> &Rules {
        &self.rules
    }

    /// Simulation time since start.
    pub fn now(&self) -> Duration {
        self.now
    }

    pub fn tick_count(&self) -> u32 {
        self.tick
    }

    /// Moves the clock forward to `now` and fires whatever became due.
    ///
    /// The clock never runs backwards; an older `now` is ignored.
    pub fn set_clock(&mut self, now: Duration) -> usize {
        if now > self.now {
            self.now = now;
        }
        self.run_due_transitions()
    }

    pub fn advance_clock(&mut self, dt: Duration) -> usize {
        self.set_clock(self.now + dt)
    }

    /// Earliest pending deferred transition, in simulation time.
    pub fn next_deadline(&self) -> Option<Duration> {
        self.transitions.next_deadline()
    }

    pub fn pending_transitions(&self) -> usize {
        self.transitions.len()
    }

    /// Fires deferred transitions due at the current time. Returns how many applied.
    pub fn run_due_transitions(&mut self) -> usize {
        let mut applied = 0;
        for scheduled in self.transitions.take_due(self.now) {
            let Some(entity) = self.world.get_mut(scheduled.entity) else {
                continue;
            };
            match scheduled.action {
                Deferred::Revert { epoch } => {
                    if entity.revert_transient(epoch) {
                        applied += 1;
                    }
                }
                Deferred::Respawn { epoch } => {
                    if entity.is_dead() && entity.epoch() == epoch {
                        entity.revive(self.rules.spawn);
                        self.events.push(GameEvent::Respawned {
                            id: scheduled.entity,
                        });
                        applied += 1;
                    }
                }
            }
        }
        applied
    }

    /// One fixed tick: due transitions, movement, snapshot.
    pub fn tick(&mut self) -> Snapshot {
        self.run_due_transitions();
        self.integrate();
        self.tick = self.tick.wrapping_add(1);
        self.world.snapshot(self.tick)
    }

    /// Routes an intent to its handler.
    pub fn apply_intent(&mut self, id: EntityId, intent: Intent) {
        match intent {
            Intent::Move { target } => self.set_move_target(id, target),
            Intent::MoveKeys(keys) => self.set_move_target_from_keys(id, keys),
            Intent::Attack { target } => self.attack(id, target),
            Intent::Cancel => self.cancel_move(id),
            Intent::StatUpdate(patch) => self.update_stats(id, patch),
        }
    }

    pub fn drain_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.events)
    }

    pub(crate) fn schedule(&mut self, id: EntityId, action: Deferred, after: Duration) {
        self.transitions.schedule(id, action, self.now + after);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arena_shared::{dice::ScriptedDice, entity::EntityState, math::Vec2};

    fn sim() -> Simulation {
        Simulation::new(Rules::default(), Box::new(ScriptedDice::default()))
    }

    #[test]
    fn clock_is_monotonic() {
        let mut s = sim();
        s.set_clock(Duration::from_millis(50));
        s.set_clock(Duration::from_millis(10));
        assert_eq!(s.now(), Duration::from_millis(50));
    }

    #[test]
    fn tick_advances_counter_and_snapshots() {
        let mut s = sim();
        s.create_entity(EntityId(1), Some("a"));
        let snap = s.tick();
        assert_eq!(snap.tick, 1);
        assert_eq!(snap.entities.len(), 1);
        assert_eq!(s.tick_count(), 1);
    }

    #[test]
    fn intents_dispatch_to_handlers() {
        let mut s = sim();
        s.create_entity(EntityId(1), None);
        let target = Vec2::new(400.0, 240.0);
        s.apply_intent(EntityId(1), Intent::Move { target });
        assert_eq!(s.world().get(EntityId(1)).unwrap().target_position, Some(target));
        s.apply_intent(EntityId(1), Intent::Cancel);
        assert_eq!(s.world().get(EntityId(1)).unwrap().target_position, None);
    }

    #[test]
    fn respawn_fires_when_enabled() {
        let rules = Rules {
            respawn_after_ms: Some(1000),
            ..Rules::default()
        };
        let mut s = Simulation::new(rules, Box::new(ScriptedDice::new([10, 16, 10, 16])));
        s.create_entity(EntityId(1), None);
        s.create_entity(EntityId(2), None);
        s.attack(EntityId(1), EntityId(2));
        s.set_clock(Duration::from_millis(300));
        s.attack(EntityId(1), EntityId(2));
        assert!(s.world().get(EntityId(2)).unwrap().is_dead());

        s.set_clock(Duration::from_millis(1200));
        assert!(s.world().get(EntityId(2)).unwrap().is_dead());
        s.set_clock(Duration::from_millis(1300));
        let revived = s.world().get(EntityId(2)).unwrap();
        assert_eq!(revived.state(), EntityState::Idle);
        assert_eq!(revived.hp, revived.max_hp);
        assert!(s.drain_events().contains(&GameEvent::Respawned { id: EntityId(2) }));
    }

    #[test]
    fn transitions_for_removed_entities_are_dropped() {
        let mut s = Simulation::new(Rules::default(), Box::new(ScriptedDice::new([10, 2])));
        s.create_entity(EntityId(1), None);
        s.create_entity(EntityId(2), None);
        s.attack(EntityId(1), EntityId(2));
        assert_eq!(s.pending_transitions(), 2);
        s.remove_entity(EntityId(1));
        s.remove_entity(EntityId(2));
        assert_eq!(s.set_clock(Duration::from_secs(1)), 0);
        assert_eq!(s.pending_transitions(), 0);
    }
}
