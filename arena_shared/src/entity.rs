//! Entity model.
//!
//! One [`Entity`] per connected player. All fields are replicated in
//! snapshots except the state epoch, which only the server uses to guard
//! deferred transitions.

use std::sync::atomic::{AtomicU32, Ordering};

use serde::{Deserialize, Serialize};

use crate::{config::Rules, math::Vec2};

static NEXT_ENTITY_ID: AtomicU32 = AtomicU32::new(1);

/// Longest display name kept after trimming.
pub const MAX_NAME_LEN: usize = 24;

pub const DEFAULT_NAME: &str = "Player";

/// Tints handed out to new entities.
pub const PALETTE: [u32; 8] = [
    0xe6194b, 0x3cb44b, 0xffe119, 0x4363d8, 0xf58231, 0x911eb4, 0x46f0f0, 0xf032e6,
];

/// Opaque entity id. Doubles as the connection id of the owning client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub u32);

impl EntityId {
    pub fn new_unique() -> Self {
        EntityId(NEXT_ENTITY_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl std::str::FromStr for EntityId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim_start_matches('#').parse().map(EntityId)
    }
}

/// Animation/combat state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityState {
    #[default]
    Idle,
    Walk,
    Attack,
    Hurt,
    Dead,
    Absorb,
}

impl EntityState {
    /// States entered by an action that revert to idle on their own.
    pub fn is_transient(self) -> bool {
        match self {
            EntityState::Attack | EntityState::Hurt | EntityState::Absorb => true,
            EntityState::Idle | EntityState::Walk | EntityState::Dead => false,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EntityState::Idle => "idle",
            EntityState::Walk => "walk",
            EntityState::Attack => "attack",
            EntityState::Hurt => "hurt",
            EntityState::Dead => "dead",
            EntityState::Absorb => "absorb",
        }
    }
}

/// Normalizes a client-supplied display name.
///
/// Blank or missing names fall back to [`DEFAULT_NAME`].
pub fn sanitize_name(name: Option<&str>) -> String {
    let trimmed = name.map(str::trim).unwrap_or_default();
    if trimmed.is_empty() {
        return DEFAULT_NAME.to_string();
    }
    trimmed.chars().take(MAX_NAME_LEN).collect()
}

/// Authoritative player record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: EntityId,
    pub name: String,
    pub color: u32,
    pub level: u32,
    pub position: Vec2,
    /// Present iff a move is in progress.
    pub target_position: Option<Vec2>,
    pub hp: i32,
    pub max_hp: i32,
    state: EntityState,
    score: u32,
    #[serde(skip)]
    epoch: u64,
}

impl Entity {
    /// Creates a freshly connected entity at the spawn point.
    pub fn spawn(id: EntityId, name: Option<&str>, rules: &Rules) -> Self {
        Self {
            id,
            name: sanitize_name(name),
            color: PALETTE[id.0 as usize % PALETTE.len()],
            level: 1,
            position: rules.spawn,
            target_position: None,
            hp: rules.max_hp,
            max_hp: rules.max_hp,
            state: EntityState::Idle,
            score: 0,
            epoch: 0,
        }
    }

    pub fn state(&self) -> EntityState {
        self.state
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    /// Identifies the current state entry; changes whenever a new one opens.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn is_dead(&self) -> bool {
        self.state == EntityState::Dead
    }

    /// Moves to `state` and returns the epoch of that entry.
    ///
    /// Re-asserting the current idle/walk state keeps the epoch; any other
    /// change, and every entry into a transient state, opens a new one.
    pub fn set_state(&mut self, state: EntityState) -> u64 {
        if state != self.state || state.is_transient() {
            self.state = state;
            self.epoch += 1;
        }
        self.epoch
    }

    /// Reverts a transient state to idle if `epoch` is still current.
    pub fn revert_transient(&mut self, epoch: u64) -> bool {
        if self.epoch != epoch || !self.state.is_transient() {
            return false;
        }
        self.set_state(EntityState::Idle);
        true
    }

    /// Restores hp, clamped to `max_hp`.
    pub fn heal(&mut self, amount: i32) {
        self.hp = self.hp.saturating_add(amount).min(self.max_hp);
    }

    /// Subtracts hp without a lower bound. Returns whether the entity is still alive.
    pub fn apply_damage(&mut self, amount: i32) -> bool {
        self.hp = self.hp.saturating_sub(amount);
        self.hp > 0
    }

    pub fn add_score(&mut self, amount: u32) {
        self.score = self.score.saturating_add(amount);
    }

    /// Sets `max_hp`, pulling `hp` down with it if needed.
    pub fn set_max_hp(&mut self, max_hp: i32) {
        self.max_hp = max_hp;
        self.hp = self.hp.min(max_hp);
    }

    /// Brings a dead entity back at `at` with full hp. Score is kept.
    pub fn revive(&mut self, at: Vec2) {
        self.position = at;
        self.target_position = None;
        self.hp = self.max_hp;
        self.set_state(EntityState::Idle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entity() -> Entity {
        Entity::spawn(EntityId(3), Some("ann"), &Rules::default())
    }

    #[test]
    fn spawn_defaults() {
        let e = entity();
        assert_eq!(e.name, "ann");
        assert_eq!(e.state(), EntityState::Idle);
        assert_eq!(e.hp, e.max_hp);
        assert_eq!(e.score(), 0);
        assert_eq!(e.level, 1);
        assert_eq!(e.position, Rules::default().spawn);
        assert!(e.target_position.is_none());
    }

    #[test]
    fn names_are_normalized() {
        assert_eq!(sanitize_name(None), DEFAULT_NAME);
        assert_eq!(sanitize_name(Some("   ")), DEFAULT_NAME);
        assert_eq!(sanitize_name(Some("  bob ")), "bob");
        assert_eq!(sanitize_name(Some("x".repeat(40).as_str())).len(), MAX_NAME_LEN);
    }

    #[test]
    fn heal_is_clamped_damage_is_not() {
        let mut e = entity();
        e.heal(5);
        assert_eq!(e.hp, e.max_hp);
        assert!(!e.apply_damage(e.max_hp + 3));
        assert_eq!(e.hp, -3);
    }

    #[test]
    fn revert_only_applies_to_current_epoch() {
        let mut e = entity();
        let first = e.set_state(EntityState::Hurt);
        let second = e.set_state(EntityState::Hurt);
        assert_ne!(first, second);
        assert!(!e.revert_transient(first));
        assert_eq!(e.state(), EntityState::Hurt);
        assert!(e.revert_transient(second));
        assert_eq!(e.state(), EntityState::Idle);
    }

    #[test]
    fn revert_never_leaves_dead() {
        let mut e = entity();
        let epoch = e.set_state(EntityState::Dead);
        assert!(!e.revert_transient(epoch));
        assert!(e.is_dead());
    }

    #[test]
    fn reasserting_walk_keeps_epoch() {
        let mut e = entity();
        let a = e.set_state(EntityState::Walk);
        let b = e.set_state(EntityState::Walk);
        assert_eq!(a, b);
    }

    #[test]
    fn snapshot_json_uses_lowercase_state_and_skips_epoch() {
        let mut e = entity();
        e.set_state(EntityState::Absorb);
        let json = serde_json::to_string(&e).unwrap();
        assert!(json.contains(r#""state":"absorb""#));
        assert!(!json.contains("epoch"));
        let back: Entity = serde_json::from_str(&json).unwrap();
        assert_eq!(back.state(), EntityState::Absorb);
        assert_eq!(back.epoch(), 0);
    }
}
