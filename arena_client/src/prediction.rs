//! Prediction and reconciliation.
//!
//! Snapshots arrive at the tick rate; frames render much faster. Each
//! rendered entity replays the server's own constant-speed step between
//! snapshots, and the local player's entity additionally runs ahead toward a
//! locally chosen target before the server has acknowledged it.
//!
//! A local prediction ends in one of two ways:
//! - it converges: the predicted position matches the authoritative one
//! - a watchdog gives up after `retry_ceiling` mismatching frames
//!
//! Either way the rendered position snaps to the server's.

use std::collections::BTreeMap;

use arena_shared::{
    config::PredictionTuning,
    entity::{Entity, EntityId},
    math::{approx_eq, distance, step_toward, Vec2},
    net::Snapshot,
    render::RenderedEntity,
};

/// Client-side shadow state for one rendered entity.
#[derive(Debug, Clone, PartialEq)]
pub struct Predictor {
    rendered: Vec2,
    client_target: Option<Vec2>,
    has_enemy_target: bool,
    convergence_attempts: u32,
    flip_x: bool,
}

impl Predictor {
    pub fn new(at: Vec2) -> Self {
        Self {
            rendered: at,
            client_target: None,
            has_enemy_target: false,
            convergence_attempts: 0,
            flip_x: false,
        }
    }

    pub fn rendered(&self) -> Vec2 {
        self.rendered
    }

    pub fn client_target(&self) -> Option<Vec2> {
        self.client_target
    }

    pub fn has_enemy_target(&self) -> bool {
        self.has_enemy_target
    }

    pub fn convergence_attempts(&self) -> u32 {
        self.convergence_attempts
    }

    pub fn flip_x(&self) -> bool {
        self.flip_x
    }

    /// Starts predicting a move toward `target`. `enemy` widens the arrival tolerance.
    pub fn predict(&mut self, target: Vec2, enemy: bool) {
        self.client_target = Some(target);
        self.has_enemy_target = enemy;
        self.convergence_attempts = 0;
    }

    /// Drops any local prediction.
    pub fn abandon(&mut self) {
        self.client_target = None;
        self.has_enemy_target = false;
        self.convergence_attempts = 0;
    }

    /// Advances one render frame against the latest authoritative state.
    pub fn frame(&mut self, auth: &Entity, tuning: &PredictionTuning) -> Vec2 {
        if auth.is_dead() {
            self.abandon();
            self.rendered = auth.position;
            return self.rendered;
        }

        match self.client_target {
            Some(target) => self.frame_local(target, auth.position, tuning),
            None => self.frame_replay(auth, tuning),
        }
        self.rendered
    }

    fn frame_local(&mut self, target: Vec2, server: Vec2, tuning: &PredictionTuning) {
        self.face(target.x - self.rendered.x);
        let tentative = step_toward(self.rendered, target, tuning.step);
        let tolerance = if self.has_enemy_target {
            tuning.enemy_tolerance
        } else {
            tuning.point_tolerance
        };

        if distance(tentative, target) > tolerance {
            self.rendered = tentative;
            return;
        }

        if approx_eq(tentative, server, tuning.convergence_epsilon) {
            self.abandon();
            self.rendered = server;
            return;
        }

        self.convergence_attempts += 1;
        if self.convergence_attempts > tuning.retry_ceiling {
            tracing::debug!(
                attempts = self.convergence_attempts,
                "Prediction did not converge, snapping to server"
            );
            self.abandon();
            self.rendered = server;
        } else {
            self.rendered = tentative;
        }
    }

    fn frame_replay(&mut self, auth: &Entity, tuning: &PredictionTuning) {
        let Some(target) = auth.target_position else {
            self.rendered = auth.position;
            return;
        };
        self.face(target.x - auth.position.x);
        let stepped = step_toward(self.rendered, target, tuning.step);
        // Never render behind the server.
        self.rendered = if distance(auth.position, target) <= distance(stepped, target) {
            auth.position
        } else {
            stepped
        };
    }

    fn face(&mut self, dx: f32) {
        if dx < 0.0 {
            self.flip_x = true;
        } else if dx > 0.0 {
            self.flip_x = false;
        }
    }
}

/// Everything the client knows about the world, plus per-entity prediction.
#[derive(Debug)]
pub struct ClientView {
    local: EntityId,
    entries: BTreeMap<EntityId, (Entity, Predictor)>,
    last_tick: Option<u32>,
}

impl ClientView {
    pub fn new(local: EntityId) -> Self {
        Self {
            local,
            entries: BTreeMap::new(),
            last_tick: None,
        }
    }

    pub fn local_id(&self) -> EntityId {
        self.local
    }

    /// Latest authoritative state of an entity.
    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.entries.get(&id).map(|(e, _)| e)
    }

    pub fn local_entity(&self) -> Option<&Entity> {
        self.entity(self.local)
    }

    pub fn predictor(&self, id: EntityId) -> Option<&Predictor> {
        self.entries.get(&id).map(|(_, p)| p)
    }

    pub fn predictor_mut(&mut self, id: EntityId) -> Option<&mut Predictor> {
        self.entries.get_mut(&id).map(|(_, p)| p)
    }

    /// Ids of every known entity, ascending.
    pub fn ids(&self) -> Vec<EntityId> {
        self.entries.keys().copied().collect()
    }

    pub fn last_tick(&self) -> Option<u32> {
        self.last_tick
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Applies a snapshot. Returns `false` if it is older than one already seen.
    ///
    /// Known entities are updated in place so their prediction state survives;
    /// entities missing from the snapshot are dropped.
    pub fn apply_snapshot(&mut self, snap: &Snapshot) -> bool {
        if self.last_tick.is_some_and(|t| snap.tick <= t) {
            return false;
        }
        self.last_tick = Some(snap.tick);

        self.entries
            .retain(|id, _| snap.entities.iter().any(|e| e.id == *id));
        for entity in &snap.entities {
            match self.entries.get_mut(&entity.id) {
                Some((known, _)) => *known = entity.clone(),
                None => {
                    let predictor = Predictor::new(entity.position);
                    self.entries.insert(entity.id, (entity.clone(), predictor));
                }
            }
        }
        true
    }

    /// Handles a removal notice.
    pub fn remove(&mut self, id: EntityId) -> bool {
        self.entries.remove(&id).is_some()
    }

    /// Runs one prediction frame for every entity and returns what to draw.
    pub fn frame(&mut self, tuning: &PredictionTuning) -> Vec<RenderedEntity> {
        let local = self.local;
        self.entries
            .iter_mut()
            .map(|(id, (entity, predictor))| {
                let position = predictor.frame(entity, tuning);
                RenderedEntity {
                    id: *id,
                    name: entity.name.clone(),
                    color: entity.color,
                    position,
                    flip_x: predictor.flip_x(),
                    state: entity.state(),
                    hp: entity.hp,
                    max_hp: entity.max_hp,
                    depth: position.y,
                    is_local: *id == local,
                }
            })
            .collect()
    }
}
