//! Configuration system.
//!
//! Loads arena configuration from JSON strings/files. Every field has a
//! default, so a config file only needs the values it overrides.

use std::{path::Path, time::Duration};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::math::Vec2;

/// Root configuration shared by client/server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArenaConfig {
    /// Server listen address, e.g. `127.0.0.1:40000`.
    pub server_addr: String,
    /// Fixed simulation tick rate.
    pub tick_hz: u32,
    /// Client render/prediction frame rate.
    pub frame_hz: u32,
    /// Player name (client only).
    pub player_name: String,
    pub rules: Rules,
    pub prediction: PredictionLimits,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            server_addr: "127.0.0.1:40000".to_string(),
            tick_hz: 30,
            frame_hz: 60,
            player_name: "Player".to_string(),
            rules: Rules::default(),
            prediction: PredictionLimits::default(),
        }
    }
}

impl ArenaConfig {
    /// Parses config from JSON.
    pub fn from_json_str(s: &str) -> serde_json::Result<Self> {
        serde_json::from_str(s)
    }

    /// Reads and parses a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read config {}", path.display()))?;
        Self::from_json_str(&text).with_context(|| format!("parse config {}", path.display()))
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs_f32(1.0 / self.tick_hz.max(1) as f32)
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs_f32(1.0 / self.frame_hz.max(1) as f32)
    }

    /// Per-frame prediction parameters for this config's rules and rates.
    pub fn prediction_tuning(&self) -> PredictionTuning {
        PredictionTuning::for_rates(&self.rules, &self.prediction, self.tick_hz, self.frame_hz)
    }
}

/// Gameplay constants applied by the authoritative server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Rules {
    /// Distance covered per tick while walking.
    pub move_speed: f32,
    /// Offset applied per axis by a directional-key intent.
    pub key_step: f32,
    /// Maximum attacker/target distance for melee.
    pub attack_range: f32,
    /// Minimum d20 result that lands a hit.
    pub hit_roll: u32,
    pub hit_score: u32,
    pub kill_score: u32,
    /// How long attack/hurt/absorb last before reverting to idle.
    pub transient_ms: u64,
    pub max_hp: i32,
    pub spawn: Vec2,
    /// Revive dead entities after this delay. `None` keeps death terminal.
    pub respawn_after_ms: Option<u64>,
}

impl Default for Rules {
    fn default() -> Self {
        Self {
            move_speed: 4.0,
            key_step: 16.0,
            attack_range: 32.0,
            hit_roll: 4,
            hit_score: 1,
            kill_score: 5,
            transient_ms: 200,
            max_hp: 20,
            spawn: Vec2::new(320.0, 240.0),
            respawn_after_ms: None,
        }
    }
}

impl Rules {
    pub fn transient(&self) -> Duration {
        Duration::from_millis(self.transient_ms)
    }

    pub fn respawn_after(&self) -> Option<Duration> {
        self.respawn_after_ms.map(Duration::from_millis)
    }
}

/// Client-side prediction limits read from config.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PredictionLimits {
    /// Arrival radius when moving to a bare point.
    pub point_tolerance: f32,
    /// Frames a settled prediction may disagree with the server before it is dropped.
    pub retry_ceiling: u32,
    /// Distance under which predicted and authoritative positions count as equal.
    pub convergence_epsilon: f32,
}

impl Default for PredictionLimits {
    fn default() -> Self {
        Self {
            point_tolerance: 4.0,
            retry_ceiling: 30,
            convergence_epsilon: 0.5,
        }
    }
}

/// Prediction parameters in per-frame units.
///
/// Derived from [`Rules`] and the tick/frame rates so that a predicted entity
/// covers the same distance per second as the server moves it.
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionTuning {
    /// Distance covered per render frame.
    pub step: f32,
    pub point_tolerance: f32,
    /// Arrival radius when approaching an enemy; the server's attack range.
    pub enemy_tolerance: f32,
    pub retry_ceiling: u32,
    pub convergence_epsilon: f32,
}

impl PredictionTuning {
    pub fn for_rates(rules: &Rules, limits: &PredictionLimits, tick_hz: u32, frame_hz: u32) -> Self {
        Self {
            step: rules.move_speed * tick_hz.max(1) as f32 / frame_hz.max(1) as f32,
            point_tolerance: limits.point_tolerance,
            enemy_tolerance: rules.attack_range,
            retry_ceiling: limits.retry_ceiling,
            convergence_epsilon: limits.convergence_epsilon,
        }
    }
}
