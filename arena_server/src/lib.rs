//! `arena_server`
//!
//! Server-side systems:
//! - World state and the action handlers that mutate it
//! - Deferred transient-state reverts, keyed by entity epoch
//! - Fixed timestep movement integrator
//! - Snapshot broadcast after every tick
//!
//! Networking model:
//! - TCP: handshake/control plane
//! - UDP: gameplay plane (intents/snapshots)

pub mod actions;
pub mod events;
pub mod movement;
pub mod notifier;
pub mod server;
pub mod simulation;
pub mod transitions;
pub mod world;

pub use server::GameServer;
pub use simulation::Simulation;
