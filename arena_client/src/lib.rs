//! `arena_client`
//!
//! Client-side systems:
//! - Connection management (reliable + unreliable channels)
//! - Local input to intents
//! - Prediction and reconciliation against server snapshots
//! - Rendering abstraction wiring

pub mod client;
pub mod input;
pub mod prediction;

pub use client::GameClient;
