//! `arena_shared`
//!
//! Shared libraries used by both client and server.
//!
//! Design goals:
//! - Deterministic movement: server integration and client prediction use
//!   the same step function and constants.
//! - Clear separation of concerns (math, dice, entity, intent, net, config).
//! - Traits at the seams that tests need to control (dice, rendering).
//! - No `unsafe`.

pub mod config;
pub mod dice;
pub mod entity;
pub mod intent;
pub mod math;
pub mod net;
pub mod render;

pub mod prelude {
    //! Commonly used exports.

    pub use crate::config::*;
    pub use crate::entity::*;
    pub use crate::intent::*;
    pub use crate::math::*;
    pub use crate::net::*;
}
