//! Artillery Server Library
//!
//! Destructible terrain and the lobby beacon for a multiplayer 2D
//! artillery game.
//!
//! # Features
//!
//! - `terrain` - Solidity grid, collision mesher and explosion controller (enabled by default)
//! - `lobby` - Reservation beacon, roster sync and session context (enabled by default)

pub mod config;
pub mod constants;
pub mod metrics;
pub mod util;

#[cfg(feature = "terrain")]
pub mod terrain;

#[cfg(feature = "lobby")]
pub mod lobby;

#[cfg(feature = "lobby")]
pub mod net;

#[cfg(feature = "lobby")]
pub mod session;
