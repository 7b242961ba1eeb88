//! Lobby reservation and roster synchronization
//!
//! Host-side slot accounting and roster, plus the client handshake state
//! machine. Neither side touches sockets; see `net` for the transport.

pub mod client;
pub mod host;
pub mod reservation;
pub mod roster;
pub mod types;

pub use client::{BeaconClient, ClientState};
pub use host::{HostSettings, LobbyHost, OutboundBatch};
pub use reservation::{ReservationError, SlotLedger};
pub use roster::Roster;
pub use types::{generate_player_id, PlayerId, PlayerLobbyInfo};
