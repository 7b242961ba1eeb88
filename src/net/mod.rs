//! Beacon transport
//!
//! Length-prefixed bincode frames over TCP, a host actor serving the lobby
//! and a client driver for the reservation handshake.

pub mod beacon_client;
pub mod beacon_host;
pub mod connection;
pub mod framing;
pub mod protocol;

pub use beacon_client::{spawn_beacon_client, BeaconClientEvents, BeaconClientHandle, ClientCommand};
pub use beacon_host::{BeaconError, BeaconHost, LobbySnapshot};
pub use protocol::{ClientMessage, ServerMessage};
