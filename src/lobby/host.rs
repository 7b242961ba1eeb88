//! Host side of the reservation and roster protocols
//!
//! `LobbyHost` holds no sockets. Every handler returns the messages to
//! send as (connection, message) pairs and the caller delivers them in
//! order. All mutation happens on one task, so handlers never interleave.
//!
//! Roster writes are tied to the connection that holds the reservation:
//! info is accepted only from a granted connection, and a connection may
//! only unregister the player id it submitted.

use std::collections::HashMap;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use smallvec::SmallVec;
use tracing::{debug, info, warn};

use crate::config::HostSlotPolicy;
use crate::lobby::reservation::{ReservationError, SlotLedger};
use crate::lobby::roster::{Roster, UpsertOutcome};
use crate::lobby::types::{PlayerId, PlayerLobbyInfo};
use crate::metrics::Metrics;
use crate::net::connection::ConnectionId;
use crate::net::protocol::{ClientMessage, ServerMessage};

/// Messages produced by one handler call
pub type OutboundBatch = SmallVec<[(ConnectionId, ServerMessage); 4]>;

/// Room parameters fixed at host-beacon creation
#[derive(Debug, Clone, Copy)]
pub struct HostSettings {
    pub max_slots: u32,
    pub room_unit_count: i32,
    pub slot_policy: HostSlotPolicy,
}

pub struct LobbyHost {
    ledger: SlotLedger,
    roster: Roster,
    clients: Vec<ConnectionId>,
    /// Granted connections and the player id each one has submitted
    grants: HashMap<ConnectionId, Option<PlayerId>>,
    accepting: bool,
    metrics: Option<Arc<Metrics>>,
}

impl LobbyHost {
    pub fn new(settings: HostSettings) -> Self {
        info!(
            "Lobby host: {} slots, {} units per player, {:?} host slot",
            settings.max_slots, settings.room_unit_count, settings.slot_policy
        );
        Self {
            ledger: SlotLedger::new(settings.max_slots, settings.slot_policy),
            roster: Roster::new(settings.room_unit_count),
            clients: Vec::new(),
            grants: HashMap::new(),
            accepting: true,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        metrics.slots_reserved.store(self.ledger.reserved() as u64, Ordering::Relaxed);
        self.metrics = Some(metrics);
        self
    }

    /// Stop granting reservations; later requests are denied as host-unavailable
    pub fn close(&mut self) {
        self.accepting = false;
    }

    /// Track a new connection and send it the current roster
    pub fn on_client_connected(&mut self, conn: ConnectionId) -> OutboundBatch {
        if !self.clients.contains(&conn) {
            self.clients.push(conn);
        }
        debug!("Lobby host: client {} connected ({} live)", conn, self.clients.len());

        let mut out = OutboundBatch::new();
        out.push((conn, ServerMessage::RosterUpdate(self.roster.players().to_vec())));
        out
    }

    /// Forget a connection. Slots and roster entries are left alone.
    pub fn on_client_disconnected(&mut self, conn: ConnectionId) {
        self.clients.retain(|&c| c != conn);
        self.grants.remove(&conn);
        debug!("Lobby host: client {} disconnected ({} live)", conn, self.clients.len());
    }

    pub fn handle_message(&mut self, conn: ConnectionId, message: ClientMessage) -> OutboundBatch {
        match message {
            ClientMessage::RequestReservation { player_id } => {
                let reply = if self.grants.contains_key(&conn) {
                    debug!("Lobby host: client {} already holds a slot", conn);
                    ServerMessage::ReservationGranted
                } else {
                    match self.request_reservation(player_id) {
                        Ok(_) => {
                            self.grants.insert(conn, None);
                            ServerMessage::ReservationGranted
                        }
                        Err(_) => ServerMessage::ReservationDenied,
                    }
                };
                let mut out = OutboundBatch::new();
                out.push((conn, reply));
                out
            }
            ClientMessage::SubmitLobbyInfo(info) => self.submit_from(conn, info),
            ClientMessage::Unregister { player_id } => self.unregister_from(conn, player_id),
        }
    }

    fn submit_from(&mut self, conn: ConnectionId, info: PlayerLobbyInfo) -> OutboundBatch {
        let player_id = info.player_id;
        match self.grants.get(&conn) {
            None => {
                warn!("Lobby host: client {} submitted player {} without a reservation", conn, player_id);
                return OutboundBatch::new();
            }
            Some(Some(bound)) if *bound != player_id => {
                warn!(
                    "Lobby host: client {} is player {}, ignoring info for player {}",
                    conn, bound, player_id
                );
                return OutboundBatch::new();
            }
            Some(_) => {}
        }

        let owned_elsewhere = self
            .grants
            .iter()
            .any(|(&other, &bound)| other != conn && bound == Some(player_id));
        if owned_elsewhere {
            warn!("Lobby host: client {} claimed player {} owned by another client", conn, player_id);
            return OutboundBatch::new();
        }

        self.grants.insert(conn, Some(player_id));
        self.register_or_update_player(info)
    }

    fn unregister_from(&mut self, conn: ConnectionId, player_id: PlayerId) -> OutboundBatch {
        if self.grants.get(&conn) != Some(&Some(player_id)) {
            warn!("Lobby host: client {} cannot unregister player {} it does not own", conn, player_id);
            return OutboundBatch::new();
        }
        self.grants.remove(&conn);
        self.unregister_player(player_id)
    }

    /// Try to reserve a slot for `player_id`
    pub fn request_reservation(&mut self, player_id: PlayerId) -> Result<u32, ReservationError> {
        let result = if self.accepting {
            self.ledger.try_reserve()
        } else {
            Err(ReservationError::HostUnavailable)
        };

        match &result {
            Ok(reserved) => {
                info!(
                    "Lobby host: reservation granted to player {} ({}/{})",
                    player_id,
                    reserved,
                    self.ledger.max()
                );
                if let Some(metrics) = &self.metrics {
                    metrics.reservations_granted.fetch_add(1, Ordering::Relaxed);
                    metrics.slots_reserved.store(*reserved as u64, Ordering::Relaxed);
                }
            }
            Err(e) => {
                info!("Lobby host: reservation denied to player {}: {}", player_id, e);
                if let Some(metrics) = &self.metrics {
                    metrics.reservations_denied.fetch_add(1, Ordering::Relaxed);
                }
            }
        }
        result
    }

    /// Upsert a roster entry with the room's unit count, then broadcast
    pub fn register_or_update_player(&mut self, info: PlayerLobbyInfo) -> OutboundBatch {
        let player_id = info.player_id;
        match self.roster.upsert(info) {
            UpsertOutcome::Inserted => info!("Lobby host: player {} joined the roster", player_id),
            UpsertOutcome::Updated => debug!("Lobby host: player {} updated", player_id),
        }
        self.broadcast()
    }

    /// Remove a player and release their slot; no-op for unknown ids
    pub fn unregister_player(&mut self, player_id: PlayerId) -> OutboundBatch {
        let removed = self.roster.remove(player_id);
        if removed == 0 {
            warn!("Lobby host: unregister for unknown player {}", player_id);
            return OutboundBatch::new();
        }

        let reserved = self.ledger.release();
        info!(
            "Lobby host: player {} left ({}/{})",
            player_id,
            reserved,
            self.ledger.max()
        );
        if let Some(metrics) = &self.metrics {
            metrics.slots_reserved.store(reserved as u64, Ordering::Relaxed);
        }
        self.broadcast()
    }

    /// Full roster to every live connection
    pub fn broadcast(&self) -> OutboundBatch {
        let targets: SmallVec<[ConnectionId; 8]> = self.clients.iter().copied().collect();
        let players = self.roster.players().to_vec();

        if let Some(metrics) = &self.metrics {
            metrics.roster_broadcasts.fetch_add(1, Ordering::Relaxed);
            metrics.roster_size.store(players.len() as u64, Ordering::Relaxed);
        }

        targets
            .into_iter()
            .map(|conn| (conn, ServerMessage::RosterUpdate(players.clone())))
            .collect()
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub fn reserved_slots(&self) -> u32 {
        self.ledger.reserved()
    }

    pub fn max_slots(&self) -> u32 {
        self.ledger.max()
    }

    pub fn client_count(&self) -> usize {
        self.clients.len()
    }
}
