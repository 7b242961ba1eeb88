//! Client side of the reservation handshake
//!
//! `BeaconClient` is a plain state machine: transport events go in and the
//! next message to send (if any) comes out. The network driver lives in
//! `net::beacon_client`.

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::lobby::types::{generate_player_id, PlayerId, PlayerLobbyInfo};
use crate::net::protocol::{ClientMessage, ServerMessage};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    Connecting,
    Connected,
    ReservationRequested,
    ReservationGranted,
    ReservationDenied,
    InfoSubmitted,
    /// Transport failure or timeout before the handshake finished
    Failed,
}

/// One-shot reservation observer
///
/// Fires at most once. A receiver that has been dropped is ignored.
#[derive(Debug)]
pub struct ReservationCallback(Option<oneshot::Sender<bool>>);

impl ReservationCallback {
    pub fn new(sender: oneshot::Sender<bool>) -> Self {
        Self(Some(sender))
    }

    /// Deliver the outcome; returns false if it had already fired
    pub fn fire(&mut self, granted: bool) -> bool {
        match self.0.take() {
            Some(sender) => {
                if sender.send(granted).is_err() {
                    debug!("Beacon client: reservation observer already gone");
                }
                true
            }
            None => false,
        }
    }

    pub fn has_fired(&self) -> bool {
        self.0.is_none()
    }
}

/// Roster updates pushed to the UI side
pub type RosterObserver = mpsc::UnboundedSender<Vec<PlayerLobbyInfo>>;

pub struct BeaconClient {
    state: ClientState,
    pending_info: PlayerLobbyInfo,
    callback: ReservationCallback,
    roster_observer: Option<RosterObserver>,
    roster: Vec<PlayerLobbyInfo>,
}

impl BeaconClient {
    pub fn new(pending_info: PlayerLobbyInfo, on_reservation: oneshot::Sender<bool>) -> Self {
        Self {
            state: ClientState::Connecting,
            pending_info,
            callback: ReservationCallback::new(on_reservation),
            roster_observer: None,
            roster: Vec::new(),
        }
    }

    pub fn with_roster_observer(mut self, observer: RosterObserver) -> Self {
        self.roster_observer = Some(observer);
        self
    }

    /// Transport is up: ask for a slot
    pub fn on_connected(&mut self) -> Option<ClientMessage> {
        if self.state != ClientState::Connecting {
            warn!("Beacon client: connected event in state {:?}", self.state);
            return None;
        }
        self.state = ClientState::Connected;
        let player_id = self.pending_info.player_id;
        debug!("Beacon client: requesting reservation for player {}", player_id);
        self.state = ClientState::ReservationRequested;
        Some(ClientMessage::RequestReservation { player_id })
    }

    /// Transport failed; resolves a pending reservation as denied
    pub fn on_failure(&mut self, reason: &str) {
        if self.callback.fire(false) {
            warn!("Beacon client: connection failed before reservation: {}", reason);
            self.state = ClientState::Failed;
        } else {
            debug!("Beacon client: connection closed: {}", reason);
        }
    }

    /// Reservation deadline passed. Returns true if it ended the handshake.
    pub fn on_timeout(&mut self) -> bool {
        if !self.awaiting_reservation() {
            return false;
        }
        warn!("Beacon client: reservation timed out in state {:?}", self.state);
        self.callback.fire(false);
        self.state = ClientState::Failed;
        true
    }

    pub fn handle_message(&mut self, message: ServerMessage) -> Option<ClientMessage> {
        match message {
            ServerMessage::ReservationGranted => self.on_granted(),
            ServerMessage::ReservationDenied => {
                if self.state != ClientState::ReservationRequested {
                    warn!("Beacon client: unexpected denial in state {:?}", self.state);
                    return None;
                }
                info!("Beacon client: reservation denied");
                self.state = ClientState::ReservationDenied;
                self.callback.fire(false);
                None
            }
            ServerMessage::RosterUpdate(players) => {
                debug!("Beacon client: roster update with {} players", players.len());
                self.roster = players;
                if let Some(observer) = &self.roster_observer {
                    if observer.send(self.roster.clone()).is_err() {
                        debug!("Beacon client: roster observer gone");
                        self.roster_observer = None;
                    }
                }
                None
            }
        }
    }

    fn on_granted(&mut self) -> Option<ClientMessage> {
        if self.state != ClientState::ReservationRequested {
            warn!("Beacon client: unexpected grant in state {:?}", self.state);
            return None;
        }
        self.state = ClientState::ReservationGranted;
        self.callback.fire(true);

        if !self.pending_info.has_id() {
            self.pending_info.player_id = generate_player_id();
            debug!("Beacon client: generated player id {}", self.pending_info.player_id);
        }
        info!(
            "Beacon client: reservation granted, submitting player {}",
            self.pending_info.player_id
        );

        self.state = ClientState::InfoSubmitted;
        Some(ClientMessage::SubmitLobbyInfo(self.pending_info.clone()))
    }

    /// Leave message, available once the player is registered
    pub fn unregister(&self) -> Option<ClientMessage> {
        match self.state {
            ClientState::InfoSubmitted => Some(ClientMessage::Unregister {
                player_id: self.pending_info.player_id,
            }),
            _ => None,
        }
    }

    /// Still waiting for grant or deny
    pub fn awaiting_reservation(&self) -> bool {
        matches!(
            self.state,
            ClientState::Connecting | ClientState::Connected | ClientState::ReservationRequested
        )
    }

    pub fn state(&self) -> ClientState {
        self.state
    }

    pub fn player_id(&self) -> PlayerId {
        self.pending_info.player_id
    }

    pub fn roster(&self) -> &[PlayerLobbyInfo] {
        &self.roster
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(info: PlayerLobbyInfo) -> (BeaconClient, oneshot::Receiver<bool>) {
        let (tx, rx) = oneshot::channel();
        (BeaconClient::new(info, tx), rx)
    }

    #[test]
    fn test_connect_requests_reservation() {
        let (mut client, _rx) = client(PlayerLobbyInfo::new("A").with_id(5));
        assert_eq!(
            client.on_connected(),
            Some(ClientMessage::RequestReservation { player_id: 5 })
        );
        assert_eq!(client.state(), ClientState::ReservationRequested);
    }

    #[test]
    fn test_grant_submits_info() {
        let (mut client, mut rx) = client(PlayerLobbyInfo::new("A").with_id(5));
        client.on_connected();
        let reply = client.handle_message(ServerMessage::ReservationGranted);
        assert!(matches!(reply, Some(ClientMessage::SubmitLobbyInfo(info)) if info.player_id == 5));
        assert_eq!(client.state(), ClientState::InfoSubmitted);
        assert_eq!(rx.try_recv(), Ok(true));
    }

    #[test]
    fn test_grant_assigns_missing_id() {
        let (mut client, _rx) = client(PlayerLobbyInfo::new("A"));
        client.on_connected();
        match client.handle_message(ServerMessage::ReservationGranted) {
            Some(ClientMessage::SubmitLobbyInfo(info)) => assert!(info.player_id > 0),
            other => panic!("unexpected {:?}", other),
        }
        assert!(client.player_id() > 0);
    }

    #[test]
    fn test_denied_sends_nothing() {
        let (mut client, mut rx) = client(PlayerLobbyInfo::new("A").with_id(5));
        client.on_connected();
        assert!(client.handle_message(ServerMessage::ReservationDenied).is_none());
        assert_eq!(client.state(), ClientState::ReservationDenied);
        assert_eq!(rx.try_recv(), Ok(false));
        assert!(client.unregister().is_none());
    }

    #[test]
    fn test_failure_before_exchange() {
        let (mut client, mut rx) = client(PlayerLobbyInfo::new("A"));
        client.on_failure("connection refused");
        assert_eq!(client.state(), ClientState::Failed);
        assert_eq!(rx.try_recv(), Ok(false));
    }

    #[test]
    fn test_callback_fires_once() {
        let (mut client, mut rx) = client(PlayerLobbyInfo::new("A").with_id(1));
        client.on_connected();
        client.handle_message(ServerMessage::ReservationGranted);
        client.on_failure("closed");
        assert_eq!(rx.try_recv(), Ok(true));
        assert_eq!(client.state(), ClientState::InfoSubmitted);
    }

    #[test]
    fn test_dropped_receiver_is_ignored() {
        let (mut client, rx) = client(PlayerLobbyInfo::new("A").with_id(1));
        drop(rx);
        client.on_connected();
        assert!(client.handle_message(ServerMessage::ReservationGranted).is_some());
    }

    #[test]
    fn test_unexpected_grant_ignored() {
        let (mut client, mut rx) = client(PlayerLobbyInfo::new("A").with_id(1));
        assert!(client.handle_message(ServerMessage::ReservationGranted).is_none());
        assert_eq!(client.state(), ClientState::Connecting);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_timeout_only_while_waiting() {
        let (mut client, mut rx) = client(PlayerLobbyInfo::new("A").with_id(1));
        client.on_connected();
        assert!(client.on_timeout());
        assert_eq!(rx.try_recv(), Ok(false));
        assert!(!client.on_timeout());

        let (mut done, _rx) = self::client(PlayerLobbyInfo::new("B").with_id(2));
        done.on_connected();
        done.handle_message(ServerMessage::ReservationGranted);
        assert!(!done.on_timeout());
    }

    #[test]
    fn test_roster_forwarded() {
        let (tx, _rx) = oneshot::channel();
        let (roster_tx, mut roster_rx) = mpsc::unbounded_channel();
        let mut client = BeaconClient::new(PlayerLobbyInfo::new("A"), tx).with_roster_observer(roster_tx);
        client.handle_message(ServerMessage::RosterUpdate(vec![PlayerLobbyInfo::new("H").with_id(3)]));
        assert_eq!(roster_rx.try_recv().unwrap()[0].player_id, 3);
        assert_eq!(client.roster().len(), 1);
    }

    #[test]
    fn test_unregister_after_submit() {
        let (mut client, _rx) = client(PlayerLobbyInfo::new("A").with_id(9));
        client.on_connected();
        client.handle_message(ServerMessage::ReservationGranted);
        assert_eq!(client.unregister(), Some(ClientMessage::Unregister { player_id: 9 }));
    }
}
