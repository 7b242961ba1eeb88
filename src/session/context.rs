//! Per-process session state
//!
//! Owns the advertised session, the host beacon (when hosting), the local
//! beacon client and the in-flight connection guard. Lobby roster updates
//! are re-published on a broadcast channel for any number of listeners.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{broadcast, oneshot};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::ServerConfig;
use crate::constants::net::LOOPBACK_HOST;
use crate::lobby::host::HostSettings;
use crate::lobby::types::PlayerLobbyInfo;
use crate::metrics::Metrics;
use crate::net::beacon_client::{spawn_beacon_client, BeaconClientEvents, BeaconClientHandle};
use crate::net::beacon_host::{BeaconError, BeaconHost, LobbySnapshot};
use crate::session::directory::{DirectoryError, SessionDirectory, SessionInfo};
use crate::session::settings::SessionSettings;

/// Roster updates kept for slow subscribers
const LOBBY_UPDATE_CAPACITY: usize = 16;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("No active session")]
    NoSession,
    #[error("A session is already active")]
    AlreadyActive,
    #[error("Beacon connection already in progress")]
    ConnectInProgress,
    #[error("Search result {index} out of range ({count} results)")]
    InvalidIndex { index: usize, count: usize },
    #[error("Host beacon is not running")]
    NoHostBeacon,
    #[error(transparent)]
    Directory(#[from] DirectoryError),
    #[error(transparent)]
    Beacon(#[from] BeaconError),
}

#[derive(Default)]
struct ContextState {
    settings: Option<SessionSettings>,
    session_id: Option<Uuid>,
    host_beacon: Option<Arc<BeaconHost>>,
    client: Option<BeaconClientHandle>,
    connecting: bool,
    /// Bumped per beacon connection attempt and on teardown
    attempt: u64,
    search_results: Vec<SessionInfo>,
}

pub struct SessionContext {
    config: ServerConfig,
    directory: Arc<dyn SessionDirectory>,
    metrics: Arc<Metrics>,
    local_player: PlayerLobbyInfo,
    state: Arc<Mutex<ContextState>>,
    lobby_updates: broadcast::Sender<Vec<PlayerLobbyInfo>>,
    game_started: AtomicBool,
}

impl SessionContext {
    pub fn new(
        config: ServerConfig,
        directory: Arc<dyn SessionDirectory>,
        metrics: Arc<Metrics>,
        local_player: PlayerLobbyInfo,
    ) -> Self {
        let (lobby_updates, _) = broadcast::channel(LOBBY_UPDATE_CAPACITY);
        Self {
            config,
            directory,
            metrics,
            local_player,
            state: Arc::new(Mutex::new(ContextState::default())),
            lobby_updates,
            game_started: AtomicBool::new(false),
        }
    }

    /// Advertise a session, start the host beacon and join it as a client
    ///
    /// The returned receiver resolves with the host's own reservation result.
    pub async fn create_session(&self, settings: SessionSettings) -> Result<oneshot::Receiver<bool>, SessionError> {
        {
            let state = self.state.lock();
            if state.session_id.is_some() {
                return Err(SessionError::AlreadyActive);
            }
        }

        let session_id = self.directory.create_session(self.config.beacon_addr(), &settings)?;
        info!(
            "Created session '{}' ({}, {} slots, {} units)",
            settings.session_name,
            settings.game_mode,
            settings.max_players(),
            settings.unit_count
        );
        {
            let mut state = self.state.lock();
            state.settings = Some(settings);
            state.session_id = Some(session_id);
        }

        if let Err(e) = self.create_host_beacon().await {
            warn!("Failed to create host beacon: {}", e);
            let _ = self.directory.destroy_session(session_id);
            let mut state = self.state.lock();
            state.settings = None;
            state.session_id = None;
            return Err(e);
        }
        self.connect_host_as_client()
    }

    /// Start the host beacon for the current session; no-op if it is running
    pub async fn create_host_beacon(&self) -> Result<SocketAddr, SessionError> {
        let host_settings = {
            let state = self.state.lock();
            if let Some(host) = &state.host_beacon {
                debug!("Host beacon already running on {}", host.local_addr());
                return Ok(host.local_addr());
            }
            // Joined sessions carry settings too, but only an advertised session gets a beacon
            let settings = match (&state.session_id, &state.settings) {
                (Some(_), Some(settings)) => settings,
                _ => return Err(SessionError::NoSession),
            };
            HostSettings {
                max_slots: settings.max_players(),
                room_unit_count: settings.unit_count,
                slot_policy: self.config.host_slot_policy,
            }
        };

        let host = BeaconHost::bind(self.config.beacon_addr(), host_settings, self.metrics.clone()).await?;

        let mut state = self.state.lock();
        if let Some(existing) = &state.host_beacon {
            // Lost a race with a concurrent call; ours shuts down on drop
            return Ok(existing.local_addr());
        }
        let addr = host.local_addr();
        state.host_beacon = Some(Arc::new(host));
        Ok(addr)
    }

    /// Run the reservation handshake against this process's own host beacon
    pub fn connect_host_as_client(&self) -> Result<oneshot::Receiver<bool>, SessionError> {
        let (port, session_id) = {
            let state = self.state.lock();
            let host = state.host_beacon.as_ref().ok_or(SessionError::NoHostBeacon)?;
            (host.local_addr().port(), state.session_id)
        };
        let addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), port);
        debug!("Connecting host to its own beacon at {}", addr);
        self.connect_beacon(addr, session_id)
    }

    /// Search for sessions and keep the results for `join_session`
    pub fn find_sessions(&self, max_results: usize, lan: bool) -> Result<Vec<SessionInfo>, SessionError> {
        let results = self.directory.find_sessions(max_results, lan)?;
        info!("Found {} sessions", results.len());
        self.state.lock().search_results = results.clone();
        Ok(results)
    }

    /// Join a search result by index
    ///
    /// The host address comes from the directory, falling back to loopback
    /// when it cannot be resolved, and the port is always the beacon port.
    pub fn join_session(&self, index: usize) -> Result<oneshot::Receiver<bool>, SessionError> {
        let session = {
            let state = self.state.lock();
            state
                .search_results
                .get(index)
                .cloned()
                .ok_or(SessionError::InvalidIndex {
                    index,
                    count: state.search_results.len(),
                })?
        };

        let ip = self
            .directory
            .resolve_connect_string(session.session_id)
            .and_then(|connect| parse_host_ip(&connect))
            .unwrap_or_else(|| {
                warn!(
                    "Could not resolve host for session '{}', using {}",
                    session.session_name, LOOPBACK_HOST
                );
                IpAddr::V4(Ipv4Addr::LOCALHOST)
            });
        let addr = SocketAddr::new(ip, self.config.beacon_port);

        info!(
            "Joining session '{}' ({} mode {}, {} units) via beacon {}",
            session.session_name,
            session.game_mode,
            session.settings.game_mode.mode_id(),
            session.settings.unit_count,
            addr
        );
        let result = self.connect_beacon(addr, None)?;
        self.state.lock().settings = Some(session.settings);
        Ok(result)
    }

    /// Change one advertised setting of the hosted session
    ///
    /// The running beacon keeps the room parameters it was created with.
    pub fn update_setting(&self, key: &str, value: &str) -> Result<(), SessionError> {
        let session_id = self.state.lock().session_id.ok_or(SessionError::NoSession)?;
        self.directory.update_setting(session_id, key, value)?;

        let mut state = self.state.lock();
        if let Some(settings) = state.settings.as_mut() {
            if !settings.apply_advertised(key, value) {
                debug!("Advertised custom setting {} = {}", key, value);
            }
        }
        Ok(())
    }

    /// Start a beacon client unless one is already connecting
    ///
    /// `publish_to` is set when hosting so roster sizes reach the directory.
    fn connect_beacon(&self, addr: SocketAddr, publish_to: Option<Uuid>) -> Result<oneshot::Receiver<bool>, SessionError> {
        let attempt = {
            let mut state = self.state.lock();
            if state.connecting {
                warn!("Beacon connection to {} rejected: another is in progress", addr);
                return Err(SessionError::ConnectInProgress);
            }
            state.connecting = true;
            state.attempt += 1;
            state.attempt
        };

        let (handle, events) =
            spawn_beacon_client(addr, self.local_player.clone(), self.config.reservation_timeout);
        let BeaconClientEvents {
            reservation,
            roster: mut roster_updates,
        } = events;
        if let Some(previous) = self.state.lock().client.replace(handle) {
            previous.disconnect();
        }

        let updates = self.lobby_updates.clone();
        let directory = self.directory.clone();
        tokio::spawn(async move {
            while let Some(roster) = roster_updates.recv().await {
                if let Some(session_id) = publish_to {
                    if let Err(e) = directory.update_player_count(session_id, roster.len() as u32) {
                        debug!("Could not publish player count: {}", e);
                    }
                }
                // No subscribers is fine
                let _ = updates.send(roster);
            }
        });

        let (result_tx, result_rx) = oneshot::channel();
        let state = self.state.clone();
        tokio::spawn(async move {
            let granted = reservation.await.unwrap_or(false);
            {
                let mut state = state.lock();
                if state.attempt != attempt {
                    debug!("Reservation result for stale attempt {} ignored", attempt);
                } else {
                    state.connecting = false;
                    if !granted {
                        if let Some(client) = state.client.take() {
                            client.disconnect();
                        }
                    }
                }
            }
            if granted {
                info!("Reservation granted by {}", addr);
            } else {
                warn!("Reservation to {} failed", addr);
            }
            let _ = result_tx.send(granted);
        });

        Ok(result_rx)
    }

    /// Give our lobby slot back to the host
    pub fn leave_lobby(&self) -> bool {
        match &self.state.lock().client {
            Some(client) => client.unregister(),
            None => false,
        }
    }

    /// Tear down the host beacon, the local client and the advertisement
    pub fn destroy_session(&self) -> Result<(), SessionError> {
        let (host, client, session_id) = {
            let mut state = self.state.lock();
            state.settings = None;
            state.connecting = false;
            state.attempt += 1;
            (state.host_beacon.take(), state.client.take(), state.session_id.take())
        };

        if let Some(client) = client {
            client.unregister();
            client.disconnect();
        }
        if let Some(host) = host {
            host.shutdown();
        }
        self.game_started.store(false, Ordering::Relaxed);

        match session_id {
            Some(session_id) => {
                self.directory.destroy_session(session_id)?;
                info!("Session {} destroyed", session_id);
                Ok(())
            }
            None => Err(SessionError::NoSession),
        }
    }

    /// Host-side lobby state, when hosting
    pub async fn host_snapshot(&self) -> Result<LobbySnapshot, SessionError> {
        let host = self
            .state
            .lock()
            .host_beacon
            .clone()
            .ok_or(SessionError::NoHostBeacon)?;
        Ok(host.snapshot().await?)
    }

    pub fn subscribe_lobby_updates(&self) -> broadcast::Receiver<Vec<PlayerLobbyInfo>> {
        self.lobby_updates.subscribe()
    }

    pub fn is_connecting(&self) -> bool {
        self.state.lock().connecting
    }

    pub fn is_hosting(&self) -> bool {
        self.state.lock().host_beacon.is_some()
    }

    pub fn session_id(&self) -> Option<Uuid> {
        self.state.lock().session_id
    }

    pub fn settings(&self) -> Option<SessionSettings> {
        self.state.lock().settings.clone()
    }

    pub fn search_results(&self) -> Vec<SessionInfo> {
        self.state.lock().search_results.clone()
    }

    pub fn set_game_started(&self, started: bool) {
        self.game_started.store(started, Ordering::Relaxed);
    }

    pub fn game_started(&self) -> bool {
        self.game_started.load(Ordering::Relaxed)
    }
}

/// IP part of a connect string ("ip:port" or bare "ip")
///
/// Unspecified addresses are treated as unresolved.
fn parse_host_ip(connect: &str) -> Option<IpAddr> {
    let ip = connect
        .parse::<SocketAddr>()
        .map(|addr| addr.ip())
        .or_else(|_| connect.parse::<IpAddr>())
        .ok()?;
    (!ip.is_unspecified()).then_some(ip)
}
