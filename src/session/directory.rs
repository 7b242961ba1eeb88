//! Session advertisement seam
//!
//! The host publishes its session here and clients search it. Real
//! deployments plug a platform service in behind `SessionDirectory`;
//! `InMemoryDirectory` serves LAN play and tests.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use crate::constants::lobby::{keys, MAX_SEARCH_RESULTS};
use crate::session::settings::{max_players_for, SessionSettings};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DirectoryError {
    #[error("Session {0} not found")]
    NotFound(Uuid),
    #[error("Session directory unavailable")]
    Unavailable,
}

/// One row of a session search
#[derive(Debug, Clone, PartialEq)]
pub struct SessionInfo {
    pub session_id: Uuid,
    pub session_name: String,
    /// Advertised mode string, possibly one this build does not know
    pub game_mode: String,
    /// Settings parsed from the advertised pairs
    pub settings: SessionSettings,
    pub current_players: u32,
    pub max_players: u32,
    pub ping_ms: u32,
    /// Host connect string, usually "ip:port"
    pub host_address: String,
    pub search_index: usize,
}

pub trait SessionDirectory: Send + Sync {
    /// Advertise a session hosted at `host_address`
    fn create_session(&self, host_address: SocketAddr, settings: &SessionSettings) -> Result<Uuid, DirectoryError>;

    /// Search advertised sessions, at most `max_results`
    fn find_sessions(&self, max_results: usize, lan: bool) -> Result<Vec<SessionInfo>, DirectoryError>;

    /// Connect string for a session, if it can be resolved
    fn resolve_connect_string(&self, session_id: Uuid) -> Option<String>;

    /// Publish the current lobby head count
    fn update_player_count(&self, session_id: Uuid, players: u32) -> Result<(), DirectoryError>;

    /// Add or replace one advertised key/value setting
    fn update_setting(&self, session_id: Uuid, key: &str, value: &str) -> Result<(), DirectoryError>;

    fn destroy_session(&self, session_id: Uuid) -> Result<(), DirectoryError>;
}

#[derive(Debug, Clone)]
struct Entry {
    /// Advertised pairs in publish order
    advertised: Vec<(String, String)>,
    is_lan: bool,
    host_address: SocketAddr,
    current_players: u32,
    sequence: u64,
}

/// Process-local directory
#[derive(Debug, Default)]
pub struct InMemoryDirectory {
    sessions: RwLock<HashMap<Uuid, Entry>>,
    next_sequence: AtomicU64,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }
}

impl Entry {
    fn get(&self, key: &str) -> Option<&str> {
        self.advertised
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    fn settings(&self) -> SessionSettings {
        SessionSettings {
            is_lan: self.is_lan,
            ..SessionSettings::from_advertised(self.advertised.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        }
    }
}

impl SessionDirectory for InMemoryDirectory {
    fn create_session(&self, host_address: SocketAddr, settings: &SessionSettings) -> Result<Uuid, DirectoryError> {
        let session_id = Uuid::new_v4();
        let sequence = self.next_sequence.fetch_add(1, Ordering::Relaxed);
        self.sessions.write().insert(
            session_id,
            Entry {
                advertised: settings
                    .advertised()
                    .into_iter()
                    .map(|(key, value)| (key.to_string(), value))
                    .collect(),
                is_lan: settings.is_lan,
                host_address,
                current_players: 0,
                sequence,
            },
        );
        info!(
            "Session '{}' ({}) advertised at {}",
            settings.session_name, settings.game_mode, host_address
        );
        Ok(session_id)
    }

    fn find_sessions(&self, max_results: usize, lan: bool) -> Result<Vec<SessionInfo>, DirectoryError> {
        let sessions = self.sessions.read();
        let mut matches: Vec<(&Uuid, &Entry)> = sessions
            .iter()
            .filter(|(_, entry)| entry.is_lan == lan)
            .collect();
        matches.sort_by_key(|(_, entry)| entry.sequence);

        let results: Vec<SessionInfo> = matches
            .into_iter()
            .take(max_results.min(MAX_SEARCH_RESULTS))
            .enumerate()
            .map(|(search_index, (id, entry))| {
                let game_mode = entry.get(keys::GAME_MODE).unwrap_or_default().to_string();
                let settings = entry.settings();
                SessionInfo {
                    session_id: *id,
                    session_name: settings.session_name.clone(),
                    max_players: max_players_for(&game_mode),
                    game_mode,
                    settings,
                    current_players: entry.current_players,
                    ping_ms: 0,
                    host_address: entry.host_address.to_string(),
                    search_index,
                }
            })
            .collect();
        debug!("Session search found {} results", results.len());
        Ok(results)
    }

    fn resolve_connect_string(&self, session_id: Uuid) -> Option<String> {
        self.sessions
            .read()
            .get(&session_id)
            .map(|entry| entry.host_address.to_string())
    }

    fn update_player_count(&self, session_id: Uuid, players: u32) -> Result<(), DirectoryError> {
        let mut sessions = self.sessions.write();
        let entry = sessions
            .get_mut(&session_id)
            .ok_or(DirectoryError::NotFound(session_id))?;
        entry.current_players = players;
        Ok(())
    }

    fn update_setting(&self, session_id: Uuid, key: &str, value: &str) -> Result<(), DirectoryError> {
        let mut sessions = self.sessions.write();
        let entry = sessions
            .get_mut(&session_id)
            .ok_or(DirectoryError::NotFound(session_id))?;
        match entry.advertised.iter_mut().find(|(k, _)| k == key) {
            Some((_, existing)) => *existing = value.to_string(),
            None => entry.advertised.push((key.to_string(), value.to_string())),
        }
        debug!("Session {} setting {} = {}", session_id, key, value);
        Ok(())
    }

    fn destroy_session(&self, session_id: Uuid) -> Result<(), DirectoryError> {
        match self.sessions.write().remove(&session_id) {
            Some(entry) => {
                info!("Session '{}' destroyed", entry.get(keys::SESSION_NAME).unwrap_or_default());
                Ok(())
            }
            None => Err(DirectoryError::NotFound(session_id)),
        }
    }
}
