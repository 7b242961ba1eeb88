use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::constants::lobby::{DEFAULT_UNIT_COUNT, PLAYER_ID_MASK, UNASSIGNED_PLAYER_ID};

/// Lobby player identity; 0 means "not assigned yet"
pub type PlayerId = i32;

/// One roster entry, exchanged between client and host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerLobbyInfo {
    pub player_name: String,
    /// Always overwritten by the host with the room setting
    pub unit_count: i32,
    /// Legacy per-unit names, unused by current clients
    #[serde(default)]
    pub unit_names: Vec<String>,
    pub profile_icon: i32,
    pub team_icon: i32,
    pub player_id: PlayerId,
}

impl Default for PlayerLobbyInfo {
    fn default() -> Self {
        Self {
            player_name: String::new(),
            unit_count: DEFAULT_UNIT_COUNT,
            unit_names: Vec::new(),
            profile_icon: 0,
            team_icon: 0,
            player_id: UNASSIGNED_PLAYER_ID,
        }
    }
}

impl PlayerLobbyInfo {
    pub fn new(player_name: impl Into<String>) -> Self {
        Self {
            player_name: player_name.into(),
            ..Default::default()
        }
    }

    pub fn with_id(mut self, player_id: PlayerId) -> Self {
        self.player_id = player_id;
        self
    }

    pub fn has_id(&self) -> bool {
        self.player_id != UNASSIGNED_PLAYER_ID
    }
}

/// Generate a positive player id
///
/// Wall-clock nanoseconds mixed with random bits, so separate processes
/// land anywhere in the 31-bit range. Never returns the unassigned id.
pub fn generate_player_id() -> PlayerId {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_nanos() as u64)
        .unwrap_or_default();
    id_from_entropy(nanos ^ rand::random::<u64>())
}

fn id_from_entropy(entropy: u64) -> PlayerId {
    match (entropy & PLAYER_ID_MASK) as PlayerId {
        UNASSIGNED_PLAYER_ID => 1,
        id => id,
    }
}
