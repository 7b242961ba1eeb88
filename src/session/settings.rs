use std::fmt;

use crate::constants::lobby::{keys, DEFAULT_UNIT_COUNT, FALLBACK_MAX_PLAYERS};

/// Match format advertised with the session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GameMode {
    #[default]
    OneVsOne,
    TwoVsTwo,
    FreeForAll,
}

impl GameMode {
    pub const ALL: [GameMode; 3] = [GameMode::OneVsOne, GameMode::TwoVsTwo, GameMode::FreeForAll];

    /// Advertised string form
    pub fn as_str(&self) -> &'static str {
        match self {
            GameMode::OneVsOne => "1V1",
            GameMode::TwoVsTwo => "2V2",
            GameMode::FreeForAll => "FFA",
        }
    }

    /// Parse the advertised form; unknown strings are None
    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|mode| mode.as_str().eq_ignore_ascii_case(value.trim()))
    }

    /// Lobby slots for this mode
    pub fn max_players(&self) -> u32 {
        match self {
            GameMode::OneVsOne => 2,
            GameMode::TwoVsTwo => 4,
            GameMode::FreeForAll => 4,
        }
    }

    /// Numeric id used by the game-mode selector
    pub fn mode_id(&self) -> u8 {
        match self {
            GameMode::OneVsOne => 0,
            GameMode::TwoVsTwo => 1,
            GameMode::FreeForAll => 2,
        }
    }
}

impl fmt::Display for GameMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Slot count for an advertised mode string, falling back for unknown modes
pub fn max_players_for(mode: &str) -> u32 {
    GameMode::parse(mode)
        .map(|m| m.max_players())
        .unwrap_or(FALLBACK_MAX_PLAYERS)
}

/// Settings the host advertises when creating a session
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSettings {
    pub session_name: String,
    pub game_mode: GameMode,
    pub unit_life: i32,
    pub unit_count: i32,
    pub turns_before_water: i32,
    pub is_lan: bool,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            session_name: "Artillery Lobby".to_string(),
            game_mode: GameMode::default(),
            unit_life: 100,
            unit_count: DEFAULT_UNIT_COUNT,
            turns_before_water: 10,
            is_lan: true,
        }
    }
}

impl SessionSettings {
    pub fn max_players(&self) -> u32 {
        self.game_mode.max_players()
    }

    /// Key/value pairs published to the session directory
    pub fn advertised(&self) -> Vec<(&'static str, String)> {
        vec![
            (keys::SESSION_NAME, self.session_name.clone()),
            (keys::GAME_MODE, self.game_mode.as_str().to_string()),
            (keys::UNIT_LIFE, self.unit_life.to_string()),
            (keys::UNIT_COUNT, self.unit_count.to_string()),
            (keys::TURNS_BEFORE_WATER, self.turns_before_water.to_string()),
        ]
    }

    /// Rebuild settings from advertised pairs; missing or bad values keep defaults
    pub fn from_advertised<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let mut settings = Self::default();
        for (key, value) in pairs {
            settings.apply_advertised(key, value);
        }
        settings
    }

    /// Apply one advertised pair. Returns false for keys this type does not carry.
    pub fn apply_advertised(&mut self, key: &str, value: &str) -> bool {
        match key {
            keys::SESSION_NAME => self.session_name = value.to_string(),
            keys::GAME_MODE => {
                if let Some(mode) = GameMode::parse(value) {
                    self.game_mode = mode;
                }
            }
            keys::UNIT_LIFE => self.unit_life = value.parse().unwrap_or(self.unit_life),
            keys::UNIT_COUNT => self.unit_count = value.parse().unwrap_or(self.unit_count),
            keys::TURNS_BEFORE_WATER => {
                self.turns_before_water = value.parse().unwrap_or(self.turns_before_water)
            }
            _ => return false,
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_max_players() {
        assert_eq!(GameMode::OneVsOne.max_players(), 2);
        assert_eq!(GameMode::TwoVsTwo.max_players(), 4);
        assert_eq!(GameMode::FreeForAll.max_players(), 4);
        assert_eq!(max_players_for("2v2"), 4);
        assert_eq!(max_players_for("CTF"), 2);
    }

    #[test]
    fn test_mode_ids() {
        let ids: Vec<u8> = GameMode::ALL.iter().map(|m| m.mode_id()).collect();
        assert_eq!(ids, vec![0, 1, 2]);
    }

    #[test]
    fn test_advertised_round_trip() {
        let settings = SessionSettings {
            session_name: "Night Match".to_string(),
            game_mode: GameMode::FreeForAll,
            unit_life: 150,
            unit_count: 3,
            turns_before_water: 8,
            is_lan: true,
        };
        let pairs = settings.advertised();
        let rebuilt = SessionSettings::from_advertised(pairs.iter().map(|(k, v)| (*k, v.as_str())));
        assert_eq!(rebuilt, settings);
    }

    #[test]
    fn test_apply_single_pair() {
        let mut settings = SessionSettings::default();
        assert!(settings.apply_advertised(keys::UNIT_COUNT, "4"));
        assert_eq!(settings.unit_count, 4);
        assert!(!settings.apply_advertised("MAP_NAME", "Canyon"));
    }

    #[test]
    fn test_bad_advertised_values_keep_defaults() {
        let rebuilt = SessionSettings::from_advertised([(keys::UNIT_COUNT, "lots"), (keys::GAME_MODE, "CTF")]);
        assert_eq!(rebuilt.unit_count, DEFAULT_UNIT_COUNT);
        assert_eq!(rebuilt.game_mode, GameMode::OneVsOne);
    }
}
