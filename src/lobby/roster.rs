//! Authoritative lobby roster kept by the host

use crate::lobby::types::{PlayerId, PlayerLobbyInfo};

/// What an upsert did to the roster
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Updated,
}

/// Ordered player list keyed by player id; never holds duplicates
#[derive(Debug, Clone, Default)]
pub struct Roster {
    players: Vec<PlayerLobbyInfo>,
    room_unit_count: i32,
}

impl Roster {
    pub fn new(room_unit_count: i32) -> Self {
        Self {
            players: Vec::new(),
            room_unit_count,
        }
    }

    /// Insert or replace by player id. The unit count is always the room's.
    pub fn upsert(&mut self, mut info: PlayerLobbyInfo) -> UpsertOutcome {
        info.unit_count = self.room_unit_count;
        match self.players.iter_mut().find(|p| p.player_id == info.player_id) {
            Some(existing) => {
                *existing = info;
                UpsertOutcome::Updated
            }
            None => {
                self.players.push(info);
                UpsertOutcome::Inserted
            }
        }
    }

    /// Remove every entry with this id, returning how many were removed
    pub fn remove(&mut self, player_id: PlayerId) -> usize {
        let before = self.players.len();
        self.players.retain(|p| p.player_id != player_id);
        before - self.players.len()
    }

    pub fn get(&self, player_id: PlayerId) -> Option<&PlayerLobbyInfo> {
        self.players.iter().find(|p| p.player_id == player_id)
    }

    pub fn players(&self) -> &[PlayerLobbyInfo] {
        &self.players
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn room_unit_count(&self) -> i32 {
        self.room_unit_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(name: &str, id: PlayerId, units: i32) -> PlayerLobbyInfo {
        PlayerLobbyInfo {
            unit_count: units,
            ..PlayerLobbyInfo::new(name).with_id(id)
        }
    }

    #[test]
    fn test_upsert_replaces_by_id() {
        let mut roster = Roster::new(3);
        assert_eq!(roster.upsert(info("A", 7, 1)), UpsertOutcome::Inserted);
        assert_eq!(roster.upsert(info("B", 7, 1)), UpsertOutcome::Updated);
        assert_eq!(roster.len(), 1);
        assert_eq!(roster.get(7).unwrap().player_name, "B");
    }

    #[test]
    fn test_unit_count_forced() {
        let mut roster = Roster::new(3);
        roster.upsert(info("A", 1, 5));
        roster.upsert(info("B", 2, 0));
        assert!(roster.players().iter().all(|p| p.unit_count == 3));
    }

    #[test]
    fn test_remove() {
        let mut roster = Roster::new(2);
        roster.upsert(info("A", 1, 1));
        roster.upsert(info("B", 2, 1));
        assert_eq!(roster.remove(1), 1);
        assert_eq!(roster.remove(1), 0);
        assert_eq!(roster.players()[0].player_id, 2);
    }

    #[test]
    fn test_order_preserved() {
        let mut roster = Roster::new(1);
        for id in [5, 3, 9] {
            roster.upsert(info("P", id, 1));
        }
        roster.upsert(info("Q", 3, 1));
        let ids: Vec<_> = roster.players().iter().map(|p| p.player_id).collect();
        assert_eq!(ids, vec![5, 3, 9]);
    }
}
