use serde::{Deserialize, Serialize};

use crate::lobby::types::{PlayerId, PlayerLobbyInfo};

/// Messages from a beacon client to the host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClientMessage {
    /// Ask for a lobby slot
    RequestReservation { player_id: PlayerId },
    /// Register or update this player's roster entry
    SubmitLobbyInfo(PlayerLobbyInfo),
    /// Leave the lobby and give the slot back
    Unregister { player_id: PlayerId },
}

/// Messages from the host to beacon clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServerMessage {
    /// A slot was reserved for the requester
    ReservationGranted,
    /// No slot available, or the host could not be reached
    ReservationDenied,
    /// Full roster replacement
    RosterUpdate(Vec<PlayerLobbyInfo>),
}

/// Encode a message using bincode
/// Uses legacy config for fixed-size integers
pub fn encode<T: Serialize>(message: &T) -> Result<Vec<u8>, EncodeError> {
    bincode::serde::encode_to_vec(message, bincode::config::legacy())
        .map_err(|e| EncodeError(e.to_string()))
}

/// Decode a message using bincode
pub fn decode<T: for<'de> Deserialize<'de>>(data: &[u8]) -> Result<T, DecodeError> {
    bincode::serde::decode_from_slice(data, bincode::config::legacy())
        .map(|(msg, _)| msg)
        .map_err(|e| DecodeError(e.to_string()))
}

#[derive(Debug, thiserror::Error)]
#[error("Encode error: {0}")]
pub struct EncodeError(String);

#[derive(Debug, thiserror::Error)]
#[error("Decode error: {0}")]
pub struct DecodeError(String);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_message_reservation() {
        let msg = ClientMessage::RequestReservation { player_id: 42 };
        let encoded = encode(&msg).unwrap();
        let decoded: ClientMessage = decode(&encoded).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn test_submit_lobby_info() {
        let info = PlayerLobbyInfo {
            player_name: "Gunner".to_string(),
            unit_count: 4,
            unit_names: vec!["Alpha".to_string()],
            profile_icon: 2,
            team_icon: 1,
            player_id: 777,
        };
        let encoded = encode(&ClientMessage::SubmitLobbyInfo(info.clone())).unwrap();
        match decode::<ClientMessage>(&encoded).unwrap() {
            ClientMessage::SubmitLobbyInfo(decoded) => assert_eq!(decoded, info),
            _ => panic!("Wrong message type"),
        }
    }

    #[test]
    fn test_roster_update() {
        let roster = vec![
            PlayerLobbyInfo::new("A").with_id(1),
            PlayerLobbyInfo::new("B").with_id(2),
        ];
        let encoded = encode(&ServerMessage::RosterUpdate(roster.clone())).unwrap();
        let decoded: ServerMessage = decode(&encoded).unwrap();
        assert_eq!(decoded, ServerMessage::RosterUpdate(roster));
    }

    #[test]
    fn test_fixed_width_player_id() {
        // legacy config: u32 variant tag + fixed 4-byte i32
        let encoded = encode(&ClientMessage::Unregister { player_id: -1 }).unwrap();
        assert_eq!(encoded.len(), 8);
    }

    #[test]
    fn test_decode_garbage() {
        let result: Result<ServerMessage, _> = decode(&[0xFF, 0xFF, 0xFF, 0xFF]);
        assert!(result.is_err());
    }
}
