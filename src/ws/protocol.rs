//! WebSocket protocol message definitions
//! These are the wire types for client-server communication

use serde::{Deserialize, Serialize};

use crate::game::state::{PlayerSlot, Score, Vec3};

/// Messages sent from client to server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientMsg {
    /// A key went down (`state: true`) or up (`state: false`)
    KeyState {
        /// Browser key name, e.g. "ArrowLeft" or "a"
        key: String,
        state: bool,
    },
}

/// Messages sent from server to client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerMsg {
    /// Authoritative state after a tick
    UpdateState {
        ball: Vec3,
        paddle1: Vec3,
        paddle2: Vec3,
        points: Score,
        /// Sign of the ball's z-velocity at the last bounce
        direction: i8,
    },

    /// Both players are in; tells each client which side it controls
    MatchStarted {
        player: PlayerSlot,
    },

    /// Match over (1 = player A, 2 = player B)
    GameOver {
        winner: u8,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_key_state() {
        let msg: ClientMsg =
            serde_json::from_str(r#"{"type":"keyState","key":"ArrowLeft","state":true}"#).unwrap();
        assert_eq!(
            msg,
            ClientMsg::KeyState {
                key: "ArrowLeft".to_string(),
                state: true
            }
        );
    }

    #[test]
    fn test_unknown_type_rejected() {
        assert!(serde_json::from_str::<ClientMsg>(r#"{"type":"ping"}"#).is_err());
        assert!(serde_json::from_str::<ClientMsg>(r#"{"type":"keyState","key":"a"}"#).is_err());
    }

    #[test]
    fn test_server_messages_shape() {
        let started = serde_json::to_value(ServerMsg::MatchStarted {
            player: PlayerSlot::A,
        })
        .unwrap();
        assert_eq!(started, json!({"type": "matchStarted", "player": "player_a"}));

        let over = serde_json::to_value(ServerMsg::GameOver { winner: 2 }).unwrap();
        assert_eq!(over, json!({"type": "gameOver", "winner": 2}));

        let update = serde_json::to_value(ServerMsg::UpdateState {
            ball: Vec3::new(1.0, 0.5, -2.0),
            paddle1: Vec3::new(0.0, 0.0, -9.0),
            paddle2: Vec3::new(0.0, 0.0, 9.0),
            points: Score {
                player_a: 3,
                player_b: 1,
            },
            direction: -1,
        })
        .unwrap();
        assert_eq!(update["type"], "updateState");
        assert_eq!(update["ball"], json!({"x": 1.0, "y": 0.5, "z": -2.0}));
        assert_eq!(update["points"], json!({"player1": 3, "player2": 1}));
        assert_eq!(update["direction"], -1);
    }
}
