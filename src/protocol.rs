//! Wire protocol: one JSON object per WebSocket text frame.

use crate::session::{PlayerId, Session, SessionId};
use serde::{Deserialize, Serialize};

/// Payload of a `join` request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinPayload {
    /// Display name chosen by the player.
    pub username: String,
}

/// Payload of a `move` request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovePayload {
    /// Column to drop into, 0-6.
    pub column: i32,
}

/// Messages sent by clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientMessage {
    /// Ask to be matched with an opponent.
    Join {
        /// Who is joining.
        payload: JoinPayload,
    },
    /// Drop a piece.
    Move {
        /// Session the move is for; the connection's own session wins.
        #[serde(default)]
        game_id: Option<SessionId>,
        /// Column choice.
        payload: MovePayload,
    },
    /// Abandon the current session.
    Leave {
        /// Session being left; the connection's own session wins.
        #[serde(default)]
        game_id: Option<SessionId>,
    },
}

impl ClientMessage {
    /// Decodes a text frame.
    ///
    /// # Errors
    ///
    /// Returns the serde error for malformed frames or unknown kinds.
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

/// Payload of a `game-state` push.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameStatePayload {
    /// Full session snapshot.
    pub game: Session,
    /// Identity of the recipient.
    pub player_id: PlayerId,
    /// Human-readable note.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
}

/// Payload of an `error` push.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    /// Error text.
    pub error: String,
}

/// Messages sent by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ServerMessage {
    /// Session snapshot addressed to one participant.
    GameState {
        /// Session identity.
        game_id: SessionId,
        /// Snapshot and note.
        payload: GameStatePayload,
    },
    /// A rejected request.
    Error {
        /// What went wrong.
        payload: ErrorPayload,
    },
}

impl ServerMessage {
    /// Builds a `game-state` message for `player_id`.
    pub fn game_state(session: &Session, player_id: &str, message: impl Into<String>) -> Self {
        Self::GameState {
            game_id: session.id().clone(),
            payload: GameStatePayload {
                game: session.clone(),
                player_id: player_id.to_string(),
                message: message.into(),
            },
        }
    }

    /// Builds an `error` message.
    pub fn error(error: impl Into<String>) -> Self {
        Self::Error {
            payload: ErrorPayload {
                error: error.into(),
            },
        }
    }

    /// Encodes as a JSON text frame.
    ///
    /// # Errors
    ///
    /// Returns the serde error if encoding fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Items queued for a connection's writer.
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    /// A protocol message.
    Message(ServerMessage),
    /// Keep-alive ping.
    Ping,
}

impl From<ServerMessage> for Outbound {
    fn from(message: ServerMessage) -> Self {
        Outbound::Message(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_join() {
        let msg = ClientMessage::parse(r#"{"type":"join","payload":{"username":"alice"}}"#).unwrap();
        assert_eq!(
            msg,
            ClientMessage::Join {
                payload: JoinPayload {
                    username: "alice".to_string()
                }
            }
        );
    }

    #[test]
    fn test_parse_move_with_and_without_game_id() {
        let with = ClientMessage::parse(r#"{"type":"move","game_id":"g1","payload":{"column":3}}"#)
            .unwrap();
        assert_eq!(
            with,
            ClientMessage::Move {
                game_id: Some("g1".to_string()),
                payload: MovePayload { column: 3 }
            }
        );

        let without = ClientMessage::parse(r#"{"type":"move","payload":{"column":-1}}"#).unwrap();
        assert_eq!(
            without,
            ClientMessage::Move {
                game_id: None,
                payload: MovePayload { column: -1 }
            }
        );
    }

    #[test]
    fn test_parse_bare_leave() {
        let msg = ClientMessage::parse(r#"{"type":"leave"}"#).unwrap();
        assert_eq!(msg, ClientMessage::Leave { game_id: None });
    }

    #[test]
    fn test_parse_rejects_unknown_kind() {
        assert!(ClientMessage::parse(r#"{"type":"dance"}"#).is_err());
        assert!(ClientMessage::parse(r#"{"type":"move","payload":{}}"#).is_err());
        assert!(ClientMessage::parse("not json").is_err());
    }

    #[test]
    fn test_error_shape() {
        let value = serde_json::to_value(ServerMessage::error("column is full")).unwrap();
        assert_eq!(value, json!({"type": "error", "payload": {"error": "column is full"}}));
    }

    #[test]
    fn test_game_state_shape() {
        let session = Session::against_bot("alice_1".into(), "alice".into());
        let value =
            serde_json::to_value(ServerMessage::game_state(&session, "alice_1", "hi")).unwrap();
        assert_eq!(value["type"], "game-state");
        assert_eq!(value["game_id"], json!(session.id()));
        assert_eq!(value["payload"]["player_id"], "alice_1");
        assert_eq!(value["payload"]["message"], "hi");
        assert_eq!(value["payload"]["game"]["status"], "active");
        assert_eq!(value["payload"]["game"]["is_bot"], true);
        assert_eq!(value["payload"]["game"]["board"][5][3], 0);
    }
}
