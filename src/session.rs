//! Game sessions and the authoritative session store.

use crate::games::connect_four::{Board, COLS, Piece, check_win, is_full};
use chrono::{DateTime, Utc};
use derive_getters::Getters;
use derive_more::{Display, Error};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, instrument, warn};

/// Unique identifier for a game session.
pub type SessionId = String;

/// Unique identifier for a participant.
pub type PlayerId = String;

/// Identity of the automated opponent.
pub const BOT_ID: &str = "bot";

/// Display name of the automated opponent.
pub const BOT_NAME: &str = "Bot";

/// Lifecycle status of a session.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SessionStatus {
    /// Moves are accepted.
    Active,
    /// A participant connected four.
    Won,
    /// The board filled with no winner.
    Draw,
}

/// Recoverable errors from applying a move.
///
/// The display strings are what the offending client receives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Error)]
pub enum SessionError {
    /// No session with that identity.
    #[display("game not found")]
    NotFound,
    /// The session already ended.
    #[display("game is not active")]
    NotActive,
    /// The mover is not the current-turn participant.
    #[display("not player's turn")]
    WrongTurn,
    /// Column outside `[0, 7)`.
    #[display("invalid column")]
    InvalidColumn,
    /// Column has no empty cell left.
    #[display("column is full")]
    ColumnFull,
}

/// One two-party game, including board and turn state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Getters)]
pub struct Session {
    id: SessionId,
    player1_id: PlayerId,
    player2_id: PlayerId,
    player1_name: String,
    player2_name: String,
    board: Board,
    current_turn: PlayerId,
    status: SessionStatus,
    winner: Option<PlayerId>,
    is_bot: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Session {
    /// Creates an active session with an empty board; participant 1 moves first.
    #[instrument(skip_all, fields(player1 = %player1_id, player2 = %player2_id, is_bot = is_bot))]
    pub fn new(
        player1_id: PlayerId,
        player1_name: String,
        player2_id: PlayerId,
        player2_name: String,
        is_bot: bool,
    ) -> Self {
        let now = Utc::now();
        let session = Self {
            id: uuid::Uuid::new_v4().to_string(),
            current_turn: player1_id.clone(),
            player1_id,
            player2_id,
            player1_name,
            player2_name,
            board: Board::new(),
            status: SessionStatus::Active,
            winner: None,
            is_bot,
            created_at: now,
            updated_at: now,
        };
        info!(session_id = %session.id, "Created session");
        session
    }

    /// Creates a session pitting `player_id` against the bot.
    pub fn against_bot(player_id: PlayerId, player_name: String) -> Self {
        Self::new(
            player_id,
            player_name,
            BOT_ID.to_string(),
            BOT_NAME.to_string(),
            true,
        )
    }

    /// True while moves are accepted.
    pub fn is_active(&self) -> bool {
        self.status == SessionStatus::Active
    }

    /// True when it is the bot's turn in an active bot session.
    pub fn is_bot_turn(&self) -> bool {
        self.is_bot && self.is_active() && self.current_turn == BOT_ID
    }

    /// Piece owned by `player_id`, or `None` for non-participants.
    pub fn piece_for(&self, player_id: &str) -> Option<Piece> {
        if player_id == self.player1_id {
            Some(Piece::One)
        } else if player_id == self.player2_id {
            Some(Piece::Two)
        } else {
            None
        }
    }

    /// The other participant, or `None` for non-participants.
    pub fn opponent_of(&self, player_id: &str) -> Option<&PlayerId> {
        if player_id == self.player1_id {
            Some(&self.player2_id)
        } else if player_id == self.player2_id {
            Some(&self.player1_id)
        } else {
            None
        }
    }

    /// Drops `player_id`'s piece into `column` and advances the game.
    ///
    /// All checks run before anything is written, so a rejected move leaves
    /// the session untouched.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError`] when the session has ended, it is not the
    /// mover's turn, or the column is off the board or full.
    #[instrument(skip(self), fields(session_id = %self.id))]
    pub fn apply_move(&mut self, player_id: &str, column: i32) -> Result<(), SessionError> {
        if !self.is_active() {
            return Err(SessionError::NotActive);
        }
        if player_id != self.current_turn {
            return Err(SessionError::WrongTurn);
        }
        let column = usize::try_from(column)
            .ok()
            .filter(|c| *c < COLS)
            .ok_or(SessionError::InvalidColumn)?;
        if !self.board.can_drop(column) {
            return Err(SessionError::ColumnFull);
        }
        let row = self.board.drop_row(column).ok_or(SessionError::ColumnFull)?;
        let piece = self.piece_for(player_id).ok_or(SessionError::WrongTurn)?;

        self.board.place(row, column, piece);
        self.updated_at = Utc::now();

        if check_win(&self.board, piece) {
            self.status = SessionStatus::Won;
            self.winner = Some(player_id.to_string());
        } else if is_full(&self.board) {
            self.status = SessionStatus::Draw;
        } else if let Some(next) = self.opponent_of(player_id).cloned() {
            self.current_turn = next;
        }

        debug!(row, column, status = %self.status, "Move applied");
        Ok(())
    }
}

/// Authoritative map from session identity to [`Session`].
///
/// Every operation takes one coarse lock, so moves on a session are
/// linearized and never observe a half-applied move.
#[derive(Debug, Clone, Default)]
pub struct SessionStore {
    sessions: Arc<Mutex<HashMap<SessionId, Session>>>,
}

impl SessionStore {
    /// Creates an empty store.
    #[instrument]
    pub fn new() -> Self {
        info!("Creating session store");
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<SessionId, Session>> {
        self.sessions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Creates and stores a new active session.
    #[instrument(skip(self))]
    pub fn create(
        &self,
        player1_id: PlayerId,
        player1_name: String,
        player2_id: PlayerId,
        player2_name: String,
        is_bot: bool,
    ) -> Session {
        let session = Session::new(player1_id, player1_name, player2_id, player2_name, is_bot);
        self.put(session.clone());
        session
    }

    /// Inserts or replaces a session built elsewhere.
    #[instrument(skip(self, session), fields(session_id = %session.id))]
    pub fn put(&self, session: Session) {
        self.lock().insert(session.id.clone(), session);
        debug!("Session stored");
    }

    /// Gets a snapshot of a session.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::NotFound`] for unknown identities.
    #[instrument(skip(self))]
    pub fn get(&self, session_id: &str) -> Result<Session, SessionError> {
        self.lock().get(session_id).cloned().ok_or_else(|| {
            debug!(session_id, "Session not found");
            SessionError::NotFound
        })
    }

    /// Applies a move atomically and returns the updated session.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::NotFound`] for unknown sessions, or the
    /// validation error from [`Session::apply_move`].
    #[instrument(skip(self))]
    pub fn apply_move(
        &self,
        session_id: &str,
        player_id: &str,
        column: i32,
    ) -> Result<Session, SessionError> {
        let mut sessions = self.lock();
        let session = sessions.get_mut(session_id).ok_or(SessionError::NotFound)?;
        session.apply_move(player_id, column).map_err(|e| {
            warn!(error = %e, "Move rejected");
            e
        })?;
        info!(
            status = %session.status,
            current_turn = %session.current_turn,
            "Move accepted"
        );
        Ok(session.clone())
    }

    /// Removes a session. Idempotent.
    #[instrument(skip(self))]
    pub fn delete(&self, session_id: &str) {
        if self.lock().remove(session_id).is_some() {
            info!(session_id, "Session deleted");
        }
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// True when no sessions are stored.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_strings() {
        assert_eq!(SessionStatus::Active.to_string(), "active");
        assert_eq!(
            serde_json::to_value(SessionStatus::Draw).unwrap(),
            serde_json::json!("draw")
        );
    }

    #[test]
    fn test_non_participant_gets_wrong_turn() {
        let mut session = Session::new("a".into(), "A".into(), "b".into(), "B".into(), false);
        assert_eq!(session.apply_move("c", 0), Err(SessionError::WrongTurn));
    }

    #[test]
    fn test_bot_session_shape() {
        let session = Session::against_bot("alice_1".into(), "alice".into());
        assert!(*session.is_bot());
        assert_eq!(session.player2_id(), BOT_ID);
        assert_eq!(session.current_turn(), "alice_1");
        assert!(!session.is_bot_turn());
    }
}
