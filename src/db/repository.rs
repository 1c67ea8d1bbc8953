//! Database repository for players and finished games.

use diesel::prelude::*;
use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};
use tracing::{debug, info, instrument};

use crate::db::{DbError, GameRecord, NewGameRecord, NewPlayer, Player, schema};
use crate::session::{Session, SessionStatus};

const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// Database repository for player and game records.
#[derive(Debug, Clone)]
pub struct GameRepository {
    db_path: String,
}

impl GameRepository {
    /// Creates a repository for the SQLite database at `db_path`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the path is empty.
    #[instrument(skip(db_path), fields(db_path = %db_path))]
    pub fn new(db_path: String) -> Result<Self, DbError> {
        if db_path.trim().is_empty() {
            return Err(DbError::new("Database path is empty"));
        }
        info!(path = %db_path, "Creating GameRepository");
        Ok(Self { db_path })
    }

    /// Establishes a database connection.
    #[instrument(skip(self))]
    fn connection(&self) -> Result<SqliteConnection, DbError> {
        debug!(path = %self.db_path, "Establishing connection");
        SqliteConnection::establish(&self.db_path)
            .map_err(|e| DbError::new(format!("Failed to connect to '{}': {}", self.db_path, e)))
    }

    /// Creates the players and games tables if they do not exist.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the connection or a migration fails.
    #[instrument(skip(self))]
    pub fn ensure_schema(&self) -> Result<(), DbError> {
        let mut conn = self.connection()?;
        let applied = conn
            .run_pending_migrations(MIGRATIONS)
            .map_err(|e| DbError::new(format!("Migration failed: {}", e)))?;
        info!(applied = applied.len(), "Schema ready");
        Ok(())
    }

    /// Stores a finished session and bumps both players' counters.
    ///
    /// Players are created on first sight, the bot included.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the session is still active or a database
    /// error occurs.
    #[instrument(skip(self, session), fields(session_id = %session.id(), status = %session.status()))]
    pub fn record_finished_game(&self, session: &Session) -> Result<GameRecord, DbError> {
        if session.is_active() {
            return Err(DbError::new(format!(
                "Session {} is still active",
                session.id()
            )));
        }
        let mut conn = self.connection()?;

        let record = conn.transaction::<_, DbError, _>(|conn| {
            for (id, name) in [
                (session.player1_id(), session.player1_name()),
                (session.player2_id(), session.player2_name()),
            ] {
                diesel::insert_into(schema::players::table)
                    .values(&NewPlayer::new(id.clone(), name.clone()))
                    .on_conflict(schema::players::id)
                    .do_nothing()
                    .execute(conn)?;
            }

            let record = diesel::insert_into(schema::games::table)
                .values(&NewGameRecord::new(
                    session.id().clone(),
                    session.player1_id().clone(),
                    session.player2_id().clone(),
                    session.winner().clone(),
                    session.status().to_string(),
                ))
                .returning(GameRecord::as_returning())
                .get_result(conn)?;

            match (session.status(), session.winner()) {
                (SessionStatus::Won, Some(winner)) => {
                    let loser = session
                        .opponent_of(winner)
                        .ok_or_else(|| DbError::new("Winner is not a participant"))?;
                    diesel::update(schema::players::table.find(winner))
                        .set(schema::players::wins.eq(schema::players::wins + 1))
                        .execute(conn)?;
                    diesel::update(schema::players::table.find(loser))
                        .set(schema::players::losses.eq(schema::players::losses + 1))
                        .execute(conn)?;
                }
                (SessionStatus::Draw, _) => {
                    diesel::update(
                        schema::players::table.filter(
                            schema::players::id
                                .eq(session.player1_id())
                                .or(schema::players::id.eq(session.player2_id())),
                        ),
                    )
                    .set(schema::players::draws.eq(schema::players::draws + 1))
                    .execute(conn)?;
                }
                (status, winner) => {
                    return Err(DbError::new(format!(
                        "Inconsistent result: status {} winner {:?}",
                        status, winner
                    )));
                }
            }

            Ok(record)
        })?;

        info!(game_id = %record.id(), "Game result recorded");
        Ok(record)
    }

    /// Gets a player by identity. Returns `None` if not found.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if a database error occurs.
    #[instrument(skip(self))]
    pub fn get_player(&self, id: &str) -> Result<Option<Player>, DbError> {
        let mut conn = self.connection()?;
        let player = schema::players::table
            .find(id)
            .select(Player::as_select())
            .first(&mut conn)
            .optional()?;
        debug!(found = player.is_some(), "Player lookup");
        Ok(player)
    }

    /// Gets a finished game by identity. Returns `None` if not found.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if a database error occurs.
    #[instrument(skip(self))]
    pub fn get_game(&self, id: &str) -> Result<Option<GameRecord>, DbError> {
        let mut conn = self.connection()?;
        let game = schema::games::table
            .find(id)
            .select(GameRecord::as_select())
            .first(&mut conn)
            .optional()?;
        Ok(game)
    }

    /// Top players by wins, at most `limit`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if a database error occurs.
    #[instrument(skip(self))]
    pub fn leaderboard(&self, limit: i64) -> Result<Vec<Player>, DbError> {
        let mut conn = self.connection()?;
        let players = schema::players::table
            .order((schema::players::wins.desc(), schema::players::username.asc()))
            .limit(limit)
            .select(Player::as_select())
            .load(&mut conn)?;
        info!(count = players.len(), "Leaderboard loaded");
        Ok(players)
    }
}
