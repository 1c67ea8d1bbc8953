//! Per-connection control loop.
//!
//! Each connection reads protocol frames sequentially and drives
//! matchmaking, the session store and the bot. Results are pushed to both
//! participants through the [`ConnectionRegistry`].

use crate::analytics::Analytics;
use crate::bot::make_bot_move;
use crate::config::ServerConfig;
use crate::db::GameRepository;
use crate::matchmaking::MatchmakingQueue;
use crate::protocol::{ClientMessage, JoinPayload, Outbound, ServerMessage};
use crate::registry::{ConnectionHandle, ConnectionRegistry};
use crate::session::{BOT_ID, PlayerId, Session, SessionId, SessionStore};
use futures::{Stream, StreamExt};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

const MSG_BOT_START: &str = "Playing against Bot. Your turn!";
const MSG_HUMAN_START: &str = "Game started! Your turn.";
const MSG_MOVE_ACCEPTED: &str = "Move accepted";
const MSG_BOT_MOVED: &str = "Bot moved";

/// Timing knobs for the control loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrchestratorSettings {
    /// How long a lone player waits before getting a bot.
    pub matchmaking_timeout: Duration,
    /// Bot "thinking" delay.
    pub bot_move_delay: Duration,
    /// Delay before pushing a new session to the opponent.
    pub opponent_notify_delay: Duration,
    /// Keep-alive interval.
    pub heartbeat_interval: Duration,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self::from(&ServerConfig::default())
    }
}

impl From<&ServerConfig> for OrchestratorSettings {
    fn from(config: &ServerConfig) -> Self {
        Self {
            matchmaking_timeout: config.matchmaking_timeout(),
            bot_move_delay: config.bot_move_delay(),
            opponent_notify_delay: config.opponent_notify_delay(),
            heartbeat_interval: config.heartbeat_interval(),
        }
    }
}

/// Pending bot-move timers, keyed by session.
///
/// The generation lets a finished timer remove only its own entry.
#[derive(Debug, Default)]
struct BotTimers {
    next_generation: AtomicU64,
    pending: Mutex<HashMap<SessionId, (u64, CancellationToken)>>,
}

impl BotTimers {
    fn arm(&self, session_id: &str) -> (u64, CancellationToken) {
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let token = CancellationToken::new();
        let previous = self
            .pending
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(session_id.to_string(), (generation, token.clone()));
        if let Some((_, stale)) = previous {
            stale.cancel();
        }
        (generation, token)
    }

    fn disarm(&self, session_id: &str, generation: u64) {
        let mut pending = self
            .pending
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if pending.get(session_id).is_some_and(|(g, _)| *g == generation) {
            pending.remove(session_id);
        }
    }

    fn cancel(&self, session_id: &str) -> bool {
        let removed = self
            .pending
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(session_id);
        match removed {
            Some((_, token)) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    fn len(&self) -> usize {
        self.pending
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }
}

/// What one connection has established so far.
#[derive(Debug, Default)]
struct ConnectionState {
    player_id: Option<PlayerId>,
    session_id: Option<SessionId>,
}

/// Shared state behind every connection's control loop.
#[derive(Debug, Clone)]
pub struct Orchestrator {
    sessions: SessionStore,
    matchmaking: MatchmakingQueue,
    connections: ConnectionRegistry,
    analytics: Analytics,
    repository: Option<GameRepository>,
    settings: OrchestratorSettings,
    bot_timers: Arc<BotTimers>,
}

impl Orchestrator {
    /// Creates an orchestrator with fresh stores.
    #[instrument(skip(analytics, repository))]
    pub fn new(
        settings: OrchestratorSettings,
        analytics: Analytics,
        repository: Option<GameRepository>,
    ) -> Self {
        info!(persistence = repository.is_some(), "Creating orchestrator");
        Self {
            sessions: SessionStore::new(),
            matchmaking: MatchmakingQueue::new(settings.matchmaking_timeout),
            connections: ConnectionRegistry::new(),
            analytics,
            repository,
            settings,
            bot_timers: Arc::new(BotTimers::default()),
        }
    }

    /// The session store.
    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// The matchmaking queue.
    pub fn matchmaking(&self) -> &MatchmakingQueue {
        &self.matchmaking
    }

    /// The connection registry.
    pub fn connections(&self) -> &ConnectionRegistry {
        &self.connections
    }

    /// Number of bot moves waiting on their thinking delay.
    pub fn pending_bot_moves(&self) -> usize {
        self.bot_timers.len()
    }

    /// Runs one connection until `inbound` ends.
    ///
    /// `inbound` yields text frames; its end means the peer closed or a
    /// read failed. The participant is unregistered on the way out.
    #[instrument(skip_all)]
    pub async fn run_connection<S>(&self, mut inbound: S, outbound: ConnectionHandle)
    where
        S: Stream<Item = String> + Unpin,
    {
        let heartbeat = CancellationToken::new();
        spawn_heartbeat(
            outbound.clone(),
            self.settings.heartbeat_interval,
            heartbeat.clone(),
        );
        let _heartbeat_guard = heartbeat.drop_guard();

        let mut state = ConnectionState::default();
        while let Some(text) = inbound.next().await {
            match ClientMessage::parse(&text) {
                Ok(ClientMessage::Join { payload }) => {
                    self.handle_join(payload, &mut state, &outbound).await;
                }
                Ok(ClientMessage::Move { game_id, payload }) => {
                    self.handle_move(game_id, payload.column, &state, &outbound);
                }
                Ok(ClientMessage::Leave { game_id }) => {
                    self.handle_leave(game_id, &mut state);
                }
                Err(e) => {
                    warn!(error = %e, "Undecodable frame");
                    reply(&outbound, ServerMessage::error("invalid message"));
                }
            }
        }

        if let Some(player_id) = &state.player_id {
            self.connections.unregister(player_id);
            info!(player_id = %player_id, "Player disconnected");
        } else {
            debug!("Connection closed before joining");
        }
    }

    #[instrument(skip(self, payload, state, outbound), fields(username = %payload.username))]
    async fn handle_join(
        &self,
        payload: JoinPayload,
        state: &mut ConnectionState,
        outbound: &ConnectionHandle,
    ) {
        if state.session_id.is_some() {
            reply(outbound, ServerMessage::error("already in a game"));
            return;
        }
        let username = payload.username.trim().to_string();
        if username.is_empty() {
            reply(outbound, ServerMessage::error("username is required"));
            return;
        }

        // A re-join after leave or cancellation gets a fresh identity.
        if let Some(previous) = state.player_id.take() {
            self.connections.unregister(&previous);
            debug!(previous = %previous, "Dropped previous identity");
        }
        let player_id = format!("{}_{}", username, uuid::Uuid::new_v4());
        // Registered before matchmaking so a partner can reach us at once.
        self.connections.register(player_id.clone(), outbound.clone());
        state.player_id = Some(player_id.clone());
        info!(player_id = %player_id, "Player joining");

        let session = match self
            .matchmaking
            .add_player(player_id.clone(), username)
            .await
        {
            Ok(session) => session,
            Err(e) => {
                reply(outbound, ServerMessage::error(e.to_string()));
                return;
            }
        };

        self.sessions.put(session.clone());
        state.session_id = Some(session.id().clone());

        let message = if *session.is_bot() {
            MSG_BOT_START
        } else {
            MSG_HUMAN_START
        };
        reply(outbound, ServerMessage::game_state(&session, &player_id, message));

        if let Some(opponent) = session.opponent_of(&player_id).cloned() {
            if opponent != BOT_ID {
                let connections = self.connections.clone();
                let delay = self.settings.opponent_notify_delay;
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    if !connections.send(&opponent, ServerMessage::game_state(&session, &opponent, message)) {
                        warn!(opponent = %opponent, "Opponent connection not found");
                    }
                });
            }
        }
    }

    #[instrument(skip(self, state, outbound))]
    fn handle_move(
        &self,
        game_id: Option<SessionId>,
        column: i32,
        state: &ConnectionState,
        outbound: &ConnectionHandle,
    ) {
        let (Some(player_id), Some(session_id)) = (&state.player_id, &state.session_id) else {
            reply(outbound, ServerMessage::error("game not started"));
            return;
        };
        if game_id.as_ref().is_some_and(|g| g != session_id) {
            debug!(requested = ?game_id, "Ignoring foreign game_id, using connection's session");
        }

        let session = match self.sessions.apply_move(session_id, player_id, column) {
            Ok(session) => session,
            Err(e) => {
                reply(outbound, ServerMessage::error(e.to_string()));
                return;
            }
        };

        self.broadcast(&session, MSG_MOVE_ACCEPTED);
        self.analytics.log_move(session_id, player_id, column);

        if session.is_bot_turn() {
            self.schedule_bot_move(session_id.clone());
        } else if !session.is_active() {
            self.finish(&session);
        }
    }

    #[instrument(skip(self, state))]
    fn handle_leave(&self, game_id: Option<SessionId>, state: &mut ConnectionState) {
        let (Some(player_id), Some(session_id)) =
            (state.player_id.as_deref(), state.session_id.take())
        else {
            debug!("Leave without a session");
            return;
        };
        if game_id.as_ref().is_some_and(|g| *g != session_id) {
            debug!(requested = ?game_id, "Ignoring foreign game_id, leaving connection's session");
        }
        self.analytics.log_game_abandoned(&session_id, player_id);
        if self.bot_timers.cancel(&session_id) {
            debug!(session_id = %session_id, "Cancelled pending bot move");
        }
        self.sessions.delete(&session_id);
        info!(session_id = %session_id, player_id, "Player left session");
    }

    fn schedule_bot_move(&self, session_id: SessionId) {
        let (generation, token) = self.bot_timers.arm(&session_id);
        let orchestrator = self.clone();
        let delay = self.settings.bot_move_delay;
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {
                    debug!(session_id = %session_id, "Bot move cancelled");
                    return;
                }
                _ = tokio::time::sleep(delay) => {}
            }
            orchestrator.play_bot_turn(&session_id);
            orchestrator.bot_timers.disarm(&session_id, generation);
        });
    }

    /// Lets the bot move in `session_id` if it is its turn.
    #[instrument(skip(self))]
    pub fn play_bot_turn(&self, session_id: &str) {
        let session = match self.sessions.get(session_id) {
            Ok(session) => session,
            Err(_) => {
                debug!("Session gone before bot could move");
                return;
            }
        };
        if !session.is_bot_turn() {
            return;
        }
        let Some(column) = make_bot_move(&session) else {
            warn!("Bot found no legal move");
            return;
        };
        let column = column as i32;

        match self.sessions.apply_move(session_id, BOT_ID, column) {
            Ok(updated) => {
                info!(column, "Bot moved");
                self.broadcast(&updated, MSG_BOT_MOVED);
                self.analytics.log_move(session_id, BOT_ID, column);
                if !updated.is_active() {
                    self.finish(&updated);
                }
            }
            Err(e) => warn!(error = %e, "Bot move rejected"),
        }
    }

    /// Pushes `session` to both human participants.
    fn broadcast(&self, session: &Session, message: &str) {
        for player_id in [session.player1_id(), session.player2_id()] {
            if player_id == BOT_ID {
                continue;
            }
            self.connections
                .send(player_id, ServerMessage::game_state(session, player_id, message));
        }
    }

    /// Reports a finished session to analytics and persistence.
    fn finish(&self, session: &Session) {
        info!(
            session_id = %session.id(),
            status = %session.status(),
            winner = ?session.winner(),
            "Game over"
        );
        self.analytics.log_game_end(
            session.id(),
            session.winner().as_deref(),
            &session.status().to_string(),
        );

        if let Some(repository) = self.repository.clone() {
            let session = session.clone();
            tokio::spawn(async move {
                let result =
                    tokio::task::spawn_blocking(move || repository.record_finished_game(&session))
                        .await;
                match result {
                    Ok(Ok(_)) => {}
                    Ok(Err(e)) => warn!(error = %e, "Failed to record game"),
                    Err(e) => warn!(error = %e, "Recording task failed"),
                }
            });
        }
    }
}

fn reply(outbound: &ConnectionHandle, message: ServerMessage) {
    if outbound.send(Outbound::Message(message)).is_err() {
        debug!("Connection writer gone, dropping reply");
    }
}

fn spawn_heartbeat(outbound: ConnectionHandle, every: Duration, stop: CancellationToken) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = stop.cancelled() => break,
                _ = ticker.tick() => {
                    if outbound.send(Outbound::Ping).is_err() {
                        debug!("Heartbeat stopped, connection gone");
                        break;
                    }
                }
            }
        }
    });
}
