//! Four in a Row - real-time two-player game server.
//!
//! Players connect over WebSocket, are paired by a matchmaking queue (or
//! handed a heuristic bot after a timeout) and play on a 6x7 board.
//!
//! # Architecture
//!
//! - **Board engine**: gravity-drop placement, win and full-board detection
//! - **Session store**: authoritative sessions with atomic move application
//! - **Matchmaking**: FIFO pairing with bot fallback
//! - **Connection registry**: identity to outbound channel
//! - **Orchestrator**: per-connection control loop
//!
//! # Example
//!
//! ```no_run
//! use four_in_a_row::{Analytics, Orchestrator, OrchestratorSettings};
//!
//! # async fn example() -> std::io::Result<()> {
//! let orchestrator = Orchestrator::new(OrchestratorSettings::default(), Analytics::disabled(), None);
//! let listener = tokio::net::TcpListener::bind("127.0.0.1:8080").await?;
//! four_in_a_row::serve(listener, orchestrator, Default::default()).await
//! # }
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod analytics;
mod bot;
mod config;
mod db;
mod games;
mod matchmaking;
mod orchestrator;
mod protocol;
mod registry;
mod server;
mod session;

// Crate-level exports - Board engine
pub use games::connect_four::{Board, COLS, Cell, Piece, ROWS, check_win, is_full};

// Crate-level exports - Sessions
pub use session::{
    BOT_ID, BOT_NAME, PlayerId, Session, SessionError, SessionId, SessionStatus, SessionStore,
};

// Crate-level exports - Bot
pub use bot::{choose_column, make_bot_move};

// Crate-level exports - Matchmaking
pub use matchmaking::{MatchmakingError, MatchmakingQueue};

// Crate-level exports - Connections and protocol
pub use protocol::{
    ClientMessage, ErrorPayload, GameStatePayload, JoinPayload, MovePayload, Outbound,
    ServerMessage,
};
pub use registry::{ConnectionHandle, ConnectionRegistry};

// Crate-level exports - Orchestration and transport
pub use orchestrator::{Orchestrator, OrchestratorSettings};
pub use server::{router, serve};

// Crate-level exports - Analytics
pub use analytics::{
    Analytics, AnalyticsError, AnalyticsSink, ChannelSink, EventType, GameEvent, NoopSink,
    TracingSink,
};

// Crate-level exports - Configuration
pub use config::{ConfigError, ServerConfig};

// Crate-level exports - Persistence
pub use db::{DbError, GameRecord, GameRepository, NewGameRecord, NewPlayer, Player};
