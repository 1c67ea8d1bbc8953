//! Database persistence for players and finished games.

mod error;
mod models;
mod repository;
mod schema; // Diesel generated schema - internal use only

pub use error::DbError;
pub use models::{GameRecord, NewGameRecord, NewPlayer, Player};
pub use repository::GameRepository;
