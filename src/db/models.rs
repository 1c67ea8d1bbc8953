//! Database models.

use chrono::NaiveDateTime;
use derive_getters::Getters;
use derive_new::new;
use diesel::prelude::*;

use crate::db::schema;

/// Player row with lifetime results.
#[derive(Debug, Clone, Queryable, Identifiable, Selectable, Getters)]
#[diesel(table_name = schema::players)]
pub struct Player {
    id: String,
    username: String,
    wins: i32,
    losses: i32,
    draws: i32,
    rating: i32,
    created_at: NaiveDateTime,
}

/// Insertable player; counters and rating take their column defaults.
#[derive(Debug, Clone, Insertable, new)]
#[diesel(table_name = schema::players)]
pub struct NewPlayer {
    id: String,
    username: String,
}

/// Finished game row.
#[derive(Debug, Clone, Queryable, Identifiable, Selectable, Getters)]
#[diesel(table_name = schema::games)]
pub struct GameRecord {
    id: String,
    player1_id: String,
    player2_id: String,
    winner_id: Option<String>,
    status: String,
    created_at: NaiveDateTime,
}

/// Insertable game row.
#[derive(Debug, Clone, Insertable, new, Getters)]
#[diesel(table_name = schema::games)]
pub struct NewGameRecord {
    id: String,
    player1_id: String,
    player2_id: String,
    winner_id: Option<String>,
    status: String,
}
