//! Four-in-a-row board engine.
//!
//! Pure logic over a fixed 6x7 grid: gravity-drop placement, win detection
//! and full-board detection. No shared state lives here.

mod rules;
mod types;

pub use rules::{check_win, is_full};
pub use types::{Board, COLS, Cell, Piece, ROWS};
