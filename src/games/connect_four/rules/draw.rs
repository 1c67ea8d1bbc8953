//! Full-board detection for four-in-a-row.

use super::super::{Board, Cell};

/// Checks if no empty cell remains.
///
/// A full board with no winner is a draw.
pub fn is_full(board: &Board) -> bool {
    board.rows().iter().flatten().all(|cell| *cell != Cell::Empty)
}
