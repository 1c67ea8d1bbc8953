//! Heuristic opponent used when no human partner is found in time.
//!
//! The rules, in priority order:
//! 1. take an immediate win (leftmost first),
//! 2. block the opponent's immediate win (leftmost first),
//! 3. play the first open column from the centre outwards.

use crate::games::connect_four::{Board, COLS, Piece, check_win};
use crate::session::Session;
use tracing::{debug, instrument};

/// Centre-out column preference.
const PREFERRED_ORDER: [usize; COLS] = [3, 4, 2, 5, 1, 6, 0];

/// Picks a column for the participant whose turn it is in `session`.
///
/// Returns `None` when no column is playable.
#[instrument(skip(session), fields(session_id = %session.id()))]
pub fn make_bot_move(session: &Session) -> Option<usize> {
    let piece = session.piece_for(session.current_turn())?;
    let mut board = session.board().clone();
    choose_column(&mut board, piece)
}

/// Picks a column for `piece` on `board`.
///
/// Lookahead placements are reverted, so `board` is unchanged on return.
pub fn choose_column(board: &mut Board, piece: Piece) -> Option<usize> {
    if let Some(col) = first_winning_column(board, piece) {
        debug!(col, "Taking winning column");
        return Some(col);
    }
    if let Some(col) = first_winning_column(board, piece.opponent()) {
        debug!(col, "Blocking opponent");
        return Some(col);
    }
    let col = PREFERRED_ORDER.into_iter().find(|&col| board.can_drop(col));
    debug!(?col, "Falling back to centre preference");
    col
}

/// Leftmost column where dropping `piece` wins on the spot.
fn first_winning_column(board: &mut Board, piece: Piece) -> Option<usize> {
    (0..COLS).find(|&col| {
        let Some(row) = board.drop_row(col) else {
            return false;
        };
        board.place(row, col, piece);
        let wins = check_win(board, piece);
        board.clear(row, col);
        wins
    })
}
