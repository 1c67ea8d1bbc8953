//! Win detection logic for four-in-a-row.

use super::super::{Board, Cell, Piece, COLS, ROWS};

/// Scan directions as `(row delta, column delta)`: right, down, down-right,
/// down-left. Every run is found from its first cell, so no backward scan.
const DIRECTIONS: [(isize, isize); 4] = [(0, 1), (1, 0), (1, 1), (1, -1)];

/// Length of a winning run.
const RUN: isize = 4;

/// Returns true iff `piece` has four in a row anywhere on the board.
///
/// Always scans the whole grid.
pub fn check_win(board: &Board, piece: Piece) -> bool {
    (0..ROWS).any(|row| {
        (0..COLS).any(|col| {
            board.get(row, col) == Some(Cell::Occupied(piece))
                && DIRECTIONS
                    .iter()
                    .any(|&(dr, dc)| run_from(board, row, col, piece, dr, dc))
        })
    })
}

fn run_from(board: &Board, row: usize, col: usize, piece: Piece, dr: isize, dc: isize) -> bool {
    (0..RUN).all(|i| {
        let r = row as isize + i * dr;
        let c = col as isize + i * dc;
        r >= 0
            && c >= 0
            && board.get(r as usize, c as usize) == Some(Cell::Occupied(piece))
    })
}
