//! Core domain types for four-in-a-row.

use derive_more::Display;
use serde::{Deserialize, Serialize};

/// Number of rows on the board.
pub const ROWS: usize = 6;

/// Number of columns on the board.
pub const COLS: usize = 7;

/// A participant's piece.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
pub enum Piece {
    /// First participant's piece (moves first).
    #[display("1")]
    One,
    /// Second participant's piece.
    #[display("2")]
    Two,
}

impl Piece {
    /// Returns the opposing piece.
    pub fn opponent(self) -> Self {
        match self {
            Piece::One => Piece::Two,
            Piece::Two => Piece::One,
        }
    }
}

/// A single cell of the grid.
///
/// Serialized as `0` (empty), `1` or `2` so clients can index the grid as a
/// plain integer matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum Cell {
    /// No piece.
    #[default]
    Empty,
    /// Cell holding a piece.
    Occupied(Piece),
}

impl From<Cell> for u8 {
    fn from(cell: Cell) -> Self {
        match cell {
            Cell::Empty => 0,
            Cell::Occupied(Piece::One) => 1,
            Cell::Occupied(Piece::Two) => 2,
        }
    }
}

impl TryFrom<u8> for Cell {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Cell::Empty),
            1 => Ok(Cell::Occupied(Piece::One)),
            2 => Ok(Cell::Occupied(Piece::Two)),
            other => Err(format!("invalid cell value: {}", other)),
        }
    }
}

/// 6x7 board. Row 0 is the top, row 5 the bottom; pieces fall toward row 5.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Board {
    cells: [[Cell; COLS]; ROWS],
}

impl Board {
    /// Creates an empty board.
    pub fn new() -> Self {
        Self::default()
    }

    /// Gets the cell at `(row, col)`, or `None` when out of bounds.
    pub fn get(&self, row: usize, col: usize) -> Option<Cell> {
        self.cells.get(row).and_then(|r| r.get(col)).copied()
    }

    /// Returns all rows, top first.
    pub fn rows(&self) -> &[[Cell; COLS]; ROWS] {
        &self.cells
    }

    /// True iff `column` is on the board and its top cell is empty.
    pub fn can_drop(&self, column: usize) -> bool {
        column < COLS && self.cells[0][column] == Cell::Empty
    }

    /// Lowest empty row in `column`, or `None` when the column is full or
    /// off the board.
    pub fn drop_row(&self, column: usize) -> Option<usize> {
        if column >= COLS {
            return None;
        }
        (0..ROWS).rev().find(|&row| self.cells[row][column] == Cell::Empty)
    }

    /// Sets a single cell. The caller guarantees the cell was empty.
    pub fn place(&mut self, row: usize, column: usize, piece: Piece) {
        self.cells[row][column] = Cell::Occupied(piece);
    }

    /// Clears a single cell. Only used to revert hypothetical placements.
    pub(crate) fn clear(&mut self, row: usize, column: usize) {
        self.cells[row][column] = Cell::Empty;
    }

    /// Counts the pieces of one kind on the board.
    pub fn count(&self, piece: Piece) -> usize {
        self.cells
            .iter()
            .flatten()
            .filter(|cell| **cell == Cell::Occupied(piece))
            .count()
    }

    /// Formats the board as a human-readable grid.
    pub fn display(&self) -> String {
        let mut result = String::new();
        for (i, row) in self.cells.iter().enumerate() {
            for cell in row {
                result.push(match cell {
                    Cell::Empty => '.',
                    Cell::Occupied(Piece::One) => 'X',
                    Cell::Occupied(Piece::Two) => 'O',
                });
            }
            if i + 1 < ROWS {
                result.push('\n');
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drop_row_stacks_from_bottom() {
        let mut board = Board::new();
        assert_eq!(board.drop_row(3), Some(5));
        board.place(5, 3, Piece::One);
        assert_eq!(board.drop_row(3), Some(4));
    }

    #[test]
    fn test_column_fills_after_six_drops() {
        let mut board = Board::new();
        for i in 0..ROWS {
            assert!(board.can_drop(2), "column should accept drop {}", i);
            let row = board.drop_row(2).unwrap();
            board.place(row, 2, if i % 2 == 0 { Piece::One } else { Piece::Two });
        }
        assert!(!board.can_drop(2));
        assert_eq!(board.drop_row(2), None);
    }

    #[test]
    fn test_out_of_range_column() {
        let board = Board::new();
        assert!(!board.can_drop(COLS));
        assert_eq!(board.drop_row(7), None);
    }

    #[test]
    fn test_board_serializes_as_integers() {
        let mut board = Board::new();
        board.place(5, 0, Piece::One);
        board.place(5, 1, Piece::Two);
        let json = serde_json::to_value(&board).unwrap();
        assert_eq!(json[5][0], 1);
        assert_eq!(json[5][1], 2);
        assert_eq!(json[0][0], 0);

        let back: Board = serde_json::from_value(json).unwrap();
        assert_eq!(back, board);
    }
}
