//! The 6×7 connection grid.
//!
//! Row 0 is the top of the grid, row 5 the bottom. A move always settles
//! into the lowest empty row of its column, so a column whose row-0 cell
//! is occupied is full. The grid is owned exclusively by its session and
//! mutated only through [`Board::drop`] (plus the crate-internal
//! simulation primitives used by the agent's lookahead).

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::BoardError;

/// Number of rows in the grid.
pub const ROWS: usize = 6;
/// Number of columns in the grid.
pub const COLS: usize = 7;

/// Run length required to win.
const WIN_LEN: usize = 4;

// ---------------------------------------------------------------------------
// Mark and Cell
// ---------------------------------------------------------------------------

/// One of the two move symbols. The first participant of a session always
/// plays `X`, the second always `O`; the assignment never changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Mark {
    X,
    O,
}

impl Mark {
    /// The opposing mark.
    pub fn other(self) -> Mark {
        match self {
            Mark::X => Mark::O,
            Mark::O => Mark::X,
        }
    }

    /// The occupied cell state for this mark.
    pub fn cell(self) -> Cell {
        match self {
            Mark::X => Cell::X,
            Mark::O => Cell::O,
        }
    }
}

impl fmt::Display for Mark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mark::X => write!(f, "X"),
            Mark::O => write!(f, "O"),
        }
    }
}

/// One cell of the grid: empty or holding a mark.
///
/// Serializes as `null` / `"X"` / `"O"` so a grid snapshot reads naturally
/// on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Cell {
    #[default]
    Empty,
    X,
    O,
}

impl Cell {
    /// The mark occupying this cell, if any.
    pub fn mark(self) -> Option<Mark> {
        match self {
            Cell::Empty => None,
            Cell::X => Some(Mark::X),
            Cell::O => Some(Mark::O),
        }
    }
}

impl Serialize for Cell {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.mark().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Cell {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match Option::<Mark>::deserialize(deserializer)? {
            None => Cell::Empty,
            Some(mark) => mark.cell(),
        })
    }
}

/// Grid coordinates of a settled move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coord {
    pub row: usize,
    pub col: usize,
}

// ---------------------------------------------------------------------------
// Board
// ---------------------------------------------------------------------------

/// Line directions scanned for a winning run: horizontal, vertical, and
/// both diagonals. Each is counted in both orientations from the origin
/// cell, so four entries cover all eight rays.
const DIRECTIONS: [(isize, isize); 4] = [(0, 1), (1, 0), (1, 1), (1, -1)];

/// The fixed 6×7 grid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Board {
    cells: [[Cell; COLS]; ROWS],
}

impl Default for Board {
    fn default() -> Self {
        Self::new()
    }
}

impl Board {
    /// Creates an empty board.
    pub fn new() -> Self {
        Self {
            cells: [[Cell::Empty; COLS]; ROWS],
        }
    }

    /// Returns the cell at the given position.
    pub fn get(&self, row: usize, col: usize) -> Cell {
        self.cells[row][col]
    }

    /// Returns `true` if the column cannot accept another move.
    pub fn is_column_full(&self, col: usize) -> bool {
        col >= COLS || self.cells[0][col] != Cell::Empty
    }

    /// Drops a mark into a column. The mark settles into the lowest empty
    /// row and the settled coordinates are returned.
    ///
    /// # Errors
    /// - [`BoardError::InvalidColumn`] if `col` is outside `0..7`
    /// - [`BoardError::ColumnFull`] if the column's top cell is occupied
    pub fn drop(&mut self, col: usize, mark: Mark) -> Result<Coord, BoardError> {
        if col >= COLS {
            return Err(BoardError::InvalidColumn(col));
        }
        let row = self
            .lowest_empty_row(col)
            .ok_or(BoardError::ColumnFull(col))?;
        self.cells[row][col] = mark.cell();
        Ok(Coord { row, col })
    }

    /// Returns `true` if every cell is occupied. Checking row 0 is
    /// sufficient because columns fill bottom-up.
    pub fn is_full(&self) -> bool {
        self.cells[0].iter().all(|c| *c != Cell::Empty)
    }

    /// Scans the whole grid for a winning run of four.
    ///
    /// Every occupied cell is tested against the four line directions,
    /// counting consecutive same-mark cells extending both ways from it
    /// (the cell itself counted once). A full rescan is deliberately kept
    /// over a last-move-origin scan; a winning board has at most one mark
    /// with a four-run, so the result is order-independent.
    pub fn winner(&self) -> Option<Mark> {
        for row in 0..ROWS {
            for col in 0..COLS {
                if let Some(mark) = self.cells[row][col].mark() {
                    if self.wins_from(row, col, mark) {
                        return Some(mark);
                    }
                }
            }
        }
        None
    }

    fn wins_from(&self, row: usize, col: usize, mark: Mark) -> bool {
        DIRECTIONS.iter().any(|&(dr, dc)| {
            let run = 1
                + self.count_ray(row, col, dr, dc, mark)
                + self.count_ray(row, col, -dr, -dc, mark);
            run >= WIN_LEN
        })
    }

    /// Counts consecutive `mark` cells along a ray, excluding the origin.
    fn count_ray(&self, row: usize, col: usize, dr: isize, dc: isize, mark: Mark) -> usize {
        let mut count = 0;
        let mut r = row as isize + dr;
        let mut c = col as isize + dc;
        while (0..ROWS as isize).contains(&r)
            && (0..COLS as isize).contains(&c)
            && self.cells[r as usize][c as usize] == mark.cell()
        {
            count += 1;
            r += dr;
            c += dc;
        }
        count
    }

    /// Full snapshot of the grid, row 0 first. Used for session views.
    pub fn snapshot(&self) -> Vec<Vec<Cell>> {
        self.cells.iter().map(|row| row.to_vec()).collect()
    }

    // -- Simulation primitives ----------------------------------------------
    //
    // The agent's lookahead places a mark, inspects the result, and lifts
    // the mark back out. No other cell may be disturbed.

    /// The row a mark dropped into `col` would settle into, if any.
    pub(crate) fn lowest_empty_row(&self, col: usize) -> Option<usize> {
        (0..ROWS).rev().find(|&row| self.cells[row][col] == Cell::Empty)
    }

    /// Places a mark at an exact cell.
    pub(crate) fn place(&mut self, row: usize, col: usize, mark: Mark) {
        self.cells[row][col] = mark.cell();
    }

    /// Retracts a simulated mark.
    pub(crate) fn lift(&mut self, row: usize, col: usize) {
        self.cells[row][col] = Cell::Empty;
    }
}

// =========================================================================
// Tests
// =========================================================================
