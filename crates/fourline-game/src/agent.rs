//! Rule-based opponent used when no human partner is available.

use crate::board::{Board, Mark, COLS};

/// Column preference once no immediate win or block exists: center first,
/// fanning outward.
const CENTER_OUT: [usize; COLS] = [3, 2, 4, 1, 5, 0, 6];

/// Deterministic move selector.
///
/// Selection order:
/// 1. a column that wins immediately for the agent
/// 2. a column that blocks the opponent's immediate win
/// 3. the first playable column in center-out order
/// 4. the first playable column left to right
///
/// The win and block probes scan columns left to right, so the lowest
/// qualifying index always wins ties. Selection simulates on the caller's
/// board but always retracts; the grid is unchanged when `select` returns.
#[derive(Debug, Clone, Copy)]
pub struct OpponentAgent {
    mark: Mark,
}

impl OpponentAgent {
    pub fn new(mark: Mark) -> Self {
        Self { mark }
    }

    /// The mark this agent plays.
    pub fn mark(&self) -> Mark {
        self.mark
    }

    /// Picks a column for the current board, or `None` when the grid is
    /// full.
    pub fn select(&self, board: &mut Board) -> Option<usize> {
        if let Some(col) = self.winning_column(board, self.mark) {
            return Some(col);
        }
        if let Some(col) = self.winning_column(board, self.mark.other()) {
            return Some(col);
        }
        CENTER_OUT
            .iter()
            .copied()
            .find(|&col| !board.is_column_full(col))
            .or_else(|| (0..COLS).find(|&col| !board.is_column_full(col)))
    }

    /// First column (left to right) where dropping `mark` completes a
    /// four-run. Each probe is placed, checked, and lifted.
    fn winning_column(&self, board: &mut Board, mark: Mark) -> Option<usize> {
        for col in 0..COLS {
            let Some(row) = board.lowest_empty_row(col) else {
                continue;
            };
            board.place(row, col, mark);
            let wins = board.winner() == Some(mark);
            board.lift(row, col);
            if wins {
                return Some(col);
            }
        }
        None
    }
}
