//! Error types for the board layer.

/// Reasons a move can be rejected by the board.
///
/// Turn ownership is not the board's concern — it only validates the
/// column itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum BoardError {
    /// The column index is outside `0..7`.
    #[error("column {0} is out of range")]
    InvalidColumn(usize),

    /// The column's top cell is occupied — no room left.
    #[error("column {0} is full")]
    ColumnFull(usize),
}
