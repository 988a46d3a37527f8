//! Board model and heuristic opponent for Fourline.
//!
//! This crate is the leaf of the workspace: a fixed 6×7 connection grid
//! with gravity-based move application and win/draw detection, plus the
//! rule-based agent that stands in when no human opponent is available.
//!
//! # Key types
//!
//! - [`Board`] — the grid; moves, win scan, simulation primitives
//! - [`Mark`] / [`Cell`] — the two move symbols and the cell states
//! - [`OpponentAgent`] — deterministic win → block → center-out heuristic
//! - [`BoardError`] — rejected moves (out-of-range or full column)

mod agent;
mod board;
mod error;

pub use agent::OpponentAgent;
pub use board::{Board, Cell, Coord, Mark, COLS, ROWS};
pub use error::BoardError;
