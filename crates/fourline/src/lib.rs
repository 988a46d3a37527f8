//! # Fourline
//!
//! WebSocket server for a two-player four-in-a-row duel. Players join
//! over a persistent socket, get matched first-in-first-out (with an
//! automated opponent stepping in after ten seconds), and play on a
//! 6×7 grid. Dropped connections get a thirty-second grace window
//! before the game is forfeited.
//!
//! The heavy lifting lives in the layer crates; this crate binds the
//! socket, routes payloads, and supplies the in-memory collaborators.
//!
//! ```rust,no_run
//! use fourline::GameServer;
//!
//! # async fn run() -> Result<(), fourline::ServerError> {
//! let server = GameServer::builder().bind("0.0.0.0:5000").build().await?;
//! server.run().await
//! # }
//! ```

mod collaborators;
mod error;
mod handler;
mod server;

pub use collaborators::{
    AnalyticsSink, AnalyticsSummary, MemoryArchive, MemoryStandings, Standing,
};
pub use error::ServerError;
pub use server::{GameServer, GameServerBuilder};
