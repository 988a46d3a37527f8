//! Game sessions for Fourline.
//!
//! Two layers live here:
//!
//! - [`Session`] — the pure state machine: turn order, move application,
//!   win/draw detection, disconnect bookkeeping, forfeits. No I/O, no
//!   tasks, fully unit-testable.
//! - [`spawn_session`] / [`SessionHandle`] — the actor wrapper: one Tokio
//!   task per session owns the `Session` exclusively and serializes
//!   every mutation (player moves, automated moves, timer firings)
//!   through its command channel.
//!
//! Completion side effects go through the [`Collaborators`] traits so
//! archival, standings, and event recording stay swappable.

mod actor;
mod config;
mod error;
mod events;
mod session;

pub use actor::{spawn_session, RetiredSender, SessionHandle};
pub use config::SessionConfig;
pub use error::SessionError;
pub use events::{
    Collaborators, CompletedGame, EventSink, GameArchive, LifecycleEvent,
    StandingsStore,
};
pub use session::{ForfeitReport, MoveReport, Session, TurnOutcome};
