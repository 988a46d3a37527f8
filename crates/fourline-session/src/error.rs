//! Error types for the session layer.

use fourline_game::BoardError;
use fourline_protocol::{PlayerName, SessionId};

/// Reasons a session operation can be rejected.
///
/// These travel back to the client as `error` payloads, so the messages
/// are written for players, not logs.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// The session hasn't started or has already completed.
    #[error("game is not active")]
    NotActive,

    /// A move arrived from the participant whose turn it isn't.
    #[error("not your turn")]
    OutOfTurn,

    /// The board rejected the column.
    #[error(transparent)]
    Move(#[from] BoardError),

    /// The named player has no seat in this session.
    #[error("{0} is not part of this game")]
    NotParticipant(PlayerName),

    /// The actor is gone; its channel is closed.
    #[error("game {0} is unavailable")]
    Unavailable(SessionId),
}
