//! Message types for Fourline's wire format.
//!
//! Everything here is a structure that gets serialized to JSON, sent over
//! the socket, and deserialized on the other side. Payload enums are
//! internally tagged on `"type"` with snake_case tags, so a join looks
//! like `{"type": "join", "username": "alice"}`.

use serde::{Deserialize, Serialize};
use std::fmt;

use fourline_game::{Cell, Coord, Mark};

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A player's chosen username.
///
/// Names are the identity of a connection: the registry, the queue, and
/// session membership are all keyed by name. A newtype keeps them from
/// being confused with other strings in signatures.
///
/// `#[serde(transparent)]` makes this serialize as the bare string.
///
/// The names `""`, `"BOT"`, and `"draw"` are rejected at join time by the
/// dispatch layer — the last two are the wire encodings of [`Participant::Bot`]
/// and [`Outcome::Draw`], and must never be claimable.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct PlayerName(String);

impl PlayerName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlayerName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PlayerName {
    fn from(name: &str) -> Self {
        Self(name.to_owned())
    }
}

/// A unique identifier for one game session.
///
/// Ids are allocated from a server-wide counter and serialize as the bare
/// number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "game-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Participant and Outcome
// ---------------------------------------------------------------------------

/// One side of a session: a named human or the automated opponent.
///
/// On the wire a participant is always a plain string — the username, or
/// the sentinel `"BOT"`. Hand-written serde impls keep that encoding in
/// one place.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Participant {
    Player(PlayerName),
    Bot,
}

/// The wire spelling of the automated opponent.
pub(crate) const BOT_SENTINEL: &str = "BOT";

impl Participant {
    pub fn is_bot(&self) -> bool {
        matches!(self, Participant::Bot)
    }

    /// The username, when this side is a human.
    pub fn name(&self) -> Option<&PlayerName> {
        match self {
            Participant::Player(name) => Some(name),
            Participant::Bot => None,
        }
    }
}

impl From<PlayerName> for Participant {
    fn from(name: PlayerName) -> Self {
        Participant::Player(name)
    }
}

impl fmt::Display for Participant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Participant::Player(name) => f.write_str(name.as_str()),
            Participant::Bot => f.write_str(BOT_SENTINEL),
        }
    }
}

impl Serialize for Participant {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Participant::Player(name) => name.serialize(serializer),
            Participant::Bot => serializer.serialize_str(BOT_SENTINEL),
        }
    }
}

impl<'de> Deserialize<'de> for Participant {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(if raw == BOT_SENTINEL {
            Participant::Bot
        } else {
            Participant::Player(PlayerName(raw))
        })
    }
}

/// How a completed session ended: a winning side, or a full-board draw.
///
/// Serializes as the winner's participant string, or `"draw"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Winner(Participant),
    Draw,
}

const DRAW_SENTINEL: &str = "draw";

impl Outcome {
    pub fn is_draw(&self) -> bool {
        matches!(self, Outcome::Draw)
    }

    pub fn winner(&self) -> Option<&Participant> {
        match self {
            Outcome::Winner(participant) => Some(participant),
            Outcome::Draw => None,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Winner(participant) => participant.fmt(f),
            Outcome::Draw => f.write_str(DRAW_SENTINEL),
        }
    }
}

impl Serialize for Outcome {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Outcome::Winner(participant) => participant.serialize(serializer),
            Outcome::Draw => serializer.serialize_str(DRAW_SENTINEL),
        }
    }
}

impl<'de> Deserialize<'de> for Outcome {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(if raw == DRAW_SENTINEL {
            Outcome::Draw
        } else if raw == BOT_SENTINEL {
            Outcome::Winner(Participant::Bot)
        } else {
            Outcome::Winner(Participant::Player(PlayerName(raw)))
        })
    }
}

// ---------------------------------------------------------------------------
// Session snapshot
// ---------------------------------------------------------------------------

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Waiting,
    Active,
    Completed,
}

/// A full snapshot of one session, embedded in `game_start` and
/// `reconnected` payloads so a client can render the whole game from a
/// single message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionView {
    pub session_id: SessionId,
    /// First seat, always a human, always plays `X`.
    pub player1: PlayerName,
    /// Second seat: human or the automated opponent, always plays `O`.
    pub player2: Participant,
    pub current_player: Participant,
    /// Grid snapshot, row 0 first; cells are `null`, `"X"`, or `"O"`.
    pub board: Vec<Vec<Cell>>,
    pub status: SessionStatus,
    pub winner: Option<Outcome>,
    pub player1_mark: Mark,
    pub player2_mark: Mark,
    pub vs_bot: bool,
}

// ---------------------------------------------------------------------------
// Payloads
// ---------------------------------------------------------------------------

/// Client → server messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientPayload {
    /// Enter the matchmaking queue under a username.
    Join { username: PlayerName },

    /// Drop a mark into a column of the caller's current session.
    Move { column: usize },

    /// Re-attach to a session after a dropped connection.
    Reconnect {
        username: PlayerName,
        session_id: SessionId,
    },
}

/// Server → client messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerPayload {
    /// Queued; no opponent yet.
    Waiting { message: String },

    /// A session started. `message` is set when the opponent is the
    /// automated one.
    GameStart {
        game: SessionView,
        #[serde(skip_serializing_if = "Option::is_none", default)]
        message: Option<String>,
    },

    /// A move was applied. Sent to both sides, mover included.
    Move {
        player: Participant,
        column: usize,
        position: Coord,
        /// Whose turn is next; absent once the session completed.
        next_player: Option<Participant>,
        game_over: bool,
        winner: Option<Outcome>,
    },

    /// Current roster of connected players, sorted by name.
    OnlinePlayers { players: Vec<PlayerName> },

    /// The opponent's connection dropped; the grace timer is running.
    OpponentDisconnected { player: PlayerName },

    /// The opponent re-attached within the grace window.
    OpponentReconnected { player: PlayerName },

    /// Reply to a successful `reconnect`, carrying the full snapshot.
    Reconnected { game: SessionView },

    /// The session ended outside the normal move flow.
    GameOver { winner: Outcome, reason: String },

    /// A request was rejected.
    Error { message: String },
}

// =========================================================================
// Tests
// =========================================================================
