//! Lifecycle events and the completion-side collaborator seams.
//!
//! The actor announces what happened; what the rest of the system does
//! with it (archive, standings, analytics) hides behind these traits.
//! All three are synchronous fire-and-forget: a slow or failing
//! collaborator must never stall a game.

use std::sync::Arc;

use serde::Serialize;

use fourline_game::Cell;
use fourline_protocol::{Outcome, Participant, PlayerName, SessionId};

/// Something notable that happened inside a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LifecycleEvent {
    SessionStarted {
        session_id: SessionId,
        player1: PlayerName,
        player2: Participant,
        vs_bot: bool,
    },
    MoveMade {
        session_id: SessionId,
        player: Participant,
        column: usize,
    },
    PlayerDisconnected {
        session_id: SessionId,
        player: PlayerName,
    },
    PlayerReconnected {
        session_id: SessionId,
        player: PlayerName,
    },
    SessionEnded {
        session_id: SessionId,
        outcome: Outcome,
        duration_secs: u64,
    },
    SessionForfeited {
        session_id: SessionId,
        forfeited_by: PlayerName,
        winner: Participant,
    },
}

/// A finished human-vs-human game, as handed to the archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompletedGame {
    pub session_id: SessionId,
    pub player1: PlayerName,
    pub player2: PlayerName,
    pub winner: Outcome,
    pub board: Vec<Vec<Cell>>,
    pub duration_secs: u64,
}

/// Receives every lifecycle event, in order, per session.
pub trait EventSink: Send + Sync + 'static {
    fn record(&self, event: LifecycleEvent);
}

/// Stores completed human-vs-human games. Bot games are never offered.
pub trait GameArchive: Send + Sync + 'static {
    fn persist(&self, game: CompletedGame);
}

/// Applies one completed game to the win/loss/draw table. Called for
/// every completion, bot games included.
pub trait StandingsStore: Send + Sync + 'static {
    fn apply(&self, player1: &PlayerName, player2: &Participant, outcome: &Outcome);
}

/// The bundle of completion-side collaborators shared by all sessions.
#[derive(Clone)]
pub struct Collaborators {
    pub events: Arc<dyn EventSink>,
    pub archive: Arc<dyn GameArchive>,
    pub standings: Arc<dyn StandingsStore>,
}
