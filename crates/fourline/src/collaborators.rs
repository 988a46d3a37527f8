//! In-memory implementations of the completion-side collaborators.
//!
//! These back the default server: an analytics sink that logs every
//! lifecycle event and keeps a running summary, an archive of finished
//! human games, and a win/loss/draw table. All three take one lock per
//! call and never block on I/O, so a finishing game is never stalled.

use std::collections::HashMap;
use std::sync::Mutex;

use serde::Serialize;
use tracing::info;

use fourline_protocol::{Outcome, Participant, PlayerName};
use fourline_session::{
    CompletedGame, EventSink, GameArchive, LifecycleEvent, StandingsStore,
};

// ---------------------------------------------------------------------------
// Analytics
// ---------------------------------------------------------------------------

/// Running totals over completed games.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AnalyticsSummary {
    pub total_games: u64,
    pub total_duration_secs: u64,
    /// Completions per outcome string (username, `"BOT"`, or `"draw"`).
    pub outcomes: HashMap<String, u64>,
}

/// Logs every lifecycle event and aggregates completion totals.
#[derive(Debug, Default)]
pub struct AnalyticsSink {
    summary: Mutex<AnalyticsSummary>,
}

impl AnalyticsSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn summary(&self) -> AnalyticsSummary {
        self.summary.lock().expect("analytics lock poisoned").clone()
    }
}

impl EventSink for AnalyticsSink {
    fn record(&self, event: LifecycleEvent) {
        match serde_json::to_string(&event) {
            Ok(json) => info!(target: "fourline::events", %json, "game event"),
            Err(_) => info!(target: "fourline::events", ?event, "game event"),
        }

        if let LifecycleEvent::SessionEnded {
            outcome,
            duration_secs,
            ..
        } = event
        {
            let mut summary = self.summary.lock().expect("analytics lock poisoned");
            summary.total_games += 1;
            summary.total_duration_secs += duration_secs;
            *summary.outcomes.entry(outcome.to_string()).or_default() += 1;
        }
    }
}

// ---------------------------------------------------------------------------
// Archive
// ---------------------------------------------------------------------------

/// Keeps completed human-vs-human games in memory, newest last.
#[derive(Debug, Default)]
pub struct MemoryArchive {
    games: Mutex<Vec<CompletedGame>>,
}

impl MemoryArchive {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn completed(&self) -> Vec<CompletedGame> {
        self.games.lock().expect("archive lock poisoned").clone()
    }
}

impl GameArchive for MemoryArchive {
    fn persist(&self, game: CompletedGame) {
        self.games.lock().expect("archive lock poisoned").push(game);
    }
}

// ---------------------------------------------------------------------------
// Standings
// ---------------------------------------------------------------------------

/// One player's row in the standings table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Standing {
    pub wins: u32,
    pub losses: u32,
    pub draws: u32,
}

/// Win/loss/draw counts per human player.
///
/// One lock acquisition covers both rows of a game, so the table never
/// shows a half-applied result. The automated opponent has no row:
/// games against it touch only the human's.
#[derive(Debug, Default)]
pub struct MemoryStandings {
    rows: Mutex<HashMap<PlayerName, Standing>>,
}

impl MemoryStandings {
    pub fn new() -> Self {
        Self::default()
    }

    /// The table sorted by wins descending, then losses ascending, then
    /// name.
    pub fn standings(&self) -> Vec<(PlayerName, Standing)> {
        let rows = self.rows.lock().expect("standings lock poisoned");
        let mut table: Vec<_> = rows.iter().map(|(p, s)| (p.clone(), *s)).collect();
        table.sort_by(|(name_a, a), (name_b, b)| {
            b.wins
                .cmp(&a.wins)
                .then(a.losses.cmp(&b.losses))
                .then(name_a.cmp(name_b))
        });
        table
    }
}

impl StandingsStore for MemoryStandings {
    fn apply(&self, player1: &PlayerName, player2: &Participant, outcome: &Outcome) {
        let mut rows = self.rows.lock().expect("standings lock poisoned");

        let mut update = |player: &PlayerName| {
            let row = rows.entry(player.clone()).or_default();
            match outcome {
                Outcome::Draw => row.draws += 1,
                Outcome::Winner(winner) if winner.name() == Some(player) => {
                    row.wins += 1;
                }
                Outcome::Winner(_) => row.losses += 1,
            }
        };

        update(player1);
        if let Some(player2) = player2.name() {
            update(player2);
        }
    }
}

// =========================================================================
// Tests
// =========================================================================
