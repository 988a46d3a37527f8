//! Matchmaking for Fourline.
//!
//! Players queue first-in-first-out. A new joiner pairs with the head of
//! the queue; a player who waits out the fallback delay gets a game
//! against the automated opponent instead. Either way, launching the
//! game goes through the [`MatchStarter`] seam, so the lobby knows
//! nothing about sessions or sockets.
//!
//! # Claimed at most once
//!
//! A queue entry can be claimed by a pairing join, by its own fallback
//! timer, or by `leave` — never by more than one. Every claim removes
//! the entry under the queue lock: pairing pops it (and cancels its
//! timer), the fallback callback removes its own entry by name before
//! launching, and a fired timer whose entry is already gone does
//! nothing.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{debug, info};

use fourline_protocol::{Participant, PlayerName};
use fourline_timer::Deferred;

/// Launches a game between two seats. Fire-and-forget: implementations
/// spawn whatever work the launch needs and return immediately.
pub trait MatchStarter: Send + Sync + 'static {
    /// `first` takes the first seat (and the first move); `second` is a
    /// paired human or the automated opponent.
    fn start_match(&self, first: PlayerName, second: Participant);
}

/// Lobby timing configuration.
#[derive(Debug, Clone)]
pub struct LobbyConfig {
    /// How long a lone player waits before the automated opponent
    /// steps in.
    pub fallback_delay: Duration,
}

impl Default for LobbyConfig {
    fn default() -> Self {
        Self {
            fallback_delay: Duration::from_secs(10),
        }
    }
}

/// What happened to a join request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinOutcome {
    /// Matched with the head of the queue; a game is launching.
    Paired { opponent: PlayerName },
    /// No opponent yet; queued with the fallback timer running.
    Queued,
}

/// One player waiting for an opponent.
struct Waiting {
    player: PlayerName,
    /// Cancelled when the entry is claimed by a pairing join or `leave`.
    fallback: Deferred,
}

/// The matchmaking queue.
pub struct Lobby {
    queue: Arc<Mutex<VecDeque<Waiting>>>,
    config: LobbyConfig,
    starter: Arc<dyn MatchStarter>,
}

impl Lobby {
    pub fn new(config: LobbyConfig, starter: Arc<dyn MatchStarter>) -> Self {
        Self {
            queue: Arc::new(Mutex::new(VecDeque::new())),
            config,
            starter,
        }
    }

    /// Queues a player, pairing immediately when someone is waiting.
    ///
    /// A player already in the queue stays where they are; the repeat
    /// join reports `Queued` and the original fallback timer keeps
    /// running.
    pub async fn join(&self, player: PlayerName) -> JoinOutcome {
        let mut queue = self.queue.lock().await;

        if queue.iter().any(|w| w.player == player) {
            debug!(%player, "already queued");
            return JoinOutcome::Queued;
        }

        if let Some(entry) = queue.pop_front() {
            entry.fallback.cancel();
            drop(queue);
            info!(player1 = %entry.player, player2 = %player, "players paired");
            self.starter
                .start_match(entry.player.clone(), Participant::Player(player));
            return JoinOutcome::Paired {
                opponent: entry.player,
            };
        }

        let fallback = self.schedule_fallback(player.clone());
        queue.push_back(Waiting { player, fallback });
        JoinOutcome::Queued
    }

    /// Removes a player from the queue, cancelling their fallback.
    /// Returns `false` if they weren't queued.
    pub async fn leave(&self, player: &PlayerName) -> bool {
        let mut queue = self.queue.lock().await;
        let Some(index) = queue.iter().position(|w| w.player == *player) else {
            return false;
        };
        let entry = queue.remove(index).expect("position just found");
        entry.fallback.cancel();
        debug!(%player, "left the queue");
        true
    }

    pub async fn is_waiting(&self, player: &PlayerName) -> bool {
        self.queue.lock().await.iter().any(|w| w.player == *player)
    }

    pub async fn waiting_count(&self) -> usize {
        self.queue.lock().await.len()
    }

    fn schedule_fallback(&self, player: PlayerName) -> Deferred {
        let queue = Arc::clone(&self.queue);
        let starter = Arc::clone(&self.starter);
        let delay = self.config.fallback_delay;
        Deferred::schedule(delay, async move {
            // Removing the entry is the claim. If a pairing join got
            // there first the entry is gone and this fire is stale.
            let mut locked = queue.lock().await;
            let Some(index) = locked.iter().position(|w| w.player == player) else {
                return;
            };
            locked.remove(index);
            drop(locked);

            info!(%player, "no opponent found, starting automated game");
            starter.start_match(player, Participant::Bot);
        })
    }
}

impl std::fmt::Debug for Lobby {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lobby")
            .field("fallback_delay", &self.config.fallback_delay)
            .finish_non_exhaustive()
    }
}
