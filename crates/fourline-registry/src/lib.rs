//! Connection registry for Fourline.
//!
//! Tracks, per username: the outbound channel to the connection's writer
//! task, the session the player is assigned to, and whether the player
//! is currently online. This is the routing table every outbound payload
//! goes through.
//!
//! # Concurrency note
//!
//! `ConnectionRegistry` is NOT thread-safe by itself — plain maps, no
//! internal locking. It is owned behind a single `tokio::sync::Mutex` at
//! the server level, and every operation here is synchronous, so the
//! lock is never held across an await.
//!
//! # Lifecycle
//!
//! A session assignment deliberately survives `disconnect`: the grace
//! window relies on looking up the dropped player's session when they
//! come back. Assignments are cleared only by the session's own cleanup.

use std::collections::{HashMap, HashSet};

use tokio::sync::mpsc;
use tracing::{debug, trace};

use fourline_protocol::{PlayerName, ServerPayload, SessionId};

/// The sending half of a connection's outbound payload channel.
///
/// Unbounded because the writer task drains continuously and payloads
/// are small; a send never blocks registry operations.
pub type PayloadSender = mpsc::UnboundedSender<ServerPayload>;

/// The registry as shared by the server, connection handlers, and
/// session actors. Lock, operate, release — nothing here awaits.
pub type SharedRegistry = std::sync::Arc<tokio::sync::Mutex<ConnectionRegistry>>;

/// Per-username connection state.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    /// Outbound channel per connected player.
    connections: HashMap<PlayerName, PayloadSender>,
    /// Session assignment per player. Outlives the connection.
    sessions: HashMap<PlayerName, SessionId>,
    /// Players currently online. A subset of `connections` keys in
    /// practice, kept separate so presence can be read cheaply.
    online: HashSet<PlayerName>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a connection for a username, replacing any previous
    /// channel under the same name, and marks the player online.
    pub fn connect(&mut self, player: PlayerName, sender: PayloadSender) {
        debug!(%player, "player connected");
        self.connections.insert(player.clone(), sender);
        self.online.insert(player);
    }

    /// Drops the player's outbound channel and marks them offline.
    ///
    /// The session assignment is kept so a reconnect within the grace
    /// window can find its way back.
    pub fn disconnect(&mut self, player: &PlayerName) {
        debug!(%player, "player disconnected");
        self.connections.remove(player);
        self.online.remove(player);
    }

    pub fn is_online(&self, player: &PlayerName) -> bool {
        self.online.contains(player)
    }

    /// Sends a payload to one player. Returns `false` when the player
    /// has no live connection; the payload is silently dropped, which is
    /// the correct behavior for a player inside their grace window.
    pub fn send_to(&self, player: &PlayerName, payload: ServerPayload) -> bool {
        match self.connections.get(player) {
            Some(sender) => sender.send(payload).is_ok(),
            None => {
                trace!(%player, "dropped payload for offline player");
                false
            }
        }
    }

    /// Sends a payload to every connected player.
    pub fn broadcast(&self, payload: ServerPayload) {
        for (player, sender) in &self.connections {
            if sender.send(payload.clone()).is_err() {
                trace!(%player, "dropped broadcast for closed channel");
            }
        }
    }

    /// Records which session a player belongs to.
    pub fn assign_session(&mut self, player: PlayerName, session_id: SessionId) {
        self.sessions.insert(player, session_id);
    }

    /// The session a player is assigned to, if any.
    pub fn session_of(&self, player: &PlayerName) -> Option<SessionId> {
        self.sessions.get(player).copied()
    }

    /// Clears a player's session assignment, but only if it still points
    /// at `session_id` — a player may already be in a newer game by the
    /// time an old session cleans up.
    pub fn clear_session(&mut self, player: &PlayerName, session_id: SessionId) {
        if self.sessions.get(player) == Some(&session_id) {
            self.sessions.remove(player);
        }
    }

    /// Sorted list of online usernames, for presence broadcasts.
    pub fn online_players(&self) -> Vec<PlayerName> {
        let mut players: Vec<_> = self.online.iter().cloned().collect();
        players.sort();
        players
    }
}

// =========================================================================
// Tests
// =========================================================================
