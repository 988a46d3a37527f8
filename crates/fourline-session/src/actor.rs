//! Session actor: an isolated Tokio task that owns one [`Session`].
//!
//! Each game runs in its own task, communicating with the outside world
//! through an mpsc channel. Player moves, the automated opponent's
//! delayed moves, and timer firings all funnel through the same channel,
//! so the session state has exactly one writer and no locks.
//!
//! Timer-driven commands arrive through a clone of the actor's own
//! sender held by [`Deferred`] tasks. Any such command can be stale by
//! the time it is processed (the player reconnected, the game already
//! ended), so every handler re-checks its precondition and treats a
//! stale command as a no-op.

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use fourline_game::{Mark, OpponentAgent};
use fourline_protocol::{Outcome, Participant, PlayerName, ServerPayload, SessionId, SessionView};
use fourline_registry::SharedRegistry;
use fourline_timer::Deferred;

use crate::{
    Collaborators, CompletedGame, ForfeitReport, LifecycleEvent, MoveReport,
    Session, SessionConfig, SessionError, TurnOutcome,
};

/// How the server learns that an actor has retired and its handle can
/// be dropped.
pub type RetiredSender = mpsc::UnboundedSender<SessionId>;

/// Commands processed by a session actor.
enum SessionCommand {
    /// A move from a connected player.
    Move {
        player: PlayerName,
        column: usize,
        reply: oneshot::Sender<Result<(), SessionError>>,
    },

    /// The automated opponent's think-time pause elapsed.
    AutomatedMove,

    /// A player's connection dropped.
    Disconnect { player: PlayerName },

    /// A player re-attached; reply with the full snapshot.
    Reconnect {
        player: PlayerName,
        reply: oneshot::Sender<Result<SessionView, SessionError>>,
    },

    /// Request the current snapshot.
    View {
        reply: oneshot::Sender<SessionView>,
    },

    /// A grace timer fired; forfeit whoever is still gone past grace.
    CheckDisconnectTimeouts,

    /// The cleanup delay elapsed; release assignments and stop.
    Cleanup,
}

/// Handle to a running session actor. Cheap to clone.
#[derive(Clone)]
pub struct SessionHandle {
    id: SessionId,
    sender: mpsc::Sender<SessionCommand>,
}

impl SessionHandle {
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Applies a move for a named player, waiting for the verdict.
    pub async fn make_move(
        &self,
        player: PlayerName,
        column: usize,
    ) -> Result<(), SessionError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(SessionCommand::Move {
                player,
                column,
                reply: reply_tx,
            })
            .await
            .map_err(|_| SessionError::Unavailable(self.id))?;
        reply_rx
            .await
            .map_err(|_| SessionError::Unavailable(self.id))?
    }

    /// Reports a dropped connection (fire-and-forget).
    pub async fn disconnect(&self, player: PlayerName) {
        let _ = self
            .sender
            .send(SessionCommand::Disconnect { player })
            .await;
    }

    /// Re-attaches a player, returning the snapshot to replay to them.
    pub async fn reconnect(
        &self,
        player: PlayerName,
    ) -> Result<SessionView, SessionError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(SessionCommand::Reconnect {
                player,
                reply: reply_tx,
            })
            .await
            .map_err(|_| SessionError::Unavailable(self.id))?;
        reply_rx
            .await
            .map_err(|_| SessionError::Unavailable(self.id))?
    }

    /// Current snapshot of the session.
    pub async fn view(&self) -> Result<SessionView, SessionError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(SessionCommand::View { reply: reply_tx })
            .await
            .map_err(|_| SessionError::Unavailable(self.id))?;
        reply_rx.await.map_err(|_| SessionError::Unavailable(self.id))
    }
}

/// The actor state. Runs inside a Tokio task until cleanup.
struct SessionActor {
    session: Session,
    agent: OpponentAgent,
    config: SessionConfig,
    registry: SharedRegistry,
    collaborators: Collaborators,
    retired: RetiredSender,
    /// Clone handed to timer tasks so firings come back as commands.
    self_tx: mpsc::Sender<SessionCommand>,
    receiver: mpsc::Receiver<SessionCommand>,
}

/// Activates a session and spawns its actor task.
///
/// The session is started (Waiting → Active) before the task launches,
/// so the handle's first `view()` already shows an active game. The
/// caller is responsible for delivering `game_start` payloads.
pub fn spawn_session(
    mut session: Session,
    config: SessionConfig,
    registry: SharedRegistry,
    collaborators: Collaborators,
    retired: RetiredSender,
) -> SessionHandle {
    let (tx, rx) = mpsc::channel(32);
    let id = session.id();

    session.start();
    collaborators.events.record(LifecycleEvent::SessionStarted {
        session_id: id,
        player1: session.player1().clone(),
        player2: session.player2().clone(),
        vs_bot: session.vs_bot(),
    });

    let actor = SessionActor {
        session,
        agent: OpponentAgent::new(Mark::O),
        config,
        registry,
        collaborators,
        retired,
        self_tx: tx.clone(),
        receiver: rx,
    };
    tokio::spawn(actor.run());

    SessionHandle { id, sender: tx }
}

impl SessionActor {
    async fn run(mut self) {
        info!(session_id = %self.session.id(), vs_bot = self.session.vs_bot(), "session started");

        while let Some(cmd) = self.receiver.recv().await {
            match cmd {
                SessionCommand::Move {
                    player,
                    column,
                    reply,
                } => {
                    let result = self.handle_move(&player, column).await;
                    let _ = reply.send(result);
                }
                SessionCommand::AutomatedMove => self.handle_automated_move().await,
                SessionCommand::Disconnect { player } => {
                    self.handle_disconnect(player).await;
                }
                SessionCommand::Reconnect { player, reply } => {
                    let result = self.handle_reconnect(player).await;
                    let _ = reply.send(result);
                }
                SessionCommand::View { reply } => {
                    let _ = reply.send(self.session.view());
                }
                SessionCommand::CheckDisconnectTimeouts => {
                    self.handle_timeout_check().await;
                }
                SessionCommand::Cleanup => {
                    self.handle_cleanup().await;
                    break;
                }
            }
        }

        info!(session_id = %self.session.id(), "session actor stopped");
    }

    async fn handle_move(
        &mut self,
        player: &PlayerName,
        column: usize,
    ) -> Result<(), SessionError> {
        let actor = self
            .session
            .participant_of(player)
            .ok_or_else(|| SessionError::NotParticipant(player.clone()))?;
        let report = self.session.make_move(&actor, column)?;
        self.after_move(actor, column, report).await;
        Ok(())
    }

    async fn handle_automated_move(&mut self) {
        // Stale once the game ended or the turn is no longer the
        // automated opponent's.
        let Some(column) = self.session.automated_column(&self.agent) else {
            return;
        };
        match self.session.make_move(&Participant::Bot, column) {
            Ok(report) => self.after_move(Participant::Bot, column, report).await,
            Err(error) => {
                warn!(session_id = %self.session.id(), %error, "automated move rejected");
            }
        }
    }

    /// Broadcasts the applied move and runs whatever it triggered: the
    /// automated opponent's think timer, or completion.
    async fn after_move(&mut self, actor: Participant, column: usize, report: MoveReport) {
        let (next_player, game_over, winner) = match &report.outcome {
            TurnOutcome::Continue { next } => (Some(next.clone()), false, None),
            TurnOutcome::Finished { outcome } => (None, true, Some(outcome.clone())),
        };

        self.send_to_players(ServerPayload::Move {
            player: actor.clone(),
            column,
            position: report.position,
            next_player,
            game_over,
            winner,
        })
        .await;

        self.collaborators.events.record(LifecycleEvent::MoveMade {
            session_id: self.session.id(),
            player: actor,
            column,
        });

        match report.outcome {
            TurnOutcome::Continue { next } if next.is_bot() => {
                let tx = self.self_tx.clone();
                // Detached on purpose: the timer owns itself.
                Deferred::schedule(self.config.think_delay, async move {
                    let _ = tx.send(SessionCommand::AutomatedMove).await;
                });
            }
            TurnOutcome::Continue { .. } => {}
            TurnOutcome::Finished { outcome } => self.finish(outcome, None),
        }
    }

    async fn handle_disconnect(&mut self, player: PlayerName) {
        if !self.session.handle_disconnect(&player) {
            return;
        }
        debug!(session_id = %self.session.id(), %player, "player disconnected, grace running");

        self.collaborators
            .events
            .record(LifecycleEvent::PlayerDisconnected {
                session_id: self.session.id(),
                player: player.clone(),
            });

        self.notify_opponent(&player, ServerPayload::OpponentDisconnected {
            player: player.clone(),
        })
        .await;

        let tx = self.self_tx.clone();
        Deferred::schedule(self.config.grace, async move {
            let _ = tx.send(SessionCommand::CheckDisconnectTimeouts).await;
        });
    }

    async fn handle_reconnect(
        &mut self,
        player: PlayerName,
    ) -> Result<SessionView, SessionError> {
        if !self.session.has_player(&player) {
            return Err(SessionError::NotParticipant(player));
        }

        if self.session.handle_reconnect(&player) {
            debug!(session_id = %self.session.id(), %player, "player reconnected");
            self.collaborators
                .events
                .record(LifecycleEvent::PlayerReconnected {
                    session_id: self.session.id(),
                    player: player.clone(),
                });
            self.notify_opponent(&player, ServerPayload::OpponentReconnected {
                player: player.clone(),
            })
            .await;
        }

        Ok(self.session.view())
    }

    async fn handle_timeout_check(&mut self) {
        // Stale when the player came back or the game already ended.
        let Some(report) = self.session.check_disconnect_timeout(self.config.grace)
        else {
            return;
        };
        info!(
            session_id = %self.session.id(),
            forfeited_by = %report.forfeited_by,
            winner = %report.winner,
            "grace elapsed, game forfeited"
        );

        let outcome = Outcome::Winner(report.winner.clone());
        self.send_to_players(ServerPayload::GameOver {
            winner: outcome.clone(),
            reason: "forfeit".into(),
        })
        .await;
        self.finish(outcome, Some(report));
    }

    /// Completion side effects. Runs exactly once per session: every
    /// path into it goes through `Session::complete`, which only fires
    /// from the Active state.
    fn finish(&mut self, outcome: Outcome, forfeit: Option<ForfeitReport>) {
        let session_id = self.session.id();

        self.collaborators.events.record(LifecycleEvent::SessionEnded {
            session_id,
            outcome: outcome.clone(),
            duration_secs: self.session.duration_secs(),
        });
        if let Some(report) = forfeit {
            self.collaborators
                .events
                .record(LifecycleEvent::SessionForfeited {
                    session_id,
                    forfeited_by: report.forfeited_by,
                    winner: report.winner,
                });
        }

        // Bot games never reach the archive; standings always update.
        if let Some(player2) = self.session.player2().name() {
            self.collaborators.archive.persist(CompletedGame {
                session_id,
                player1: self.session.player1().clone(),
                player2: player2.clone(),
                winner: outcome.clone(),
                board: self.session.view().board,
                duration_secs: self.session.duration_secs(),
            });
        }
        self.collaborators.standings.apply(
            self.session.player1(),
            self.session.player2(),
            &outcome,
        );

        let tx = self.self_tx.clone();
        Deferred::schedule(self.config.cleanup_delay, async move {
            let _ = tx.send(SessionCommand::Cleanup).await;
        });
    }

    async fn handle_cleanup(&mut self) {
        let session_id = self.session.id();
        debug!(%session_id, "session cleaning up");

        {
            let mut registry = self.registry.lock().await;
            registry.clear_session(self.session.player1(), session_id);
            if let Some(player2) = self.session.player2().name() {
                registry.clear_session(player2, session_id);
            }
        }
        let _ = self.retired.send(session_id);
    }

    /// Sends a payload to both human seats. Offline players drop theirs.
    async fn send_to_players(&self, payload: ServerPayload) {
        let registry = self.registry.lock().await;
        registry.send_to(self.session.player1(), payload.clone());
        if let Some(player2) = self.session.player2().name() {
            registry.send_to(player2, payload);
        }
    }

    /// Sends a payload to the human opposite `player`, if there is one.
    async fn notify_opponent(&self, player: &PlayerName, payload: ServerPayload) {
        let Some(opponent) = self.session.opponent_of(player) else {
            return;
        };
        if let Some(name) = opponent.name() {
            let registry = self.registry.lock().await;
            registry.send_to(name, payload);
        }
    }
}
