//! The pure session state machine.
//!
//! A `Session` owns one board and the turn/lifecycle state around it.
//! It performs no I/O and spawns nothing; the actor in `actor.rs` is the
//! only caller that mutates one after creation.

use std::collections::HashMap;
use std::time::Duration;

use tokio::time::Instant;

use fourline_game::{Board, Coord, Mark, OpponentAgent};
use fourline_protocol::{
    Outcome, Participant, PlayerName, SessionId, SessionStatus, SessionView,
};

use crate::SessionError;

/// What a successfully applied move did to the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveReport {
    /// Where the mark settled.
    pub position: Coord,
    pub outcome: TurnOutcome,
}

/// Whether the game continues after a move.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    Continue { next: Participant },
    Finished { outcome: Outcome },
}

/// A forfeiture: who abandoned the game and who wins because of it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForfeitReport {
    pub forfeited_by: PlayerName,
    pub winner: Participant,
}

/// One game between a human and an opponent (human or automated).
///
/// Seats and marks are fixed at creation: the first seat is always a
/// human playing `X` and always moves first; the second seat plays `O`.
pub struct Session {
    id: SessionId,
    player1: PlayerName,
    player2: Participant,
    board: Board,
    current: Participant,
    status: SessionStatus,
    winner: Option<Outcome>,
    created_at: Instant,
    started_at: Option<Instant>,
    /// Players inside their grace window, with the instant they dropped.
    disconnected: HashMap<PlayerName, Instant>,
}

impl Session {
    pub fn new(id: SessionId, player1: PlayerName, player2: Participant) -> Self {
        let current = Participant::Player(player1.clone());
        Self {
            id,
            player1,
            player2,
            board: Board::new(),
            current,
            status: SessionStatus::Waiting,
            winner: None,
            created_at: Instant::now(),
            started_at: None,
            disconnected: HashMap::new(),
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn vs_bot(&self) -> bool {
        self.player2.is_bot()
    }

    pub fn player1(&self) -> &PlayerName {
        &self.player1
    }

    pub fn player2(&self) -> &Participant {
        &self.player2
    }

    pub fn current_player(&self) -> &Participant {
        &self.current
    }

    /// Activates a freshly created session. A no-op unless Waiting.
    pub fn start(&mut self) {
        if self.status == SessionStatus::Waiting {
            self.status = SessionStatus::Active;
            self.started_at = Some(Instant::now());
        }
    }

    pub fn has_player(&self, player: &PlayerName) -> bool {
        self.player1 == *player || self.player2.name() == Some(player)
    }

    /// The seat a named human occupies, if any.
    pub fn participant_of(&self, player: &PlayerName) -> Option<Participant> {
        if self.player1 == *player {
            Some(Participant::Player(self.player1.clone()))
        } else if self.player2.name() == Some(player) {
            Some(self.player2.clone())
        } else {
            None
        }
    }

    /// The other seat, from a named human's point of view.
    pub fn opponent_of(&self, player: &PlayerName) -> Option<Participant> {
        if self.player1 == *player {
            Some(self.player2.clone())
        } else if self.player2.name() == Some(player) {
            Some(Participant::Player(self.player1.clone()))
        } else {
            None
        }
    }

    fn mark_of(&self, participant: &Participant) -> Mark {
        if *participant == Participant::Player(self.player1.clone()) {
            Mark::X
        } else {
            Mark::O
        }
    }

    /// Applies one move for `actor`.
    ///
    /// On success the board holds the mark, the winner/draw check has
    /// run, and either the turn has flipped or the session is Completed.
    ///
    /// # Errors
    /// - [`SessionError::NotActive`] outside the Active state
    /// - [`SessionError::OutOfTurn`] when it isn't `actor`'s turn
    /// - [`SessionError::Move`] when the board rejects the column
    pub fn make_move(
        &mut self,
        actor: &Participant,
        column: usize,
    ) -> Result<MoveReport, SessionError> {
        if self.status != SessionStatus::Active {
            return Err(SessionError::NotActive);
        }
        if *actor != self.current {
            return Err(SessionError::OutOfTurn);
        }

        let mark = self.mark_of(actor);
        let position = self.board.drop(column, mark)?;

        let outcome = if self.board.winner() == Some(mark) {
            let outcome = Outcome::Winner(actor.clone());
            self.complete(outcome.clone());
            TurnOutcome::Finished { outcome }
        } else if self.board.is_full() {
            self.complete(Outcome::Draw);
            TurnOutcome::Finished {
                outcome: Outcome::Draw,
            }
        } else {
            self.current = if *actor == Participant::Player(self.player1.clone()) {
                self.player2.clone()
            } else {
                Participant::Player(self.player1.clone())
            };
            TurnOutcome::Continue {
                next: self.current.clone(),
            }
        };

        Ok(MoveReport { position, outcome })
    }

    /// The automated opponent's column choice, when it is the automated
    /// opponent's turn in an active session.
    pub fn automated_column(&mut self, agent: &OpponentAgent) -> Option<usize> {
        if self.status != SessionStatus::Active || !self.current.is_bot() {
            return None;
        }
        agent.select(&mut self.board)
    }

    /// Records a dropped connection. Returns `true` if newly recorded;
    /// `false` for non-members, inactive sessions, or repeats.
    pub fn handle_disconnect(&mut self, player: &PlayerName) -> bool {
        if self.status != SessionStatus::Active || !self.has_player(player) {
            return false;
        }
        self.disconnected
            .insert(player.clone(), Instant::now())
            .is_none()
    }

    /// Clears a grace window. Returns `true` if the player was inside one.
    pub fn handle_reconnect(&mut self, player: &PlayerName) -> bool {
        self.disconnected.remove(player).is_some()
    }

    pub fn is_disconnected(&self, player: &PlayerName) -> bool {
        self.disconnected.contains_key(player)
    }

    /// Forfeits any player whose grace window has fully elapsed.
    ///
    /// Safe to call at any time: inactive sessions and windows that were
    /// cleared by a reconnect yield `None`, which is how stale timer
    /// firings become no-ops.
    pub fn check_disconnect_timeout(&mut self, grace: Duration) -> Option<ForfeitReport> {
        if self.status != SessionStatus::Active {
            return None;
        }
        let expired = self
            .disconnected
            .iter()
            .find(|(_, since)| since.elapsed() >= grace)
            .map(|(player, _)| player.clone())?;
        self.forfeit(&expired)
    }

    /// Ends an active session with the named player losing by
    /// abandonment. `None` for non-members or non-active sessions.
    pub fn forfeit(&mut self, player: &PlayerName) -> Option<ForfeitReport> {
        if self.status != SessionStatus::Active {
            return None;
        }
        let winner = self.opponent_of(player)?;
        self.complete(Outcome::Winner(winner.clone()));
        Some(ForfeitReport {
            forfeited_by: player.clone(),
            winner,
        })
    }

    fn complete(&mut self, outcome: Outcome) {
        self.status = SessionStatus::Completed;
        self.winner = Some(outcome);
    }

    /// Seconds since the session went Active (or was created, if it
    /// somehow never started).
    pub fn duration_secs(&self) -> u64 {
        self.started_at.unwrap_or(self.created_at).elapsed().as_secs()
    }

    /// Full snapshot for `game_start` and `reconnected` payloads.
    pub fn view(&self) -> SessionView {
        SessionView {
            session_id: self.id,
            player1: self.player1.clone(),
            player2: self.player2.clone(),
            current_player: self.current.clone(),
            board: self.board.snapshot(),
            status: self.status,
            winner: self.winner.clone(),
            player1_mark: Mark::X,
            player2_mark: Mark::O,
            vs_bot: self.vs_bot(),
        }
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use fourline_game::{BoardError, COLS, ROWS};

    fn alice() -> Participant {
        Participant::Player(PlayerName::from("alice"))
    }

    fn bob() -> Participant {
        Participant::Player(PlayerName::from("bob"))
    }

    fn human_session() -> Session {
        let mut session = Session::new(
            SessionId(1),
            PlayerName::from("alice"),
            bob(),
        );
        session.start();
        session
    }

    fn continues(report: &MoveReport) -> bool {
        matches!(report.outcome, TurnOutcome::Continue { .. })
    }

    #[test]
    fn test_moves_rejected_before_start() {
        let mut session = Session::new(SessionId(1), PlayerName::from("alice"), bob());
        assert_eq!(
            session.make_move(&alice(), 3),
            Err(SessionError::NotActive)
        );
    }

    #[test]
    fn test_first_move_belongs_to_player1() {
        let mut session = human_session();
        assert_eq!(
            session.make_move(&bob(), 3),
            Err(SessionError::OutOfTurn)
        );

        let report = session.make_move(&alice(), 3).unwrap();
        assert_eq!(report.position, Coord { row: 5, col: 3 });
        assert_eq!(
            report.outcome,
            TurnOutcome::Continue { next: bob() }
        );
    }

    #[test]
    fn test_same_player_cannot_move_twice() {
        let mut session = human_session();
        session.make_move(&alice(), 3).unwrap();
        assert_eq!(
            session.make_move(&alice(), 4),
            Err(SessionError::OutOfTurn)
        );
    }

    #[test]
    fn test_board_rejections_pass_through() {
        let mut session = human_session();
        assert_eq!(
            session.make_move(&alice(), 9),
            Err(SessionError::Move(BoardError::InvalidColumn(9)))
        );
        // A rejected move does not consume the turn.
        assert!(session.make_move(&alice(), 0).is_ok());
    }

    #[test]
    fn test_vertical_win_completes_session() {
        let mut session = human_session();
        // alice stacks column 3, bob stacks column 2.
        for _ in 0..3 {
            assert!(continues(&session.make_move(&alice(), 3).unwrap()));
            assert!(continues(&session.make_move(&bob(), 2).unwrap()));
        }

        let report = session.make_move(&alice(), 3).unwrap();
        assert_eq!(
            report.outcome,
            TurnOutcome::Finished {
                outcome: Outcome::Winner(alice())
            }
        );
        assert_eq!(session.status(), SessionStatus::Completed);
        assert_eq!(session.view().winner, Some(Outcome::Winner(alice())));

        // Nothing moves after completion.
        assert_eq!(
            session.make_move(&bob(), 2),
            Err(SessionError::NotActive)
        );
    }

    /// 42 alternating moves with no four-run anywhere: column bases
    /// X X O O X X O inverted on every level, filled one level at a time
    /// in the order 0,2,1,3,4,6,5 so the marks strictly alternate.
    fn draw_columns() -> Vec<usize> {
        let order = [0, 2, 1, 3, 4, 6, 5];
        (0..ROWS).flat_map(|_| order).collect()
    }

    #[test]
    fn test_full_board_is_a_draw() {
        let mut session = human_session();
        let columns = draw_columns();
        assert_eq!(columns.len(), ROWS * COLS);

        for (i, &col) in columns.iter().enumerate() {
            let actor = if i % 2 == 0 { alice() } else { bob() };
            let report = session.make_move(&actor, col).unwrap();
            if i < columns.len() - 1 {
                assert!(continues(&report), "unexpected finish at move {i}");
            } else {
                assert_eq!(
                    report.outcome,
                    TurnOutcome::Finished {
                        outcome: Outcome::Draw
                    }
                );
            }
        }
        assert_eq!(session.view().winner, Some(Outcome::Draw));
    }

    #[test]
    fn test_forfeit_awards_opponent() {
        let mut session = human_session();
        session.make_move(&alice(), 0).unwrap();

        let report = session.forfeit(&PlayerName::from("alice")).unwrap();
        assert_eq!(report.forfeited_by, PlayerName::from("alice"));
        assert_eq!(report.winner, bob());
        assert_eq!(session.status(), SessionStatus::Completed);

        // Already completed: a second forfeit is a no-op.
        assert!(session.forfeit(&PlayerName::from("bob")).is_none());
    }

    #[test]
    fn test_forfeit_ignores_strangers() {
        let mut session = human_session();
        assert!(session.forfeit(&PlayerName::from("mallory")).is_none());
        assert_eq!(session.status(), SessionStatus::Active);
    }

    #[test]
    fn test_elapsed_grace_forfeits_disconnected_player() {
        let mut session = human_session();
        assert!(session.handle_disconnect(&PlayerName::from("bob")));

        // Zero grace makes the window elapse immediately.
        let report = session.check_disconnect_timeout(Duration::ZERO).unwrap();
        assert_eq!(report.forfeited_by, PlayerName::from("bob"));
        assert_eq!(report.winner, alice());
    }

    #[test]
    fn test_reconnect_clears_grace_window() {
        let mut session = human_session();
        session.handle_disconnect(&PlayerName::from("bob"));
        assert!(session.is_disconnected(&PlayerName::from("bob")));

        assert!(session.handle_reconnect(&PlayerName::from("bob")));
        assert!(!session.is_disconnected(&PlayerName::from("bob")));

        // The stale timer firing finds nothing to forfeit.
        assert!(session.check_disconnect_timeout(Duration::ZERO).is_none());
        assert_eq!(session.status(), SessionStatus::Active);
    }

    #[test]
    fn test_unelapsed_grace_window_does_not_forfeit() {
        let mut session = human_session();
        session.handle_disconnect(&PlayerName::from("bob"));
        assert!(session
            .check_disconnect_timeout(Duration::from_secs(3600))
            .is_none());
        assert_eq!(session.status(), SessionStatus::Active);
    }

    #[test]
    fn test_timeout_check_after_completion_is_noop() {
        let mut session = human_session();
        session.handle_disconnect(&PlayerName::from("bob"));
        session.forfeit(&PlayerName::from("bob"));

        assert!(session.check_disconnect_timeout(Duration::ZERO).is_none());
    }

    #[test]
    fn test_disconnect_ignored_when_not_active() {
        let mut session = Session::new(SessionId(1), PlayerName::from("alice"), bob());
        assert!(!session.handle_disconnect(&PlayerName::from("alice")));
    }

    #[test]
    fn test_automated_column_only_on_bot_turn() {
        let agent = OpponentAgent::new(Mark::O);
        let mut session = Session::new(
            SessionId(2),
            PlayerName::from("alice"),
            Participant::Bot,
        );
        session.start();

        // alice to move: the agent stays silent.
        assert_eq!(session.automated_column(&agent), None);

        session.make_move(&alice(), 0).unwrap();
        assert_eq!(session.current_player(), &Participant::Bot);
        assert_eq!(session.automated_column(&agent), Some(3));
    }

    #[test]
    fn test_view_reflects_state() {
        let mut session = Session::new(
            SessionId(9),
            PlayerName::from("alice"),
            Participant::Bot,
        );
        let view = session.view();
        assert_eq!(view.status, SessionStatus::Waiting);
        assert!(view.vs_bot);
        assert_eq!(view.player1_mark, Mark::X);

        session.start();
        session.make_move(&alice(), 6).unwrap();
        let view = session.view();
        assert_eq!(view.current_player, Participant::Bot);
        assert_eq!(view.board[5][6], fourline_game::Cell::X);
    }
}
