//! One-shot cancellable timers for Fourline.
//!
//! Every timer in the system is one-shot: the matchmaking fallback, the
//! automated opponent's think-time pause, the disconnect grace window,
//! and the post-game cleanup delay. [`Deferred`] is the single primitive
//! behind all of them: schedule a task to run after a delay, with the
//! option to cancel before it fires.
//!
//! # Cancellation semantics
//!
//! - [`Deferred::cancel`] aborts the timer task. If the delay has not
//!   elapsed the task never runs; once the task body has started, abort
//!   at the next await point applies (the bodies used here send a single
//!   message, so in practice a fired timer stays fired).
//! - Dropping a `Deferred` **detaches** the timer instead of cancelling
//!   it. Several timers must keep running after the struct that owns
//!   them goes away — the grace window outlives the closed connection
//!   that started it.
//!
//! Because a cancel can race the firing, every timer callback in this
//! system re-checks its precondition when it runs. `Deferred` guarantees
//! "at most once", not "exactly the intended once".

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::trace;

/// A task scheduled to run once after a delay.
#[derive(Debug)]
pub struct Deferred {
    handle: JoinHandle<()>,
}

impl Deferred {
    /// Spawns `task` to run after `delay`.
    ///
    /// The task is spawned immediately onto the current Tokio runtime;
    /// the returned handle only controls cancellation.
    pub fn schedule<F>(delay: Duration, task: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        trace!(delay_ms = delay.as_millis() as u64, "timer scheduled");
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            task.await;
        });
        Self { handle }
    }

    /// Cancels the timer. A timer that already fired is unaffected;
    /// calling this twice is harmless.
    pub fn cancel(&self) {
        self.handle.abort();
    }

    /// `true` once the task has run to completion or been cancelled.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

// Drop intentionally does NOT abort: the handle is detached and the
// timer keeps running. Cancellation is always explicit.
