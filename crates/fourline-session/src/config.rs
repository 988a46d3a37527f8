//! Session timing configuration.

use std::time::Duration;

/// Timing knobs for a session actor. Tests shorten these through the
/// server builder; production uses the defaults.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// How long a disconnected player may stay away before forfeiting.
    pub grace: Duration,
    /// Pause before the automated opponent's move is applied.
    pub think_delay: Duration,
    /// Delay between completion and the actor retiring itself.
    pub cleanup_delay: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            grace: Duration::from_secs(30),
            think_delay: Duration::from_millis(500),
            cleanup_delay: Duration::from_secs(5),
        }
    }
}
