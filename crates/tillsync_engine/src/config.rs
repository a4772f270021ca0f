//! Configuration for the sync engine.

use std::time::Duration;

/// Configuration for the engine and its orchestrator.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Upper bound for any single remote request.
    ///
    /// Every remote call the engine makes is wrapped in this timeout so
    /// an orchestration run cannot hang in the syncing or pulling state.
    pub request_timeout: Duration,
    /// How long a run lingers in its terminal state before returning to
    /// idle, so the UI can show the outcome.
    pub settle_delay: Duration,
    /// Initial connectivity assumption before the first platform signal.
    pub start_online: bool,
}

impl EngineConfig {
    /// Creates a configuration with the default timeouts.
    #[must_use]
    pub fn new() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            settle_delay: Duration::from_secs(2),
            start_online: true,
        }
    }

    /// Sets the remote request timeout.
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Sets the terminal-state settle delay.
    #[must_use]
    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    /// Sets the initial connectivity assumption.
    #[must_use]
    pub fn with_start_online(mut self, online: bool) -> Self {
        self.start_online = online;
        self
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new()
    }
}
