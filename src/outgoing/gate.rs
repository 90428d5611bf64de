//! Timed sync switch

use std::time::Duration;

use tokio::time::Instant;

/// How long a remote click suppresses local ones
pub const DEFAULT_SYNC_WINDOW: Duration = Duration::from_secs(1);

/// Boolean switch that closes for a window after each trigger
///
/// Starts open. Every [`SyncGate::close`] restarts the window.
#[derive(Debug, Clone)]
pub struct SyncGate {
    window: Duration,
    closed_until: Option<Instant>,
}

impl SyncGate {
    /// Create an open gate
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            closed_until: None,
        }
    }

    /// Close the gate for one window starting at `now`
    pub fn close(&mut self, now: Instant) {
        self.closed_until = Some(now + self.window);
    }

    /// Check whether syncing is allowed at `now`
    pub fn is_open(&self, now: Instant) -> bool {
        match self.closed_until {
            Some(until) => now >= until,
            None => true,
        }
    }
}

impl Default for SyncGate {
    fn default() -> Self {
        Self::new(DEFAULT_SYNC_WINDOW)
    }
}
