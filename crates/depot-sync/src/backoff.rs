use std::time::Duration;

pub const INITIAL_BACKOFF: Duration = Duration::from_secs(15);
pub const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// Reconnect backoff for the replication session.
///
/// The current interval doubles after every short-lived connection
/// attempt, up to a ceiling. A session that outlived its own window (it
/// survived past when the retry timer would have fired) is considered
/// healthy rather than transient, and resets the interval to the initial
/// value.
#[derive(Clone, Copy, Debug)]
pub struct Backoff {
    initial: Duration,
    ceiling: Duration,
    current: Duration,
}

impl Backoff {
    pub fn new(initial: Duration, ceiling: Duration) -> Self {
        Self {
            initial,
            ceiling,
            current: initial,
        }
    }

    /// The current window: both the dial timeout and the minimum time
    /// between connection attempts.
    pub fn window(&self) -> Duration {
        self.current
    }

    /// Record the outcome of one connection attempt. `outlived` is true
    /// when a stream was opened and the session lasted past the window.
    pub fn record_session(&mut self, outlived: bool) {
        if outlived {
            self.current = self.initial;
        } else {
            self.current = (self.current * 2).min(self.ceiling);
        }
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(INITIAL_BACKOFF, MAX_BACKOFF)
    }
}
