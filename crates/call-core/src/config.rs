//! Coordinator configuration.

use std::time::Duration;

/// Tunables for the call coordinator.
///
/// Defaults match a gate-intercom deployment: half a minute to answer, a
/// small candidate buffer (real negotiations rarely produce more than a
/// handful before the answer lands).
#[derive(Debug, Clone)]
pub struct CallConfig {
    /// How long an outbound call may stay in Dialing before it is cancelled
    /// as unanswered. `None` disables the timer.
    pub dial_timeout: Option<Duration>,

    /// How long an inbound call may ring before it is auto-rejected.
    /// `None` disables the timer.
    pub ring_timeout: Option<Duration>,

    /// Upper bound on candidates buffered while the negotiation handle is not
    /// ready. The oldest candidate is dropped when the bound is exceeded.
    pub max_buffered_candidates: usize,

    /// Capacity of the UI event broadcast channel.
    pub event_capacity: usize,
}

impl Default for CallConfig {
    fn default() -> Self {
        Self {
            dial_timeout: Some(Duration::from_secs(30)),
            ring_timeout: Some(Duration::from_secs(30)),
            max_buffered_candidates: 16,
            event_capacity: 64,
        }
    }
}

impl CallConfig {
    pub fn with_dial_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.dial_timeout = timeout;
        self
    }

    pub fn with_ring_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.ring_timeout = timeout;
        self
    }

    pub fn with_max_buffered_candidates(mut self, max: usize) -> Self {
        self.max_buffered_candidates = max;
        self
    }

    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }
}
