//! Debouncing of full style reloads.
//!
//! Filesystem events tend to arrive in bursts (editor save, checkout,
//! formatter). The first event after a quiet period reloads right away;
//! events inside the window only mark a reload as pending, which the
//! periodic timer picks up later.

use std::time::{Duration, Instant};

/// Outcome of recording a reload request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadDecision {
    /// The window has passed: reload immediately.
    Now,
    /// A reload happened recently: deferred to the next timer tick.
    Deferred,
}

/// Tracks when the last reload ran and whether another one is owed.
#[derive(Debug)]
pub struct ReloadDebouncer {
    /// When the last reload ran; `None` before the first one.
    last_reload: Option<Instant>,
    /// A request arrived inside the window and has not been served.
    pending: bool,
    /// Minimum spacing between two automatic reloads.
    window: Duration,
}

impl ReloadDebouncer {
    /// Create a new debouncer with the given window in milliseconds.
    pub fn new(window_ms: u64) -> Self {
        Self {
            last_reload: None,
            pending: false,
            window: Duration::from_millis(window_ms),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Record a reload request at `now`.
    ///
    /// Returns [`ReloadDecision::Now`] when nothing has been reloaded yet
    /// or strictly more than the window has passed since the last reload;
    /// otherwise marks the request as pending. A zero window never defers.
    pub fn request(&mut self, now: Instant) -> ReloadDecision {
        let elapsed = self.last_reload.map(|last| {
            self.window.is_zero() || now.saturating_duration_since(last) > self.window
        });

        match elapsed {
            None | Some(true) => ReloadDecision::Now,
            Some(false) => {
                self.pending = true;
                ReloadDecision::Deferred
            }
        }
    }

    /// Record that a reload ran at `now`; clears the pending flag.
    pub fn mark_reloaded(&mut self, now: Instant) {
        self.last_reload = Some(now);
        self.pending = false;
    }

    /// Take the pending flag, leaving it cleared.
    pub fn take_pending(&mut self) -> bool {
        std::mem::take(&mut self.pending)
    }

    pub fn has_pending(&self) -> bool {
        self.pending
    }

    pub fn last_reload(&self) -> Option<Instant> {
        self.last_reload
    }
}
