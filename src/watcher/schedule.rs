//! Fixed-period poll timers driven by an external tick.
//!
//! Nothing here sleeps or spawns; owners call [`PollSchedule::fire`] with
//! the current instant from their event loop and do their work when it
//! returns `true`.

use std::time::{Duration, Instant};

/// Default file poll period.
pub const FILE_POLL_INTERVAL: Duration = Duration::from_millis(2500);

/// Default directory reconciliation period.
pub const DIRECTORY_POLL_INTERVAL: Duration = Duration::from_millis(10_000);

/// A periodic timer that remembers when it last fired.
#[derive(Debug, Clone)]
pub struct PollSchedule {
    period: Duration,
    /// `None` until the first firing; a fresh schedule is due immediately.
    last_fired: Option<Instant>,
}

impl PollSchedule {
    /// Schedule that is due on the first tick.
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            last_fired: None,
        }
    }

    /// Schedule whose first period starts at `at`.
    pub fn started_at(period: Duration, at: Instant) -> Self {
        Self {
            period,
            last_fired: Some(at),
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn last_fired(&self) -> Option<Instant> {
        self.last_fired
    }

    /// Check whether a full period has passed since the last firing.
    pub fn is_due(&self, now: Instant) -> bool {
        match self.last_fired {
            None => true,
            Some(last) => now.saturating_duration_since(last) >= self.period,
        }
    }

    /// Fire if due, restarting the period at `now`.
    ///
    /// Missed periods are skipped rather than replayed.
    pub fn fire(&mut self, now: Instant) -> bool {
        if self.is_due(now) {
            self.last_fired = Some(now);
            true
        } else {
            false
        }
    }
}

/// Poll periods handed down through a watch tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollIntervals {
    pub file: Duration,
    pub directory: Duration,
}

impl Default for PollIntervals {
    fn default() -> Self {
        Self {
            file: FILE_POLL_INTERVAL,
            directory: DIRECTORY_POLL_INTERVAL,
        }
    }
}

impl From<&crate::config::WatchConfig> for PollIntervals {
    fn from(config: &crate::config::WatchConfig) -> Self {
        Self {
            file: Duration::from_millis(config.file_poll_interval_ms),
            directory: Duration::from_millis(config.directory_poll_interval_ms),
        }
    }
}
