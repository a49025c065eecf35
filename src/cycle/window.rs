//! # Session and idle windows with timing accuracy.
//!
//! An [`OpenWindow`] is created when a session (or idle period) starts and is
//! consumed by [`OpenWindow::close`], producing an immutable [`ClosedWindow`].
//! The orchestrator keeps the last `history_limit` closed windows.
//!
//! ```text
//! timing_error     = |(actual_end - actual_start) - planned_duration|
//! timing_error_pct = timing_error / planned_duration × 100
//! ```

use std::collections::VecDeque;
use std::time::{Duration, SystemTime};

use serde::Serialize;
use tokio::time::Instant;

/// What the window covers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowKind {
    /// Active crawl session.
    Session,
    /// Mandatory idle period.
    Idle,
}

/// A window that has not ended yet.
#[derive(Clone, Debug)]
pub struct OpenWindow {
    /// Session or idle.
    pub kind: WindowKind,
    /// Cycle number.
    pub cycle: u64,
    /// Planned start (wall estimate).
    pub planned_start: SystemTime,
    /// Planned length.
    pub planned_duration: Duration,
    /// Actual start (monotonic).
    pub actual_start: Instant,
}

impl OpenWindow {
    /// Opens a window starting at `now`.
    pub fn open(
        kind: WindowKind,
        cycle: u64,
        now: Instant,
        wall_now: SystemTime,
        planned_duration: Duration,
    ) -> Self {
        Self {
            kind,
            cycle,
            planned_start: wall_now,
            planned_duration,
            actual_start: now,
        }
    }

    /// Monotonic instant the window is planned to end.
    #[inline]
    pub fn planned_end(&self) -> Instant {
        self.actual_start + self.planned_duration
    }

    /// Planned end on the wall clock.
    #[inline]
    pub fn planned_end_wall(&self) -> SystemTime {
        self.planned_start + self.planned_duration
    }

    /// Time left until the planned end (zero once passed).
    #[inline]
    pub fn remaining(&self, now: Instant) -> Duration {
        self.planned_end().saturating_duration_since(now)
    }

    /// Closes the window at `end`.
    pub fn close(self, end: Instant, end_wall: SystemTime) -> ClosedWindow {
        let actual = end.saturating_duration_since(self.actual_start);
        let timing_error = actual.abs_diff(self.planned_duration);
        ClosedWindow {
            kind: self.kind,
            cycle: self.cycle,
            planned_start: self.planned_start,
            planned_duration: self.planned_duration,
            actual_start: self.actual_start,
            actual_end: end,
            actual_end_wall: end_wall,
            actual_duration: actual,
            timing_error,
        }
    }
}

/// Immutable record of a finished window.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClosedWindow {
    /// Session or idle.
    pub kind: WindowKind,
    /// Cycle number.
    pub cycle: u64,
    /// Planned start (wall estimate).
    pub planned_start: SystemTime,
    /// Planned length.
    pub planned_duration: Duration,
    /// Actual start (monotonic).
    pub actual_start: Instant,
    /// Actual end (monotonic).
    pub actual_end: Instant,
    /// Actual end (wall estimate).
    pub actual_end_wall: SystemTime,
    /// `actual_end - actual_start`.
    pub actual_duration: Duration,
    /// `|actual_duration - planned_duration|`.
    pub timing_error: Duration,
}

impl ClosedWindow {
    /// Timing error in whole milliseconds.
    #[inline]
    pub fn timing_error_ms(&self) -> u128 {
        self.timing_error.as_millis()
    }

    /// Timing error as a percentage of the planned duration.
    pub fn timing_error_pct(&self) -> f64 {
        if self.planned_duration.is_zero() {
            return 0.0;
        }
        self.timing_error.as_secs_f64() / self.planned_duration.as_secs_f64() * 100.0
    }

    /// Reporting view of the window.
    pub fn timing(&self) -> TimingReport {
        TimingReport {
            kind: self.kind,
            cycle: self.cycle,
            planned: self.planned_duration,
            actual: self.actual_duration,
            error_ms: self.timing_error_ms(),
            error_pct: self.timing_error_pct(),
        }
    }
}

/// Planned vs. actual duration of a closed window.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct TimingReport {
    /// Session or idle.
    pub kind: WindowKind,
    /// Cycle number.
    pub cycle: u64,
    /// Planned length.
    pub planned: Duration,
    /// Actual length.
    pub actual: Duration,
    /// Absolute error in milliseconds.
    pub error_ms: u128,
    /// Error as % of plan.
    pub error_pct: f64,
}

/// Bounded FIFO of closed windows.
#[derive(Clone, Debug)]
pub struct WindowHistory {
    limit: usize,
    items: VecDeque<ClosedWindow>,
}

impl WindowHistory {
    /// Creates a history keeping at most `limit` windows (min 1).
    pub fn new(limit: usize) -> Self {
        let limit = limit.max(1);
        Self {
            limit,
            items: VecDeque::with_capacity(limit.min(256)),
        }
    }

    /// Appends a window, evicting the oldest when full.
    pub fn push(&mut self, w: ClosedWindow) {
        if self.items.len() == self.limit {
            self.items.pop_front();
        }
        self.items.push_back(w);
    }

    /// Most recent window of `kind`.
    pub fn last(&self, kind: WindowKind) -> Option<&ClosedWindow> {
        self.items.iter().rev().find(|w| w.kind == kind)
    }

    /// Windows, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &ClosedWindow> {
        self.items.iter()
    }

    /// Number of retained windows.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// True when empty.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
