//! # Clock source: monotonic time plus a corrected wall-clock estimate.
//!
//! All phase timers run on the monotonic clock ([`tokio::time::Instant`]), so
//! they are immune to wall-clock jumps and follow tokio's paused time in tests.
//! Wall-clock values in events and status are *estimates*: the anchor wall time
//! plus monotonic elapsed time plus a correction learned by [`ClockSource::sync`].
//!
//! ## Sync
//! ```text
//! estimate = anchor_wall + (now_mono - anchor_mono) + correction
//! drift    = system_wall - estimate          (signed)
//! accuracy = |drift|
//! correction += drift
//! ```
//! There is no network round trip; `sync` only reconciles the process' two clocks.

use std::sync::{Mutex, PoisonError};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::time::Instant;

/// Result of one clock-sync pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClockSyncReport {
    /// Monotonic instant of the pass.
    pub at: Instant,
    /// Corrected wall time after the pass.
    pub wall: SystemTime,
    /// Signed difference `system - estimate`, in milliseconds.
    pub drift_ms: i64,
    /// Absolute drift; how far off the estimate was.
    pub accuracy: Duration,
}

#[derive(Debug)]
struct Correction {
    offset_ms: i64,
    last: Option<ClockSyncReport>,
}

/// Shared time source for the runtime.
#[derive(Debug)]
pub struct ClockSource {
    anchor_mono: Instant,
    anchor_wall: SystemTime,
    correction: Mutex<Correction>,
}

impl Default for ClockSource {
    fn default() -> Self {
        Self::new()
    }
}

impl ClockSource {
    /// Anchors a new clock at the current instant.
    pub fn new() -> Self {
        Self {
            anchor_mono: Instant::now(),
            anchor_wall: SystemTime::now(),
            correction: Mutex::new(Correction {
                offset_ms: 0,
                last: None,
            }),
        }
    }

    /// Monotonic now.
    #[inline]
    pub fn now(&self) -> Instant {
        Instant::now()
    }

    /// Corrected wall-clock estimate for now.
    pub fn wall_now(&self) -> SystemTime {
        self.wall_at(self.now())
    }

    /// Corrected wall-clock estimate for a monotonic instant.
    pub fn wall_at(&self, at: Instant) -> SystemTime {
        let offset = self.lock().offset_ms;
        let base = match at.checked_duration_since(self.anchor_mono) {
            Some(elapsed) => self.anchor_wall + elapsed,
            None => self.anchor_wall - self.anchor_mono.duration_since(at),
        };
        shift(base, offset)
    }

    /// Reconciles the estimate with the system wall clock.
    pub fn sync(&self) -> ClockSyncReport {
        self.sync_against(SystemTime::now())
    }

    /// Last sync pass, if any.
    pub fn last_sync(&self) -> Option<ClockSyncReport> {
        self.lock().last
    }

    fn sync_against(&self, system: SystemTime) -> ClockSyncReport {
        let at = self.now();
        let estimate = self.wall_at(at);
        let drift_ms = signed_ms(system) - signed_ms(estimate);

        let mut c = self.lock();
        c.offset_ms = c.offset_ms.saturating_add(drift_ms);
        let report = ClockSyncReport {
            at,
            wall: system,
            drift_ms,
            accuracy: Duration::from_millis(drift_ms.unsigned_abs()),
        };
        c.last = Some(report);
        report
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Correction> {
        self.correction.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn shift(t: SystemTime, offset_ms: i64) -> SystemTime {
    let delta = Duration::from_millis(offset_ms.unsigned_abs());
    if offset_ms >= 0 { t + delta } else { t - delta }
}

fn signed_ms(t: SystemTime) -> i64 {
    match t.duration_since(UNIX_EPOCH) {
        Ok(d) => d.as_millis().min(i64::MAX as u128) as i64,
        Err(e) => -(e.duration().as_millis().min(i64::MAX as u128) as i64),
    }
}
