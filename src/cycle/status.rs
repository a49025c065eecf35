//! Point-in-time view of the cycle orchestrator.

use std::time::{Duration, SystemTime};

use serde::Serialize;

use crate::clock::ClockSyncReport;

use super::phase::CyclePhase;
use super::window::TimingReport;

/// Snapshot returned by [`CycleOrchestrator::status`](crate::CycleOrchestrator::status).
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CycleStatus {
    /// Current phase.
    pub phase: CyclePhase,
    /// Number of the current (or last) cycle; `0` before the first start.
    pub cycle_number: u64,
    /// Time left in the current window or retry delay.
    pub time_remaining: Option<Duration>,
    /// Wall estimate of the next timer-driven transition.
    pub next_transition_at: Option<SystemTime>,
    /// Consecutive failed restarts since the last successful one.
    pub restart_attempts: u32,
    /// Errors recorded in the last 5 minutes.
    pub error_count: usize,
    /// Errors recorded since the orchestrator was created.
    pub total_errors: u64,
    /// Last clock-sync pass.
    #[serde(skip)]
    pub last_clock_sync: Option<ClockSyncReport>,
    /// Timing of the last closed session window.
    pub last_session: Option<TimingReport>,
    /// Timing of the last closed idle window.
    pub last_idle: Option<TimingReport>,
}

impl CycleStatus {
    /// Empty status for a given phase.
    pub fn new(phase: CyclePhase) -> Self {
        Self {
            phase,
            cycle_number: 0,
            time_remaining: None,
            next_transition_at: None,
            restart_attempts: 0,
            error_count: 0,
            total_errors: 0,
            last_clock_sync: None,
            last_session: None,
            last_idle: None,
        }
    }

    /// Accuracy of the last clock sync, if any.
    pub fn clock_accuracy(&self) -> Option<Duration> {
        self.last_clock_sync.map(|r| r.accuracy)
    }
}

/// Read-only access to the orchestrator's status.
///
/// The health monitor depends on this rather than on the orchestrator itself.
pub trait CycleView: Send + Sync + 'static {
    /// Current status snapshot.
    fn cycle_status(&self) -> CycleStatus;
}
