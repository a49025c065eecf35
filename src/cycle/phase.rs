//! # Cycle phases and the transition table.
//!
//! ```text
//!            start                 timer / terminate          cleanup attempted
//! Stopped ─────────► Running ───────────────────► Terminating ────────────────► Idle
//!                      ▲                                                         │
//!                      │ validation passed                          idle expired │
//!                      └──────────────────────── Restarting ◄────────────────────┘
//!                                                 │     ▲
//!                             attempts exhausted  │     │ validation failed, attempts remain
//!                                                 ▼     │
//!                                           ErrorHalted └──┘
//!
//! any ── stop ──► Stopped
//! ```
//!
//! [`CyclePhase::on`] is total: illegal `(phase, event)` pairs return `None` and
//! [`CyclePhase::apply`] leaves the phase unchanged.

use std::fmt;

use serde::Serialize;

/// Lifecycle phase of the cycle orchestrator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CyclePhase {
    /// Not running; `start` is allowed.
    #[default]
    Stopped,
    /// A session window is open.
    Running,
    /// Session closed; cleanup in progress.
    Terminating,
    /// Mandatory pause before the next restart.
    Idle,
    /// Validating, or waiting to retry a failed restart.
    Restarting,
    /// Restart attempts exhausted; needs an operator.
    ErrorHalted,
}

impl CyclePhase {
    /// All phases, for exhaustive checks.
    pub const ALL: [CyclePhase; 6] = [
        CyclePhase::Stopped,
        CyclePhase::Running,
        CyclePhase::Terminating,
        CyclePhase::Idle,
        CyclePhase::Restarting,
        CyclePhase::ErrorHalted,
    ];

    /// Stable lower-case name.
    pub fn as_str(&self) -> &'static str {
        match self {
            CyclePhase::Stopped => "stopped",
            CyclePhase::Running => "running",
            CyclePhase::Terminating => "terminating",
            CyclePhase::Idle => "idle",
            CyclePhase::Restarting => "restarting",
            CyclePhase::ErrorHalted => "error_halted",
        }
    }

    /// Target phase for `event`, or `None` if the pair is illegal.
    pub fn on(self, event: PhaseEvent) -> Option<CyclePhase> {
        use CyclePhase::*;
        use PhaseEvent::*;
        match (self, event) {
            (_, Stop) => Some(Stopped),
            (Stopped, Start) => Some(Running),
            (Running, Terminate) => Some(Terminating),
            (Terminating, CleanupAttempted) => Some(Idle),
            (Idle, IdleExpired) => Some(Restarting),
            (Restarting, ValidationPassed) => Some(Running),
            (Restarting, RetryScheduled) => Some(Restarting),
            (Restarting, AttemptsExhausted) => Some(ErrorHalted),
            _ => None,
        }
    }

    /// Target phase for `event`; identity for illegal pairs.
    #[inline]
    pub fn apply(self, event: PhaseEvent) -> CyclePhase {
        self.on(event).unwrap_or(self)
    }
}

impl fmt::Display for CyclePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inputs of the transition table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PhaseEvent {
    /// `start()` called.
    Start,
    /// Session timer fired or `terminate_session()` called.
    Terminate,
    /// Reclaimer returned, failed, or timed out.
    CleanupAttempted,
    /// Idle timer fired.
    IdleExpired,
    /// Restart validation passed.
    ValidationPassed,
    /// Restart validation failed with attempts remaining.
    RetryScheduled,
    /// Restart validation failed with no attempts remaining.
    AttemptsExhausted,
    /// Shutdown or explicit stop.
    Stop,
}

impl PhaseEvent {
    /// All events, for exhaustive checks.
    pub const ALL: [PhaseEvent; 8] = [
        PhaseEvent::Start,
        PhaseEvent::Terminate,
        PhaseEvent::CleanupAttempted,
        PhaseEvent::IdleExpired,
        PhaseEvent::ValidationPassed,
        PhaseEvent::RetryScheduled,
        PhaseEvent::AttemptsExhausted,
        PhaseEvent::Stop,
    ];
}
