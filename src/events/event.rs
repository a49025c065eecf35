//! # Runtime events emitted by the orchestrator, monitor and shutdown coordinator.
//!
//! The [`EventKind`] enum classifies event types across four categories:
//! - **Cycle events**: session/idle windows, cleanup, restarts, phase changes
//! - **Monitor events**: alerts, resolutions, recovery attempts
//! - **Shutdown events**: initiation, component results, completion, forced exit
//! - **Subscriber events**: overflow/panic inside subscriber workers
//!
//! The [`Event`] struct carries the metadata each kind sets; the rest stay `None`.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use cyclevisor::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::RestartFailed)
//!     .with_cycle(4)
//!     .with_attempt(3)
//!     .with_reason("memory above critical threshold");
//!
//! assert_eq!(ev.kind, EventKind::RestartFailed);
//! assert_eq!(ev.cycle, Some(4));
//! assert_eq!(ev.reason.as_deref(), Some("memory above critical threshold"));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

use crate::cycle::{CyclePhase, ValidationResult};
use crate::monitor::Alert;
use crate::reclaim::ReclaimReport;
use crate::shutdown::ShutdownSummary;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    // === Cycle events ===
    /// A crawl session opened.
    ///
    /// Sets: `cycle`, `start`, `planned_end`
    SessionStarted,

    /// A crawl session closed.
    ///
    /// Sets: `cycle`, `end`, `duration` (actual), `timing_error`
    SessionTerminated,

    /// The resource reclaimer was called after a session.
    ///
    /// Sets: `duration`, `success`, `reclaim` (when the reclaimer answered), `reason` (on failure)
    CleanupCompleted,

    /// The idle window opened.
    ///
    /// Sets: `cycle`, `start`, `planned_end`
    IdlePeriodStarted,

    /// The idle window closed.
    ///
    /// Sets: `cycle`, `end`, `duration` (actual), `timing_error`
    IdlePeriodEnded,

    /// Validation passed and a new session opened.
    ///
    /// Sets: `cycle` (new cycle number), `validation`
    SessionRestarted,

    /// Validation failed; another restart attempt is scheduled.
    ///
    /// Sets: `cycle`, `attempt`, `delay`, `reason`, `validation`
    RestartScheduled,

    /// Restart attempts are exhausted; the cycle halted.
    ///
    /// Sets: `cycle`, `attempt` (attempts made), `reason` (final error)
    RestartFailed,

    /// The orchestrator moved between phases.
    ///
    /// Sets: `from`, `phase`
    PhaseChanged,

    /// A clock-sync pass completed.
    ///
    /// Sets: `duration` (accuracy), `drift_ms`
    ClockSynced,

    // === Monitor events ===
    /// An alert passed its gates and was raised.
    ///
    /// Sets: `alert`
    Alert,

    /// A previously raised alert's condition cleared.
    ///
    /// Sets: `reason` (alert id)
    AlertResolved,

    /// A recovery action ran for a critical alert.
    ///
    /// Sets: `reason` (alert id), `success`, `attempt`
    RecoveryAttempted,

    // === Shutdown events ===
    /// Shutdown started.
    ///
    /// Sets: `reason`, `emergency`
    ShutdownInitiated,

    /// Every registered component was processed.
    ///
    /// Sets: `shutdown`
    ComponentsShutdown,

    /// Shutdown finished within its budget.
    ///
    /// Sets: `duration`, `reason`
    ShutdownCompleted,

    /// Shutdown escalated to forced termination.
    ///
    /// Sets: `reason`
    ForceShutdown,

    // === Subscriber events ===
    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets: `reason`
    SubscriberOverflow,

    /// Subscriber panicked during event processing.
    ///
    /// Sets: `reason`
    SubscriberPanicked,
}

impl EventKind {
    /// Stable snake_case name for logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::SessionStarted => "session_started",
            EventKind::SessionTerminated => "session_terminated",
            EventKind::CleanupCompleted => "cleanup_completed",
            EventKind::IdlePeriodStarted => "idle_period_started",
            EventKind::IdlePeriodEnded => "idle_period_ended",
            EventKind::SessionRestarted => "session_restarted",
            EventKind::RestartScheduled => "restart_scheduled",
            EventKind::RestartFailed => "restart_failed",
            EventKind::PhaseChanged => "phase_changed",
            EventKind::ClockSynced => "clock_synced",
            EventKind::Alert => "alert",
            EventKind::AlertResolved => "alert_resolved",
            EventKind::RecoveryAttempted => "recovery_attempted",
            EventKind::ShutdownInitiated => "shutdown_initiated",
            EventKind::ComponentsShutdown => "components_shutdown",
            EventKind::ShutdownCompleted => "shutdown_completed",
            EventKind::ForceShutdown => "force_shutdown",
            EventKind::SubscriberOverflow => "subscriber_overflow",
            EventKind::SubscriberPanicked => "subscriber_panicked",
        }
    }
}

/// Runtime event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Cycle number the event belongs to.
    pub cycle: Option<u64>,
    /// Window start (wall estimate).
    pub start: Option<SystemTime>,
    /// Window end (wall estimate).
    pub end: Option<SystemTime>,
    /// Planned window end (wall estimate).
    pub planned_end: Option<SystemTime>,
    /// Actual duration, cleanup duration, shutdown duration or sync accuracy.
    pub duration: Option<Duration>,
    /// `|actual - planned|` for closed windows.
    pub timing_error: Option<Duration>,
    /// Signed clock drift in milliseconds.
    pub drift_ms: Option<i64>,
    /// Scheduled delay before the next attempt.
    pub delay: Option<Duration>,
    /// Attempt count.
    pub attempt: Option<u32>,
    /// Outcome flag.
    pub success: Option<bool>,
    /// Emergency shutdown flag.
    pub emergency: Option<bool>,
    /// Human-readable reason (errors, alert ids, shutdown reasons).
    pub reason: Option<Arc<str>>,
    /// Previous phase for phase changes.
    pub from: Option<CyclePhase>,
    /// Current phase for phase changes.
    pub phase: Option<CyclePhase>,

    /// Raised alert.
    pub alert: Option<Arc<Alert>>,
    /// Reclaimer result.
    pub reclaim: Option<Arc<ReclaimReport>>,
    /// Restart validation result.
    pub validation: Option<Arc<ValidationResult>>,
    /// Per-component shutdown results.
    pub shutdown: Option<Arc<ShutdownSummary>>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            cycle: None,
            start: None,
            end: None,
            planned_end: None,
            duration: None,
            timing_error: None,
            drift_ms: None,
            delay: None,
            attempt: None,
            success: None,
            emergency: None,
            reason: None,
            from: None,
            phase: None,
            alert: None,
            reclaim: None,
            validation: None,
            shutdown: None,
        }
    }

    /// Overrides the timestamp (used with the corrected clock estimate).
    #[inline]
    pub fn at(mut self, at: SystemTime) -> Self {
        self.at = at;
        self
    }

    /// Attaches a cycle number.
    #[inline]
    pub fn with_cycle(mut self, cycle: u64) -> Self {
        self.cycle = Some(cycle);
        self
    }

    /// Attaches a window start and its planned end.
    #[inline]
    pub fn with_window(mut self, start: SystemTime, planned_end: SystemTime) -> Self {
        self.start = Some(start);
        self.planned_end = Some(planned_end);
        self
    }

    /// Attaches a window end with actual duration and timing error.
    #[inline]
    pub fn with_closed(mut self, end: SystemTime, actual: Duration, error: Duration) -> Self {
        self.end = Some(end);
        self.duration = Some(actual);
        self.timing_error = Some(error);
        self
    }

    /// Attaches a duration.
    #[inline]
    pub fn with_duration(mut self, d: Duration) -> Self {
        self.duration = Some(d);
        self
    }

    /// Attaches a signed drift in milliseconds.
    #[inline]
    pub fn with_drift(mut self, drift_ms: i64) -> Self {
        self.drift_ms = Some(drift_ms);
        self
    }

    /// Attaches a scheduled delay.
    #[inline]
    pub fn with_delay(mut self, d: Duration) -> Self {
        self.delay = Some(d);
        self
    }

    /// Attaches an attempt count.
    #[inline]
    pub fn with_attempt(mut self, n: u32) -> Self {
        self.attempt = Some(n);
        self
    }

    /// Attaches an outcome flag.
    #[inline]
    pub fn with_success(mut self, ok: bool) -> Self {
        self.success = Some(ok);
        self
    }

    /// Attaches the emergency flag.
    #[inline]
    pub fn with_emergency(mut self, emergency: bool) -> Self {
        self.emergency = Some(emergency);
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches a phase change.
    #[inline]
    pub fn with_phases(mut self, from: CyclePhase, to: CyclePhase) -> Self {
        self.from = Some(from);
        self.phase = Some(to);
        self
    }

    /// Attaches a raised alert.
    #[inline]
    pub fn with_alert(mut self, alert: Alert) -> Self {
        self.alert = Some(Arc::new(alert));
        self
    }

    /// Attaches a reclaimer result.
    #[inline]
    pub fn with_reclaim(mut self, report: ReclaimReport) -> Self {
        self.reclaim = Some(Arc::new(report));
        self
    }

    /// Attaches a validation result.
    #[inline]
    pub fn with_validation(mut self, v: ValidationResult) -> Self {
        self.validation = Some(Arc::new(v));
        self
    }

    /// Attaches per-component shutdown results.
    #[inline]
    pub fn with_shutdown(mut self, summary: ShutdownSummary) -> Self {
        self.shutdown = Some(Arc::new(summary));
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_reason(format!("subscriber={subscriber} reason={reason}"))
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_reason(format!("subscriber={subscriber} panic={info}"))
    }

    /// True for events produced by subscriber workers themselves.
    #[inline]
    pub fn is_subscriber_internal(&self) -> bool {
        matches!(
            self.kind,
            EventKind::SubscriberOverflow | EventKind::SubscriberPanicked
        )
    }
}
