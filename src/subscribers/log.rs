//! # Tracing subscriber for runtime events.
//!
//! [`LogWriter`] renders every bus event as a structured `tracing` record under
//! the `cyclevisor::events` target. Severity follows the event: alerts, failed
//! restarts and forced shutdowns are `warn`/`error`, the rest `info`/`debug`.
//!
//! ## Example
//! ```no_run
//! # use std::sync::Arc;
//! # use cyclevisor::{Config, LogWriter, Runtime, Subscribe};
//! # async fn demo() {
//! let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter)];
//! let _runtime = Runtime::builder(Config::default()).with_subscribers(subs).build();
//! # }
//! ```

use async_trait::async_trait;

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

const TARGET: &str = "cyclevisor::events";

/// Structured logging subscriber.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogWriter;

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let kind = e.kind.as_str();
        match e.kind {
            EventKind::SessionStarted | EventKind::IdlePeriodStarted => {
                tracing::info!(target: TARGET, kind, cycle = ?e.cycle, planned_end = ?e.planned_end);
            }
            EventKind::SessionTerminated | EventKind::IdlePeriodEnded => {
                tracing::info!(
                    target: TARGET,
                    kind,
                    cycle = ?e.cycle,
                    actual = ?e.duration,
                    timing_error = ?e.timing_error
                );
            }
            EventKind::CleanupCompleted => {
                if e.success == Some(true) {
                    tracing::info!(target: TARGET, kind, duration = ?e.duration);
                } else {
                    tracing::warn!(target: TARGET, kind, duration = ?e.duration, reason = ?e.reason);
                }
            }
            EventKind::SessionRestarted => {
                tracing::info!(target: TARGET, kind, cycle = ?e.cycle);
            }
            EventKind::RestartScheduled => {
                tracing::warn!(
                    target: TARGET,
                    kind,
                    cycle = ?e.cycle,
                    attempt = ?e.attempt,
                    delay = ?e.delay,
                    reason = ?e.reason
                );
            }
            EventKind::RestartFailed => {
                tracing::error!(target: TARGET, kind, cycle = ?e.cycle, attempts = ?e.attempt, reason = ?e.reason);
            }
            EventKind::PhaseChanged => {
                tracing::debug!(target: TARGET, kind, from = ?e.from, to = ?e.phase);
            }
            EventKind::ClockSynced => {
                tracing::debug!(target: TARGET, kind, drift_ms = ?e.drift_ms);
            }
            EventKind::Alert => {
                if let Some(alert) = &e.alert {
                    tracing::warn!(
                        target: TARGET,
                        kind,
                        id = %alert.id,
                        severity = alert.severity.as_str(),
                        message = %alert.message
                    );
                }
            }
            EventKind::AlertResolved => {
                tracing::info!(target: TARGET, kind, id = ?e.reason);
            }
            EventKind::RecoveryAttempted => {
                tracing::info!(target: TARGET, kind, id = ?e.reason, success = ?e.success, attempt = ?e.attempt);
            }
            EventKind::ShutdownInitiated => {
                tracing::info!(target: TARGET, kind, reason = ?e.reason, emergency = ?e.emergency);
            }
            EventKind::ComponentsShutdown => {
                if let Some(s) = &e.shutdown {
                    tracing::info!(target: TARGET, kind, ok = s.successful, failed = s.failed);
                }
            }
            EventKind::ShutdownCompleted => {
                tracing::info!(target: TARGET, kind, duration = ?e.duration, reason = ?e.reason);
            }
            EventKind::ForceShutdown => {
                tracing::error!(target: TARGET, kind, reason = ?e.reason);
            }
            EventKind::SubscriberOverflow | EventKind::SubscriberPanicked => {
                tracing::warn!(target: TARGET, kind, reason = ?e.reason);
            }
        }
    }

    fn name(&self) -> &'static str {
        "log-writer"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn handles_every_kind_without_payload() {
        let kinds = [
            EventKind::SessionStarted,
            EventKind::CleanupCompleted,
            EventKind::Alert,
            EventKind::ComponentsShutdown,
            EventKind::ForceShutdown,
        ];
        for kind in kinds {
            LogWriter.on_event(&Event::new(kind)).await;
        }
    }
}
