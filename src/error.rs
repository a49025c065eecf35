//! Error types used by the cycle runtime.
//!
//! This module defines the error enums raised by each part of the runtime:
//!
//! - [`CycleError`] — failures of the cycle orchestrator (phase misuse, cleanup, validation).
//! - [`ShutdownError`] — failures of the shutdown coordinator and its registry.
//! - [`ComponentError`] — failures reported by a single component while shutting down.
//! - [`ConfigError`] — rejected configuration values.
//! - [`StoreError`] — failures persisting the shutdown snapshot.
//! - [`RuntimeError`] — failures building or starting the wired runtime.
//!
//! Every enum provides `as_label` for logs/metrics.

use std::time::Duration;
use thiserror::Error;

use crate::cycle::CyclePhase;

/// # Errors produced by the cycle orchestrator.
///
/// None of these stop the runtime on their own: invalid-phase calls are no-ops,
/// cleanup failures still lead to the idle window, and validation failures feed
/// the restart backoff.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CycleError {
    /// Operation is not legal in the current phase; nothing changed.
    #[error("{op} is not allowed in phase {phase}")]
    InvalidPhase {
        /// Operation that was attempted.
        op: &'static str,
        /// Phase observed when the call was made.
        phase: CyclePhase,
    },

    /// The resource reclaimer reported a failure.
    #[error("cleanup failed: {reason}")]
    Cleanup {
        /// Reclaimer-provided reason.
        reason: String,
    },

    /// Restart preconditions were not met.
    #[error("system state invalid: {}", reasons.join("; "))]
    Validation {
        /// Every failed precondition.
        reasons: Vec<String>,
    },

    /// An external capability did not answer before its deadline.
    #[error("{op} timed out after {timeout:?}")]
    Timeout {
        /// Capability that was called.
        op: &'static str,
        /// Deadline that fired.
        timeout: Duration,
    },
}

impl CycleError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use cyclevisor::{CycleError, CyclePhase};
    ///
    /// let err = CycleError::InvalidPhase { op: "start", phase: CyclePhase::Running };
    /// assert_eq!(err.as_label(), "cycle_invalid_phase");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            CycleError::InvalidPhase { .. } => "cycle_invalid_phase",
            CycleError::Cleanup { .. } => "cycle_cleanup_failed",
            CycleError::Validation { .. } => "cycle_validation_failed",
            CycleError::Timeout { .. } => "cycle_timeout",
        }
    }
}

/// # Errors produced by the shutdown coordinator.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ShutdownError {
    /// Shutdown already started; the registry no longer accepts changes.
    #[error("component registry is closed: shutdown in progress")]
    RegistryClosed,

    /// A component with the same name is already registered.
    #[error("component '{name}' is already registered")]
    DuplicateComponent {
        /// Conflicting name.
        name: String,
    },

    /// The registration would introduce a dependency cycle.
    #[error("dependency cycle: {}", path.join(" -> "))]
    DependencyCycle {
        /// Names along the cycle, first name repeated at the end.
        path: Vec<String>,
    },

    /// No component with that name is registered.
    #[error("component '{name}' is not registered")]
    UnknownComponent {
        /// Requested name.
        name: String,
    },
}

impl ShutdownError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            ShutdownError::RegistryClosed => "shutdown_registry_closed",
            ShutdownError::DuplicateComponent { .. } => "shutdown_duplicate_component",
            ShutdownError::DependencyCycle { .. } => "shutdown_dependency_cycle",
            ShutdownError::UnknownComponent { .. } => "shutdown_unknown_component",
        }
    }
}

/// # Errors reported while shutting down one component.
///
/// Recorded per component; they never abort the rest of the sequence.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ComponentError {
    /// The component's shutdown capability returned an error.
    #[error("shutdown failed: {error}")]
    Failed {
        /// The underlying error message.
        error: String,
    },

    /// The component did not finish before its deadline.
    #[error("shutdown timed out after {timeout:?}")]
    TimedOut {
        /// Deadline that fired.
        timeout: Duration,
    },

    /// The shutdown capability panicked.
    #[error("shutdown panicked: {info}")]
    Panicked {
        /// Panic payload, when it is a string.
        info: String,
    },
}

impl ComponentError {
    /// Creates a [`ComponentError::Failed`] from any displayable error.
    pub fn failed(error: impl std::fmt::Display) -> Self {
        ComponentError::Failed {
            error: error.to_string(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            ComponentError::Failed { .. } => "component_failed",
            ComponentError::TimedOut { .. } => "component_timeout",
            ComponentError::Panicked { .. } => "component_panicked",
        }
    }
}

/// # Rejected configuration values.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A duration that must be positive was zero.
    #[error("{field} must be greater than zero")]
    ZeroDuration {
        /// Offending field.
        field: &'static str,
    },

    /// A count that must be positive was zero.
    #[error("{field} must be at least 1")]
    ZeroLimit {
        /// Offending field.
        field: &'static str,
    },

    /// The force watchdog would fire before the graceful one.
    #[error("force_timeout ({force:?}) must not be shorter than graceful_timeout ({graceful:?})")]
    ForceBeforeGraceful {
        /// Configured graceful timeout.
        graceful: Duration,
        /// Configured force timeout.
        force: Duration,
    },
}

impl ConfigError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            ConfigError::ZeroDuration { .. } => "config_zero_duration",
            ConfigError::ZeroLimit { .. } => "config_zero_limit",
            ConfigError::ForceBeforeGraceful { .. } => "config_force_before_graceful",
        }
    }
}

/// # Errors raised by a shutdown state store.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum StoreError {
    /// Reading or writing the backing file failed.
    #[error("state store io: {0}")]
    Io(#[from] std::io::Error),

    /// The snapshot could not be encoded or decoded.
    #[error("state store encoding: {0}")]
    Encoding(#[from] serde_json::Error),
}

impl StoreError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            StoreError::Io(_) => "store_io",
            StoreError::Encoding(_) => "store_encoding",
        }
    }
}

/// # Errors raised while building or starting a [`Runtime`](crate::Runtime).
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// The configuration was rejected.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A component registration was rejected.
    #[error(transparent)]
    Registration(#[from] ShutdownError),

    /// The orchestrator refused to start.
    #[error(transparent)]
    Cycle(#[from] CycleError),

    /// OS signal handlers could not be installed.
    #[error("signal handlers: {0}")]
    Signals(#[from] std::io::Error),
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::Config(e) => e.as_label(),
            RuntimeError::Registration(e) => e.as_label(),
            RuntimeError::Cycle(e) => e.as_label(),
            RuntimeError::Signals(_) => "runtime_signals",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_message_joins_reasons() {
        let err = CycleError::Validation {
            reasons: vec!["memory".into(), "errors".into()],
        };
        assert_eq!(err.to_string(), "system state invalid: memory; errors");
        assert_eq!(err.as_label(), "cycle_validation_failed");
    }

    #[test]
    fn cycle_path_is_rendered_in_order() {
        let err = ShutdownError::DependencyCycle {
            path: vec!["a".into(), "b".into(), "a".into()],
        };
        assert_eq!(err.to_string(), "dependency cycle: a -> b -> a");
    }
}
