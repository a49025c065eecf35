//! # Restart preconditions.
//!
//! Before every restart the orchestrator checks, in this order:
//! 1. resident memory ≤ `critical_memory_mb`
//! 2. a cleanup completed within `cleanup_freshness_window()`
//! 3. open handles ≤ `max_tracked_resources`
//! 4. errors recorded in the last 5 minutes ≤ `max_recent_errors`
//!
//! Every failing check contributes one reason; the result is valid only when
//! there are none.

use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;

use crate::core::Config;
use crate::error::CycleError;
use crate::monitor::ResourceSample;

/// Window used for the recent-error ceiling.
pub const RECENT_ERROR_WINDOW: Duration = Duration::from_secs(5 * 60);

/// Outcome of a restart validation.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ValidationResult {
    /// True when no precondition failed.
    pub valid: bool,
    /// One entry per failed precondition.
    pub reasons: Vec<String>,
}

impl ValidationResult {
    /// Converts a failed validation into [`CycleError::Validation`].
    pub fn into_result(self) -> Result<(), CycleError> {
        if self.valid {
            Ok(())
        } else {
            Err(CycleError::Validation {
                reasons: self.reasons,
            })
        }
    }
}

/// Inputs to one validation pass.
#[derive(Clone, Copy, Debug)]
pub(crate) struct ValidationInput {
    pub sample: ResourceSample,
    pub now: Instant,
    pub last_cleanup: Option<Instant>,
    pub recent_errors: usize,
}

pub(crate) fn validate(cfg: &Config, input: ValidationInput) -> ValidationResult {
    let mut reasons = Vec::new();

    let rss_mb = input.sample.rss_mb();
    if rss_mb > cfg.critical_memory_mb {
        reasons.push(format!(
            "memory {rss_mb}MB above critical {}MB",
            cfg.critical_memory_mb
        ));
    }

    let freshness = cfg.cleanup_freshness_window();
    match input.last_cleanup {
        None => reasons.push("no cleanup recorded".to_string()),
        Some(at) => {
            let age = input.now.saturating_duration_since(at);
            if age > freshness {
                reasons.push(format!(
                    "last cleanup {}s ago exceeds {}s",
                    age.as_secs(),
                    freshness.as_secs()
                ));
            }
        }
    }

    if let Some(handles) = input.sample.open_handles {
        if handles > cfg.max_tracked_resources {
            reasons.push(format!(
                "{handles} open handles above {}",
                cfg.max_tracked_resources
            ));
        }
    }

    if input.recent_errors > cfg.max_recent_errors {
        reasons.push(format!(
            "{} errors in the last 5 minutes above {}",
            input.recent_errors, cfg.max_recent_errors
        ));
    }

    ValidationResult {
        valid: reasons.is_empty(),
        reasons,
    }
}
