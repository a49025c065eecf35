//! # Resource reclaimer collaborator.
//!
//! The orchestrator calls a [`ResourceReclaimer`] at the end of every session
//! (and the monitor calls it for memory recovery). The reclaimer itself lives
//! outside this crate: it frees memory, removes temp files, closes network and
//! database handles, and reports what it did.
//!
//! Callers always wrap `reclaim` in their own deadline; a late report is discarded.

use async_trait::async_trait;
use serde::Serialize;

/// Outcome reported by a reclaimer.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ReclaimReport {
    /// Overall success.
    pub success: bool,
    /// Bytes released.
    pub freed_memory: u64,
    /// Temporary files removed.
    pub files_removed: u32,
    /// Network connections closed.
    pub network_closed: u32,
    /// Database handles closed.
    pub db_closed: u32,
    /// Individual failures; may be non-empty even when `success` is true.
    pub errors: Vec<String>,
}

impl ReclaimReport {
    /// A successful report with no work done.
    pub fn clean() -> Self {
        Self {
            success: true,
            ..Self::default()
        }
    }

    /// A failed report carrying one error.
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            errors: vec![error.into()],
            ..Self::default()
        }
    }

    /// Errors joined for logs; `"unknown"` when the list is empty.
    pub fn error_summary(&self) -> String {
        if self.errors.is_empty() {
            "unknown".to_string()
        } else {
            self.errors.join("; ")
        }
    }
}

/// Frees process resources on request.
#[async_trait]
pub trait ResourceReclaimer: Send + Sync + 'static {
    /// Runs one cleanup pass. `forced` asks for the deepest pass available.
    async fn reclaim(&self, forced: bool) -> ReclaimReport;
}

/// Reclaimer that does nothing and always succeeds.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopReclaimer;

#[async_trait]
impl ResourceReclaimer for NoopReclaimer {
    async fn reclaim(&self, _forced: bool) -> ReclaimReport {
        ReclaimReport::clean()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_joins_errors() {
        let mut report = ReclaimReport::failed("tmp dir busy");
        report.errors.push("db pool locked".into());
        assert_eq!(report.error_summary(), "tmp dir busy; db pool locked");
        assert_eq!(ReclaimReport::clean().error_summary(), "unknown");
    }

    #[tokio::test]
    async fn noop_succeeds() {
        assert!(NoopReclaimer.reclaim(true).await.success);
    }
}
