use std::sync::Arc;

use crate::clock::ClockSource;
use crate::monitor::{ComponentProbe, NoopRecovery, RecoveryHook, ResourceProbe, SystemProbe};
use crate::reclaim::{NoopReclaimer, ResourceReclaimer};
use crate::session::SessionRef;

/// External capabilities the orchestrator and monitor call into.
///
/// `Default` gives a fresh clock, a [`NoopReclaimer`], a [`SystemProbe`] for
/// the current process, no crawl session, no component probes and
/// [`NoopRecovery`].
#[derive(Clone)]
pub struct Collaborators {
    /// Shared clock.
    pub clock: Arc<ClockSource>,
    /// Called after every session and for memory recovery.
    pub reclaimer: Arc<dyn ResourceReclaimer>,
    /// Process resource readings.
    pub probe: Arc<dyn ResourceProbe>,
    /// Work run inside each session window.
    pub session: Option<SessionRef>,
    /// External components polled by the monitor.
    pub components: Vec<Arc<dyn ComponentProbe>>,
    /// Cycle remediation for critical cycle alerts.
    pub recovery: Arc<dyn RecoveryHook>,
}

impl Default for Collaborators {
    fn default() -> Self {
        Self {
            clock: Arc::new(ClockSource::new()),
            reclaimer: Arc::new(NoopReclaimer),
            probe: Arc::new(SystemProbe::new()),
            session: None,
            components: Vec::new(),
            recovery: Arc::new(NoopRecovery),
        }
    }
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators")
            .field("session", &self.session.as_ref().map(|s| s.name().to_string()))
            .field("components", &self.components.len())
            .finish_non_exhaustive()
    }
}
