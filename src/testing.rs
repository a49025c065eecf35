//! Shared fakes for unit tests.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::core::Collaborators;
use crate::cycle::{CyclePhase, CycleStatus, CycleView};
use crate::events::{Event, EventKind, Observe};
use crate::monitor::{ResourceProbe, ResourceSample};
use crate::reclaim::{ReclaimReport, ResourceReclaimer};
use crate::shutdown::Terminator;

const MB: u64 = 1024 * 1024;

/// Status with only phase and restart attempts set.
pub(crate) fn status(phase: CyclePhase, restart_attempts: u32) -> CycleStatus {
    CycleStatus {
        restart_attempts,
        ..CycleStatus::new(phase)
    }
}

/// Default collaborators with the given probe and reclaimer.
pub(crate) fn collaborators(probe: Arc<FakeProbe>, reclaimer: Arc<FakeReclaimer>) -> Collaborators {
    Collaborators {
        probe,
        reclaimer,
        ..Collaborators::default()
    }
}

/// Probe with a settable RSS.
#[derive(Debug)]
pub(crate) struct FakeProbe {
    rss_mb: AtomicU64,
}

impl FakeProbe {
    pub fn new(rss_mb: u64) -> Arc<Self> {
        Arc::new(Self {
            rss_mb: AtomicU64::new(rss_mb),
        })
    }

    pub fn set_rss_mb(&self, mb: u64) {
        self.rss_mb.store(mb, Ordering::SeqCst);
    }
}

impl ResourceProbe for FakeProbe {
    fn sample(&self) -> ResourceSample {
        ResourceSample {
            rss_bytes: self.rss_mb.load(Ordering::SeqCst) * MB,
            cpu_pct: 1.0,
            open_handles: None,
        }
    }
}

/// Reclaimer that counts calls and can fail or stall.
#[derive(Debug, Default)]
pub(crate) struct FakeReclaimer {
    calls: AtomicU32,
    forced: AtomicU32,
    failure: Mutex<Option<String>>,
    delay: Mutex<Duration>,
}

impl FakeReclaimer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn forced_calls(&self) -> u32 {
        self.forced.load(Ordering::SeqCst)
    }

    pub fn fail_with(&self, error: &str) {
        *self.failure.lock().unwrap() = Some(error.to_string());
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = delay;
    }
}

#[async_trait]
impl ResourceReclaimer for FakeReclaimer {
    async fn reclaim(&self, forced: bool) -> ReclaimReport {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if forced {
            self.forced.fetch_add(1, Ordering::SeqCst);
        }
        let delay = *self.delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        let failure = self.failure.lock().unwrap().clone();
        match failure {
            Some(error) => ReclaimReport::failed(error),
            None => ReclaimReport {
                freed_memory: 64 * MB,
                files_removed: 3,
                ..ReclaimReport::clean()
            },
        }
    }
}

/// Cycle view with a settable status.
#[derive(Debug)]
pub(crate) struct FakeCycle {
    status: Mutex<CycleStatus>,
}

impl FakeCycle {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            status: Mutex::new(CycleStatus::new(CyclePhase::Running)),
        })
    }

    pub fn set_phase(&self, phase: CyclePhase, restart_attempts: u32) {
        *self.status.lock().unwrap() = status(phase, restart_attempts);
    }
}

impl CycleView for FakeCycle {
    fn cycle_status(&self) -> CycleStatus {
        self.status.lock().unwrap().clone()
    }
}

/// Observer that keeps every event.
#[derive(Debug, Default)]
pub(crate) struct Recorder {
    events: Mutex<Vec<Event>>,
}

impl Recorder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn count(&self, kind: EventKind) -> usize {
        self.events.lock().unwrap().iter().filter(|e| e.kind == kind).count()
    }

    pub fn of(&self, kind: EventKind) -> Vec<Event> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.kind == kind)
            .cloned()
            .collect()
    }

    pub fn kinds(&self) -> Vec<EventKind> {
        self.events.lock().unwrap().iter().map(|e| e.kind).collect()
    }
}

impl Observe for Recorder {
    fn on_event(&self, event: &Event) {
        self.events.lock().unwrap().push(event.clone());
    }
}

/// Terminator that records exit codes instead of exiting.
#[derive(Debug, Default)]
pub(crate) struct RecordingTerminator {
    codes: Mutex<Vec<i32>>,
}

impl RecordingTerminator {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn codes(&self) -> Vec<i32> {
        self.codes.lock().unwrap().clone()
    }
}

impl Terminator for RecordingTerminator {
    fn terminate(&self, code: i32) {
        self.codes.lock().unwrap().push(code);
    }
}
