//! # CycleOrchestrator: session/idle state machine with restart backoff.
//!
//! Owns the [`CyclePhase`], the open window, the restart counter and the window
//! history. Every transition goes through one `Mutex<CycleState>`; the lock is
//! never held across an `.await`, and events are published only after it is
//! released, so observers may call [`CycleOrchestrator::status`] freely.
//!
//! ## Timers
//! ```text
//! Running      session timer ──► terminate ──► reclaim (deadline) ──► Idle
//!              clock-sync loop, health-check loop (cancelled on leaving Running)
//! Idle         idle timer ──► end_idle_period ──► Restarting ──► validate
//! Restarting   retry timer ──► validate again
//! ```
//!
//! Each phase owns a `CancellationToken`; entering a new phase cancels the old
//! one, which stops its timers and the crawl session. Timers also carry the
//! epoch they were armed in and do nothing if the epoch has moved on.
//!
//! ## Restart policy
//! - valid state: counter reset to 0, new session, `SessionRestarted`
//! - invalid, `attempts < max_restart_attempts`: retry after `restart_backoff.next(attempts)`
//! - invalid, attempts exhausted: `ErrorHalted` (left only by `stop()`), `RestartFailed`

use std::collections::VecDeque;
use std::future::Future;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use futures::FutureExt;
use tokio::select;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::clock::ClockSource;
use crate::core::{Collaborators, Config};
use crate::error::{ComponentError, CycleError};
use crate::events::{Bus, Event, EventKind};
use crate::monitor::ResourceProbe;
use crate::reclaim::{ReclaimReport, ResourceReclaimer};
use crate::session::{SessionContext, SessionRef};
use crate::shutdown::{ShutdownContext, Shutdownable};
use crate::subscribers::panic_message;

use super::phase::{CyclePhase, PhaseEvent};
use super::status::{CycleStatus, CycleView};
use super::validate::{self, RECENT_ERROR_WINDOW, ValidationInput, ValidationResult};
use super::window::{ClosedWindow, OpenWindow, WindowHistory, WindowKind};

const ERROR_LOG_CAP: usize = 256;

/// Drives the session → cleanup → idle → restart loop.
///
/// Cheap to clone; clones share state.
#[derive(Clone)]
pub struct CycleOrchestrator {
    inner: Arc<Inner>,
}

struct Inner {
    cfg: Config,
    bus: Bus,
    clock: Arc<ClockSource>,
    reclaimer: Arc<dyn ResourceReclaimer>,
    probe: Arc<dyn ResourceProbe>,
    session: Option<SessionRef>,
    state: Mutex<CycleState>,
}

struct CycleState {
    phase: CyclePhase,
    epoch: u64,
    phase_token: CancellationToken,
    cycle: u64,
    restart_attempts: u32,
    window: Option<OpenWindow>,
    retry_at: Option<Instant>,
    history: WindowHistory,
    errors: ErrorLog,
    last_cleanup: Option<Instant>,
    session_task: Option<JoinHandle<()>>,
}

impl CycleState {
    /// Applies `event`, renewing the phase token and epoch. `None` if illegal.
    fn advance(&mut self, event: PhaseEvent) -> Option<(CyclePhase, CyclePhase)> {
        let from = self.phase;
        let Some(to) = from.on(event) else {
            tracing::warn!(phase = %from, event = ?event, "illegal phase transition ignored");
            return None;
        };
        self.phase = to;
        self.epoch += 1;
        self.phase_token.cancel();
        self.phase_token = CancellationToken::new();
        Some((from, to))
    }
}

struct ErrorLog {
    entries: VecDeque<(Instant, String)>,
    total: u64,
}

impl ErrorLog {
    fn push(&mut self, at: Instant, error: String) {
        self.total += 1;
        if self.entries.len() == ERROR_LOG_CAP {
            self.entries.pop_front();
        }
        self.entries.push_back((at, error));
    }

    fn recent(&self, now: Instant) -> usize {
        self.entries
            .iter()
            .filter(|(at, _)| now.saturating_duration_since(*at) <= RECENT_ERROR_WINDOW)
            .count()
    }
}

struct CleanupOutcome {
    report: Option<ReclaimReport>,
    error: Option<CycleError>,
    elapsed: Duration,
}

impl std::fmt::Debug for CycleOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let st = self.lock();
        f.debug_struct("CycleOrchestrator")
            .field("phase", &st.phase)
            .field("cycle", &st.cycle)
            .field("restart_attempts", &st.restart_attempts)
            .finish()
    }
}

impl CycleOrchestrator {
    /// Creates a stopped orchestrator.
    pub fn new(cfg: Config, bus: Bus, parts: &Collaborators) -> Self {
        let history = WindowHistory::new(cfg.history_limit);
        Self {
            inner: Arc::new(Inner {
                cfg,
                bus,
                clock: Arc::clone(&parts.clock),
                reclaimer: Arc::clone(&parts.reclaimer),
                probe: Arc::clone(&parts.probe),
                session: parts.session.clone(),
                state: Mutex::new(CycleState {
                    phase: CyclePhase::Stopped,
                    epoch: 0,
                    phase_token: CancellationToken::new(),
                    cycle: 0,
                    restart_attempts: 0,
                    window: None,
                    retry_at: None,
                    history,
                    errors: ErrorLog {
                        entries: VecDeque::new(),
                        total: 0,
                    },
                    last_cleanup: None,
                    session_task: None,
                }),
            }),
        }
    }

    /// Current phase.
    pub fn phase(&self) -> CyclePhase {
        self.lock().phase
    }

    /// Opens the first session.
    ///
    /// Fails with [`CycleError::InvalidPhase`] unless the phase is `Stopped`;
    /// the phase is left unchanged in that case.
    pub fn start(&self) -> Result<(), CycleError> {
        let mut events = Vec::new();
        {
            let mut st = self.lock();
            if st.phase != CyclePhase::Stopped {
                tracing::warn!(phase = %st.phase, "start ignored: orchestrator already active");
                return Err(CycleError::InvalidPhase {
                    op: "start",
                    phase: st.phase,
                });
            }
            st.restart_attempts = 0;
            self.open_session(&mut st, PhaseEvent::Start, &mut events);
        }
        self.emit(events);
        Ok(())
    }

    /// Ends the running session early and moves on to cleanup and idle.
    ///
    /// Returns `false` (and logs a warning) when no session is running.
    pub async fn terminate_session(&self) -> bool {
        self.terminate(None).await
    }

    /// Leaves whatever phase is active and returns to `Stopped`.
    ///
    /// Open windows are closed and reported; timers and the crawl session are
    /// cancelled. Returns `false` if already stopped.
    pub fn stop(&self) -> bool {
        let mut events = Vec::new();
        {
            let mut st = self.lock();
            if st.phase == CyclePhase::Stopped {
                return false;
            }
            let cycle = st.cycle;
            if let Some((from, to)) = st.advance(PhaseEvent::Stop) {
                events.push(self.phase_changed(from, to));
                tracing::info!(from = %from, cycle, "cycle stopped");
            }
            st.retry_at = None;
            if let Some(window) = st.window.take() {
                let closed = self.close(window);
                events.push(self.closed_event(&closed));
                st.history.push(closed);
            }
        }
        self.emit(events);
        true
    }

    /// Checks the restart preconditions against the current process state.
    pub fn validate_system_state(&self) -> ValidationResult {
        let sample = self.inner.probe.sample();
        let input = {
            let st = self.lock();
            let now = self.inner.clock.now();
            ValidationInput {
                sample,
                now,
                last_cleanup: st.last_cleanup,
                recent_errors: st.errors.recent(now),
            }
        };
        let result = validate::validate(&self.inner.cfg, input);
        if !result.valid {
            tracing::warn!(reasons = ?result.reasons, "restart validation failed");
        }
        result
    }

    /// Records an error; it counts toward the recent-error ceiling for 5 minutes.
    pub fn record_error(&self, error: impl Into<String>) {
        let now = self.inner.clock.now();
        self.lock().errors.push(now, error.into());
    }

    /// Snapshot of phase, counters, remaining time and timing accuracy.
    pub fn status(&self) -> CycleStatus {
        let clock = &self.inner.clock;
        let st = self.lock();
        let now = clock.now();
        let deadline = match st.phase {
            CyclePhase::Running | CyclePhase::Idle => st.window.as_ref().map(OpenWindow::planned_end),
            CyclePhase::Restarting => st.retry_at,
            _ => None,
        };
        CycleStatus {
            phase: st.phase,
            cycle_number: st.cycle,
            time_remaining: deadline.map(|d| d.saturating_duration_since(now)),
            next_transition_at: deadline.map(|d| clock.wall_at(d)),
            restart_attempts: st.restart_attempts,
            error_count: st.errors.recent(now),
            total_errors: st.errors.total,
            last_clock_sync: clock.last_sync(),
            last_session: st.history.last(WindowKind::Session).map(ClosedWindow::timing),
            last_idle: st.history.last(WindowKind::Idle).map(ClosedWindow::timing),
        }
    }

    /// Closed windows, oldest first.
    pub fn windows(&self) -> Vec<ClosedWindow> {
        self.lock().history.iter().cloned().collect()
    }

    fn open_session(&self, st: &mut CycleState, via: PhaseEvent, events: &mut Vec<Event>) {
        let Some((from, to)) = st.advance(via) else {
            return;
        };
        st.cycle += 1;
        st.retry_at = None;
        let cycle = st.cycle;
        let window = self.open(WindowKind::Session, cycle, self.inner.cfg.session_duration);
        events.push(self.phase_changed(from, to));
        events.push(
            self.event(EventKind::SessionStarted)
                .with_cycle(cycle)
                .with_window(window.planned_start, window.planned_end_wall()),
        );

        let token = st.phase_token.clone();
        let epoch = st.epoch;
        self.arm(token.clone(), window.planned_end(), move |o| async move {
            o.terminate(Some(epoch)).await;
        });
        if let Some(every) = self.inner.cfg.clock_sync_every() {
            self.arm_every(token.clone(), every, Self::sync_clock);
        }
        if let Some(every) = self.inner.cfg.health_check_every() {
            self.arm_every(token.clone(), every, Self::check_health);
        }
        st.session_task = self.spawn_session(cycle, token.child_token());
        st.window = Some(window);
        tracing::info!(cycle, planned = ?self.inner.cfg.session_duration, "session started");
    }

    async fn terminate(&self, armed_in: Option<u64>) -> bool {
        let mut events = Vec::new();
        let (epoch, cycle) = {
            let mut st = self.lock();
            let stale = armed_in.is_some_and(|e| e != st.epoch);
            if st.phase != CyclePhase::Running || stale {
                if armed_in.is_none() {
                    tracing::warn!(phase = %st.phase, "terminate_session ignored: no session running");
                }
                return false;
            }
            let window = st.window.take();
            if let Some((from, to)) = st.advance(PhaseEvent::Terminate) {
                events.push(self.phase_changed(from, to));
            }
            if let Some(window) = window {
                let closed = self.close(window);
                tracing::info!(
                    cycle = closed.cycle,
                    actual = ?closed.actual_duration,
                    timing_error_ms = closed.timing_error.as_millis() as u64,
                    "session terminated"
                );
                events.push(self.closed_event(&closed));
                st.history.push(closed);
            }
            (st.epoch, st.cycle)
        };
        self.emit(events);

        let cleanup = self.run_cleanup().await;
        self.enter_idle(epoch, cycle, cleanup);
        true
    }

    async fn run_cleanup(&self) -> CleanupOutcome {
        let timeout = self.inner.cfg.cleanup_timeout;
        let started = self.inner.clock.now();
        let call = AssertUnwindSafe(self.inner.reclaimer.reclaim(false)).catch_unwind();
        let (report, error) = match time::timeout(timeout, call).await {
            Ok(Ok(report)) if report.success => (Some(report), None),
            Ok(Ok(report)) => {
                let error = CycleError::Cleanup {
                    reason: report.error_summary(),
                };
                (Some(report), Some(error))
            }
            Ok(Err(panic)) => {
                let reason = format!("reclaimer panicked: {}", panic_message(panic.as_ref()));
                (None, Some(CycleError::Cleanup { reason }))
            }
            Err(_elapsed) => (
                None,
                Some(CycleError::Timeout {
                    op: "reclaim",
                    timeout,
                }),
            ),
        };
        CleanupOutcome {
            report,
            error,
            elapsed: started.elapsed(),
        }
    }

    fn enter_idle(&self, epoch: u64, cycle: u64, cleanup: CleanupOutcome) {
        let mut done = self
            .event(EventKind::CleanupCompleted)
            .with_cycle(cycle)
            .with_duration(cleanup.elapsed)
            .with_success(cleanup.error.is_none());
        if let Some(report) = cleanup.report {
            done = done.with_reclaim(report);
        }
        if let Some(error) = &cleanup.error {
            tracing::warn!(cycle, error = %error, label = error.as_label(), "cleanup failed; idling anyway");
            done = done.with_reason(error.to_string());
        }
        let mut events = vec![done];

        {
            let mut st = self.lock();
            let now = self.inner.clock.now();
            st.last_cleanup = Some(now);
            if let Some(error) = cleanup.error {
                st.errors.push(now, error.to_string());
            }
            if st.phase == CyclePhase::Terminating && st.epoch == epoch {
                if let Some((from, to)) = st.advance(PhaseEvent::CleanupAttempted) {
                    events.push(self.phase_changed(from, to));
                }
                let window = self.open(WindowKind::Idle, cycle, self.inner.cfg.idle_period);
                events.push(
                    self.event(EventKind::IdlePeriodStarted)
                        .with_cycle(cycle)
                        .with_window(window.planned_start, window.planned_end_wall()),
                );
                let epoch = st.epoch;
                self.arm(st.phase_token.clone(), window.planned_end(), move |o| async move {
                    o.end_idle_period(epoch);
                });
                st.window = Some(window);
                tracing::info!(cycle, planned = ?self.inner.cfg.idle_period, "idle period started");
            }
        }
        self.emit(events);
    }

    fn end_idle_period(&self, armed_in: u64) {
        let mut events = Vec::new();
        let epoch = {
            let mut st = self.lock();
            if st.phase != CyclePhase::Idle || st.epoch != armed_in {
                return;
            }
            if let Some(window) = st.window.take() {
                let closed = self.close(window);
                events.push(self.closed_event(&closed));
                st.history.push(closed);
            }
            if let Some((from, to)) = st.advance(PhaseEvent::IdleExpired) {
                events.push(self.phase_changed(from, to));
            }
            st.epoch
        };
        self.emit(events);
        self.attempt_restart(epoch);
    }

    fn attempt_restart(&self, armed_in: u64) {
        let validation = self.validate_system_state();
        let mut events = Vec::new();
        {
            let mut st = self.lock();
            if st.phase != CyclePhase::Restarting || st.epoch != armed_in {
                return;
            }

            if validation.valid {
                st.restart_attempts = 0;
                self.open_session(&mut st, PhaseEvent::ValidationPassed, &mut events);
                tracing::info!(cycle = st.cycle, "session restarted");
                events.push(
                    self.event(EventKind::SessionRestarted)
                        .with_cycle(st.cycle)
                        .with_validation(validation),
                );
            } else {
                st.restart_attempts = st.restart_attempts.saturating_add(1);
                let attempts = st.restart_attempts;
                let cycle = st.cycle;
                let error = CycleError::Validation {
                    reasons: validation.reasons.clone(),
                };

                if attempts < self.inner.cfg.max_restart_attempts {
                    let delay = self.inner.cfg.restart_backoff.next(attempts);
                    st.advance(PhaseEvent::RetryScheduled);
                    let deadline = self.inner.clock.now() + delay;
                    st.retry_at = Some(deadline);
                    let epoch = st.epoch;
                    self.arm(st.phase_token.clone(), deadline, move |o| async move {
                        o.attempt_restart(epoch);
                    });
                    tracing::warn!(cycle, attempt = attempts, delay = ?delay, error = %error, "restart failed; retry scheduled");
                    events.push(
                        self.event(EventKind::RestartScheduled)
                            .with_cycle(cycle)
                            .with_attempt(attempts)
                            .with_delay(delay)
                            .with_reason(error.to_string())
                            .with_validation(validation),
                    );
                } else {
                    st.retry_at = None;
                    if let Some((from, to)) = st.advance(PhaseEvent::AttemptsExhausted) {
                        events.push(self.phase_changed(from, to));
                    }
                    tracing::error!(cycle, attempts, error = %error, "restart attempts exhausted; cycle halted");
                    events.push(
                        self.event(EventKind::RestartFailed)
                            .with_cycle(cycle)
                            .with_attempt(attempts)
                            .with_reason(error.to_string()),
                    );
                }
            }
        }
        self.emit(events);
    }

    fn sync_clock(&self) {
        let report = self.inner.clock.sync();
        tracing::debug!(drift_ms = report.drift_ms, "clock synced");
        self.inner.bus.publish(
            Event::new(EventKind::ClockSynced)
                .at(report.wall)
                .with_duration(report.accuracy)
                .with_drift(report.drift_ms),
        );
    }

    fn check_health(&self) {
        let rss_mb = self.inner.probe.sample().rss_mb();
        let critical = self.inner.cfg.critical_memory_mb;
        if rss_mb > critical {
            tracing::warn!(rss_mb, critical_mb = critical, "session memory above critical threshold");
            self.record_error(format!("memory {rss_mb}MB above critical {critical}MB"));
        }
    }

    fn spawn_session(&self, cycle: u64, token: CancellationToken) -> Option<JoinHandle<()>> {
        let session = self.inner.session.clone()?;
        let this = self.clone();
        Some(tokio::spawn(async move {
            let run = session.run(SessionContext { cycle, token });
            match AssertUnwindSafe(run).catch_unwind().await {
                Ok(Ok(())) => tracing::debug!(session = session.name(), cycle, "crawl session returned"),
                Ok(Err(e)) => {
                    tracing::warn!(session = session.name(), cycle, error = %e, "crawl session failed");
                    this.record_error(e.to_string());
                }
                Err(panic) => {
                    let info = panic_message(panic.as_ref());
                    tracing::error!(session = session.name(), cycle, panic = %info, "crawl session panicked");
                    this.record_error(format!("session panicked: {info}"));
                }
            }
        }))
    }

    /// Runs `fire` at `deadline` unless `token` is cancelled first.
    fn arm<F, Fut>(&self, token: CancellationToken, deadline: Instant, fire: F)
    where
        F: FnOnce(CycleOrchestrator) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let this = self.clone();
        tokio::spawn(async move {
            select! {
                _ = time::sleep_until(deadline) => fire(this).await,
                _ = token.cancelled() => {}
            }
        });
    }

    /// Runs `tick` every `period` (first tick immediately) until `token` is cancelled.
    fn arm_every(&self, token: CancellationToken, period: Duration, tick: fn(&CycleOrchestrator)) {
        let this = self.clone();
        tokio::spawn(async move {
            let mut interval = time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                select! {
                    _ = interval.tick() => {
                        if let Err(panic) = catch_unwind(AssertUnwindSafe(|| tick(&this))) {
                            tracing::error!(panic = %panic_message(panic.as_ref()), "periodic cycle task panicked");
                        }
                    }
                    _ = token.cancelled() => break,
                }
            }
        });
    }

    fn open(&self, kind: WindowKind, cycle: u64, planned: Duration) -> OpenWindow {
        let now = self.inner.clock.now();
        OpenWindow::open(kind, cycle, now, self.inner.clock.wall_at(now), planned)
    }

    fn close(&self, window: OpenWindow) -> ClosedWindow {
        let now = self.inner.clock.now();
        window.close(now, self.inner.clock.wall_at(now))
    }

    fn closed_event(&self, closed: &ClosedWindow) -> Event {
        let kind = match closed.kind {
            WindowKind::Session => EventKind::SessionTerminated,
            WindowKind::Idle => EventKind::IdlePeriodEnded,
        };
        self.event(kind)
            .with_cycle(closed.cycle)
            .with_closed(closed.actual_end_wall, closed.actual_duration, closed.timing_error)
    }

    fn phase_changed(&self, from: CyclePhase, to: CyclePhase) -> Event {
        self.event(EventKind::PhaseChanged).with_phases(from, to)
    }

    fn event(&self, kind: EventKind) -> Event {
        Event::new(kind).at(self.inner.clock.wall_now())
    }

    fn emit(&self, events: Vec<Event>) {
        for ev in events {
            self.inner.bus.publish(ev);
        }
    }

    fn lock(&self) -> MutexGuard<'_, CycleState> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl CycleView for CycleOrchestrator {
    fn cycle_status(&self) -> CycleStatus {
        self.status()
    }
}

#[async_trait]
impl Shutdownable for CycleOrchestrator {
    /// Stops the cycle and waits for the crawl session to return.
    async fn shutdown(&self, ctx: ShutdownContext) -> Result<(), ComponentError> {
        self.stop();
        let task = self.lock().session_task.take();
        let Some(task) = task else {
            return Ok(());
        };
        if ctx.emergency {
            task.abort();
        }
        match task.await {
            Ok(()) => Ok(()),
            Err(e) if e.is_cancelled() => Ok(()),
            Err(e) => Err(ComponentError::failed(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use super::*;
    use crate::session::{SessionError, SessionFn};
    use crate::testing::{FakeProbe, FakeReclaimer, Recorder, collaborators};

    fn cfg() -> Config {
        Config {
            session_duration: Duration::from_millis(2000),
            idle_period: Duration::from_millis(500),
            max_restart_attempts: 2,
            clock_sync_interval: Duration::ZERO,
            health_check_interval: Duration::ZERO,
            ..Config::default()
        }
    }

    struct Rig {
        orch: CycleOrchestrator,
        rec: Arc<Recorder>,
        probe: Arc<FakeProbe>,
        reclaimer: Arc<FakeReclaimer>,
    }

    fn rig(cfg: Config) -> Rig {
        let bus = Bus::new(64);
        let rec = Recorder::new();
        bus.observe(rec.clone());
        let probe = FakeProbe::new(100);
        let reclaimer = FakeReclaimer::new();
        let parts = collaborators(probe.clone(), reclaimer.clone());
        Rig {
            orch: CycleOrchestrator::new(cfg, bus, &parts),
            rec,
            probe,
            reclaimer,
        }
    }

    async fn sleep_ms(ms: u64) {
        time::sleep(Duration::from_millis(ms)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn session_idle_restart_scenario() {
        let r = rig(cfg());
        r.orch.start().unwrap();

        sleep_ms(2450).await;
        assert_eq!(r.rec.count(EventKind::SessionTerminated), 1);
        assert_eq!(r.rec.count(EventKind::IdlePeriodStarted), 1);
        assert_eq!(r.rec.count(EventKind::SessionRestarted), 0);
        assert_eq!(r.orch.phase(), CyclePhase::Idle);

        sleep_ms(550).await;
        let restarted = r.rec.of(EventKind::SessionRestarted);
        assert_eq!(restarted.len(), 1);
        assert_eq!(restarted[0].cycle, Some(2));
        assert!(restarted[0].validation.as_ref().is_some_and(|v| v.valid));

        let st = r.orch.status();
        assert_eq!(st.phase, CyclePhase::Running);
        assert_eq!(st.cycle_number, 2);
        assert_eq!(st.restart_attempts, 0);
        assert_eq!(r.reclaimer.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn timing_is_reported_in_status() {
        let r = rig(cfg());
        r.orch.start().unwrap();
        sleep_ms(2600).await;

        let st = r.orch.status();
        let session = st.last_session.unwrap();
        assert_eq!(session.planned, Duration::from_millis(2000));
        assert_eq!(session.error_ms, session.actual.abs_diff(session.planned).as_millis());
        let idle = st.last_idle.unwrap();
        assert_eq!(idle.planned, Duration::from_millis(500));
        assert_eq!(idle.cycle, 1);

        let ended = r.rec.of(EventKind::SessionTerminated);
        assert_eq!(ended[0].duration, Some(session.actual));
    }

    #[tokio::test(start_paused = true)]
    async fn start_is_rejected_outside_stopped() {
        let r = rig(cfg());
        r.orch.start().unwrap();
        let err = r.orch.start().unwrap_err();
        assert_eq!(
            err,
            CycleError::InvalidPhase {
                op: "start",
                phase: CyclePhase::Running
            }
        );
        assert_eq!(r.orch.phase(), CyclePhase::Running);
        assert_eq!(r.rec.count(EventKind::SessionStarted), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn terminate_is_noop_outside_running() {
        let r = rig(cfg());
        assert!(!r.orch.terminate_session().await);
        assert_eq!(r.orch.phase(), CyclePhase::Stopped);

        r.orch.start().unwrap();
        assert!(r.orch.terminate_session().await);
        assert_eq!(r.orch.phase(), CyclePhase::Idle);
        assert!(!r.orch.terminate_session().await);
        assert_eq!(r.orch.phase(), CyclePhase::Idle);
        assert_eq!(r.rec.count(EventKind::SessionTerminated), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_cleanup_still_reaches_idle() {
        let r = rig(cfg());
        r.reclaimer.fail_with("tmp dir busy");
        r.orch.start().unwrap();
        assert!(r.orch.terminate_session().await);

        assert_eq!(r.orch.phase(), CyclePhase::Idle);
        let done = r.rec.of(EventKind::CleanupCompleted);
        assert_eq!(done[0].success, Some(false));
        assert_eq!(done[0].reason.as_deref(), Some("cleanup failed: tmp dir busy"));
        assert_eq!(r.orch.status().error_count, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_cleanup_is_cut_off_by_deadline() {
        let r = rig(Config {
            cleanup_timeout: Duration::from_secs(1),
            ..cfg()
        });
        r.reclaimer.set_delay(Duration::from_secs(10));
        r.orch.start().unwrap();

        let started = Instant::now();
        assert!(r.orch.terminate_session().await);
        let waited = started.elapsed();
        assert!(waited >= Duration::from_secs(1) && waited < Duration::from_secs(2));
        assert_eq!(r.orch.phase(), CyclePhase::Idle);
        let done = r.rec.of(EventKind::CleanupCompleted);
        assert_eq!(done[0].success, Some(false));
        assert!(done[0].reclaim.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn invalid_state_backs_off_then_halts() {
        let r = rig(Config {
            critical_memory_mb: 200,
            ..cfg()
        });
        r.probe.set_rss_mb(500);
        r.orch.start().unwrap();

        sleep_ms(2600).await;
        let scheduled = r.rec.of(EventKind::RestartScheduled);
        assert_eq!(scheduled.len(), 1);
        assert_eq!(scheduled[0].attempt, Some(1));
        assert_eq!(scheduled[0].delay, Some(Duration::from_secs(5)));
        let st = r.orch.status();
        assert_eq!(st.phase, CyclePhase::Restarting);
        assert_eq!(st.restart_attempts, 1);
        let remaining = st.time_remaining.unwrap();
        assert!(remaining > Duration::from_millis(4800) && remaining <= Duration::from_secs(5));

        sleep_ms(5000).await;
        assert_eq!(r.orch.phase(), CyclePhase::ErrorHalted);
        let failed = r.rec.of(EventKind::RestartFailed);
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].attempt, Some(2));
        assert_eq!(r.orch.status().restart_attempts, 2);

        // halted until stopped
        r.probe.set_rss_mb(10);
        sleep_ms(60_000).await;
        assert_eq!(r.orch.phase(), CyclePhase::ErrorHalted);
        assert!(r.orch.stop());
        assert_eq!(r.orch.phase(), CyclePhase::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn successful_retry_resets_attempts() {
        let r = rig(Config {
            critical_memory_mb: 200,
            max_restart_attempts: 3,
            ..cfg()
        });
        r.probe.set_rss_mb(500);
        r.orch.start().unwrap();
        sleep_ms(2600).await;
        assert_eq!(r.orch.status().restart_attempts, 1);

        r.probe.set_rss_mb(50);
        sleep_ms(5000).await;
        let st = r.orch.status();
        assert_eq!(st.phase, CyclePhase::Running);
        assert_eq!(st.restart_attempts, 0);
        assert_eq!(st.cycle_number, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_cancels_timers_and_session() {
        let bus = Bus::new(64);
        let rec = Recorder::new();
        bus.observe(rec.clone());
        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = cancelled.clone();
        let mut parts = collaborators(FakeProbe::new(100), FakeReclaimer::new());
        parts.session = Some(SessionFn::arc("crawl", move |ctx: SessionContext| {
            let flag = flag.clone();
            async move {
                ctx.token.cancelled().await;
                flag.store(true, Ordering::SeqCst);
                Ok::<_, SessionError>(())
            }
        }));
        let orch = CycleOrchestrator::new(cfg(), bus, &parts);
        orch.start().unwrap();
        sleep_ms(100).await;

        orch.shutdown(ShutdownContext::new("test", false, Duration::from_secs(1)))
            .await
            .unwrap();
        assert!(cancelled.load(Ordering::SeqCst));
        assert_eq!(orch.phase(), CyclePhase::Stopped);

        sleep_ms(10_000).await;
        assert_eq!(rec.count(EventKind::IdlePeriodStarted), 0);
        assert_eq!(rec.count(EventKind::CleanupCompleted), 0);
        assert!(!orch.stop());
    }

    #[tokio::test(start_paused = true)]
    async fn session_errors_count_toward_validation() {
        let mut parts = collaborators(FakeProbe::new(100), FakeReclaimer::new());
        parts.session = Some(SessionFn::arc("flaky", |_ctx: SessionContext| async {
            Err::<(), _>(SessionError::new("proxy pool empty"))
        }));
        let bus = Bus::new(16);
        let orch = CycleOrchestrator::new(
            Config {
                max_recent_errors: 0,
                ..cfg()
            },
            bus,
            &parts,
        );
        orch.start().unwrap();
        sleep_ms(10).await;
        assert_eq!(orch.status().error_count, 1);
        let v = orch.validate_system_state();
        assert!(!v.valid);
        assert_eq!(v.reasons.len(), 2);
    }
}
