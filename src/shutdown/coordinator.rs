//! # ShutdownCoordinator: ordered teardown under watchdogs.
//!
//! ```text
//! initiate_shutdown(reason, emergency)      (first call only; later calls are ignored)
//!   ├─► close registry, publish ShutdownInitiated
//!   ├─► arm force watchdog     (force_timeout, always)    ──► force_shutdown
//!   ├─► arm graceful watchdog  (graceful_timeout, non-emergency only) ──► force_shutdown
//!   └─► spawn execute
//!         ├─► save snapshot            (non-emergency, save_state_on_shutdown)
//!         ├─► for each component in teardown order:
//!         │     shutdown(ctx) raced against its deadline; record outcome; never abort
//!         ├─► publish ComponentsShutdown
//!         └─► complete: cancel watchdogs, publish ShutdownCompleted, exit(exit_code)
//!                (a panic anywhere on this path escalates to force_shutdown)
//! ```
//!
//! Completion and force race through one atomic: whichever claims it first
//! wins, and the loser does nothing. [`ShutdownCoordinator::force_shutdown`]
//! is synchronous and never waits on anything.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, SystemTime};

use futures::FutureExt;
use serde::Serialize;
use tokio::select;
use tokio::sync::watch;
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;

use crate::clock::ClockSource;
use crate::core::Config;
use crate::error::{ComponentError, ShutdownError};
use crate::events::{Bus, Event, EventKind};
use crate::subscribers::panic_message;

use super::component::{ComponentOutcome, ComponentRegistration, ShutdownContext, ShutdownSummary};
use super::order::{find_cycle, teardown_order};
use super::store::{ShutdownSnapshot, StateStore};
use super::terminator::{FATAL_EXIT_CODE, FORCED_EXIT_CODE, Terminator};

const RUNNING: u8 = 0;
const COMPLETING: u8 = 1;
const COMPLETED: u8 = 2;
const FORCED: u8 = 3;

/// Shutdown progress.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ShutdownPhase {
    /// No shutdown requested.
    #[default]
    Idle,
    /// Accepted; watchdogs armed.
    Initiated,
    /// Components are being shut down.
    Executing,
    /// Every component was processed in time.
    Completed,
    /// A watchdog or fault escalated to forced termination.
    Forced,
}

/// State mutated only by the coordinator.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ShutdownState {
    /// Progress.
    pub phase: ShutdownPhase,
    /// Reason given to `initiate_shutdown` (or `force_shutdown`).
    pub reason: Option<String>,
    /// Wall-clock time the shutdown started.
    pub started_at: Option<SystemTime>,
    /// Emergency flag.
    pub emergency: bool,
}

/// How a shutdown ended.
#[derive(Clone, Debug, PartialEq)]
pub enum ShutdownOutcome {
    /// Every component was processed before the watchdogs fired.
    Completed {
        /// Per-component results.
        summary: ShutdownSummary,
        /// Time from initiation to completion.
        duration: Duration,
    },
    /// Escalated to forced termination.
    Forced {
        /// Why it was forced.
        reason: Arc<str>,
    },
}

impl ShutdownOutcome {
    /// True for [`ShutdownOutcome::Forced`].
    pub fn is_forced(&self) -> bool {
        matches!(self, ShutdownOutcome::Forced { .. })
    }
}

/// Status query of the coordinator.
#[derive(Clone, Debug, PartialEq)]
pub struct ShutdownStatus {
    /// Current state.
    pub state: ShutdownState,
    /// Registered components in teardown order.
    pub components: Vec<String>,
    /// Time since initiation.
    pub elapsed: Option<Duration>,
    /// Results, once every component was processed.
    pub summary: Option<ShutdownSummary>,
}

/// Owns the component registry and runs the shutdown protocol.
///
/// Cheap to clone; clones share state.
#[derive(Clone)]
pub struct ShutdownCoordinator {
    inner: Arc<Inner>,
}

struct Inner {
    cfg: Config,
    bus: Bus,
    clock: Arc<ClockSource>,
    store: Option<Arc<dyn StateStore>>,
    terminator: Arc<dyn Terminator>,
    registry: Mutex<Registry>,
    state: Mutex<Progress>,
    started: AtomicBool,
    terminal: AtomicU8,
    watchdogs: CancellationToken,
    halt: CancellationToken,
    done: watch::Sender<Option<ShutdownOutcome>>,
}

#[derive(Default)]
struct Registry {
    entries: Vec<ComponentRegistration>,
    order: Vec<usize>,
    closed: bool,
}

impl Registry {
    fn ordered(&self) -> Vec<ComponentRegistration> {
        self.order.iter().map(|&i| self.entries[i].clone()).collect()
    }

    fn names(&self) -> Vec<String> {
        self.order.iter().map(|&i| self.entries[i].name.clone()).collect()
    }
}

#[derive(Default)]
struct Progress {
    state: ShutdownState,
    started: Option<Instant>,
    summary: Option<ShutdownSummary>,
}

impl std::fmt::Debug for ShutdownCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShutdownCoordinator")
            .field("phase", &self.progress().state.phase)
            .field("components", &self.registry().entries.len())
            .finish()
    }
}

impl ShutdownCoordinator {
    /// Creates a coordinator with an empty registry.
    pub fn new(
        cfg: Config,
        bus: Bus,
        clock: Arc<ClockSource>,
        terminator: Arc<dyn Terminator>,
        store: Option<Arc<dyn StateStore>>,
    ) -> Self {
        let (done, _) = watch::channel(None);
        Self {
            inner: Arc::new(Inner {
                cfg,
                bus,
                clock,
                store,
                terminator,
                registry: Mutex::new(Registry::default()),
                state: Mutex::new(Progress::default()),
                started: AtomicBool::new(false),
                terminal: AtomicU8::new(RUNNING),
                watchdogs: CancellationToken::new(),
                halt: CancellationToken::new(),
                done,
            }),
        }
    }

    /// Adds a component.
    ///
    /// # Errors
    /// - [`ShutdownError::RegistryClosed`] once shutdown has started
    /// - [`ShutdownError::DuplicateComponent`] if the name is taken
    /// - [`ShutdownError::DependencyCycle`] if the dependencies would form a cycle
    pub fn register(&self, reg: ComponentRegistration) -> Result<(), ShutdownError> {
        let mut registry = self.registry();
        if registry.closed {
            return Err(ShutdownError::RegistryClosed);
        }
        if registry.entries.iter().any(|r| r.name == reg.name) {
            return Err(ShutdownError::DuplicateComponent { name: reg.name });
        }
        if let Some(path) = find_cycle(&registry.entries, &reg) {
            tracing::warn!(component = %reg.name, path = ?path, "registration rejected: dependency cycle");
            return Err(ShutdownError::DependencyCycle { path });
        }
        tracing::debug!(component = %reg.name, priority = reg.priority, "component registered");
        registry.entries.push(reg);
        registry.order = teardown_order(&registry.entries);
        Ok(())
    }

    /// Removes a component.
    ///
    /// # Errors
    /// - [`ShutdownError::RegistryClosed`] once shutdown has started
    /// - [`ShutdownError::UnknownComponent`] if no component has that name
    pub fn unregister(&self, name: &str) -> Result<(), ShutdownError> {
        let mut registry = self.registry();
        if registry.closed {
            return Err(ShutdownError::RegistryClosed);
        }
        let Some(pos) = registry.entries.iter().position(|r| r.name == name) else {
            return Err(ShutdownError::UnknownComponent { name: name.to_string() });
        };
        registry.entries.remove(pos);
        registry.order = teardown_order(&registry.entries);
        tracing::debug!(component = name, "component unregistered");
        Ok(())
    }

    /// Registered component names in teardown order.
    pub fn order(&self) -> Vec<String> {
        self.registry().names()
    }

    /// Starts the shutdown protocol.
    ///
    /// Returns `false` (and does nothing) if a shutdown was already started.
    pub fn initiate_shutdown(&self, reason: impl Into<Arc<str>>, emergency: bool) -> bool {
        let reason = reason.into();
        if self
            .inner
            .started
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::warn!(reason = %reason, "shutdown already in progress; interrupt ignored");
            return false;
        }

        self.registry().closed = true;
        {
            let mut p = self.progress();
            p.state = ShutdownState {
                phase: ShutdownPhase::Initiated,
                reason: Some(reason.to_string()),
                started_at: Some(self.inner.clock.wall_now()),
                emergency,
            };
            p.started = Some(self.inner.clock.now());
        }
        tracing::warn!(reason = %reason, emergency, "shutdown initiated");
        self.publish(
            self.event(EventKind::ShutdownInitiated)
                .with_reason(reason.clone())
                .with_emergency(emergency),
        );

        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            self.force_shutdown("shutdown initiated outside a tokio runtime");
            return true;
        };

        let force_after = self.inner.cfg.force_timeout;
        self.arm_watchdog(&handle, force_after, format!("force timeout after {force_after:?}"));
        if !emergency {
            let graceful = self.inner.cfg.graceful_timeout;
            self.arm_watchdog(&handle, graceful, format!("graceful timeout after {graceful:?}"));
        }

        let this = self.clone();
        handle.spawn(async move {
            match AssertUnwindSafe(this.execute(reason, emergency)).catch_unwind().await {
                Ok(summary) => {
                    if let Err(panic) = catch_unwind(AssertUnwindSafe(|| this.complete(summary))) {
                        this.inner.terminal.store(RUNNING, Ordering::Release);
                        this.force_shutdown(format!(
                            "shutdown completion panicked: {}",
                            panic_message(panic.as_ref())
                        ));
                    }
                }
                Err(panic) => this.force_shutdown(format!(
                    "shutdown execution panicked: {}",
                    panic_message(panic.as_ref())
                )),
            }
        });
        true
    }

    /// Terminates the process immediately with [`FORCED_EXIT_CODE`].
    ///
    /// Cancels the watchdogs, stops the component sequence and publishes
    /// `ForceShutdown`. If that itself fails, exits with [`FATAL_EXIT_CODE`]
    /// (and aborts if even that fails). No-op once completion has begun or a
    /// force already ran.
    pub fn force_shutdown(&self, reason: impl Into<Arc<str>>) {
        let reason = reason.into();
        if self
            .inner
            .terminal
            .compare_exchange(RUNNING, FORCED, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }

        let attempt = catch_unwind(AssertUnwindSafe(|| {
            self.inner.started.store(true, Ordering::Release);
            self.inner.watchdogs.cancel();
            self.inner.halt.cancel();
            {
                let mut registry = self.registry();
                registry.closed = true;
            }
            {
                let mut p = self.progress();
                p.state.phase = ShutdownPhase::Forced;
                if p.state.reason.is_none() {
                    p.state.reason = Some(reason.to_string());
                }
            }
            tracing::error!(reason = %reason, code = FORCED_EXIT_CODE, "forcing shutdown");
            self.publish(self.event(EventKind::ForceShutdown).with_reason(reason.clone()));
            self.inner.done.send_replace(Some(ShutdownOutcome::Forced {
                reason: reason.clone(),
            }));
            self.inner.terminator.terminate(FORCED_EXIT_CODE);
        }));

        if let Err(panic) = attempt {
            tracing::error!(panic = %panic_message(panic.as_ref()), code = FATAL_EXIT_CODE, "forced shutdown failed");
            let fatal = catch_unwind(AssertUnwindSafe(|| {
                self.inner.terminator.terminate(FATAL_EXIT_CODE)
            }));
            if fatal.is_err() {
                std::process::abort();
            }
        }
    }

    /// True once `initiate_shutdown` (or `force_shutdown`) ran.
    pub fn is_shutting_down(&self) -> bool {
        self.inner.started.load(Ordering::Acquire)
    }

    /// Current state.
    pub fn state(&self) -> ShutdownState {
        self.progress().state.clone()
    }

    /// State, registry order, elapsed time and results.
    pub fn status(&self) -> ShutdownStatus {
        let components = self.order();
        let p = self.progress();
        ShutdownStatus {
            state: p.state.clone(),
            components,
            elapsed: p.started.map(|s| s.elapsed()),
            summary: p.summary.clone(),
        }
    }

    /// Resolves once the shutdown completed or was forced.
    pub async fn completion(&self) -> ShutdownOutcome {
        let mut rx = self.inner.done.subscribe();
        let outcome = match rx.wait_for(Option::is_some).await {
            Ok(v) => v.clone(),
            Err(_) => None,
        };
        outcome.unwrap_or_else(|| ShutdownOutcome::Forced {
            reason: Arc::from("coordinator dropped"),
        })
    }

    async fn execute(&self, reason: Arc<str>, emergency: bool) -> ShutdownSummary {
        self.progress().state.phase = ShutdownPhase::Executing;
        let plan = self.registry().ordered();

        if self.inner.cfg.save_state_on_shutdown && !emergency {
            self.save_snapshot(&reason, &plan);
        }

        let mut results = Vec::with_capacity(plan.len());
        for reg in plan {
            if self.inner.halt.is_cancelled() {
                break;
            }
            let outcome = select! {
                outcome = self.shutdown_one(&reg, &reason, emergency) => outcome,
                _ = self.inner.halt.cancelled() => break,
            };
            results.push(outcome);
        }

        let summary = ShutdownSummary::from_results(results);
        tracing::info!(successful = summary.successful, failed = summary.failed, "components shut down");
        self.publish(
            self.event(EventKind::ComponentsShutdown)
                .with_shutdown(summary.clone()),
        );
        summary
    }

    async fn shutdown_one(
        &self,
        reg: &ComponentRegistration,
        reason: &Arc<str>,
        emergency: bool,
    ) -> ComponentOutcome {
        let timeout = reg.effective_timeout(emergency);
        let ctx = ShutdownContext::new(Arc::clone(reason), emergency, timeout);
        let started = Instant::now();
        let call = AssertUnwindSafe(reg.handle.shutdown(ctx)).catch_unwind();
        let error = match time::timeout(timeout, call).await {
            Ok(Ok(Ok(()))) => None,
            Ok(Ok(Err(e))) => Some(e),
            Ok(Err(panic)) => Some(ComponentError::Panicked {
                info: panic_message(panic.as_ref()),
            }),
            Err(_elapsed) => Some(ComponentError::TimedOut { timeout }),
        };
        let duration = started.elapsed();

        match &error {
            None => tracing::info!(component = %reg.name, ?duration, "component shut down"),
            Some(e) if reg.required => tracing::error!(
                component = %reg.name, error = %e, label = e.as_label(), "required component failed to shut down"
            ),
            Some(e) => tracing::warn!(
                component = %reg.name, error = %e, label = e.as_label(), "component failed to shut down"
            ),
        }
        ComponentOutcome {
            name: reg.name.clone(),
            required: reg.required,
            duration,
            error,
        }
    }

    fn complete(&self, summary: ShutdownSummary) {
        if self
            .inner
            .terminal
            .compare_exchange(RUNNING, COMPLETING, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }
        self.inner.watchdogs.cancel();

        let (duration, reason) = {
            let mut p = self.progress();
            p.state.phase = ShutdownPhase::Completed;
            p.summary = Some(summary.clone());
            (
                p.started.map(|s| s.elapsed()).unwrap_or_default(),
                p.state.reason.clone().unwrap_or_default(),
            )
        };
        tracing::info!(?duration, reason = %reason, "shutdown completed");
        self.publish(
            self.event(EventKind::ShutdownCompleted)
                .with_duration(duration)
                .with_reason(reason),
        );
        self.inner
            .done
            .send_replace(Some(ShutdownOutcome::Completed { summary, duration }));
        self.inner.terminal.store(COMPLETED, Ordering::Release);

        if self.inner.cfg.exit_on_complete {
            self.inner.terminator.terminate(self.inner.cfg.exit_code);
        }
    }

    fn save_snapshot(&self, reason: &str, plan: &[ComponentRegistration]) {
        let Some(store) = &self.inner.store else {
            return;
        };
        let snapshot = ShutdownSnapshot {
            reason: reason.to_string(),
            emergency: false,
            initiated_at: self
                .progress()
                .state
                .started_at
                .unwrap_or_else(|| self.inner.clock.wall_now()),
            components: plan.iter().map(|r| r.name.clone()).collect(),
        };
        match store.save(&snapshot) {
            Ok(()) => tracing::debug!("shutdown state saved"),
            Err(e) => tracing::warn!(error = %e, label = e.as_label(), "failed to save shutdown state"),
        }
    }

    fn arm_watchdog(&self, handle: &tokio::runtime::Handle, after: Duration, reason: String) {
        let this = self.clone();
        let token = self.inner.watchdogs.clone();
        handle.spawn(async move {
            select! {
                _ = time::sleep(after) => this.force_shutdown(reason),
                _ = token.cancelled() => {}
            }
        });
    }

    fn event(&self, kind: EventKind) -> Event {
        Event::new(kind).at(self.inner.clock.wall_now())
    }

    fn publish(&self, ev: Event) {
        self.inner.bus.publish(ev);
    }

    fn registry(&self) -> MutexGuard<'_, Registry> {
        self.inner.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn progress(&self) -> MutexGuard<'_, Progress> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex as StdMutex;

    use super::*;
    use crate::shutdown::{ComponentRef, JsonFileStore, ShutdownFn};
    use crate::testing::{Recorder, RecordingTerminator};

    fn cfg() -> Config {
        Config {
            graceful_timeout: Duration::from_secs(30),
            force_timeout: Duration::from_secs(60),
            ..Config::default()
        }
    }

    struct Rig {
        coord: ShutdownCoordinator,
        rec: Arc<Recorder>,
        term: Arc<RecordingTerminator>,
        calls: Arc<StdMutex<Vec<String>>>,
    }

    fn rig_with(cfg: Config, store: Option<Arc<dyn StateStore>>) -> Rig {
        let bus = Bus::new(64);
        let rec = Recorder::new();
        bus.observe(rec.clone());
        let term = RecordingTerminator::new();
        let coord = ShutdownCoordinator::new(cfg, bus, Arc::new(ClockSource::new()), term.clone(), store);
        Rig {
            coord,
            rec,
            term,
            calls: Arc::new(StdMutex::new(Vec::new())),
        }
    }

    fn rig() -> Rig {
        rig_with(cfg(), None)
    }

    /// Component that records its name, then sleeps `delay` and returns `result`.
    fn component(
        calls: &Arc<StdMutex<Vec<String>>>,
        name: &'static str,
        delay: Duration,
        result: Result<(), ComponentError>,
    ) -> ComponentRef {
        let calls = calls.clone();
        ShutdownFn::arc(move |_ctx: ShutdownContext| {
            let calls = calls.clone();
            let result = result.clone();
            async move {
                calls.lock().unwrap().push(name.to_string());
                time::sleep(delay).await;
                result
            }
        })
    }

    fn ok(r: &Rig, name: &'static str) -> ComponentRef {
        component(&r.calls, name, Duration::from_millis(10), Ok(()))
    }

    #[tokio::test(start_paused = true)]
    async fn shuts_down_in_priority_order() {
        let r = rig();
        r.coord.register(ComponentRegistration::new("low", ok(&r, "low")).priority(0)).unwrap();
        r.coord.register(ComponentRegistration::new("high", ok(&r, "high")).priority(100)).unwrap();
        r.coord.register(ComponentRegistration::new("mid", ok(&r, "mid")).priority(50)).unwrap();

        assert!(r.coord.initiate_shutdown("test", false));
        let outcome = r.coord.completion().await;

        let ShutdownOutcome::Completed { summary, .. } = outcome else {
            panic!("expected completion, got {outcome:?}");
        };
        assert_eq!(summary.successful, 3);
        assert_eq!(summary.order(), ["high", "mid", "low"]);
        assert_eq!(*r.calls.lock().unwrap(), ["high", "mid", "low"]);

        let done = r.rec.of(EventKind::ComponentsShutdown);
        assert_eq!(done.len(), 1);
        assert_eq!(done[0].shutdown.as_ref().map(|s| s.successful), Some(3));
        assert_eq!(r.rec.count(EventKind::ShutdownCompleted), 1);
        assert_eq!(r.coord.state().phase, ShutdownPhase::Completed);
        assert_eq!(r.term.codes(), [0]);
    }

    #[tokio::test(start_paused = true)]
    async fn second_initiate_is_ignored() {
        let r = rig();
        r.coord.register(ComponentRegistration::new("a", ok(&r, "a"))).unwrap();

        assert!(r.coord.initiate_shutdown("signal:SIGTERM", false));
        assert!(!r.coord.initiate_shutdown("signal:SIGINT", false));
        assert!(!r.coord.initiate_shutdown("fault", true));
        r.coord.completion().await;

        assert_eq!(r.rec.count(EventKind::ShutdownInitiated), 1);
        assert_eq!(r.coord.state().reason.as_deref(), Some("signal:SIGTERM"));
        assert!(!r.coord.state().emergency);
        assert_eq!(*r.calls.lock().unwrap(), ["a"]);
    }

    #[tokio::test(start_paused = true)]
    async fn registry_closes_once_shutdown_starts() {
        let r = rig();
        r.coord.register(ComponentRegistration::new("a", ok(&r, "a"))).unwrap();
        assert_eq!(
            r.coord.register(ComponentRegistration::new("a", ok(&r, "a"))),
            Err(ShutdownError::DuplicateComponent { name: "a".into() })
        );
        assert!(matches!(
            r.coord.register(ComponentRegistration::new("b", ok(&r, "b")).depends_on("b")),
            Err(ShutdownError::DependencyCycle { .. })
        ));
        assert_eq!(
            r.coord.unregister("ghost"),
            Err(ShutdownError::UnknownComponent { name: "ghost".into() })
        );

        r.coord.initiate_shutdown("test", false);
        assert_eq!(
            r.coord.register(ComponentRegistration::new("late", ok(&r, "late"))),
            Err(ShutdownError::RegistryClosed)
        );
        assert_eq!(r.coord.unregister("a"), Err(ShutdownError::RegistryClosed));
    }

    #[tokio::test(start_paused = true)]
    async fn failures_do_not_abort_the_sequence() {
        let r = rig();
        let failing = component(&r.calls, "db", Duration::ZERO, Err(ComponentError::failed("locked")));
        let panicking: ComponentRef = ShutdownFn::arc(|_ctx: ShutdownContext| async {
            if true {
                panic!("cache exploded");
            }
            Ok::<_, ComponentError>(())
        });
        r.coord.register(ComponentRegistration::new("db", failing).priority(3).required(true)).unwrap();
        r.coord.register(ComponentRegistration::new("cache", panicking).priority(2)).unwrap();
        r.coord.register(ComponentRegistration::new("queue", ok(&r, "queue")).priority(1)).unwrap();

        r.coord.initiate_shutdown("test", false);
        let ShutdownOutcome::Completed { summary, .. } = r.coord.completion().await else {
            panic!("expected completion");
        };
        assert_eq!((summary.successful, summary.failed), (1, 2));
        assert_eq!(summary.results[0].error, Some(ComponentError::failed("locked")));
        assert!(matches!(
            summary.results[1].error,
            Some(ComponentError::Panicked { ref info }) if info == "cache exploded"
        ));
        assert!(summary.results[2].success());
    }

    #[tokio::test(start_paused = true)]
    async fn slow_component_times_out_individually() {
        let r = rig();
        let slow = component(&r.calls, "slow", Duration::from_secs(20), Ok(()));
        r.coord
            .register(ComponentRegistration::new("slow", slow).timeout(Duration::from_secs(2)))
            .unwrap();
        r.coord.register(ComponentRegistration::new("next", ok(&r, "next")).priority(-1)).unwrap();

        r.coord.initiate_shutdown("test", false);
        let ShutdownOutcome::Completed { summary, .. } = r.coord.completion().await else {
            panic!("expected completion");
        };
        assert_eq!(
            summary.results[0].error,
            Some(ComponentError::TimedOut { timeout: Duration::from_secs(2) })
        );
        assert!(summary.results[1].success());
    }

    #[tokio::test(start_paused = true)]
    async fn emergency_caps_component_deadline() {
        let r = rig();
        let slow = component(&r.calls, "slow", Duration::from_secs(7), Ok(()));
        r.coord
            .register(ComponentRegistration::new("slow", slow).timeout(Duration::from_secs(30)))
            .unwrap();

        r.coord.initiate_shutdown("fault", true);
        let ShutdownOutcome::Completed { summary, .. } = r.coord.completion().await else {
            panic!("expected completion");
        };
        assert_eq!(
            summary.results[0].error,
            Some(ComponentError::TimedOut { timeout: Duration::from_secs(5) })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn stuck_components_are_forced_by_graceful_watchdog() {
        let r = rig();
        for name in ["a", "b", "c"] {
            let stuck = component(&r.calls, name, Duration::from_secs(3600), Ok(()));
            r.coord
                .register(ComponentRegistration::new(name, stuck).timeout(Duration::from_secs(3600)))
                .unwrap();
        }

        let started = Instant::now();
        r.coord.initiate_shutdown("test", false);
        let outcome = r.coord.completion().await;

        assert!(outcome.is_forced());
        assert!(started.elapsed() <= Duration::from_secs(31));
        assert_eq!(r.coord.state().phase, ShutdownPhase::Forced);
        assert_eq!(r.term.codes(), [FORCED_EXIT_CODE]);
        assert_eq!(r.rec.count(EventKind::ForceShutdown), 1);
        assert_eq!(*r.calls.lock().unwrap(), ["a"]);

        // the force watchdog was cancelled with the graceful one
        time::sleep(Duration::from_secs(120)).await;
        assert_eq!(r.term.codes(), [FORCED_EXIT_CODE]);
        assert_eq!(r.rec.count(EventKind::ShutdownCompleted), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn emergency_relies_on_force_watchdog() {
        let r = rig();
        let stuck = component(&r.calls, "stuck", Duration::from_secs(3600), Ok(()));
        // the 5s emergency cap makes each component give up quickly; many of them still exceed the budget
        for i in 0..20 {
            r.coord
                .register(ComponentRegistration::new(format!("c{i}"), stuck.clone()))
                .unwrap();
        }

        let started = Instant::now();
        r.coord.initiate_shutdown("fault", true);
        let outcome = r.coord.completion().await;

        assert!(outcome.is_forced());
        let waited = started.elapsed();
        assert!(waited >= Duration::from_secs(60) && waited <= Duration::from_secs(61));
        assert_eq!(r.term.codes(), [FORCED_EXIT_CODE]);
    }

    #[tokio::test(start_paused = true)]
    async fn empty_registry_completes() {
        let r = rig_with(
            Config {
                exit_on_complete: false,
                ..cfg()
            },
            None,
        );
        r.coord.initiate_shutdown("test", false);
        let ShutdownOutcome::Completed { summary, .. } = r.coord.completion().await else {
            panic!("expected completion");
        };
        assert_eq!(summary.results.len(), 0);
        assert!(r.term.codes().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn force_after_completion_is_noop() {
        let r = rig();
        r.coord.initiate_shutdown("test", false);
        r.coord.completion().await;
        r.coord.force_shutdown("late");
        assert_eq!(r.coord.state().phase, ShutdownPhase::Completed);
        assert_eq!(r.rec.count(EventKind::ForceShutdown), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn snapshot_saved_only_for_graceful_shutdown() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(JsonFileStore::new(dir.path().join("graceful.json")));
        let r = rig_with(cfg(), Some(store.clone()));
        r.coord.register(ComponentRegistration::new("a", ok(&r, "a"))).unwrap();
        r.coord.initiate_shutdown("signal:SIGTERM", false);
        r.coord.completion().await;
        let snap = store.load().unwrap().unwrap();
        assert_eq!(snap.reason, "signal:SIGTERM");
        assert_eq!(snap.components, ["a"]);

        let store = Arc::new(JsonFileStore::new(dir.path().join("emergency.json")));
        let r = rig_with(cfg(), Some(store.clone()));
        r.coord.initiate_shutdown("fault", true);
        r.coord.completion().await;
        assert_eq!(store.load().unwrap(), None);
    }
}
