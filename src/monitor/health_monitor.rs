//! # HealthMonitor: periodic sampling, alerting and bounded recovery.
//!
//! ```text
//! every monitor_every():
//!   sample probe + cycle status + request/security window
//!   ├─► classify: memory → cycle → error rate → response time → security → components
//!   ├─► overall level (≥3 issues ⇒ critical), store HealthReport
//!   ├─► per dimension, in order:
//!   │     non-healthy ─► AlertBook::raise ── Raised | Escalated ─► publish Alert
//!   │                                  └─ critical memory/cycle + auto recovery
//!   │                                       └─ attempt reserved (cap recovery_attempts) ─► queue
//!   │     healthy + active ─► resolve ─► publish AlertResolved
//!   ├─► evict history past alert_retention
//!   └─► spawn queued recoveries; each waits recovery_delay, then:
//!         memory ─► reclaimer.reclaim(forced = true)
//!         cycle  ─► RecoveryHook::recover_cycle
//! ```
//!
//! Recoveries run beside the sampling loop and are cancelled by `stop`.
//! Reclaim and the recovery hook are bounded by `cleanup_timeout`, component
//! probes by the sampling period; a timeout or panic counts as failure.
//!
//! The monitor only reads the orchestrator (through [`CycleView`]) and is the
//! only writer of alert state. It also observes the bus and counts
//! `CleanupCompleted` events that report failure.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use futures::FutureExt;
use tokio::select;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::clock::ClockSource;
use crate::core::{Collaborators, Config};
use crate::cycle::CycleView;
use crate::error::ComponentError;
use crate::events::{Bus, Event, EventKind, Observe};
use crate::reclaim::ResourceReclaimer;
use crate::shutdown::{ShutdownContext, Shutdownable};
use crate::subscribers::panic_message;

use super::alerts::{Alert, AlertBook, AlertGates, AlertRecord, AlertSeverity, RaiseOutcome};
use super::feed::Feed;
use super::health::{self, Dimension, DimensionHealth, HealthLevel, HealthReport, Readings};
use super::probe::{ComponentProbe, ComponentReading, ResourceProbe};
use super::recovery::RecoveryHook;

/// Samples health, raises alerts and runs bounded recovery.
///
/// Cheap to clone; clones share state.
#[derive(Clone)]
pub struct HealthMonitor {
    inner: Arc<Inner>,
}

struct Inner {
    cfg: Config,
    bus: Bus,
    clock: Arc<ClockSource>,
    cycle: Arc<dyn CycleView>,
    probe: Arc<dyn ResourceProbe>,
    reclaimer: Arc<dyn ResourceReclaimer>,
    recovery: Arc<dyn RecoveryHook>,
    components: Vec<Arc<dyn ComponentProbe>>,
    state: Mutex<MonitorState>,
    cleanup_failures: AtomicU64,
    running: AtomicBool,
    token: CancellationToken,
}

struct MonitorState {
    book: AlertBook,
    feed: Feed,
    last_report: Option<HealthReport>,
    recoveries_used: u32,
}

impl std::fmt::Debug for HealthMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HealthMonitor")
            .field("running", &self.inner.running.load(Ordering::Relaxed))
            .field("components", &self.inner.components.len())
            .finish()
    }
}

impl HealthMonitor {
    /// Creates a monitor reading `cycle`. Call [`HealthMonitor::start`] to begin sampling.
    pub fn new(cfg: Config, bus: Bus, cycle: Arc<dyn CycleView>, parts: &Collaborators) -> Self {
        let gates = AlertGates {
            cooldown: cfg.alert_cooldown,
            max_per_hour: cfg.max_alerts_per_hour,
            retention: cfg.alert_retention,
        };
        Self {
            inner: Arc::new(Inner {
                cfg,
                bus,
                clock: Arc::clone(&parts.clock),
                cycle,
                probe: Arc::clone(&parts.probe),
                reclaimer: Arc::clone(&parts.reclaimer),
                recovery: Arc::clone(&parts.recovery),
                components: parts.components.clone(),
                state: Mutex::new(MonitorState {
                    book: AlertBook::new(gates),
                    feed: Feed::default(),
                    last_report: None,
                    recoveries_used: 0,
                }),
                cleanup_failures: AtomicU64::new(0),
                running: AtomicBool::new(false),
                token: CancellationToken::new(),
            }),
        }
    }

    /// Spawns the sampling loop. Returns `false` if it is already running or was stopped.
    pub fn start(&self) -> bool {
        if self.inner.token.is_cancelled()
            || self
                .inner
                .running
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                .is_err()
        {
            return false;
        }

        let period = self.inner.cfg.monitor_every();
        tracing::info!(?period, "health monitor started");
        let this = self.clone();
        tokio::spawn(async move {
            let mut interval = time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                select! {
                    _ = interval.tick() => {
                        if let Err(panic) = AssertUnwindSafe(this.check()).catch_unwind().await {
                            tracing::error!(panic = %panic_message(panic.as_ref()), "health check panicked");
                        }
                    }
                    _ = this.inner.token.cancelled() => break,
                }
            }
            this.inner.running.store(false, Ordering::Release);
            tracing::info!("health monitor stopped");
        });
        true
    }

    /// Stops the sampling loop and any pending recovery. Idempotent; a stopped
    /// monitor cannot be restarted.
    pub fn stop(&self) {
        self.inner.token.cancel();
    }

    /// Runs one sampling pass and returns its report.
    pub async fn check(&self) -> HealthReport {
        let now = self.inner.clock.now();
        let at = self.inner.clock.wall_at(now);
        let sample = self.inner.probe.sample();
        let status = self.inner.cycle.cycle_status();
        let stats = self.lock().feed.stats(now);

        let mut dimensions = health::classify(
            &self.inner.cfg,
            Readings {
                rss_mb: sample.rss_mb(),
                cycle: &status,
                error_rate_pct: stats.error_rate_pct,
                avg_response_ms: stats.avg_response_ms,
                security_violations: stats.security_violations,
            },
        );
        let probe_budget = self.inner.cfg.monitor_every();
        for probe in &self.inner.components {
            let reading = match self.bounded("component probe", probe_budget, probe.read()).await {
                Some(reading) => reading,
                None => ComponentReading {
                    level: HealthLevel::Warning,
                    value: 0.0,
                    message: format!("{} probe did not answer", probe.name()),
                },
            };
            dimensions.push(DimensionHealth {
                dimension: Dimension::Component(probe.name().to_string()),
                level: reading.level,
                value: reading.value,
                message: reading.message,
            });
        }

        let (level, issues) = health::overall(&dimensions);
        let report = HealthReport {
            at,
            level,
            dimensions,
            issues,
            cleanup_failures: self.inner.cleanup_failures.load(Ordering::Relaxed),
        };
        if level != HealthLevel::Healthy {
            tracing::warn!(level = %level, issues, "health degraded");
        } else {
            tracing::debug!(rss_mb = sample.rss_mb(), cpu_pct = sample.cpu_pct, "health ok");
        }

        let mut events = Vec::new();
        let mut recover = Vec::new();
        {
            let mut st = self.lock();
            for d in &report.dimensions {
                let id = d.dimension.alert_id();
                if d.level == HealthLevel::Healthy {
                    if st.book.resolve(&id, at) {
                        tracing::info!(alert = %id, "alert resolved");
                        events.push(self.event(EventKind::AlertResolved).with_reason(id));
                    }
                    continue;
                }

                let alert = Alert {
                    id: id.clone(),
                    severity: match d.level {
                        HealthLevel::Critical => AlertSeverity::Critical,
                        _ => AlertSeverity::Warning,
                    },
                    message: d.message.clone(),
                    first_raised_at: at,
                    data: serde_json::json!({
                        "value": d.value,
                        "level": d.level.as_str(),
                    }),
                };
                match st.book.raise(alert.clone(), now) {
                    outcome @ (RaiseOutcome::Raised | RaiseOutcome::Escalated) => {
                        tracing::warn!(
                            alert = %id,
                            severity = alert.severity.as_str(),
                            escalated = outcome == RaiseOutcome::Escalated,
                            message = %alert.message,
                            "alert raised"
                        );
                        let recoverable = matches!(d.dimension, Dimension::Memory | Dimension::Cycle);
                        if alert.severity == AlertSeverity::Critical
                            && recoverable
                            && self.inner.cfg.enable_auto_recovery
                        {
                            let cap = self.inner.cfg.recovery_attempts;
                            if st.recoveries_used < cap {
                                st.recoveries_used += 1;
                                recover.push((d.dimension.clone(), st.recoveries_used));
                            } else {
                                tracing::warn!(alert = %id, cap, "recovery attempts exhausted");
                            }
                        }
                        events.push(self.event(EventKind::Alert).with_alert(alert));
                    }
                    RaiseOutcome::Duplicate => {}
                    RaiseOutcome::Cooldown => {
                        tracing::debug!(alert = %id, "alert suppressed: cooldown");
                    }
                    RaiseOutcome::RateLimited => {
                        tracing::warn!(alert = %id, max_per_hour = self.inner.cfg.max_alerts_per_hour, "alert suppressed: hourly cap");
                    }
                }
            }
            let evicted = st.book.evict(now);
            if evicted > 0 {
                tracing::debug!(evicted, "alert history evicted");
            }
            st.last_report = Some(report.clone());
        }
        self.emit(events);

        for (dimension, attempt) in recover {
            self.spawn_recovery(dimension, attempt);
        }
        report
    }

    /// Feeds one request outcome into the error-rate and response-time dimensions.
    pub fn record_request(&self, ok: bool, latency: Duration) {
        let now = self.inner.clock.now();
        self.lock().feed.record_request(now, ok, latency);
    }

    /// Feeds one security violation into the security dimension.
    pub fn record_security_violation(&self) {
        let now = self.inner.clock.now();
        self.lock().feed.record_violation(now);
    }

    /// Report of the most recent pass.
    pub fn last_report(&self) -> Option<HealthReport> {
        self.lock().last_report.clone()
    }

    /// Active alerts sorted by id.
    pub fn active_alerts(&self) -> Vec<Alert> {
        self.lock().book.active()
    }

    /// Alert history within the retention window, oldest first.
    pub fn alert_history(&self) -> Vec<AlertRecord> {
        self.lock().book.history().cloned().collect()
    }

    /// Recovery attempts used so far.
    pub fn recoveries_used(&self) -> u32 {
        self.lock().recoveries_used
    }

    fn spawn_recovery(&self, dimension: Dimension, attempt: u32) {
        let this = self.clone();
        tokio::spawn(async move {
            select! {
                _ = this.recover(dimension, attempt) => {}
                _ = this.inner.token.cancelled() => {}
            }
        });
    }

    async fn recover(&self, dimension: Dimension, attempt: u32) {
        time::sleep(self.inner.cfg.recovery_delay).await;

        let id = dimension.alert_id();
        let budget = self.inner.cfg.cleanup_timeout;
        let success = match dimension {
            Dimension::Memory => self
                .bounded("reclaimer", budget, self.inner.reclaimer.reclaim(true))
                .await
                .map(|report| {
                    tracing::info!(freed = report.freed_memory, success = report.success, "memory recovery ran");
                    report.success
                })
                .unwrap_or(false),
            _ => {
                let status = self.inner.cycle.cycle_status();
                self.bounded("recovery hook", budget, self.inner.recovery.recover_cycle(&status))
                    .await
                    .unwrap_or(false)
            }
        };
        tracing::info!(alert = %id, attempt, success, "recovery attempted");
        self.emit(vec![
            self.event(EventKind::RecoveryAttempted)
                .with_reason(id)
                .with_success(success)
                .with_attempt(attempt),
        ]);
    }

    /// Runs a collaborator call under `budget`. `None` on timeout or panic.
    async fn bounded<F: Future>(&self, what: &'static str, budget: Duration, call: F) -> Option<F::Output> {
        match time::timeout(budget, AssertUnwindSafe(call).catch_unwind()).await {
            Ok(Ok(out)) => Some(out),
            Ok(Err(panic)) => {
                tracing::error!(what, panic = %panic_message(panic.as_ref()), "monitor collaborator panicked");
                None
            }
            Err(_elapsed) => {
                tracing::warn!(what, timeout = ?budget, "monitor collaborator timed out");
                None
            }
        }
    }

    fn event(&self, kind: EventKind) -> Event {
        Event::new(kind).at(self.inner.clock.wall_now())
    }

    fn emit(&self, events: Vec<Event>) {
        for ev in events {
            self.inner.bus.publish(ev);
        }
    }

    fn lock(&self) -> MutexGuard<'_, MonitorState> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Observe for HealthMonitor {
    fn on_event(&self, event: &Event) {
        if event.kind == EventKind::CleanupCompleted && event.success == Some(false) {
            self.inner.cleanup_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn name(&self) -> &'static str {
        "health-monitor"
    }
}

#[async_trait]
impl Shutdownable for HealthMonitor {
    async fn shutdown(&self, _ctx: ShutdownContext) -> Result<(), ComponentError> {
        self.stop();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cycle::CyclePhase;
    use crate::testing::{FakeCycle, FakeProbe, FakeReclaimer, Recorder, collaborators};

    fn cfg() -> Config {
        Config {
            monitor_interval: Duration::from_secs(10),
            memory_threshold_mb: 1000,
            alert_cooldown: Duration::from_secs(60),
            recovery_delay: Duration::from_secs(1),
            recovery_attempts: 2,
            ..Config::default()
        }
    }

    struct Rig {
        monitor: HealthMonitor,
        probe: Arc<FakeProbe>,
        cycle: Arc<FakeCycle>,
        reclaimer: Arc<FakeReclaimer>,
        rec: Arc<Recorder>,
        bus: Bus,
    }

    fn rig_with(cfg: Config, components: Vec<Arc<dyn ComponentProbe>>) -> Rig {
        let bus = Bus::new(64);
        let rec = Recorder::new();
        bus.observe(rec.clone());
        let probe = FakeProbe::new(100);
        let reclaimer = FakeReclaimer::new();
        let cycle = FakeCycle::new();
        let mut parts = collaborators(probe.clone(), reclaimer.clone());
        parts.components = components;
        let monitor = HealthMonitor::new(cfg, bus.clone(), cycle.clone(), &parts);
        bus.observe(Arc::new(monitor.clone()));
        Rig {
            monitor,
            probe,
            cycle,
            reclaimer,
            rec,
            bus,
        }
    }

    fn rig() -> Rig {
        rig_with(cfg(), Vec::new())
    }

    fn alert_ids(rec: &Recorder) -> Vec<String> {
        rec.of(EventKind::Alert)
            .iter()
            .filter_map(|e| e.alert.as_ref().map(|a| a.id.clone()))
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn memory_over_threshold_twice_within_cooldown_alerts_once() {
        let r = rig_with(
            Config {
                enable_auto_recovery: false,
                ..cfg()
            },
            Vec::new(),
        );
        r.probe.set_rss_mb(1500);
        assert!(r.monitor.start());

        time::sleep(Duration::from_secs(15)).await;
        let report = r.monitor.last_report().unwrap();
        assert_eq!(report.level, HealthLevel::Critical);
        assert_eq!(report.dimensions[0].dimension, Dimension::Memory);

        assert_eq!(r.rec.count(EventKind::Alert), 1);
        assert_eq!(alert_ids(&r.rec), ["memory"]);
        let alert = &r.rec.of(EventKind::Alert)[0];
        assert_eq!(
            alert.alert.as_ref().map(|a| a.severity),
            Some(AlertSeverity::Critical)
        );
        r.monitor.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn alert_resolves_and_cooldown_blocks_refire() {
        let r = rig_with(
            Config {
                enable_auto_recovery: false,
                ..cfg()
            },
            Vec::new(),
        );
        r.probe.set_rss_mb(900);
        r.monitor.check().await;
        assert_eq!(r.monitor.active_alerts().len(), 1);
        assert_eq!(r.monitor.active_alerts()[0].severity, AlertSeverity::Warning);

        r.probe.set_rss_mb(100);
        r.monitor.check().await;
        assert!(r.monitor.active_alerts().is_empty());
        assert_eq!(r.rec.count(EventKind::AlertResolved), 1);
        assert_eq!(
            r.rec.of(EventKind::AlertResolved)[0].reason.as_deref(),
            Some("memory")
        );

        r.probe.set_rss_mb(900);
        r.monitor.check().await;
        assert_eq!(r.rec.count(EventKind::Alert), 1);

        time::advance(Duration::from_secs(61)).await;
        r.monitor.check().await;
        assert_eq!(r.rec.count(EventKind::Alert), 2);

        let history = r.monitor.alert_history();
        assert_eq!(history.len(), 2);
        assert!(history[0].resolved_at.is_some());
        assert!(history[1].resolved_at.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn hourly_cap_suppresses_extra_alerts() {
        let r = rig_with(
            Config {
                max_alerts_per_hour: 1,
                enable_auto_recovery: false,
                ..cfg()
            },
            Vec::new(),
        );
        r.probe.set_rss_mb(900);
        r.monitor.record_security_violation();
        r.monitor.check().await;

        assert_eq!(alert_ids(&r.rec), ["memory"]);
        assert!(!r.monitor.active_alerts().iter().any(|a| a.id == "security"));
    }

    #[tokio::test(start_paused = true)]
    async fn three_issues_force_critical() {
        let r = rig();
        r.probe.set_rss_mb(850);
        r.monitor.record_request(true, Duration::from_millis(6_000));
        r.monitor.record_request(true, Duration::from_millis(6_000));
        r.monitor.record_security_violation();

        let report = r.monitor.check().await;
        let levels: Vec<HealthLevel> = report.dimensions.iter().map(|d| d.level).collect();
        assert_eq!(
            levels,
            [
                HealthLevel::Warning,
                HealthLevel::Healthy,
                HealthLevel::Healthy,
                HealthLevel::Warning,
                HealthLevel::Warning,
            ]
        );
        assert_eq!(report.issues, 3);
        assert_eq!(report.level, HealthLevel::Critical);
        assert_eq!(alert_ids(&r.rec), ["memory", "response_time", "security"]);
        // no dimension is critical on its own, so nothing to recover
        assert_eq!(r.rec.count(EventKind::RecoveryAttempted), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn error_rate_uses_the_observation_window() {
        let r = rig();
        for ok in [false, true, true, true] {
            r.monitor.record_request(ok, Duration::from_millis(10));
        }
        let report = r.monitor.check().await;
        assert_eq!(report.dimensions[2].dimension, Dimension::ErrorRate);
        assert_eq!(report.dimensions[2].value, 25.0);
        assert_eq!(report.dimensions[2].level, HealthLevel::Critical);

        time::advance(Duration::from_secs(5 * 60)).await;
        let report = r.monitor.check().await;
        assert_eq!(report.dimensions[2].level, HealthLevel::Healthy);
    }

    #[tokio::test(start_paused = true)]
    async fn memory_recovery_is_capped() {
        let r = rig();
        for _ in 0..3 {
            r.probe.set_rss_mb(2000);
            r.monitor.check().await;
            r.probe.set_rss_mb(100);
            r.monitor.check().await;
            time::advance(Duration::from_secs(61)).await;
        }

        time::sleep(Duration::from_secs(5)).await;

        assert_eq!(r.rec.count(EventKind::Alert), 3);
        assert_eq!(r.reclaimer.forced_calls(), 2);
        assert_eq!(r.monitor.recoveries_used(), 2);
        let attempts: Vec<Option<u32>> = r
            .rec
            .of(EventKind::RecoveryAttempted)
            .iter()
            .map(|e| e.attempt)
            .collect();
        assert_eq!(attempts, [Some(1), Some(2)]);
    }

    #[tokio::test(start_paused = true)]
    async fn halted_cycle_triggers_cycle_recovery() {
        let r = rig();
        r.cycle.set_phase(CyclePhase::ErrorHalted, 3);
        r.monitor.check().await;
        time::sleep(Duration::from_secs(5)).await;

        let rec = r.rec.of(EventKind::RecoveryAttempted);
        assert_eq!(rec.len(), 1);
        assert_eq!(rec[0].reason.as_deref(), Some("cycle"));
        assert_eq!(rec[0].success, Some(true));
        assert_eq!(r.reclaimer.forced_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn warning_then_critical_escalates_and_reclaims() {
        let r = rig();
        r.probe.set_rss_mb(900);
        r.monitor.check().await;
        r.probe.set_rss_mb(5000);
        let report = r.monitor.check().await;
        assert_eq!(report.level, HealthLevel::Critical);
        time::sleep(Duration::from_secs(5)).await;

        let severities: Vec<AlertSeverity> = r
            .rec
            .of(EventKind::Alert)
            .iter()
            .filter_map(|e| e.alert.as_ref().map(|a| a.severity))
            .collect();
        assert_eq!(severities, [AlertSeverity::Warning, AlertSeverity::Critical]);
        let active = r.monitor.active_alerts();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].severity, AlertSeverity::Critical);

        assert_eq!(r.reclaimer.forced_calls(), 1);
        let rec = r.rec.of(EventKind::RecoveryAttempted);
        assert_eq!(rec.len(), 1);
        assert_eq!(rec[0].success, Some(true));
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_reclaimer_does_not_block_sampling() {
        let r = rig_with(
            Config {
                cleanup_timeout: Duration::from_secs(30),
                ..cfg()
            },
            Vec::new(),
        );
        r.reclaimer.set_delay(Duration::from_secs(24 * 60 * 60));
        r.probe.set_rss_mb(5000);
        assert!(r.monitor.start());

        time::sleep(Duration::from_secs(1)).await;
        r.probe.set_rss_mb(100);
        time::sleep(Duration::from_secs(600)).await;

        assert_eq!(r.monitor.last_report().unwrap().level, HealthLevel::Healthy);
        assert!(r.monitor.active_alerts().is_empty());
        assert_eq!(r.rec.count(EventKind::AlertResolved), 1);

        assert_eq!(r.reclaimer.forced_calls(), 1);
        let rec = r.rec.of(EventKind::RecoveryAttempted);
        assert_eq!(rec.len(), 1);
        assert_eq!(rec[0].success, Some(false));
        r.monitor.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn stop_cancels_pending_recovery() {
        let r = rig();
        r.probe.set_rss_mb(5000);
        r.monitor.check().await;
        r.monitor.stop();
        time::sleep(Duration::from_secs(5)).await;

        assert_eq!(r.monitor.recoveries_used(), 1);
        assert_eq!(r.reclaimer.calls(), 0);
        assert_eq!(r.rec.count(EventKind::RecoveryAttempted), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn auto_recovery_can_be_disabled() {
        let r = rig_with(
            Config {
                enable_auto_recovery: false,
                ..cfg()
            },
            Vec::new(),
        );
        r.probe.set_rss_mb(5000);
        r.monitor.check().await;
        assert_eq!(r.rec.count(EventKind::Alert), 1);
        assert_eq!(r.rec.count(EventKind::RecoveryAttempted), 0);
        assert_eq!(r.reclaimer.calls(), 0);
    }

    struct Queue;

    #[async_trait]
    impl ComponentProbe for Queue {
        fn name(&self) -> &str {
            "queue"
        }

        async fn read(&self) -> ComponentReading {
            ComponentReading {
                level: HealthLevel::Warning,
                value: 12_000.0,
                message: "queue depth 12000".into(),
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn component_probes_follow_fixed_dimensions() {
        let r = rig_with(cfg(), vec![Arc::new(Queue)]);
        r.probe.set_rss_mb(900);
        let report = r.monitor.check().await;

        assert_eq!(report.dimensions.len(), 6);
        assert_eq!(
            report.dimensions[5].dimension,
            Dimension::Component("queue".into())
        );
        assert_eq!(alert_ids(&r.rec), ["memory", "component:queue"]);
    }

    struct Stuck;

    #[async_trait]
    impl ComponentProbe for Stuck {
        fn name(&self) -> &str {
            "stuck"
        }

        async fn read(&self) -> ComponentReading {
            time::sleep(Duration::from_secs(24 * 60 * 60)).await;
            ComponentReading {
                level: HealthLevel::Healthy,
                value: 0.0,
                message: String::new(),
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn unanswered_component_probe_reads_as_warning() {
        let r = rig_with(cfg(), vec![Arc::new(Stuck)]);
        let started = time::Instant::now();
        let report = r.monitor.check().await;

        assert!(started.elapsed() <= Duration::from_secs(10));
        let stuck = &report.dimensions[5];
        assert_eq!(stuck.dimension, Dimension::Component("stuck".into()));
        assert_eq!(stuck.level, HealthLevel::Warning);
        assert_eq!(stuck.message, "stuck probe did not answer");
    }

    #[tokio::test(start_paused = true)]
    async fn counts_failed_cleanups_from_the_bus() {
        let r = rig();
        r.bus
            .publish(Event::new(EventKind::CleanupCompleted).with_success(false));
        r.bus
            .publish(Event::new(EventKind::CleanupCompleted).with_success(true));
        let report = r.monitor.check().await;
        assert_eq!(report.cleanup_failures, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_ends_sampling() {
        let r = rig();
        assert!(r.monitor.start());
        assert!(!r.monitor.start());
        time::sleep(Duration::from_secs(1)).await;
        let first = r.monitor.last_report().unwrap().at;

        r.monitor
            .shutdown(ShutdownContext::new("test", false, Duration::from_secs(1)))
            .await
            .unwrap();
        time::sleep(Duration::from_secs(60)).await;
        assert_eq!(r.monitor.last_report().unwrap().at, first);
        assert!(!r.monitor.start());
    }
}
