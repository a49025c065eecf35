//! # Runtime: the orchestrator, monitor and coordinator wired onto one bus.
//!
//! ```text
//! RuntimeBuilder::build()
//!   ├─► Bus (+ user observers, monitor cleanup feed)
//!   ├─► SubscriberSet (one worker per subscriber)
//!   ├─► CycleOrchestrator ──(CycleView)──► HealthMonitor
//!   └─► ShutdownCoordinator: "cycle" (100), "monitor" (90), user components
//!
//! Runtime::run()
//!   ├─► subscriber listener: Bus.subscribe() ─► SubscriberSet::emit
//!   ├─► one listener per InterruptSource ─► coordinator.initiate_shutdown(reason, emergency)
//!   ├─► orchestrator.start(), monitor.start()
//!   ├─► await coordinator.completion()
//!   └─► stop listeners, drain subscribers, return the ShutdownOutcome
//! ```
//!
//! With `exit_on_complete` (the default) the coordinator ends the process
//! before `run` returns.
//!
//! ## Example
//! ```rust,no_run
//! use std::time::Duration;
//! use cyclevisor::{Config, Runtime, SessionContext, SessionError, SessionFn};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let cfg = Config {
//!         session_duration: Duration::from_secs(60 * 60),
//!         idle_period: Duration::from_secs(10 * 60),
//!         ..Config::default()
//!     };
//!
//!     let crawl = SessionFn::arc("crawler", |ctx: SessionContext| async move {
//!         ctx.token.cancelled().await;
//!         Ok::<_, SessionError>(())
//!     });
//!
//!     let runtime = Runtime::builder(cfg).with_session(crawl).build()?;
//!     let outcome = runtime.run().await?;
//!     println!("{outcome:?}");
//!     Ok(())
//! }
//! ```

use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::core::{Config, RuntimeBuilder};
use crate::cycle::{CycleOrchestrator, CycleStatus};
use crate::error::RuntimeError;
use crate::events::Bus;
use crate::monitor::{Alert, HealthMonitor, HealthReport};
use crate::shutdown::{
    InterruptHandle, InterruptSource, ShutdownCoordinator, ShutdownOutcome, ShutdownStatus,
};
use crate::subscribers::SubscriberSet;

/// Combined status of the three parts.
#[derive(Clone, Debug, PartialEq)]
pub struct RuntimeStatus {
    /// Orchestrator status, including timing accuracy.
    pub cycle: CycleStatus,
    /// Last monitor report, if a pass has run.
    pub health: Option<HealthReport>,
    /// Alerts currently active.
    pub active_alerts: Vec<Alert>,
    /// Shutdown coordinator status.
    pub shutdown: ShutdownStatus,
}

/// Serializable summary of [`RuntimeStatus`] for status endpoints.
#[derive(Clone, Debug, Serialize)]
pub struct StatusDigest {
    /// Orchestrator status.
    pub cycle: CycleStatus,
    /// Overall health level, if a pass has run.
    pub health: Option<&'static str>,
    /// Ids of active alerts.
    pub active_alerts: Vec<String>,
    /// Shutdown phase.
    pub shutdown: crate::shutdown::ShutdownState,
}

impl RuntimeStatus {
    /// Reduces the status to its serializable core.
    pub fn digest(&self) -> StatusDigest {
        StatusDigest {
            cycle: self.cycle.clone(),
            health: self.health.as_ref().map(|h| h.level.as_str()),
            active_alerts: self.active_alerts.iter().map(|a| a.id.clone()).collect(),
            shutdown: self.shutdown.state.clone(),
        }
    }
}

/// The wired cycle runtime.
pub struct Runtime {
    cfg: Config,
    bus: Bus,
    subs: Mutex<Option<SubscriberSet>>,
    orchestrator: CycleOrchestrator,
    monitor: HealthMonitor,
    coordinator: ShutdownCoordinator,
    sources: Mutex<Vec<Box<dyn InterruptSource>>>,
    interrupts: InterruptHandle,
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("orchestrator", &self.orchestrator)
            .field("monitor", &self.monitor)
            .field("coordinator", &self.coordinator)
            .finish_non_exhaustive()
    }
}

impl Runtime {
    /// Returns a builder.
    pub fn builder(cfg: Config) -> RuntimeBuilder {
        RuntimeBuilder::new(cfg)
    }

    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new_internal(
        cfg: Config,
        bus: Bus,
        subs: SubscriberSet,
        orchestrator: CycleOrchestrator,
        monitor: HealthMonitor,
        coordinator: ShutdownCoordinator,
        sources: Vec<Box<dyn InterruptSource>>,
        interrupts: InterruptHandle,
    ) -> Self {
        Self {
            cfg,
            bus,
            subs: Mutex::new(Some(subs)),
            orchestrator,
            monitor,
            coordinator,
            sources: Mutex::new(sources),
            interrupts,
        }
    }

    /// Starts the cycle and monitor and waits for shutdown to finish.
    ///
    /// # Errors
    /// [`RuntimeError::Cycle`] if the orchestrator refuses to start (already running).
    pub async fn run(&self) -> Result<ShutdownOutcome, RuntimeError> {
        let token = CancellationToken::new();
        let mut listeners = JoinSet::new();

        let subs = self.subs.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(subs) = subs {
            listeners.spawn(subscriber_listener(self.bus.clone(), subs, token.clone()));
        }
        let sources = std::mem::take(&mut *self.sources.lock().unwrap_or_else(PoisonError::into_inner));
        for source in sources {
            listeners.spawn(interrupt_listener(source, self.coordinator.clone(), token.clone()));
        }

        if let Err(e) = self.orchestrator.start() {
            token.cancel();
            while listeners.join_next().await.is_some() {}
            return Err(e.into());
        }
        self.monitor.start();
        tracing::info!(
            session = ?self.cfg.session_duration,
            idle = ?self.cfg.idle_period,
            "cycle runtime started"
        );

        let outcome = self.coordinator.completion().await;

        token.cancel();
        while listeners.join_next().await.is_some() {}
        tracing::info!(forced = outcome.is_forced(), "cycle runtime finished");
        Ok(outcome)
    }

    /// Requests a graceful shutdown. Returns `false` if one is already in progress.
    pub fn stop(&self, reason: &str) -> bool {
        self.coordinator.initiate_shutdown(reason, false)
    }

    /// Handle for explicit stop requests and fault reports from other tasks or threads.
    pub fn interrupt_handle(&self) -> InterruptHandle {
        self.interrupts.clone()
    }

    /// Status of the orchestrator, monitor and coordinator.
    pub fn status(&self) -> RuntimeStatus {
        RuntimeStatus {
            cycle: self.orchestrator.status(),
            health: self.monitor.last_report(),
            active_alerts: self.monitor.active_alerts(),
            shutdown: self.coordinator.status(),
        }
    }

    /// The cycle orchestrator.
    pub fn orchestrator(&self) -> &CycleOrchestrator {
        &self.orchestrator
    }

    /// The health monitor.
    pub fn monitor(&self) -> &HealthMonitor {
        &self.monitor
    }

    /// The shutdown coordinator.
    pub fn coordinator(&self) -> &ShutdownCoordinator {
        &self.coordinator
    }

    /// The event bus.
    pub fn bus(&self) -> &Bus {
        &self.bus
    }
}

/// Forwards broadcast events to the subscriber set until `token` is cancelled,
/// then delivers what is still buffered and drains the workers.
async fn subscriber_listener(bus: Bus, subs: SubscriberSet, token: CancellationToken) {
    let mut rx = bus.subscribe();
    loop {
        tokio::select! {
            ev = rx.recv() => match ev {
                Ok(ev) => subs.emit(&ev),
                Err(RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "subscriber listener lagged");
                }
                Err(RecvError::Closed) => break,
            },
            _ = token.cancelled() => {
                loop {
                    match rx.try_recv() {
                        Ok(ev) => subs.emit(&ev),
                        Err(TryRecvError::Lagged(_)) => continue,
                        Err(_) => break,
                    }
                }
                break;
            }
        }
    }
    subs.shutdown().await;
}

/// Turns every interrupt from `source` into a shutdown request.
async fn interrupt_listener(
    mut source: Box<dyn InterruptSource>,
    coordinator: ShutdownCoordinator,
    token: CancellationToken,
) {
    loop {
        let next = tokio::select! {
            next = source.next() => next,
            _ = token.cancelled() => return,
        };
        let Some(interrupt) = next else {
            return;
        };
        tracing::info!(reason = %interrupt.reason, emergency = interrupt.emergency, "interrupt received");
        coordinator.initiate_shutdown(interrupt.reason, interrupt.emergency);
    }
}
