use std::sync::Arc;
use std::time::Duration;

use crate::clock::ClockSource;
use crate::core::{Collaborators, Config, Runtime};
use crate::cycle::{CycleOrchestrator, CycleView};
use crate::error::RuntimeError;
use crate::events::{Bus, Observe};
use crate::monitor::{ComponentProbe, HealthMonitor, RecoveryHook, ResourceProbe};
use crate::reclaim::ResourceReclaimer;
use crate::session::SessionRef;
use crate::shutdown::{
    ComponentRegistration, InterruptChannel, InterruptSource, OsSignals, ProcessTerminator,
    ShutdownCoordinator, StateStore, Terminator,
};
use crate::subscribers::{Subscribe, SubscriberSet};

/// Shutdown priority of the cycle orchestrator (torn down first).
pub const CYCLE_COMPONENT_PRIORITY: i32 = 100;

/// Shutdown priority of the health monitor.
pub const MONITOR_COMPONENT_PRIORITY: i32 = 90;

/// Builder for a [`Runtime`].
pub struct RuntimeBuilder {
    cfg: Config,
    parts: Collaborators,
    subscribers: Vec<Arc<dyn Subscribe>>,
    observers: Vec<Arc<dyn Observe>>,
    components: Vec<ComponentRegistration>,
    sources: Vec<Box<dyn InterruptSource>>,
    os_signals: bool,
    store: Option<Arc<dyn StateStore>>,
    terminator: Arc<dyn Terminator>,
}

impl RuntimeBuilder {
    /// Creates a builder with default collaborators and OS signal handling on.
    pub fn new(cfg: Config) -> Self {
        Self {
            cfg,
            parts: Collaborators::default(),
            subscribers: Vec::new(),
            observers: Vec::new(),
            components: Vec::new(),
            sources: Vec::new(),
            os_signals: true,
            store: None,
            terminator: Arc::new(ProcessTerminator),
        }
    }

    /// Sets the work run inside each session window.
    pub fn with_session(mut self, session: SessionRef) -> Self {
        self.parts.session = Some(session);
        self
    }

    /// Sets the resource reclaimer.
    pub fn with_reclaimer(mut self, reclaimer: Arc<dyn ResourceReclaimer>) -> Self {
        self.parts.reclaimer = reclaimer;
        self
    }

    /// Replaces the process resource probe.
    pub fn with_probe(mut self, probe: Arc<dyn ResourceProbe>) -> Self {
        self.parts.probe = probe;
        self
    }

    /// Shares an existing clock.
    pub fn with_clock(mut self, clock: Arc<ClockSource>) -> Self {
        self.parts.clock = clock;
        self
    }

    /// Adds an external component the monitor polls on every tick.
    pub fn with_component_probe(mut self, probe: Arc<dyn ComponentProbe>) -> Self {
        self.parts.components.push(probe);
        self
    }

    /// Sets the cycle recovery hook.
    pub fn with_recovery_hook(mut self, hook: Arc<dyn RecoveryHook>) -> Self {
        self.parts.recovery = hook;
        self
    }

    /// Sets event subscribers.
    ///
    /// Subscribers receive every bus event through dedicated workers with
    /// bounded queues.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Adds a synchronous observer, called inside `publish` in registration order.
    pub fn with_observer(mut self, observer: Arc<dyn Observe>) -> Self {
        self.observers.push(observer);
        self
    }

    /// Registers a component with the shutdown coordinator.
    pub fn with_component(mut self, registration: ComponentRegistration) -> Self {
        self.components.push(registration);
        self
    }

    /// Adds an interrupt source.
    pub fn with_interrupts(mut self, source: impl InterruptSource) -> Self {
        self.sources.push(Box::new(source));
        self
    }

    /// Enables or disables SIGINT/SIGTERM/SIGHUP (Ctrl-C) handling. On by default.
    pub fn with_os_signals(mut self, enabled: bool) -> Self {
        self.os_signals = enabled;
        self
    }

    /// Persists a snapshot before graceful shutdowns.
    pub fn with_state_store(mut self, store: Arc<dyn StateStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Replaces how the process exits.
    pub fn with_terminator(mut self, terminator: Arc<dyn Terminator>) -> Self {
        self.terminator = terminator;
        self
    }

    /// Validates the configuration and wires the runtime.
    ///
    /// The orchestrator (`"cycle"`) and monitor (`"monitor"`) are registered as
    /// shutdown components ahead of the user's registrations, so those may depend
    /// on them. Must be called inside a tokio runtime.
    ///
    /// # Errors
    /// - [`RuntimeError::Config`] if [`Config::validate`] fails
    /// - [`RuntimeError::Registration`] if a component registration is rejected
    /// - [`RuntimeError::Signals`] if OS signal handlers cannot be installed
    pub fn build(self) -> Result<Arc<Runtime>, RuntimeError> {
        self.cfg.validate()?;

        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        for observer in self.observers {
            bus.observe(observer);
        }
        let subs = SubscriberSet::new(self.subscribers, bus.clone());

        let orchestrator = CycleOrchestrator::new(self.cfg.clone(), bus.clone(), &self.parts);
        let view: Arc<dyn CycleView> = Arc::new(orchestrator.clone());
        let monitor = HealthMonitor::new(self.cfg.clone(), bus.clone(), view, &self.parts);
        bus.observe(Arc::new(monitor.clone()));

        let coordinator = ShutdownCoordinator::new(
            self.cfg.clone(),
            bus.clone(),
            Arc::clone(&self.parts.clock),
            self.terminator,
            self.store,
        );
        coordinator.register(
            ComponentRegistration::new("cycle", Arc::new(orchestrator.clone()))
                .priority(CYCLE_COMPONENT_PRIORITY)
                .timeout(self.cfg.cleanup_timeout.max(Duration::from_secs(1)))
                .required(true),
        )?;
        coordinator.register(
            ComponentRegistration::new("monitor", Arc::new(monitor.clone()))
                .priority(MONITOR_COMPONENT_PRIORITY),
        )?;
        for registration in self.components {
            coordinator.register(registration)?;
        }

        let mut sources = self.sources;
        if self.os_signals {
            sources.push(Box::new(OsSignals::new()?));
        }
        let (interrupts, channel) = InterruptChannel::pair();
        sources.push(Box::new(channel));

        Ok(Arc::new(Runtime::new_internal(
            self.cfg,
            bus,
            subs,
            orchestrator,
            monitor,
            coordinator,
            sources,
            interrupts,
        )))
    }
}
