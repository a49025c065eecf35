//! # cyclevisor
//!
//! **Cyclevisor** runs a crawler in a perpetual cycle: a bounded active
//! session, a cleanup pass, a mandatory idle period, a validated restart. Next
//! to the cycle it runs a health monitor with alerting and bounded
//! auto-recovery, and a shutdown coordinator that tears every registered
//! component down in priority and dependency order under hard time budgets.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!   interrupts: OsSignals · InterruptChannel · panic hook
//!                           │ initiate_shutdown(reason, emergency)   (first wins)
//!                           ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  ShutdownCoordinator                                              │
//! │  - registry ordered by priority, then dependencies                │
//! │  - force / graceful watchdogs                                     │
//! │  - StateStore snapshot, Terminator exit                           │
//! └──────┬───────────────────────────┬────────────────────────┬───────┘
//!        ▼ shutdown (100)            ▼ shutdown (90)          ▼ user components
//! ┌──────────────────────┐   ┌──────────────────────┐
//! │  CycleOrchestrator   │   │  HealthMonitor       │
//! │  session ► cleanup   │◄──│  reads CycleView     │
//! │  ► idle ► restart    │   │  alerts, recovery    │
//! └──────┬───────────────┘   └──────┬───────────────┘
//!        │ reclaim(false)           │ reclaim(true) (memory recovery)
//!        ▼                          ▼
//!   ResourceReclaimer          ResourceProbe / ComponentProbe
//!
//!   all three publish Event ──► Bus ──► Observe (ordered, in-line)
//!                                   └─► broadcast ──► SubscriberSet ──► Subscribe workers
//! ```
//!
//! ### Cycle
//! ```text
//! Stopped ──start──► Running ──session timer──► Terminating ──cleanup──► Idle
//!                       ▲                                                  │ idle timer
//!                       │ valid                                            ▼
//!                       └──────────────────── validate ◄─────────── Restarting
//!                                                 │ invalid: retry after min(30s, 5s × n)
//!                                                 └─ attempts exhausted ─► ErrorHalted
//! ```
//!
//! ## Features
//! | Area | Description | Key types / traits |
//! |---|---|---|
//! | **Cycle** | Session/idle state machine, timing accuracy, restart validation. | [`CycleOrchestrator`], [`CyclePhase`], [`CycleStatus`] |
//! | **Monitoring** | Health classification, gated alerts, bounded recovery. | [`HealthMonitor`], [`HealthReport`], [`Alert`] |
//! | **Shutdown** | Ordered teardown with watchdogs and exit codes. | [`ShutdownCoordinator`], [`Shutdownable`], [`ComponentRegistration`] |
//! | **Interrupts** | Signals, explicit stops and faults. | [`InterruptSource`], [`OsSignals`], [`InterruptHandle`] |
//! | **Events** | Ordered observers and async subscribers. | [`Bus`], [`Observe`], [`Subscribe`] |
//! | **Policies** | Linear restart backoff. | [`BackoffPolicy`] |
//! | **Errors** | Typed errors with stable labels. | [`CycleError`], [`ShutdownError`], [`RuntimeError`] |
//! | **Configuration** | One owned settings struct. | [`Config`] |
//!
//! ## Optional features
//! - `logging`: exports [`LogWriter`], a subscriber that renders events through `tracing`.
//!
//! ## Example
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use cyclevisor::{
//!     ComponentError, ComponentRegistration, Config, Runtime, SessionContext, SessionError,
//!     SessionFn, ShutdownContext, ShutdownFn,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let cfg = Config {
//!         session_duration: Duration::from_secs(2 * 60 * 60),
//!         idle_period: Duration::from_secs(30 * 60),
//!         ..Config::default()
//!     };
//!
//!     let crawl = SessionFn::arc("crawler", |ctx: SessionContext| async move {
//!         while !ctx.token.is_cancelled() {
//!             // fetch the next page...
//!             tokio::time::sleep(Duration::from_millis(250)).await;
//!         }
//!         Ok::<_, SessionError>(())
//!     });
//!
//!     let db = ShutdownFn::arc(|ctx: ShutdownContext| async move {
//!         // flush and close the pool, faster when ctx.emergency
//!         let _ = ctx.emergency;
//!         Ok::<_, ComponentError>(())
//!     });
//!
//!     let runtime = Runtime::builder(cfg)
//!         .with_session(crawl)
//!         .with_component(ComponentRegistration::new("db", db).depends_on("cycle").required(true))
//!         .build()?;
//!
//!     let handle = runtime.interrupt_handle();
//!     let rt = Arc::clone(&runtime);
//!     let run = tokio::spawn(async move { rt.run().await });
//!
//!     tokio::time::sleep(Duration::from_secs(5)).await;
//!     handle.stop("maintenance");
//!     let _outcome = run.await??;
//!     Ok(())
//! }
//! ```

mod clock;
mod core;
mod cycle;
mod error;
mod events;
mod monitor;
mod policies;
mod reclaim;
mod session;
mod shutdown;
mod subscribers;

#[cfg(test)]
mod testing;

// ---- Public re-exports ----

pub use clock::{ClockSource, ClockSyncReport};
pub use crate::core::{
    CYCLE_COMPONENT_PRIORITY, Collaborators, Config, MONITOR_COMPONENT_PRIORITY, Runtime,
    RuntimeBuilder, RuntimeStatus, StatusDigest,
};
pub use cycle::{
    ClosedWindow, CycleOrchestrator, CyclePhase, CycleStatus, CycleView, OpenWindow, PhaseEvent,
    RECENT_ERROR_WINDOW, TimingReport, ValidationResult, WindowHistory, WindowKind,
};
pub use error::{ComponentError, ConfigError, CycleError, RuntimeError, ShutdownError, StoreError};
pub use events::{Bus, Event, EventKind, Observe};
pub use monitor::{
    Alert, AlertBook, AlertGates, AlertRecord, AlertSeverity, ComponentProbe, ComponentReading,
    Dimension, DimensionHealth, HealthLevel, HealthMonitor, HealthReport, NoopRecovery,
    OBSERVATION_WINDOW, RaiseOutcome, RecoveryHook, ResourceProbe, ResourceSample, SystemProbe,
};
pub use policies::BackoffPolicy;
pub use reclaim::{NoopReclaimer, ReclaimReport, ResourceReclaimer};
pub use session::{BoxSessionFuture, CrawlSession, SessionContext, SessionError, SessionFn, SessionRef};
pub use shutdown::{
    ComponentOutcome, ComponentRef, ComponentRegistration, DEFAULT_COMPONENT_TIMEOUT,
    EMERGENCY_COMPONENT_TIMEOUT, FATAL_EXIT_CODE, FORCED_EXIT_CODE, Interrupt, InterruptChannel,
    InterruptHandle, InterruptSource, JsonFileStore, OsSignals, ProcessTerminator,
    ShutdownContext, ShutdownCoordinator, ShutdownFn, ShutdownOutcome, ShutdownPhase,
    ShutdownSnapshot, ShutdownState, ShutdownStatus, ShutdownSummary, Shutdownable, StateStore,
    Terminator, install_panic_hook,
};
pub use subscribers::{Subscribe, SubscriberSet};

// Optional: expose a built-in logger subscriber.
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
