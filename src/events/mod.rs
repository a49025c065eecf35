//! Runtime events: types and the shared bus.
//!
//! This module groups the event **data model** and the **bus** used to
//! publish/observe lifecycle events emitted by the cycle orchestrator, the
//! health monitor and the shutdown coordinator.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Bus`] ordered synchronous observers plus a `tokio::sync::broadcast` channel
//! - [`Observe`] synchronous observer contract
//!
//! ## Quick reference
//! - **Publishers**: `CycleOrchestrator`, `HealthMonitor`, `ShutdownCoordinator`,
//!   `SubscriberSet` workers (overflow/panic).
//! - **Consumers**: `Observe` implementations (e.g. the monitor's cleanup feed),
//!   and the runtime's subscriber listener which fans out to `SubscriberSet`.

mod bus;
mod event;

pub use bus::{Bus, Observe};
pub use event::{Event, EventKind};
