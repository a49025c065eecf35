//! # Health & alert monitoring.
//!
//! - [`HealthMonitor`] samples on a fixed period, classifies health and manages alerts.
//! - [`ResourceProbe`] / [`ComponentProbe`] supply the readings.
//! - [`RecoveryHook`] is called for cycle-critical alerts.

mod alerts;
mod feed;
mod health;
mod health_monitor;
mod probe;
mod recovery;

pub use alerts::{Alert, AlertBook, AlertGates, AlertRecord, AlertSeverity, RaiseOutcome};
pub use feed::OBSERVATION_WINDOW;
pub use health::{Dimension, DimensionHealth, HealthLevel, HealthReport};
pub use health_monitor::HealthMonitor;
pub use probe::{ComponentProbe, ComponentReading, ResourceProbe, ResourceSample, SystemProbe};
pub use recovery::{NoopRecovery, RecoveryHook};
