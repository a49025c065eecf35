//! Runtime core: configuration, collaborators and wiring.
//!
//! - [`Config`]: the single owned settings struct;
//! - [`Collaborators`]: external capabilities (clock, reclaimer, probes, session, recovery);
//! - [`RuntimeBuilder`]: validates the config and wires the parts onto one bus;
//! - [`Runtime`]: runs the cycle until shutdown completes.

mod builder;
mod collaborators;
mod config;
mod runtime;

pub use builder::{CYCLE_COMPONENT_PRIORITY, MONITOR_COMPONENT_PRIORITY, RuntimeBuilder};
pub use collaborators::Collaborators;
pub use config::Config;
pub use runtime::{Runtime, RuntimeStatus, StatusDigest};
