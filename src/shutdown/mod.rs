//! # Shutdown coordination.
//!
//! - [`component`]: what a shutdown participant is, and what it reported.
//! - [`coordinator`]: the registry and the shutdown protocol.
//! - [`signals`]: where shutdown requests come from.
//! - [`store`]: what is persisted before teardown.
//! - [`terminator`]: how the process finally exits.

mod component;
mod coordinator;
mod order;
mod signals;
mod store;
mod terminator;

pub use component::{
    ComponentOutcome, ComponentRef, ComponentRegistration, DEFAULT_COMPONENT_TIMEOUT,
    EMERGENCY_COMPONENT_TIMEOUT, ShutdownContext, ShutdownFn, ShutdownSummary, Shutdownable,
};
pub use coordinator::{
    ShutdownCoordinator, ShutdownOutcome, ShutdownPhase, ShutdownState, ShutdownStatus,
};
pub use signals::{
    Interrupt, InterruptChannel, InterruptHandle, InterruptSource, OsSignals, install_panic_hook,
};
pub use store::{JsonFileStore, ShutdownSnapshot, StateStore};
pub use terminator::{FATAL_EXIT_CODE, FORCED_EXIT_CODE, ProcessTerminator, Terminator};
