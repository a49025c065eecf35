//! Cycle orchestration: phases, windows, restart validation and the orchestrator.
//!
//! ## Contents
//! - [`CyclePhase`], [`PhaseEvent`] the transition table
//! - [`OpenWindow`], [`ClosedWindow`], [`TimingReport`] session/idle windows with timing accuracy
//! - [`ValidationResult`] restart preconditions
//! - [`CycleStatus`], [`CycleView`] status query
//! - [`CycleOrchestrator`] the state machine and its timers

mod orchestrator;
mod phase;
mod status;
mod validate;
mod window;

pub use orchestrator::CycleOrchestrator;
pub use phase::{CyclePhase, PhaseEvent};
pub use status::{CycleStatus, CycleView};
pub use validate::{RECENT_ERROR_WINDOW, ValidationResult};
pub use window::{ClosedWindow, OpenWindow, TimingReport, WindowHistory, WindowKind};
