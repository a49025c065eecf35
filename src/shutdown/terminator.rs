//! Process termination.
//!
//! The coordinator never calls `std::process::exit` directly; it goes through a
//! [`Terminator`] so tests can record exit codes instead of dying.

/// Exit status after a forced shutdown.
pub const FORCED_EXIT_CODE: i32 = 1;

/// Exit status when the forced-shutdown path itself fails.
pub const FATAL_EXIT_CODE: i32 = 2;

/// Ends the process.
pub trait Terminator: Send + Sync + 'static {
    /// Terminates with `code`. Must not block.
    fn terminate(&self, code: i32);
}

/// Calls [`std::process::exit`].
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessTerminator;

impl Terminator for ProcessTerminator {
    fn terminate(&self, code: i32) {
        tracing::info!(code, "exiting process");
        std::process::exit(code);
    }
}
