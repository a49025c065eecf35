//! # Interrupt sources.
//!
//! Everything that can stop the process is funnelled through an
//! [`InterruptSource`] into `ShutdownCoordinator::initiate_shutdown`, which
//! ignores every interrupt after the first.
//!
//! - [`OsSignals`]: SIGINT, SIGTERM and SIGHUP on Unix; Ctrl-C elsewhere.
//!   Each maps to the reason `signal:<NAME>`.
//! - [`InterruptChannel`] / [`InterruptHandle`]: explicit stop requests and
//!   in-process faults, usable from any thread.
//! - [`install_panic_hook`]: turns panics into emergency interrupts.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

/// One request to shut down.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Interrupt {
    /// Human-readable reason.
    pub reason: Arc<str>,
    /// Emergency shutdowns skip state persistence and the graceful watchdog.
    pub emergency: bool,
}

impl Interrupt {
    /// A process signal, reason `signal:<name>`.
    pub fn signal(name: &str) -> Self {
        Self {
            reason: format!("signal:{name}").into(),
            emergency: false,
        }
    }

    /// An explicit, graceful stop request.
    pub fn stop(reason: impl Into<Arc<str>>) -> Self {
        Self {
            reason: reason.into(),
            emergency: false,
        }
    }

    /// An unrecoverable in-process fault.
    pub fn fault(reason: impl Into<Arc<str>>) -> Self {
        Self {
            reason: reason.into(),
            emergency: true,
        }
    }
}

/// Source of interrupts.
#[async_trait]
pub trait InterruptSource: Send + 'static {
    /// Waits for the next interrupt; `None` once the source can produce no more.
    async fn next(&mut self) -> Option<Interrupt>;
}

/// OS signal listener.
#[derive(Debug)]
pub struct OsSignals {
    #[cfg(unix)]
    sigint: tokio::signal::unix::Signal,
    #[cfg(unix)]
    sigterm: tokio::signal::unix::Signal,
    #[cfg(unix)]
    sighup: tokio::signal::unix::Signal,
}

impl OsSignals {
    /// Registers the signal handlers. Must be called inside a tokio runtime.
    #[cfg(unix)]
    pub fn new() -> std::io::Result<Self> {
        use tokio::signal::unix::{SignalKind, signal};

        Ok(Self {
            sigint: signal(SignalKind::interrupt())?,
            sigterm: signal(SignalKind::terminate())?,
            sighup: signal(SignalKind::hangup())?,
        })
    }

    /// Registers the signal handlers. Must be called inside a tokio runtime.
    #[cfg(not(unix))]
    pub fn new() -> std::io::Result<Self> {
        Ok(Self {})
    }
}

#[async_trait]
impl InterruptSource for OsSignals {
    #[cfg(unix)]
    async fn next(&mut self) -> Option<Interrupt> {
        let name = tokio::select! {
            s = self.sigint.recv()  => s.map(|_| "SIGINT"),
            s = self.sigterm.recv() => s.map(|_| "SIGTERM"),
            s = self.sighup.recv()  => s.map(|_| "SIGHUP"),
        }?;
        Some(Interrupt::signal(name))
    }

    #[cfg(not(unix))]
    async fn next(&mut self) -> Option<Interrupt> {
        tokio::signal::ctrl_c().await.ok()?;
        Some(Interrupt::signal("CTRL_C"))
    }
}

/// Sending half for explicit interrupts. Cheap to clone.
#[derive(Clone, Debug)]
pub struct InterruptHandle {
    tx: mpsc::UnboundedSender<Interrupt>,
}

impl InterruptHandle {
    /// Sends an interrupt. Returns `false` if the listener is gone.
    pub fn send(&self, interrupt: Interrupt) -> bool {
        self.tx.send(interrupt).is_ok()
    }

    /// Requests a graceful shutdown.
    pub fn stop(&self, reason: impl Into<Arc<str>>) -> bool {
        self.send(Interrupt::stop(reason))
    }

    /// Reports an unrecoverable fault (emergency shutdown).
    pub fn fault(&self, reason: impl Into<Arc<str>>) -> bool {
        self.send(Interrupt::fault(reason))
    }
}

/// Receiving half for explicit interrupts.
#[derive(Debug)]
pub struct InterruptChannel {
    rx: mpsc::UnboundedReceiver<Interrupt>,
}

impl InterruptChannel {
    /// Creates a connected handle/channel pair.
    pub fn pair() -> (InterruptHandle, InterruptChannel) {
        let (tx, rx) = mpsc::unbounded_channel();
        (InterruptHandle { tx }, InterruptChannel { rx })
    }
}

#[async_trait]
impl InterruptSource for InterruptChannel {
    async fn next(&mut self) -> Option<Interrupt> {
        self.rx.recv().await
    }
}

/// Chains a panic hook that reports every panic as an emergency interrupt.
///
/// Panics the runtime isolates (subscribers, sessions, components) pass through
/// the hook too, so install it only when any panic should stop the process.
pub fn install_panic_hook(handle: InterruptHandle) {
    let previous = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let location = info
            .location()
            .map(|l| format!(" at {}:{}", l.file(), l.line()))
            .unwrap_or_default();
        let message = crate::subscribers::panic_message(info.payload());
        handle.fault(format!("panic: {message}{location}"));
        previous(info);
    }));
}
