//! # Crawl session capability.
//!
//! The orchestrator does not crawl. When a session window opens it calls the
//! configured [`CrawlSession`] with a [`SessionContext`] whose token is
//! cancelled when the window closes (timer, explicit terminate, or stop).
//!
//! A session returning early does not end the window; the window always runs
//! its planned duration. Errors are recorded and count toward restart validation.
//!
//! ## Example
//! ```rust
//! use cyclevisor::{SessionFn, SessionRef, SessionContext, SessionError};
//!
//! let crawl: SessionRef = SessionFn::arc("crawler", |ctx: SessionContext| async move {
//!     while !ctx.token.is_cancelled() {
//!         // visit next page...
//!         tokio::task::yield_now().await;
//!     }
//!     Ok::<_, SessionError>(())
//! });
//! assert_eq!(crawl.name(), "crawler");
//! ```

use std::borrow::Cow;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Boxed future returned by [`CrawlSession::run`].
pub type BoxSessionFuture = Pin<Box<dyn Future<Output = Result<(), SessionError>> + Send + 'static>>;

/// Shared handle to a session implementation.
pub type SessionRef = Arc<dyn CrawlSession>;

/// Error returned by a crawl session.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("session failed: {0}")]
pub struct SessionError(pub String);

impl SessionError {
    /// Creates an error from any displayable value.
    pub fn new(msg: impl std::fmt::Display) -> Self {
        Self(msg.to_string())
    }
}

/// Arguments handed to one session run.
#[derive(Clone, Debug)]
pub struct SessionContext {
    /// Cycle number of the window.
    pub cycle: u64,
    /// Cancelled when the window closes.
    pub token: CancellationToken,
}

/// Opaque crawl work executed inside a session window.
pub trait CrawlSession: Send + Sync + 'static {
    /// Stable, human-readable name.
    fn name(&self) -> &str;

    /// Creates the future for one window; it should return once `ctx.token` is cancelled.
    fn run(&self, ctx: SessionContext) -> BoxSessionFuture;
}

/// Function-backed session: a closure that creates a fresh future per window.
#[derive(Debug)]
pub struct SessionFn<F> {
    name: Cow<'static, str>,
    f: F,
}

impl<F> SessionFn<F> {
    /// Creates a new function-backed session.
    pub fn new(name: impl Into<Cow<'static, str>>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }

    /// Creates the session and returns it as a shared handle.
    pub fn arc(name: impl Into<Cow<'static, str>>, f: F) -> Arc<Self> {
        Arc::new(Self::new(name, f))
    }
}

impl<F, Fut> CrawlSession for SessionFn<F>
where
    F: Fn(SessionContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), SessionError>> + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn run(&self, ctx: SessionContext) -> BoxSessionFuture {
        Box::pin((self.f)(ctx))
    }
}
