//! # Shutdown participants.
//!
//! Every component the coordinator tears down implements [`Shutdownable`] and
//! is registered with a [`ComponentRegistration`]: a unique name, a priority
//! (higher shuts down first), a per-component deadline, a `required` flag and
//! the names of the components that must shut down before it.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use cyclevisor::{ComponentError, ComponentRegistration, ShutdownContext, ShutdownFn};
//!
//! let pool = ShutdownFn::arc(|ctx: ShutdownContext| async move {
//!     // close connections...
//!     let _ = ctx.emergency;
//!     Ok::<_, ComponentError>(())
//! });
//!
//! let reg = ComponentRegistration::new("db-pool", pool)
//!     .priority(10)
//!     .timeout(Duration::from_secs(3))
//!     .required(true)
//!     .depends_on("crawler");
//! assert_eq!(reg.name, "db-pool");
//! ```

use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::ComponentError;

/// Deadline used when a registration does not set one.
pub const DEFAULT_COMPONENT_TIMEOUT: Duration = Duration::from_secs(10);

/// Cap applied to every component deadline during an emergency shutdown.
pub const EMERGENCY_COMPONENT_TIMEOUT: Duration = Duration::from_secs(5);

/// Arguments handed to [`Shutdownable::shutdown`].
#[derive(Clone, Debug)]
pub struct ShutdownContext {
    /// Why the shutdown started (`"signal:SIGTERM"`, `"stop requested"`, ...).
    pub reason: Arc<str>,
    /// True for fault-triggered shutdowns; components should skip slow work.
    pub emergency: bool,
    /// Deadline the coordinator enforces for this call.
    pub timeout: Duration,
}

impl ShutdownContext {
    /// Creates a context.
    pub fn new(reason: impl Into<Arc<str>>, emergency: bool, timeout: Duration) -> Self {
        Self {
            reason: reason.into(),
            emergency,
            timeout,
        }
    }
}

/// A component that can be shut down by the coordinator.
#[async_trait]
pub trait Shutdownable: Send + Sync + 'static {
    /// Releases the component's resources.
    ///
    /// Runs under the coordinator's deadline; a late result is discarded.
    async fn shutdown(&self, ctx: ShutdownContext) -> Result<(), ComponentError>;
}

/// Shared handle to a shutdown participant.
pub type ComponentRef = Arc<dyn Shutdownable>;

/// Closure-backed [`Shutdownable`].
pub struct ShutdownFn<F> {
    f: F,
}

impl<F> ShutdownFn<F> {
    /// Wraps a closure.
    pub fn new(f: F) -> Self {
        Self { f }
    }

    /// Wraps a closure and returns it as a shared handle.
    pub fn arc(f: F) -> Arc<Self> {
        Arc::new(Self::new(f))
    }
}

#[async_trait]
impl<F, Fut> Shutdownable for ShutdownFn<F>
where
    F: Fn(ShutdownContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), ComponentError>> + Send + 'static,
{
    async fn shutdown(&self, ctx: ShutdownContext) -> Result<(), ComponentError> {
        (self.f)(ctx).await
    }
}

/// Registry entry for one component.
#[derive(Clone)]
pub struct ComponentRegistration {
    /// Unique key.
    pub name: String,
    /// Shutdown capability.
    pub handle: ComponentRef,
    /// Higher shuts down earlier.
    pub priority: i32,
    /// Per-call deadline (capped at 5s during emergencies).
    pub timeout: Duration,
    /// Failures are logged as errors instead of warnings.
    pub required: bool,
    /// Components that must be shut down before this one.
    pub dependencies: BTreeSet<String>,
}

impl std::fmt::Debug for ComponentRegistration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentRegistration")
            .field("name", &self.name)
            .field("priority", &self.priority)
            .field("timeout", &self.timeout)
            .field("required", &self.required)
            .field("dependencies", &self.dependencies)
            .finish()
    }
}

impl ComponentRegistration {
    /// Creates a registration with priority 0, a 10s deadline and no dependencies.
    pub fn new(name: impl Into<String>, handle: ComponentRef) -> Self {
        Self {
            name: name.into(),
            handle,
            priority: 0,
            timeout: DEFAULT_COMPONENT_TIMEOUT,
            required: false,
            dependencies: BTreeSet::new(),
        }
    }

    /// Sets the priority.
    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Sets the per-call deadline.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Marks the component as required.
    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    /// Adds a dependency that must shut down first.
    pub fn depends_on(mut self, name: impl Into<String>) -> Self {
        self.dependencies.insert(name.into());
        self
    }

    /// Deadline for one call, capped during emergencies.
    pub fn effective_timeout(&self, emergency: bool) -> Duration {
        if emergency {
            self.timeout.min(EMERGENCY_COMPONENT_TIMEOUT)
        } else {
            self.timeout
        }
    }
}

/// Result of shutting down one component.
#[derive(Clone, Debug, PartialEq)]
pub struct ComponentOutcome {
    /// Component name.
    pub name: String,
    /// Whether it was registered as required.
    pub required: bool,
    /// Time spent in the call (bounded by the deadline).
    pub duration: Duration,
    /// `None` on success.
    pub error: Option<ComponentError>,
}

impl ComponentOutcome {
    /// True when the component shut down cleanly.
    #[inline]
    pub fn success(&self) -> bool {
        self.error.is_none()
    }
}

/// Per-component results of one shutdown, in execution order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ShutdownSummary {
    /// Results in execution order.
    pub results: Vec<ComponentOutcome>,
    /// Components that shut down cleanly.
    pub successful: usize,
    /// Components that failed, timed out or panicked.
    pub failed: usize,
}

impl ShutdownSummary {
    /// Builds a summary and its counts.
    pub fn from_results(results: Vec<ComponentOutcome>) -> Self {
        let successful = results.iter().filter(|r| r.success()).count();
        let failed = results.len() - successful;
        Self {
            results,
            successful,
            failed,
        }
    }

    /// Names in execution order.
    pub fn order(&self) -> Vec<&str> {
        self.results.iter().map(|r| r.name.as_str()).collect()
    }
}
