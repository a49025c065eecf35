//! # Core subscriber trait
//!
//! `Subscribe` is the extension point for slow event consumers (metrics
//! exporters, log shippers, audit sinks). Each subscriber is driven by a
//! dedicated worker fed by a bounded queue owned by the
//! [`SubscriberSet`](crate::SubscriberSet), so it never delays the cycle.
//!
//! For fast, ordered, in-line handling use [`Observe`](crate::Observe) instead.
//!
//! ## Example
//! ```rust
//! use cyclevisor::{Event, EventKind, Subscribe};
//!
//! struct AlertCounter(std::sync::atomic::AtomicU64);
//!
//! #[async_trait::async_trait]
//! impl Subscribe for AlertCounter {
//!     async fn on_event(&self, ev: &Event) {
//!         if ev.kind == EventKind::Alert {
//!             self.0.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
//!         }
//!     }
//!     fn name(&self) -> &'static str { "alert-counter" }
//! }
//! ```

use crate::events::Event;
use async_trait::async_trait;

/// Contract for asynchronous event subscribers.
#[async_trait]
pub trait Subscribe: Send + Sync + 'static {
    /// Handle a single event for this subscriber.
    async fn on_event(&self, event: &Event);

    /// Human-readable name (for logs/metrics).
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Preferred capacity of this subscriber's queue.
    ///
    /// On overflow, events for this subscriber are **dropped** (warn).
    fn queue_capacity(&self) -> usize {
        1024
    }
}
