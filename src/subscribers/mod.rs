//! # Event subscribers for the cycle runtime.
//!
//! This module provides the asynchronous [`Subscribe`] trait, the bounded
//! fan-out [`SubscriberSet`], and the built-in [`LogWriter`].
//!
//! ## Architecture
//! ```text
//! Orchestrator / Monitor / Coordinator
//!        │ publish(Event)
//!        ▼
//!       Bus ──► broadcast ──► runtime listener ──► SubscriberSet::emit
//!                                                    ├──► LogWriter
//!                                                    ├──► Metrics exporter
//!                                                    └──► ...
//! ```

#[cfg(feature = "logging")]
mod log;
mod set;
mod subscribe;

#[cfg(feature = "logging")]
pub use log::LogWriter;
pub(crate) use set::panic_message;
pub use set::SubscriberSet;
pub use subscribe::Subscribe;
