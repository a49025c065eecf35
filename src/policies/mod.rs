//! Restart retry policy.
//!
//! This module holds the knob that controls **how long** the cycle
//! orchestrator waits between failed restart attempts. Whether to retry at all
//! is decided by `Config::max_restart_attempts`.
//!
//! ## Defaults
//! - `BackoffPolicy::default()` → `min(30s, 5s × attempt)`.

mod backoff;

pub use backoff::BackoffPolicy;
