//! # Backoff policy for restart attempts.
//!
//! [`BackoffPolicy`] controls how long the orchestrator waits before retrying a
//! failed restart. The delay grows linearly with the attempt number:
//! - [`BackoffPolicy::step`] the delay added per attempt;
//! - [`BackoffPolicy::max`] the maximum delay cap.
//!
//! The default is the schedule `min(30s, 5s × attempt)`.
//!
//! # Example
//! ```rust
//! use std::time::Duration;
//! use cyclevisor::BackoffPolicy;
//!
//! let backoff = BackoffPolicy::default();
//!
//! assert_eq!(backoff.next(1), Duration::from_secs(5));
//! assert_eq!(backoff.next(3), Duration::from_secs(15));
//! // 5s × 10 = 50s → capped at max=30s
//! assert_eq!(backoff.next(10), Duration::from_secs(30));
//! ```

use std::time::Duration;

/// Restart backoff policy.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BackoffPolicy {
    /// Delay added per attempt.
    pub step: Duration,
    /// Maximum delay cap.
    pub max: Duration,
}

impl Default for BackoffPolicy {
    /// Returns `min(30s, 5s × attempt)`.
    fn default() -> Self {
        Self {
            step: Duration::from_secs(5),
            max: Duration::from_secs(30),
        }
    }
}

impl BackoffPolicy {
    /// Computes the delay before retry number `attempt` (1-based; `0` is treated as `1`).
    pub fn next(&self, attempt: u32) -> Duration {
        let attempt = attempt.max(1);
        self.step
            .checked_mul(attempt)
            .map_or(self.max, |d| d.min(self.max))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linear_schedule_is_capped() {
        let policy = BackoffPolicy::default();
        assert_eq!(policy.next(1), Duration::from_secs(5));
        assert_eq!(policy.next(2), Duration::from_secs(10));
        assert_eq!(policy.next(6), Duration::from_secs(30));
        assert_eq!(policy.next(7), Duration::from_secs(30));
        assert_eq!(policy.next(u32::MAX), Duration::from_secs(30));
    }

    #[test]
    fn attempt_zero_behaves_like_first() {
        let policy = BackoffPolicy::default();
        assert_eq!(policy.next(0), policy.next(1));
    }

    #[test]
    fn step_exceeding_max_clamps() {
        let policy = BackoffPolicy {
            step: Duration::from_secs(60),
            max: Duration::from_secs(5),
        };
        assert_eq!(policy.next(1), Duration::from_secs(5));
    }

    #[test]
    fn overflowing_step_clamps() {
        let policy = BackoffPolicy {
            step: Duration::MAX,
            max: Duration::from_secs(30),
        };
        assert_eq!(policy.next(3), Duration::from_secs(30));
    }
}
