//! # Runtime configuration.
//!
//! Provides [`Config`] the single owned settings struct for the cycle runtime.
//! It is built once, validated by [`Config::validate`], and moved into the
//! [`RuntimeBuilder`](crate::RuntimeBuilder); components receive their own clone
//! and never mutate it.
//!
//! ## Sentinel values
//! - `clock_sync_interval = 0s` → no periodic clock sync
//! - `health_check_interval = 0s` → no in-session health checks
//! - `cleanup_freshness = 0s` → derived as `idle_period + 5min`
//! - `monitor_interval = 0s` → falls back to `health_check_interval` (or 30s)

use std::time::Duration;

use crate::error::ConfigError;
use crate::policies::BackoffPolicy;

/// Global configuration for the cycle runtime.
///
/// Groups:
/// - **Cycle**: session/idle durations, clock sync, restart policy
/// - **Validation**: thresholds checked before every restart
/// - **Monitor**: health thresholds, alert gates, auto recovery
/// - **Shutdown**: watchdog timeouts, exit behaviour, state persistence
/// - **Runtime**: bus capacity, history retention
#[derive(Clone, Debug)]
pub struct Config {
    /// Length of one active crawl session.
    pub session_duration: Duration,
    /// Mandatory pause between a session's cleanup and the next restart.
    pub idle_period: Duration,
    /// Interval between clock-sync passes while a session runs (`0s` = disabled).
    pub clock_sync_interval: Duration,
    /// Consecutive failed restarts tolerated before the cycle halts.
    pub max_restart_attempts: u32,
    /// Delay between failed restart attempts.
    pub restart_backoff: BackoffPolicy,

    /// Resident memory (MB) above which a restart is refused.
    pub critical_memory_mb: u64,
    /// Maximum age of the last cleanup accepted at restart (`0s` = derived).
    pub cleanup_freshness: Duration,
    /// Maximum open handles (files, sockets) accepted at restart.
    pub max_tracked_resources: u64,
    /// Maximum errors recorded in the last 5 minutes accepted at restart.
    pub max_recent_errors: usize,

    /// Interval of in-session health checks (`0s` = disabled).
    pub health_check_interval: Duration,
    /// Sampling interval of the health monitor (`0s` = derived).
    pub monitor_interval: Duration,
    /// Process memory (MB) treated as 100% for the memory dimension.
    pub memory_threshold_mb: u64,
    /// Error rate (%) at which the error-rate dimension turns critical.
    pub error_rate_threshold_pct: f64,
    /// Average response time (ms) at which the response-time dimension turns warning.
    pub response_time_threshold_ms: u64,
    /// Security violations in the observation window that turn the dimension critical.
    pub security_violation_threshold: u32,
    /// Minimum gap between two firings of the same alert id.
    pub alert_cooldown: Duration,
    /// Cap on alerts raised in any rolling hour.
    pub max_alerts_per_hour: u32,
    /// How long resolved alerts stay in history.
    pub alert_retention: Duration,
    /// Run recovery actions for critical alerts.
    pub enable_auto_recovery: bool,
    /// Total recovery actions allowed for the runtime's lifetime.
    pub recovery_attempts: u32,
    /// Pause before a recovery action runs.
    pub recovery_delay: Duration,

    /// Graceful shutdown budget (non-emergency only).
    pub graceful_timeout: Duration,
    /// Hard budget after which the process is terminated.
    pub force_timeout: Duration,
    /// Deadline for one reclaimer call.
    pub cleanup_timeout: Duration,
    /// Terminate the process after a completed shutdown.
    pub exit_on_complete: bool,
    /// Exit status used after a completed shutdown.
    pub exit_code: i32,
    /// Persist shutdown intent before tearing components down.
    pub save_state_on_shutdown: bool,

    /// Capacity of the event bus broadcast ring buffer (min 1).
    pub bus_capacity: usize,
    /// Number of closed session/idle windows kept for reporting.
    pub history_limit: usize,
}

impl Config {
    /// Returns the clock-sync interval as an `Option` (`None` = disabled).
    #[inline]
    pub fn clock_sync_every(&self) -> Option<Duration> {
        non_zero(self.clock_sync_interval)
    }

    /// Returns the in-session health-check interval as an `Option` (`None` = disabled).
    #[inline]
    pub fn health_check_every(&self) -> Option<Duration> {
        non_zero(self.health_check_interval)
    }

    /// Returns the monitor sampling interval.
    ///
    /// Falls back to `health_check_interval`, then to 30s.
    #[inline]
    pub fn monitor_every(&self) -> Duration {
        non_zero(self.monitor_interval)
            .or_else(|| self.health_check_every())
            .unwrap_or(Duration::from_secs(30))
    }

    /// Returns the accepted age of the last cleanup at restart.
    #[inline]
    pub fn cleanup_freshness_window(&self) -> Duration {
        non_zero(self.cleanup_freshness).unwrap_or(self.idle_period + Duration::from_secs(300))
    }

    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }

    /// Checks the values the runtime cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let durations = [
            ("session_duration", self.session_duration),
            ("idle_period", self.idle_period),
            ("graceful_timeout", self.graceful_timeout),
            ("force_timeout", self.force_timeout),
            ("cleanup_timeout", self.cleanup_timeout),
        ];
        for (field, value) in durations {
            if value.is_zero() {
                return Err(ConfigError::ZeroDuration { field });
            }
        }
        if self.max_restart_attempts == 0 {
            return Err(ConfigError::ZeroLimit {
                field: "max_restart_attempts",
            });
        }
        if self.max_alerts_per_hour == 0 {
            return Err(ConfigError::ZeroLimit {
                field: "max_alerts_per_hour",
            });
        }
        if self.force_timeout < self.graceful_timeout {
            return Err(ConfigError::ForceBeforeGraceful {
                graceful: self.graceful_timeout,
                force: self.force_timeout,
            });
        }
        Ok(())
    }
}

fn non_zero(d: Duration) -> Option<Duration> {
    if d.is_zero() { None } else { Some(d) }
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - 2h sessions, 30min idle, clock sync every 5min, 3 restart attempts
    /// - linear restart backoff `min(30s, 5s × attempt)`
    /// - 2GB critical memory, 1000 open handles, 10 errors per 5min
    /// - health checks every 30s, alerts with 5min cooldown and 20/hour cap
    /// - 30s graceful / 60s force shutdown, 30s cleanup deadline
    fn default() -> Self {
        Self {
            session_duration: Duration::from_secs(2 * 60 * 60),
            idle_period: Duration::from_secs(30 * 60),
            clock_sync_interval: Duration::from_secs(5 * 60),
            max_restart_attempts: 3,
            restart_backoff: BackoffPolicy::default(),

            critical_memory_mb: 2048,
            cleanup_freshness: Duration::ZERO,
            max_tracked_resources: 1000,
            max_recent_errors: 10,

            health_check_interval: Duration::from_secs(30),
            monitor_interval: Duration::ZERO,
            memory_threshold_mb: 1024,
            error_rate_threshold_pct: 10.0,
            response_time_threshold_ms: 5_000,
            security_violation_threshold: 5,
            alert_cooldown: Duration::from_secs(5 * 60),
            max_alerts_per_hour: 20,
            alert_retention: Duration::from_secs(24 * 60 * 60),
            enable_auto_recovery: true,
            recovery_attempts: 3,
            recovery_delay: Duration::from_secs(5),

            graceful_timeout: Duration::from_secs(30),
            force_timeout: Duration::from_secs(60),
            cleanup_timeout: Duration::from_secs(30),
            exit_on_complete: true,
            exit_code: 0,
            save_state_on_shutdown: true,

            bus_capacity: 1024,
            history_limit: 100,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert_eq!(Config::default().validate(), Ok(()));
    }

    #[test]
    fn sentinels_resolve() {
        let mut cfg = Config::default();
        cfg.clock_sync_interval = Duration::ZERO;
        cfg.health_check_interval = Duration::ZERO;
        cfg.idle_period = Duration::from_secs(60);
        assert_eq!(cfg.clock_sync_every(), None);
        assert_eq!(cfg.health_check_every(), None);
        assert_eq!(cfg.monitor_every(), Duration::from_secs(30));
        assert_eq!(cfg.cleanup_freshness_window(), Duration::from_secs(360));

        cfg.monitor_interval = Duration::from_secs(7);
        assert_eq!(cfg.monitor_every(), Duration::from_secs(7));
    }

    #[test]
    fn rejects_force_shorter_than_graceful() {
        let mut cfg = Config::default();
        cfg.graceful_timeout = Duration::from_secs(10);
        cfg.force_timeout = Duration::from_secs(5);
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::ForceBeforeGraceful { .. })
        ));
    }

    #[test]
    fn rejects_zero_session() {
        let mut cfg = Config::default();
        cfg.session_duration = Duration::ZERO;
        assert_eq!(
            cfg.validate(),
            Err(ConfigError::ZeroDuration {
                field: "session_duration"
            })
        );
    }
}
