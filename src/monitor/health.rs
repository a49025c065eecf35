//! # Health classification.
//!
//! Each monitor tick classifies five fixed dimensions, always in this order:
//!
//! | Dimension | Warning | Critical |
//! |---|---|---|
//! | memory | rss ≥ 80% of `memory_threshold_mb` | rss ≥ `memory_threshold_mb` |
//! | cycle | restart attempts pending | phase `ErrorHalted` |
//! | error rate | ≥ half of `error_rate_threshold_pct` | ≥ `error_rate_threshold_pct` |
//! | response time | ≥ `response_time_threshold_ms` | ≥ 2 × threshold |
//! | security | ≥ 1 violation | ≥ `security_violation_threshold` |
//!
//! External component readings follow. Overall health is the worst level seen,
//! except that three or more non-healthy dimensions force `Critical`.

use std::fmt;
use std::time::SystemTime;

use serde::Serialize;

use crate::core::Config;
use crate::cycle::{CyclePhase, CycleStatus};

/// Classification of one dimension (ordered: `Healthy < Warning < Critical`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthLevel {
    /// Within thresholds.
    Healthy,
    /// Degraded; alert raised as a warning.
    Warning,
    /// Out of bounds; alert raised as critical, recovery may run.
    Critical,
}

impl HealthLevel {
    /// Stable lower-case name.
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthLevel::Healthy => "healthy",
            HealthLevel::Warning => "warning",
            HealthLevel::Critical => "critical",
        }
    }
}

impl fmt::Display for HealthLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a dimension measures.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Dimension {
    /// Process resident memory.
    Memory,
    /// Cycle orchestrator phase and restart state.
    Cycle,
    /// Failed requests in the observation window.
    ErrorRate,
    /// Average request latency in the observation window.
    ResponseTime,
    /// Security violations in the observation window.
    Security,
    /// External component by name.
    Component(String),
}

impl Dimension {
    /// Alert id used for this dimension.
    pub fn alert_id(&self) -> String {
        match self {
            Dimension::Memory => "memory".into(),
            Dimension::Cycle => "cycle".into(),
            Dimension::ErrorRate => "error_rate".into(),
            Dimension::ResponseTime => "response_time".into(),
            Dimension::Security => "security".into(),
            Dimension::Component(name) => format!("component:{name}"),
        }
    }
}

/// Classification of one dimension on one tick.
#[derive(Clone, Debug, PartialEq)]
pub struct DimensionHealth {
    /// Dimension measured.
    pub dimension: Dimension,
    /// Classification.
    pub level: HealthLevel,
    /// Measured value (MB, %, ms, count, attempts).
    pub value: f64,
    /// Human-readable description.
    pub message: String,
}

/// Result of one monitor tick.
#[derive(Clone, Debug, PartialEq)]
pub struct HealthReport {
    /// Wall-clock time of the tick.
    pub at: SystemTime,
    /// Overall classification.
    pub level: HealthLevel,
    /// Per-dimension results, in evaluation order.
    pub dimensions: Vec<DimensionHealth>,
    /// Number of non-healthy dimensions.
    pub issues: usize,
    /// Cleanup failures observed since the monitor started.
    pub cleanup_failures: u64,
}

/// Inputs for one tick's fixed dimensions.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Readings<'a> {
    pub rss_mb: u64,
    pub cycle: &'a CycleStatus,
    pub error_rate_pct: f64,
    pub avg_response_ms: f64,
    pub security_violations: u32,
}

/// Classifies the five fixed dimensions in evaluation order.
pub(crate) fn classify(cfg: &Config, r: Readings<'_>) -> Vec<DimensionHealth> {
    vec![
        memory(cfg, r.rss_mb),
        cycle(r.cycle),
        error_rate(cfg, r.error_rate_pct),
        response_time(cfg, r.avg_response_ms),
        security(cfg, r.security_violations),
    ]
}

/// Worst level, or `Critical` when three or more dimensions have issues.
pub(crate) fn overall(dimensions: &[DimensionHealth]) -> (HealthLevel, usize) {
    let issues = dimensions
        .iter()
        .filter(|d| d.level != HealthLevel::Healthy)
        .count();
    let worst = dimensions
        .iter()
        .map(|d| d.level)
        .max()
        .unwrap_or(HealthLevel::Healthy);
    let level = if issues >= 3 {
        HealthLevel::Critical
    } else {
        worst
    };
    (level, issues)
}

fn memory(cfg: &Config, rss_mb: u64) -> DimensionHealth {
    let limit = cfg.memory_threshold_mb.max(1);
    let pct = rss_mb as f64 / limit as f64 * 100.0;
    let level = if rss_mb >= limit {
        HealthLevel::Critical
    } else if pct >= 80.0 {
        HealthLevel::Warning
    } else {
        HealthLevel::Healthy
    };
    DimensionHealth {
        dimension: Dimension::Memory,
        level,
        value: rss_mb as f64,
        message: format!("memory {rss_mb}MB ({pct:.1}% of {limit}MB)"),
    }
}

fn cycle(status: &CycleStatus) -> DimensionHealth {
    let (level, message) = match status.phase {
        CyclePhase::ErrorHalted => (
            HealthLevel::Critical,
            format!(
                "cycle halted after {} failed restarts",
                status.restart_attempts
            ),
        ),
        _ if status.restart_attempts > 0 => (
            HealthLevel::Warning,
            format!(
                "cycle restarting, {} failed attempts",
                status.restart_attempts
            ),
        ),
        phase => (HealthLevel::Healthy, format!("cycle {phase}")),
    };
    DimensionHealth {
        dimension: Dimension::Cycle,
        level,
        value: f64::from(status.restart_attempts),
        message,
    }
}

fn error_rate(cfg: &Config, pct: f64) -> DimensionHealth {
    let limit = cfg.error_rate_threshold_pct;
    let level = if pct >= limit {
        HealthLevel::Critical
    } else if pct >= limit / 2.0 {
        HealthLevel::Warning
    } else {
        HealthLevel::Healthy
    };
    DimensionHealth {
        dimension: Dimension::ErrorRate,
        level,
        value: pct,
        message: format!("error rate {pct:.1}% (limit {limit:.1}%)"),
    }
}

fn response_time(cfg: &Config, avg_ms: f64) -> DimensionHealth {
    let limit = cfg.response_time_threshold_ms as f64;
    let level = if avg_ms >= limit * 2.0 {
        HealthLevel::Critical
    } else if avg_ms >= limit {
        HealthLevel::Warning
    } else {
        HealthLevel::Healthy
    };
    DimensionHealth {
        dimension: Dimension::ResponseTime,
        level,
        value: avg_ms,
        message: format!("avg response {avg_ms:.0}ms (limit {limit:.0}ms)"),
    }
}

fn security(cfg: &Config, violations: u32) -> DimensionHealth {
    let level = if violations >= cfg.security_violation_threshold.max(1) {
        HealthLevel::Critical
    } else if violations > 0 {
        HealthLevel::Warning
    } else {
        HealthLevel::Healthy
    };
    DimensionHealth {
        dimension: Dimension::Security,
        level,
        value: f64::from(violations),
        message: format!("{violations} security violations"),
    }
}
