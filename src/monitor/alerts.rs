//! # Alert book: active alerts, history, and emission gates.
//!
//! ```text
//! raise(id)
//!   ├─ id active, same or higher severity? → Duplicate   (no-op)
//!   ├─ id active, lower severity?
//!   │    ├─ ≥ max_per_hour fired last hour?  → RateLimited (active alert kept)
//!   │    └─ close old record, record new     → Escalated
//!   ├─ same id fired < cooldown ago?       → Cooldown    (suppressed)
//!   ├─ ≥ max_per_hour fired last hour?     → RateLimited (suppressed)
//!   └─ record: active[id], history.push, fired_at[id], hourly.push → Raised
//! ```
//!
//! Escalation skips the cooldown: the cooldown throttles refiring the same
//! condition, not a worsening one. History is append-only apart from retention
//! eviction ([`AlertBook::evict`]).

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, SystemTime};

use serde::Serialize;
use tokio::time::Instant;

const HOUR: Duration = Duration::from_secs(60 * 60);

/// Severity of a raised alert.
/// Ordered: `Warning < Critical`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    /// Degraded but self-healing.
    Warning,
    /// Needs recovery or operator attention.
    Critical,
}

impl AlertSeverity {
    /// Stable lower-case name.
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertSeverity::Warning => "warning",
            AlertSeverity::Critical => "critical",
        }
    }
}

/// A raised alert.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Alert {
    /// Stable id, one live alert per id.
    pub id: String,
    /// Severity at the time it was raised.
    pub severity: AlertSeverity,
    /// Human-readable description.
    pub message: String,
    /// Wall-clock time it was first raised.
    pub first_raised_at: SystemTime,
    /// Structured context (measured value, thresholds, ...).
    pub data: serde_json::Value,
}

/// History entry: the alert and, once cleared, when it resolved.
#[derive(Clone, Debug, PartialEq)]
pub struct AlertRecord {
    /// Raised alert.
    pub alert: Alert,
    /// Monotonic time it was raised (for retention).
    pub raised: Instant,
    /// Wall-clock time it resolved, if it has.
    pub resolved_at: Option<SystemTime>,
}

/// Outcome of [`AlertBook::raise`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RaiseOutcome {
    /// Passed all gates and was recorded.
    Raised,
    /// Replaced an active alert of the same id at a lower severity.
    Escalated,
    /// An alert with the same id is already active at this severity or higher.
    Duplicate,
    /// Same id fired within the cooldown.
    Cooldown,
    /// Hourly cap reached.
    RateLimited,
}

/// Gate settings.
#[derive(Clone, Copy, Debug)]
pub struct AlertGates {
    /// Minimum gap between firings of one id.
    pub cooldown: Duration,
    /// Cap on firings per rolling hour.
    pub max_per_hour: u32,
    /// How long history entries are kept.
    pub retention: Duration,
}

/// Active alerts plus history, owned by the monitor.
#[derive(Debug)]
pub struct AlertBook {
    gates: AlertGates,
    active: HashMap<String, Alert>,
    history: VecDeque<AlertRecord>,
    last_fired: HashMap<String, Instant>,
    hourly: VecDeque<Instant>,
}

impl AlertBook {
    /// Creates an empty book.
    pub fn new(gates: AlertGates) -> Self {
        Self {
            gates,
            active: HashMap::new(),
            history: VecDeque::new(),
            last_fired: HashMap::new(),
            hourly: VecDeque::new(),
        }
    }

    /// Runs the gates and records the alert if it passes.
    pub fn raise(&mut self, alert: Alert, now: Instant) -> RaiseOutcome {
        if let Some(active) = self.active.get(&alert.id) {
            if alert.severity <= active.severity {
                return RaiseOutcome::Duplicate;
            }
            if self.hourly_cap_reached(now) {
                return RaiseOutcome::RateLimited;
            }
            self.close_record(&alert.id, alert.first_raised_at);
            self.record(alert, now);
            return RaiseOutcome::Escalated;
        }
        if let Some(last) = self.last_fired.get(&alert.id) {
            if now.saturating_duration_since(*last) < self.gates.cooldown {
                return RaiseOutcome::Cooldown;
            }
        }
        if self.hourly_cap_reached(now) {
            return RaiseOutcome::RateLimited;
        }
        self.record(alert, now);
        RaiseOutcome::Raised
    }

    /// Removes an active alert. Returns `true` if it was active.
    pub fn resolve(&mut self, id: &str, at: SystemTime) -> bool {
        if self.active.remove(id).is_none() {
            return false;
        }
        self.close_record(id, at);
        true
    }

    fn hourly_cap_reached(&mut self, now: Instant) -> bool {
        while self
            .hourly
            .front()
            .is_some_and(|oldest| now.saturating_duration_since(*oldest) >= HOUR)
        {
            self.hourly.pop_front();
        }
        self.hourly.len() >= self.gates.max_per_hour as usize
    }

    fn record(&mut self, alert: Alert, now: Instant) {
        self.last_fired.insert(alert.id.clone(), now);
        self.hourly.push_back(now);
        self.history.push_back(AlertRecord {
            alert: alert.clone(),
            raised: now,
            resolved_at: None,
        });
        self.active.insert(alert.id.clone(), alert);
    }

    fn close_record(&mut self, id: &str, at: SystemTime) {
        if let Some(rec) = self
            .history
            .iter_mut()
            .rev()
            .find(|r| r.alert.id == id && r.resolved_at.is_none())
        {
            rec.resolved_at = Some(at);
        }
    }

    /// Drops history entries older than the retention window.
    ///
    /// Active alerts are never evicted.
    pub fn evict(&mut self, now: Instant) -> usize {
        let retention = self.gates.retention;
        let active = &self.active;
        let before = self.history.len();
        self.history.retain(|r| {
            now.saturating_duration_since(r.raised) < retention || active.contains_key(&r.alert.id)
        });
        before - self.history.len()
    }

    /// True if an alert with `id` is active.
    pub fn is_active(&self, id: &str) -> bool {
        self.active.contains_key(id)
    }

    /// Active alerts sorted by id.
    pub fn active(&self) -> Vec<Alert> {
        let mut v: Vec<Alert> = self.active.values().cloned().collect();
        v.sort_by(|a, b| a.id.cmp(&b.id));
        v
    }

    /// History, oldest first.
    pub fn history(&self) -> impl Iterator<Item = &AlertRecord> {
        self.history.iter()
    }
}
