//! Request and security feeds over a sliding observation window.

use std::collections::VecDeque;
use std::time::Duration;

use tokio::time::Instant;

/// How far back the error-rate, response-time and security dimensions look.
pub const OBSERVATION_WINDOW: Duration = Duration::from_secs(5 * 60);

#[derive(Clone, Copy, Debug)]
struct Request {
    at: Instant,
    ok: bool,
    latency: Duration,
}

/// Aggregates of the current window.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub(crate) struct WindowStats {
    pub requests: usize,
    pub error_rate_pct: f64,
    pub avg_response_ms: f64,
    pub security_violations: u32,
}

/// Requests and violations seen within [`OBSERVATION_WINDOW`].
#[derive(Debug, Default)]
pub(crate) struct Feed {
    requests: VecDeque<Request>,
    violations: VecDeque<Instant>,
}

impl Feed {
    pub fn record_request(&mut self, at: Instant, ok: bool, latency: Duration) {
        self.prune(at);
        self.requests.push_back(Request { at, ok, latency });
    }

    pub fn record_violation(&mut self, at: Instant) {
        self.prune(at);
        self.violations.push_back(at);
    }

    /// Drops entries older than the window and aggregates the rest.
    pub fn stats(&mut self, now: Instant) -> WindowStats {
        self.prune(now);

        let requests = self.requests.len();
        if requests == 0 {
            return WindowStats {
                security_violations: self.violations.len() as u32,
                ..WindowStats::default()
            };
        }
        let failed = self.requests.iter().filter(|r| !r.ok).count();
        let total_ms: f64 = self
            .requests
            .iter()
            .map(|r| r.latency.as_secs_f64() * 1000.0)
            .sum();

        WindowStats {
            requests,
            error_rate_pct: failed as f64 / requests as f64 * 100.0,
            avg_response_ms: total_ms / requests as f64,
            security_violations: self.violations.len() as u32,
        }
    }

    fn prune(&mut self, now: Instant) {
        let fresh = |at: Instant| now.saturating_duration_since(at) < OBSERVATION_WINDOW;
        while self.requests.front().is_some_and(|r| !fresh(r.at)) {
            self.requests.pop_front();
        }
        while self.violations.front().is_some_and(|at| !fresh(*at)) {
            self.violations.pop_front();
        }
    }
}
