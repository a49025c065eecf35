//! # Resource probes.
//!
//! [`ResourceProbe`] reads process resource usage; [`SystemProbe`] is the
//! `sysinfo`-backed implementation. [`ComponentProbe`] lets external
//! collaborators (work queues, proxy pools) report their own health.

use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};

use super::health::HealthLevel;

const MB: u64 = 1024 * 1024;

/// One reading of the process' resource usage.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ResourceSample {
    /// Resident set size in bytes.
    pub rss_bytes: u64,
    /// CPU usage since the previous sample (% of one core).
    pub cpu_pct: f32,
    /// Open handles (file descriptors, sockets); `None` when the platform can't tell.
    pub open_handles: Option<u64>,
}

impl ResourceSample {
    /// Resident memory in whole megabytes.
    #[inline]
    pub fn rss_mb(&self) -> u64 {
        self.rss_bytes / MB
    }
}

/// Source of process resource readings.
pub trait ResourceProbe: Send + Sync + 'static {
    /// Takes one sample. Must not block for long.
    fn sample(&self) -> ResourceSample;
}

/// `sysinfo`-backed probe for the current process.
pub struct SystemProbe {
    pid: Option<Pid>,
    sys: Mutex<System>,
}

impl std::fmt::Debug for SystemProbe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SystemProbe").field("pid", &self.pid).finish()
    }
}

impl Default for SystemProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemProbe {
    /// Creates a probe for the current process.
    pub fn new() -> Self {
        let pid = match sysinfo::get_current_pid() {
            Ok(pid) => Some(pid),
            Err(e) => {
                tracing::warn!(error = e, "cannot resolve current pid; resource samples will be empty");
                None
            }
        };
        Self {
            pid,
            sys: Mutex::new(System::new()),
        }
    }
}

impl ResourceProbe for SystemProbe {
    fn sample(&self) -> ResourceSample {
        let Some(pid) = self.pid else {
            return ResourceSample::default();
        };

        let mut sys = self.sys.lock().unwrap_or_else(PoisonError::into_inner);
        sys.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[pid]),
            true,
            ProcessRefreshKind::nothing().with_memory().with_cpu(),
        );

        let (rss_bytes, cpu_pct) = sys
            .process(pid)
            .map(|p| (p.memory(), p.cpu_usage()))
            .unwrap_or_default();

        ResourceSample {
            rss_bytes,
            cpu_pct,
            open_handles: open_handles(),
        }
    }
}

#[cfg(target_os = "linux")]
fn open_handles() -> Option<u64> {
    std::fs::read_dir("/proc/self/fd")
        .ok()
        .map(|dir| dir.filter_map(Result::ok).count() as u64)
}

#[cfg(not(target_os = "linux"))]
fn open_handles() -> Option<u64> {
    None
}

/// Health reported by an external component.
#[derive(Clone, Debug, PartialEq)]
pub struct ComponentReading {
    /// Classification chosen by the component.
    pub level: HealthLevel,
    /// Numeric value behind the level (queue depth, pool size, ...).
    pub value: f64,
    /// Short description for the alert message.
    pub message: String,
}

/// External component polled on every monitor tick.
#[async_trait]
pub trait ComponentProbe: Send + Sync + 'static {
    /// Stable name; alerts use the id `component:<name>`.
    fn name(&self) -> &str;

    /// Reads the component's current health.
    async fn read(&self) -> ComponentReading;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rss_mb_rounds_down() {
        let s = ResourceSample {
            rss_bytes: 3 * MB + 10,
            ..ResourceSample::default()
        };
        assert_eq!(s.rss_mb(), 3);
    }

    #[test]
    fn system_probe_reads_own_process() {
        let sample = SystemProbe::new().sample();
        assert!(sample.rss_bytes > 0);
    }
}
