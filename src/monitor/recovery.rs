//! Remediation hooks for critical alerts.
//!
//! Memory recovery is built in (a forced reclaim pass). Cycle recovery is
//! delegated to a [`RecoveryHook`]; the default [`NoopRecovery`] only logs.

use async_trait::async_trait;

use crate::cycle::CycleStatus;

/// Cycle-specific remediation, run when the cycle dimension turns critical.
#[async_trait]
pub trait RecoveryHook: Send + Sync + 'static {
    /// Attempts to recover the cycle. Returns `true` on success.
    async fn recover_cycle(&self, status: &CycleStatus) -> bool;
}

/// Hook that does nothing and reports success.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopRecovery;

#[async_trait]
impl RecoveryHook for NoopRecovery {
    async fn recover_cycle(&self, status: &CycleStatus) -> bool {
        tracing::info!(phase = %status.phase, restart_attempts = status.restart_attempts, "no cycle recovery configured");
        true
    }
}
