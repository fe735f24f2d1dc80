//! Types for the staging orchestrator.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur during orchestration.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// Ledger error.
    #[error("ledger error: {0}")]
    Ledger(#[from] crate::ledger::LedgerError),

    /// Destination resolution error.
    #[error("resolver error: {0}")]
    Resolve(#[from] crate::resolver::ResolveError),
}

/// Current status of the orchestrator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrchestratorStatus {
    /// Whether the orchestrator is running.
    pub running: bool,
    /// Requests waiting to be claimed.
    pub requested_count: usize,
    /// Requests claimed and in flight.
    pub pending_count: usize,
    /// Requests deferred by admission.
    pub queued_count: usize,
    /// Requests that failed.
    pub failed_count: usize,
    /// Requests delivered and inside their retention window.
    pub success_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_orchestrator_status_default() {
        let status = OrchestratorStatus::default();
        assert!(!status.running);
        assert_eq!(status.requested_count, 0);
        assert_eq!(status.pending_count, 0);
    }

    #[test]
    fn test_error_display() {
        let err = OrchestratorError::Ledger(crate::ledger::LedgerError::Unavailable(
            "locked".to_string(),
        ));
        assert_eq!(err.to_string(), "ledger error: ledger unavailable: locked");
    }
}
