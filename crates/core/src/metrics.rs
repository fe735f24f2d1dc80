//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Orchestrator (claims, admission, transfers, finalization)
//! - Reaper (sweeps, reclaimed datasets)
//! - Remote command execution

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts};

// =============================================================================
// Orchestrator Metrics
// =============================================================================

/// Requests claimed out of REQUESTED.
pub static REQUESTS_CLAIMED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "portage_requests_claimed_total",
        "Total requests claimed for processing",
    )
    .unwrap()
});

/// Admission decisions by outcome.
pub static ADMISSION_DECISIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "portage_admission_decisions_total",
            "Total admission decisions",
        ),
        &["decision"], // "admit", "defer_space", "defer_quota"
    )
    .unwrap()
});

/// File transfers by result.
pub static TRANSFERS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("portage_transfers_total", "Total file transfers"),
        &["result"], // "success", "failed"
    )
    .unwrap()
});

/// Per-file transfer duration in seconds.
pub static TRANSFER_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "portage_transfer_duration_seconds",
            "Duration of single file transfers",
        )
        .buckets(vec![0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 300.0, 1800.0]),
        &["result"],
    )
    .unwrap()
});

/// Requests reaching a terminal state, by status.
pub static REQUESTS_FINALIZED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "portage_requests_finalized_total",
            "Total requests moved to a terminal state",
        ),
        &["status"], // "success", "failed"
    )
    .unwrap()
});

/// Stale PENDING claims returned to REQUESTED.
pub static STALE_CLAIMS_RECLAIMED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "portage_stale_claims_reclaimed_total",
        "Total stale claims returned to the eligible pool",
    )
    .unwrap()
});

// =============================================================================
// Reaper Metrics
// =============================================================================

/// Reaper sweeps completed.
pub static REAPER_SWEEPS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("portage_reaper_sweeps_total", "Total reaper sweeps").unwrap()
});

/// Requests reaped (archived and deleted).
pub static DATASETS_REAPED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "portage_datasets_reaped_total",
        "Total requests archived and removed",
    )
    .unwrap()
});

// =============================================================================
// Remote Execution Metrics
// =============================================================================

/// Remote command duration, recorded by `RemoteShell` for every child it
/// waits on, including timeouts.
pub static REMOTE_COMMAND_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "portage_remote_command_duration_seconds",
            "Duration of remote ssh/scp commands",
        )
        .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
        &["operation"], // "ssh", "scp"
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Orchestrator
        Box::new(REQUESTS_CLAIMED.clone()),
        Box::new(ADMISSION_DECISIONS.clone()),
        Box::new(TRANSFERS_TOTAL.clone()),
        Box::new(TRANSFER_DURATION.clone()),
        Box::new(REQUESTS_FINALIZED.clone()),
        Box::new(STALE_CLAIMS_RECLAIMED.clone()),
        // Reaper
        Box::new(REAPER_SWEEPS.clone()),
        Box::new(DATASETS_REAPED.clone()),
        // Remote execution
        Box::new(REMOTE_COMMAND_DURATION.clone()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_metrics_register_cleanly() {
        let registry = prometheus::Registry::new();
        for metric in all_metrics() {
            registry.register(metric).unwrap();
        }
    }
}
