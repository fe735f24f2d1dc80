//! Staging orchestrator implementation.
//!
//! Drives requests through the state machine on a poll loop:
//! - REQUESTED rows are claimed with a conditional update, so several
//!   orchestrators can share one ledger without double delivery
//! - Admission denials return the request to the pool as QUEUED
//! - Transfers run file by file; one bad file fails the request but the
//!   remaining files are still attempted

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use crate::admission::{AdmissionController, Decision, DeferReason};
use crate::alert::{AlertEvent, AlertHandle};
use crate::config::OrchestratorConfig;
use crate::ledger::{Ledger, Request, RequestStatus};
use crate::metrics;
use crate::resolver::{AccountProvisioner, DestinationResolver};
use crate::transfer::{dataset_size, TransferError, TransferExecutor};

use super::types::{OrchestratorError, OrchestratorStatus};

/// The staging orchestrator - moves datasets from the archive to their
/// resolved destinations.
pub struct StagingOrchestrator {
    config: OrchestratorConfig,
    ledger: Arc<dyn Ledger>,
    resolver: Arc<DestinationResolver>,
    provisioner: Arc<dyn AccountProvisioner>,
    admission: Arc<AdmissionController>,
    executor: Arc<dyn TransferExecutor>,
    alerts: Option<AlertHandle>,

    // Runtime state
    running: Arc<AtomicBool>,
    shutdown_tx: broadcast::Sender<()>,
}

impl StagingOrchestrator {
    /// Create a new orchestrator.
    pub fn new(
        config: OrchestratorConfig,
        ledger: Arc<dyn Ledger>,
        resolver: Arc<DestinationResolver>,
        provisioner: Arc<dyn AccountProvisioner>,
        admission: Arc<AdmissionController>,
        executor: Arc<dyn TransferExecutor>,
        alerts: Option<AlertHandle>,
    ) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            config,
            ledger,
            resolver,
            provisioner,
            admission,
            executor,
            alerts,
            running: Arc::new(AtomicBool::new(false)),
            shutdown_tx,
        }
    }

    /// Start the orchestrator (spawns the poll loop).
    pub async fn start(&self) {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("Orchestrator already running");
            return;
        }

        info!("Starting staging orchestrator");
        self.spawn_poll_loop();
        info!("Staging orchestrator started");
    }

    /// Stop the orchestrator gracefully.
    pub async fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            warn!("Orchestrator not running");
            return;
        }

        info!("Stopping staging orchestrator");
        let _ = self.shutdown_tx.send(());
        tokio::time::sleep(Duration::from_millis(500)).await;
        info!("Staging orchestrator stopped");
    }

    /// Get current orchestrator status.
    pub async fn status(&self) -> OrchestratorStatus {
        let count = |status| self.ledger.count_by_status(status).unwrap_or(0) as usize;

        OrchestratorStatus {
            running: self.running.load(Ordering::Relaxed),
            requested_count: count(RequestStatus::Requested),
            pending_count: count(RequestStatus::Pending),
            queued_count: count(RequestStatus::Queued),
            failed_count: count(RequestStatus::Failed),
            success_count: count(RequestStatus::Success),
        }
    }

    fn spawn_poll_loop(&self) {
        let running = Arc::clone(&self.running);
        let ledger = Arc::clone(&self.ledger);
        let resolver = Arc::clone(&self.resolver);
        let provisioner = Arc::clone(&self.provisioner);
        let admission = Arc::clone(&self.admission);
        let executor = Arc::clone(&self.executor);
        let config = self.config.clone();
        let alerts = self.alerts.clone();
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            info!("Poll loop started");
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        info!("Poll loop received shutdown signal");
                        break;
                    }
                    _ = tokio::time::sleep(Duration::from_secs(config.poll_interval_secs)) => {
                        if !running.load(Ordering::Relaxed) {
                            break;
                        }
                        if let Err(e) = Self::process_cycle(
                            &ledger,
                            &resolver,
                            &provisioner,
                            &admission,
                            &executor,
                            &config,
                            &alerts,
                        ).await {
                            warn!("Poll cycle error: {}", e);
                        }
                    }
                }
            }
            info!("Poll loop stopped");
        });
    }

    /// One poll cycle: recover stale claims, then work through every
    /// eligible request. A per-request failure never aborts the batch.
    pub async fn process_cycle(
        ledger: &Arc<dyn Ledger>,
        resolver: &Arc<DestinationResolver>,
        provisioner: &Arc<dyn AccountProvisioner>,
        admission: &Arc<AdmissionController>,
        executor: &Arc<dyn TransferExecutor>,
        config: &OrchestratorConfig,
        alerts: &Option<AlertHandle>,
    ) -> Result<(), OrchestratorError> {
        let stale_cutoff =
            Utc::now() - chrono::Duration::seconds(config.stale_claim_timeout_secs as i64);
        let reclaimed = ledger.reclaim_stale_pending(stale_cutoff)?;
        if reclaimed > 0 {
            metrics::STALE_CLAIMS_RECLAIMED.inc_by(reclaimed as u64);
            warn!(reclaimed, "returned stale claims to the eligible pool");
        }

        let eligible = match ledger.eligible_requests() {
            Ok(eligible) => eligible,
            Err(e) => {
                if let Some(alerts) = alerts {
                    alerts
                        .emit(AlertEvent::LedgerUnavailable {
                            detail: e.to_string(),
                        })
                        .await;
                }
                return Err(e.into());
            }
        };

        for request in eligible {
            match request.status {
                RequestStatus::Requested => {
                    if !ledger.claim(&request.dataset_id, request.delivery_type)? {
                        debug!(
                            dataset_id = %request.dataset_id,
                            "lost claim race, skipping"
                        );
                        continue;
                    }
                    metrics::REQUESTS_CLAIMED.inc();
                }
                RequestStatus::Queued => {}
                // Claimed by another orchestrator (or reclaimed above);
                // not ours to touch this cycle.
                _ => continue,
            }

            if let Err(e) = Self::process_request(
                ledger,
                resolver,
                provisioner,
                admission,
                executor,
                config,
                alerts,
                &request,
            )
            .await
            {
                error!(
                    dataset_id = %request.dataset_id,
                    delivery_type = %request.delivery_type,
                    "request processing error: {}",
                    e
                );
            }
        }

        Ok(())
    }

    /// Process one claimed (or queued) request end to end.
    #[allow(clippy::too_many_arguments)]
    async fn process_request(
        ledger: &Arc<dyn Ledger>,
        resolver: &Arc<DestinationResolver>,
        provisioner: &Arc<dyn AccountProvisioner>,
        admission: &Arc<AdmissionController>,
        executor: &Arc<dyn TransferExecutor>,
        config: &OrchestratorConfig,
        alerts: &Option<AlertHandle>,
        request: &Request,
    ) -> Result<(), OrchestratorError> {
        debug!(
            dataset_id = %request.dataset_id,
            delivery_type = %request.delivery_type,
            "processing request"
        );

        let files = ledger.files(&request.dataset_id)?;
        if files.is_empty() {
            Self::fail_request(ledger, alerts, request, "dataset has no files").await?;
            return Ok(());
        }

        let required_bytes = match dataset_size(&files).await {
            Ok(bytes) => bytes,
            Err(e) => {
                Self::fail_request(ledger, alerts, request, &e.to_string()).await?;
                return Ok(());
            }
        };

        let destination = resolver.resolve(request)?;

        if resolver.needs_provisioning(request.delivery_type) {
            if let Err(e) = provisioner
                .ensure_account(&destination.remote_principal, &destination.remote_host)
                .await
            {
                if let Some(alerts) = alerts {
                    alerts
                        .emit(AlertEvent::ProvisioningFailed {
                            dataset_id: request.dataset_id.clone(),
                            principal: destination.remote_principal.clone(),
                            host: destination.remote_host.clone(),
                        })
                        .await;
                }
                Self::fail_request(ledger, alerts, request, &e.to_string()).await?;
                return Ok(());
            }
        }

        match admission
            .admit(&destination, &request.owner, required_bytes)
            .await
        {
            Decision::Admit => {
                metrics::ADMISSION_DECISIONS.with_label_values(&["admit"]).inc();
            }
            Decision::Defer(reason) => {
                ledger.mark_queued(&request.dataset_id, request.delivery_type)?;
                info!(
                    dataset_id = %request.dataset_id,
                    delivery_type = %request.delivery_type,
                    "deferred: {}",
                    reason
                );
                if let Some(alerts) = alerts {
                    let event = match reason {
                        DeferReason::InsufficientSpace {
                            required_bytes,
                            available_bytes,
                        } => {
                            metrics::ADMISSION_DECISIONS
                                .with_label_values(&["defer_space"])
                                .inc();
                            AlertEvent::SpaceDeferred {
                                dataset_id: request.dataset_id.clone(),
                                delivery_type: request.delivery_type.to_string(),
                                required_bytes,
                                available_bytes,
                                host: destination.remote_host.clone(),
                            }
                        }
                        DeferReason::QuotaExceeded {
                            required_bytes,
                            used_bytes,
                            quota_bytes,
                        } => {
                            metrics::ADMISSION_DECISIONS
                                .with_label_values(&["defer_quota"])
                                .inc();
                            AlertEvent::QuotaDeferred {
                                dataset_id: request.dataset_id.clone(),
                                delivery_type: request.delivery_type.to_string(),
                                required_bytes,
                                used_bytes,
                                quota_bytes,
                                host: destination.remote_host.clone(),
                            }
                        }
                    };
                    alerts.emit(event).await;
                } else {
                    let label = match reason {
                        DeferReason::InsufficientSpace { .. } => "defer_space",
                        DeferReason::QuotaExceeded { .. } => "defer_quota",
                    };
                    metrics::ADMISSION_DECISIONS.with_label_values(&[label]).inc();
                }
                return Ok(());
            }
        }

        let mut failures: Vec<TransferError> = Vec::new();
        for file in &files {
            let timer = std::time::Instant::now();
            match executor.place(file, &destination, &request.owner).await {
                Ok(()) => {
                    metrics::TRANSFERS_TOTAL.with_label_values(&["success"]).inc();
                    metrics::TRANSFER_DURATION
                        .with_label_values(&["success"])
                        .observe(timer.elapsed().as_secs_f64());
                }
                Err(e) => {
                    metrics::TRANSFERS_TOTAL.with_label_values(&["failed"]).inc();
                    metrics::TRANSFER_DURATION
                        .with_label_values(&["failed"])
                        .observe(timer.elapsed().as_secs_f64());
                    error!(
                        dataset_id = %request.dataset_id,
                        source = %file.source_path.display(),
                        "file transfer failed: {}",
                        e
                    );
                    // Keep going; the remaining files may still land.
                    failures.push(e);
                }
            }
        }

        if !failures.is_empty() {
            let reason = format!(
                "{} of {} files failed, first error: {}",
                failures.len(),
                files.len(),
                failures[0]
            );
            Self::fail_request(ledger, alerts, request, &reason).await?;
            return Ok(());
        }

        let completed = Utc::now();
        let expiry = completed + chrono::Duration::days(config.retention_days as i64);
        ledger.mark_success(&request.dataset_id, request.delivery_type, completed, expiry)?;
        metrics::REQUESTS_FINALIZED.with_label_values(&["success"]).inc();
        info!(
            dataset_id = %request.dataset_id,
            delivery_type = %request.delivery_type,
            files = files.len(),
            bytes = required_bytes,
            "request completed"
        );
        if let Some(alerts) = alerts {
            alerts
                .emit(AlertEvent::RequestCompleted {
                    dataset_id: request.dataset_id.clone(),
                    delivery_type: request.delivery_type.to_string(),
                    files: files.len(),
                    bytes: required_bytes,
                })
                .await;
        }

        Ok(())
    }

    async fn fail_request(
        ledger: &Arc<dyn Ledger>,
        alerts: &Option<AlertHandle>,
        request: &Request,
        reason: &str,
    ) -> Result<(), OrchestratorError> {
        error!(
            dataset_id = %request.dataset_id,
            delivery_type = %request.delivery_type,
            "request failed: {}",
            reason
        );
        ledger.mark_failed(&request.dataset_id, request.delivery_type, Utc::now())?;
        metrics::REQUESTS_FINALIZED.with_label_values(&["failed"]).inc();
        if let Some(alerts) = alerts {
            alerts
                .emit(AlertEvent::RequestFailed {
                    dataset_id: request.dataset_id.clone(),
                    delivery_type: request.delivery_type.to_string(),
                    reason: reason.to_string(),
                })
                .await;
        }
        Ok(())
    }
}
