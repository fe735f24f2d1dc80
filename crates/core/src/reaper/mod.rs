//! Retention reaper: reclaims delivered datasets after their retention
//! window (or on an operator's force flag) and archives the ledger rows.
//!
//! Only terminal requests are ever considered. Remote removal failure is
//! logged and alerted but does not block archival; the ledger row must not
//! outlive its retention window just because an endpoint is unreachable.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

use crate::alert::{AlertEvent, AlertHandle};
use crate::config::ReaperConfig;
use crate::ledger::{Ledger, LedgerError};
use crate::metrics;
use crate::resolver::DestinationResolver;
use crate::transfer::TransferExecutor;

/// Outcome of one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepStats {
    /// Terminal requests examined.
    pub examined: usize,
    /// Requests archived and deleted.
    pub reaped: usize,
    /// Remote removals that failed (the rows were archived anyway).
    pub removal_failures: usize,
}

pub struct RetentionReaper {
    config: ReaperConfig,
    ledger: Arc<dyn Ledger>,
    resolver: Arc<DestinationResolver>,
    executor: Arc<dyn TransferExecutor>,
    alerts: Option<AlertHandle>,

    running: Arc<AtomicBool>,
    shutdown_tx: broadcast::Sender<()>,
}

impl RetentionReaper {
    pub fn new(
        config: ReaperConfig,
        ledger: Arc<dyn Ledger>,
        resolver: Arc<DestinationResolver>,
        executor: Arc<dyn TransferExecutor>,
        alerts: Option<AlertHandle>,
    ) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            config,
            ledger,
            resolver,
            executor,
            alerts,
            running: Arc::new(AtomicBool::new(false)),
            shutdown_tx,
        }
    }

    /// Start the reaper (spawns the sweep loop).
    pub async fn start(&self) {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("Reaper already running");
            return;
        }

        info!("Starting retention reaper");
        let running = Arc::clone(&self.running);
        let ledger = Arc::clone(&self.ledger);
        let resolver = Arc::clone(&self.resolver);
        let executor = Arc::clone(&self.executor);
        let config = self.config.clone();
        let alerts = self.alerts.clone();
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            info!("Sweep loop started");
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        info!("Sweep loop received shutdown signal");
                        break;
                    }
                    _ = tokio::time::sleep(Duration::from_secs(config.sweep_interval_secs)) => {
                        if !running.load(Ordering::Relaxed) {
                            break;
                        }
                        match Self::sweep(&ledger, &resolver, &executor, &alerts).await {
                            Ok(stats) if stats.reaped > 0 => {
                                info!(
                                    examined = stats.examined,
                                    reaped = stats.reaped,
                                    removal_failures = stats.removal_failures,
                                    "sweep finished"
                                );
                            }
                            Ok(_) => {}
                            Err(e) => warn!("Sweep error: {}", e),
                        }
                    }
                }
            }
            info!("Sweep loop stopped");
        });
    }

    /// Stop the reaper gracefully.
    pub async fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            warn!("Reaper not running");
            return;
        }

        info!("Stopping retention reaper");
        let _ = self.shutdown_tx.send(());
        tokio::time::sleep(Duration::from_millis(500)).await;
        info!("Retention reaper stopped");
    }

    /// One sweep over the terminal requests.
    pub async fn sweep(
        ledger: &Arc<dyn Ledger>,
        resolver: &Arc<DestinationResolver>,
        executor: &Arc<dyn TransferExecutor>,
        alerts: &Option<AlertHandle>,
    ) -> Result<SweepStats, LedgerError> {
        metrics::REAPER_SWEEPS.inc();
        let now = Utc::now();
        let terminal = ledger.terminal_requests()?;

        let mut stats = SweepStats {
            examined: terminal.len(),
            ..SweepStats::default()
        };

        for request in terminal {
            if !request.should_reap(now) {
                continue;
            }

            // Resolution here is a pure lookup; the reaper never provisions.
            let destination = match resolver.resolve(&request) {
                Ok(destination) => destination,
                Err(e) => {
                    error!(
                        dataset_id = %request.dataset_id,
                        delivery_type = %request.delivery_type,
                        "cannot resolve destination for reclamation: {}",
                        e
                    );
                    continue;
                }
            };

            match executor
                .remove_dataset(&destination, &request.owner, &request.dataset_id)
                .await
            {
                Ok(()) => {}
                Err(e) => {
                    // Archival proceeds regardless; the endpoint may be
                    // gone for good.
                    stats.removal_failures += 1;
                    warn!(
                        dataset_id = %request.dataset_id,
                        host = %destination.remote_host,
                        "remote removal failed, archiving anyway: {}",
                        e
                    );
                    if let Some(alerts) = alerts {
                        alerts
                            .emit(AlertEvent::RemovalFailed {
                                dataset_id: request.dataset_id.clone(),
                                delivery_type: request.delivery_type.to_string(),
                                host: destination.remote_host.clone(),
                                detail: e.to_string(),
                            })
                            .await;
                    }
                }
            }

            ledger.archive_and_delete(&request.dataset_id, request.delivery_type)?;
            stats.reaped += 1;
            metrics::DATASETS_REAPED.inc();
            info!(
                dataset_id = %request.dataset_id,
                delivery_type = %request.delivery_type,
                forced = request.force_delete,
                "dataset reaped"
            );
            if let Some(alerts) = alerts {
                alerts
                    .emit(AlertEvent::DatasetReaped {
                        dataset_id: request.dataset_id.clone(),
                        delivery_type: request.delivery_type.to_string(),
                        forced: request.force_delete,
                    })
                    .await;
            }
        }

        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{DeliveryType, QuotaConstants, RequestStatus, SqliteLedger};
    use crate::testing::{fixtures, MockExecutor};

    struct Harness {
        ledger: Arc<SqliteLedger>,
        resolver: Arc<DestinationResolver>,
        executor: Arc<MockExecutor>,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                ledger: Arc::new(SqliteLedger::in_memory().unwrap()),
                resolver: Arc::new(DestinationResolver::new(
                    fixtures::profiles(),
                    QuotaConstants::default(),
                )),
                executor: Arc::new(MockExecutor::new()),
            }
        }

        async fn sweep(&self) -> SweepStats {
            let ledger: Arc<dyn Ledger> = self.ledger.clone();
            let executor: Arc<dyn TransferExecutor> = self.executor.clone();
            RetentionReaper::sweep(&ledger, &self.resolver, &executor, &None)
                .await
                .unwrap()
        }

        fn seed(&self, dataset_id: &str, delivery: DeliveryType) {
            self.ledger
                .insert_request(&crate::ledger::NewRequest {
                    dataset_id: dataset_id.to_string(),
                    delivery_type: delivery,
                    owner: "proj-1".to_string(),
                })
                .unwrap();
        }

        fn succeed(&self, dataset_id: &str, delivery: DeliveryType, expired: bool) {
            let completed = Utc::now() - chrono::Duration::days(8);
            let expiry = if expired {
                Utc::now() - chrono::Duration::days(1)
            } else {
                Utc::now() + chrono::Duration::days(6)
            };
            self.ledger
                .mark_success(dataset_id, delivery, completed, expiry)
                .unwrap();
        }
    }

    #[tokio::test]
    async fn test_reaps_expired_success() {
        let harness = Harness::new();
        harness.seed("ds-1", DeliveryType::Web);
        harness.succeed("ds-1", DeliveryType::Web, true);

        let stats = harness.sweep().await;
        assert_eq!(
            stats,
            SweepStats {
                examined: 1,
                reaped: 1,
                removal_failures: 0
            }
        );
        assert!(harness
            .ledger
            .request("ds-1", DeliveryType::Web)
            .unwrap()
            .is_none());
        assert!(harness
            .ledger
            .historical_request("ds-1", DeliveryType::Web)
            .unwrap()
            .is_some());
        assert_eq!(harness.executor.removed().len(), 1);
        assert_eq!(harness.executor.removed()[0].dataset_id, "ds-1");
        assert_eq!(harness.executor.removed()[0].host, "web.internal");
    }

    #[tokio::test]
    async fn test_unexpired_success_is_left_alone() {
        let harness = Harness::new();
        harness.seed("ds-1", DeliveryType::Web);
        harness.succeed("ds-1", DeliveryType::Web, false);

        let stats = harness.sweep().await;
        assert_eq!(stats.examined, 1);
        assert_eq!(stats.reaped, 0);
        assert!(harness
            .ledger
            .request("ds-1", DeliveryType::Web)
            .unwrap()
            .is_some());
        assert!(harness.executor.removed().is_empty());
    }

    #[tokio::test]
    async fn test_force_delete_overrides_retention() {
        let harness = Harness::new();
        harness.seed("ds-1", DeliveryType::Sftp);
        harness.succeed("ds-1", DeliveryType::Sftp, false);
        harness
            .ledger
            .set_force_delete("ds-1", DeliveryType::Sftp)
            .unwrap();

        let stats = harness.sweep().await;
        assert_eq!(stats.reaped, 1);
        assert!(harness
            .ledger
            .request("ds-1", DeliveryType::Sftp)
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_failed_requests_are_reaped_when_flagged() {
        let harness = Harness::new();
        harness.seed("ds-1", DeliveryType::Web);
        harness
            .ledger
            .mark_failed("ds-1", DeliveryType::Web, Utc::now())
            .unwrap();
        harness
            .ledger
            .set_force_delete("ds-1", DeliveryType::Web)
            .unwrap();

        let stats = harness.sweep().await;
        assert_eq!(stats.reaped, 1);
    }

    #[tokio::test]
    async fn test_never_touches_live_requests() {
        let harness = Harness::new();
        harness.seed("ds-req", DeliveryType::Web);
        harness.seed("ds-pend", DeliveryType::Web);
        assert!(harness.ledger.claim("ds-pend", DeliveryType::Web).unwrap());
        harness.seed("ds-queued", DeliveryType::Web);
        harness
            .ledger
            .mark_queued("ds-queued", DeliveryType::Web)
            .unwrap();

        let stats = harness.sweep().await;
        assert_eq!(stats.examined, 0);
        assert_eq!(stats.reaped, 0);
        assert_eq!(
            harness
                .ledger
                .count_by_status(RequestStatus::Requested)
                .unwrap(),
            1
        );
    }

    #[tokio::test]
    async fn test_removal_failure_does_not_block_archival() {
        let harness = Harness::new();
        harness.seed("ds-1", DeliveryType::Web);
        harness.succeed("ds-1", DeliveryType::Web, true);
        harness.executor.fail_removals();

        let stats = harness.sweep().await;
        assert_eq!(stats.reaped, 1);
        assert_eq!(stats.removal_failures, 1);
        assert!(harness
            .ledger
            .request("ds-1", DeliveryType::Web)
            .unwrap()
            .is_none());
        assert!(harness
            .ledger
            .historical_request("ds-1", DeliveryType::Web)
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_owner_principal_used_for_sftp_removal() {
        let harness = Harness::new();
        harness.seed("ds-1", DeliveryType::Sftp);
        harness.succeed("ds-1", DeliveryType::Sftp, true);

        harness.sweep().await;
        assert_eq!(harness.executor.removed()[0].owner, "proj-1");
        assert_eq!(harness.executor.removed()[0].host, "sftp.internal");
    }

    #[tokio::test]
    async fn test_start_stop_lifecycle() {
        let harness = Harness::new();
        let reaper = RetentionReaper::new(
            ReaperConfig::default(),
            harness.ledger.clone(),
            harness.resolver.clone(),
            harness.executor.clone(),
            None,
        );

        reaper.start().await;
        reaper.stop().await;
    }
}
