//! End-to-end flow against a file-backed ledger: request intake through
//! delivery, expiry, and reclamation.

use std::sync::Arc;

use chrono::{Duration, Utc};
use portage_core::admission::AdmissionController;
use portage_core::config::OrchestratorConfig;
use portage_core::ledger::{DeliveryType, NewRequest, QuotaConstants, RequestStatus, SqliteLedger};
use portage_core::resolver::{AccountProvisioner, DestinationResolver};
use portage_core::testing::{fixtures, MockExecutor, MockProber, MockProvisioner};
use portage_core::transfer::TransferExecutor;
use portage_core::{Ledger, RetentionReaper, StagingOrchestrator};

#[tokio::test]
async fn test_request_lifecycle_delivery_to_reclamation() {
    let dir = tempfile::tempdir().unwrap();
    let ledger = Arc::new(SqliteLedger::new(&dir.path().join("portage.db")).unwrap());
    fixtures::seed_request_with_files(
        &ledger,
        "ds-1",
        DeliveryType::Sftp,
        dir.path(),
        &["a.bin", "sub.bin"],
    );

    let ledger_dyn: Arc<dyn Ledger> = ledger.clone();
    let resolver = Arc::new(DestinationResolver::new(
        fixtures::profiles(),
        QuotaConstants::default(),
    ));
    let provisioner: Arc<dyn AccountProvisioner> = Arc::new(MockProvisioner::new());
    let admission = Arc::new(AdmissionController::new(Arc::new(MockProber::new(
        u64::MAX,
        0,
    ))));
    let executor = Arc::new(MockExecutor::new());
    let executor_dyn: Arc<dyn TransferExecutor> = executor.clone();

    StagingOrchestrator::process_cycle(
        &ledger_dyn,
        &resolver,
        &provisioner,
        &admission,
        &executor_dyn,
        &OrchestratorConfig::default(),
        &None,
    )
    .await
    .unwrap();

    let delivered = ledger.request("ds-1", DeliveryType::Sftp).unwrap().unwrap();
    assert_eq!(delivered.status, RequestStatus::Success);
    assert_eq!(executor.placed().len(), 2);

    // Not yet expired, the sweep leaves it alone.
    let stats = RetentionReaper::sweep(&ledger_dyn, &resolver, &executor_dyn, &None)
        .await
        .unwrap();
    assert_eq!(stats.reaped, 0);

    // Backdate the expiry and sweep again.
    ledger
        .mark_success(
            "ds-1",
            DeliveryType::Sftp,
            Utc::now() - Duration::days(8),
            Utc::now() - Duration::days(1),
        )
        .unwrap();
    let stats = RetentionReaper::sweep(&ledger_dyn, &resolver, &executor_dyn, &None)
        .await
        .unwrap();
    assert_eq!(stats.reaped, 1);

    assert!(ledger.request("ds-1", DeliveryType::Sftp).unwrap().is_none());
    let archived = ledger
        .historical_request("ds-1", DeliveryType::Sftp)
        .unwrap()
        .unwrap();
    assert_eq!(archived.dataset_id, "ds-1");
    assert_eq!(ledger.historical_files("ds-1").unwrap().len(), 2);
    assert_eq!(executor.removed().len(), 1);
}

#[tokio::test]
async fn test_survives_restart_with_file_backed_ledger() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("portage.db");

    {
        let ledger = SqliteLedger::new(&db_path).unwrap();
        ledger
            .insert_request(&NewRequest {
                dataset_id: "ds-1".to_string(),
                delivery_type: DeliveryType::Web,
                owner: "proj-1".to_string(),
            })
            .unwrap();
        assert!(ledger.claim("ds-1", DeliveryType::Web).unwrap());
    }

    // A new process sees the stale claim and can reclaim it.
    let ledger = SqliteLedger::new(&db_path).unwrap();
    let reclaimed = ledger
        .reclaim_stale_pending(Utc::now() + Duration::seconds(1))
        .unwrap();
    assert_eq!(reclaimed, 1);
    let request = ledger.request("ds-1", DeliveryType::Web).unwrap().unwrap();
    assert_eq!(request.status, RequestStatus::Requested);
}
