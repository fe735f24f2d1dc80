//! Testing utilities and mock implementations for end-to-end tests.
//!
//! This module provides mock implementations of the external-infrastructure
//! traits (capacity probing, file transfer, account provisioning), allowing
//! orchestrator and reaper tests without remote hosts.
//!
//! # Example
//!
//! ```rust,ignore
//! use portage_core::testing::{MockExecutor, MockProber, MockProvisioner};
//!
//! let prober = MockProber::new(1_000_000, 0);
//! let executor = MockExecutor::new();
//! executor.fail_source("/archive/ds-1/a.bin".into());
//! ```

mod mock_executor;
mod mock_prober;
mod mock_provisioner;

pub use mock_executor::{MockExecutor, PlacedFile, RemovedDataset};
pub use mock_prober::MockProber;
pub use mock_provisioner::MockProvisioner;

/// Test fixtures and helper functions.
pub mod fixtures {
    use std::path::PathBuf;

    use crate::ledger::{DeliveryType, FileEntry, NewRequest, Request, RequestStatus, SqliteLedger};
    use crate::resolver::{DeliveryProfile, ResolverProfiles};

    /// Create a test request with reasonable defaults.
    pub fn request(dataset_id: &str, delivery_type: DeliveryType) -> Request {
        Request {
            dataset_id: dataset_id.to_string(),
            delivery_type,
            owner: "proj-1".to_string(),
            status: RequestStatus::Requested,
            failure_date: None,
            completion_date: None,
            expiry_date: None,
            force_delete: false,
            claimed_at: None,
        }
    }

    /// Resolver profiles pointing at in-test hostnames.
    pub fn profiles() -> ResolverProfiles {
        ResolverProfiles {
            web: DeliveryProfile {
                principal: Some("webstage".to_string()),
                host: "web.internal".to_string(),
                path_prefix: PathBuf::from("/srv/web/projects"),
            },
            federated: DeliveryProfile {
                principal: None,
                host: "gridftp.internal".to_string(),
                path_prefix: PathBuf::from("/home"),
            },
            sftp: DeliveryProfile {
                principal: None,
                host: "sftp.internal".to_string(),
                path_prefix: PathBuf::from("/srv/sftp"),
            },
        }
    }

    /// Seed a request row plus one file row whose source exists on disk.
    pub fn seed_request_with_files(
        ledger: &SqliteLedger,
        dataset_id: &str,
        delivery_type: DeliveryType,
        source_dir: &std::path::Path,
        file_names: &[&str],
    ) {
        ledger
            .insert_request(&NewRequest {
                dataset_id: dataset_id.to_string(),
                delivery_type,
                owner: "proj-1".to_string(),
            })
            .unwrap();
        for name in file_names {
            let source_path = source_dir.join(name);
            std::fs::write(&source_path, b"test data").unwrap();
            ledger
                .insert_file(&FileEntry {
                    dataset_id: dataset_id.to_string(),
                    source_path,
                    relative_destination: PathBuf::from(name),
                })
                .unwrap();
        }
    }
}
