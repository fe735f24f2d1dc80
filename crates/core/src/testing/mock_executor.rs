//! Mock transfer executor for testing.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::ledger::FileEntry;
use crate::resolver::Destination;
use crate::transfer::{TransferError, TransferExecutor};

/// Recorded placement call.
#[derive(Debug, Clone)]
pub struct PlacedFile {
    pub file: FileEntry,
    pub owner: String,
    pub host: String,
}

/// Recorded removal call.
#[derive(Debug, Clone)]
pub struct RemovedDataset {
    pub dataset_id: String,
    pub owner: String,
    pub host: String,
}

/// Mock executor recording calls, with per-source placement failures and a
/// switch failing every removal.
#[derive(Default)]
pub struct MockExecutor {
    placed: Mutex<Vec<PlacedFile>>,
    removed: Mutex<Vec<RemovedDataset>>,
    failing_sources: Mutex<HashSet<PathBuf>>,
    fail_removals: AtomicBool,
}

impl MockExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make placement of this source path fail with a copy error.
    pub fn fail_source(&self, source: PathBuf) {
        self.failing_sources.lock().unwrap().insert(source);
    }

    /// Make every removal fail.
    pub fn fail_removals(&self) {
        self.fail_removals.store(true, Ordering::SeqCst);
    }

    pub fn placed(&self) -> Vec<PlacedFile> {
        self.placed.lock().unwrap().clone()
    }

    pub fn removed(&self) -> Vec<RemovedDataset> {
        self.removed.lock().unwrap().clone()
    }
}

#[async_trait]
impl TransferExecutor for MockExecutor {
    async fn place(
        &self,
        file: &FileEntry,
        destination: &Destination,
        owner: &str,
    ) -> Result<(), TransferError> {
        if self
            .failing_sources
            .lock()
            .unwrap()
            .contains(&file.source_path)
        {
            return Err(TransferError::CopyFailed {
                source_path: file.source_path.clone(),
                destination: destination.file_path(
                    owner,
                    &file.dataset_id,
                    &file.relative_destination,
                ),
                detail: "mock copy failure".to_string(),
            });
        }
        self.placed.lock().unwrap().push(PlacedFile {
            file: file.clone(),
            owner: owner.to_string(),
            host: destination.remote_host.clone(),
        });
        Ok(())
    }

    async fn remove_dataset(
        &self,
        destination: &Destination,
        owner: &str,
        dataset_id: &str,
    ) -> Result<(), TransferError> {
        if self.fail_removals.load(Ordering::SeqCst) {
            return Err(TransferError::RemovalFailed {
                path: destination.dataset_root(owner, dataset_id),
                detail: "mock removal failure".to_string(),
            });
        }
        self.removed.lock().unwrap().push(RemovedDataset {
            dataset_id: dataset_id.to_string(),
            owner: owner.to_string(),
            host: destination.remote_host.clone(),
        });
        Ok(())
    }
}
