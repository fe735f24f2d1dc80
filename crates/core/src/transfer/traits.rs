use async_trait::async_trait;

use super::error::TransferError;
use crate::ledger::FileEntry;
use crate::resolver::Destination;

/// Moves dataset files to, and removes them from, a resolved destination.
#[async_trait]
pub trait TransferExecutor: Send + Sync {
    /// Deliver one file into the destination's dataset subtree.
    ///
    /// Creates intermediate directories as needed; re-placing a file that
    /// is already there overwrites it (retries are idempotent).
    async fn place(
        &self,
        file: &FileEntry,
        destination: &Destination,
        owner: &str,
    ) -> Result<(), TransferError>;

    /// Remove a dataset's whole subtree from the destination.
    ///
    /// Removing a tree that is already gone succeeds.
    async fn remove_dataset(
        &self,
        destination: &Destination,
        owner: &str,
        dataset_id: &str,
    ) -> Result<(), TransferError>;
}
