//! Ledger access trait and error type.

use chrono::{DateTime, Utc};
use thiserror::Error;

use super::types::{DeliveryType, FileEntry, QuotaConstants, Request};

/// Errors from the request ledger.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// The store cannot be reached; transient, skip this cycle and retry
    /// on the next poll.
    #[error("ledger unavailable: {0}")]
    Unavailable(String),

    /// Request row not found for `(dataset_id, delivery_type)`.
    #[error("request not found: {dataset_id} ({delivery_type})")]
    RequestNotFound {
        dataset_id: String,
        delivery_type: DeliveryType,
    },

    /// A stored value could not be interpreted.
    #[error("corrupt ledger row: {0}")]
    Corrupt(String),
}

/// Typed accessor over the external request/file/quota store.
///
/// Read and conditional-update operations only; rows are created by the
/// upstream intake process and destroyed by [`Ledger::archive_and_delete`].
pub trait Ledger: Send + Sync {
    /// Quota ceilings from the constants row. Returns defaults when the
    /// row is absent.
    fn quota_constants(&self) -> Result<QuotaConstants, LedgerError>;

    /// Requests with status in {REQUESTED, PENDING, QUEUED}, in ledger
    /// insertion order. Rows that cannot be interpreted are logged and
    /// skipped rather than failing the scan.
    fn eligible_requests(&self) -> Result<Vec<Request>, LedgerError>;

    /// Requests with terminal status (SUCCESS or FAILED); reaper input.
    /// Unreadable rows are skipped like in [`Ledger::eligible_requests`].
    fn terminal_requests(&self) -> Result<Vec<Request>, LedgerError>;

    /// Fetch one request by identity.
    fn request(
        &self,
        dataset_id: &str,
        delivery_type: DeliveryType,
    ) -> Result<Option<Request>, LedgerError>;

    /// Claim a REQUESTED row, moving it to PENDING.
    ///
    /// This is a compare-and-swap at the storage layer: it returns `true`
    /// only if exactly one REQUESTED row was updated. `false` means another
    /// orchestrator got there first (or the row changed state); skip the
    /// request this cycle, it is not an error.
    fn claim(
        &self,
        dataset_id: &str,
        delivery_type: DeliveryType,
    ) -> Result<bool, LedgerError>;

    /// Files belonging to a dataset.
    fn files(&self, dataset_id: &str) -> Result<Vec<FileEntry>, LedgerError>;

    /// Return a claimed request to the eligible pool (admission denied).
    fn mark_queued(
        &self,
        dataset_id: &str,
        delivery_type: DeliveryType,
    ) -> Result<(), LedgerError>;

    /// Record a terminal failure.
    fn mark_failed(
        &self,
        dataset_id: &str,
        delivery_type: DeliveryType,
        failure_date: DateTime<Utc>,
    ) -> Result<(), LedgerError>;

    /// Record a terminal success with its expiry window.
    fn mark_success(
        &self,
        dataset_id: &str,
        delivery_type: DeliveryType,
        completion_date: DateTime<Utc>,
        expiry_date: DateTime<Utc>,
    ) -> Result<(), LedgerError>;

    /// Copy the request row (and, when this is the last live request for
    /// the dataset, its file rows) into the historical tables and delete
    /// the live rows. This is the request's destruction.
    fn archive_and_delete(
        &self,
        dataset_id: &str,
        delivery_type: DeliveryType,
    ) -> Result<(), LedgerError>;

    /// Return PENDING rows claimed before the cutoff to REQUESTED.
    ///
    /// Crash recovery: a request interrupted mid-transfer must not sit in
    /// PENDING forever. Returns the number of reclaimed rows.
    fn reclaim_stale_pending(
        &self,
        older_than: DateTime<Utc>,
    ) -> Result<usize, LedgerError>;

    /// Count live requests by status.
    fn count_by_status(&self, status: super::RequestStatus) -> Result<i64, LedgerError>;

    /// Fetch an archived request row, if present.
    fn historical_request(
        &self,
        dataset_id: &str,
        delivery_type: DeliveryType,
    ) -> Result<Option<Request>, LedgerError>;

    /// Fetch archived file rows for a dataset.
    fn historical_files(&self, dataset_id: &str) -> Result<Vec<FileEntry>, LedgerError>;
}
