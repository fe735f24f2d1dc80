//! Core ledger data types.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Delivery transport for a staging request.
///
/// The same dataset may be staged to several delivery types independently;
/// each `(dataset_id, delivery_type)` pair has its own lifecycle.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryType {
    /// Internal web-accessible project area, served under a fixed service
    /// account.
    Web,
    /// Per-user federated-transfer home directory; the remote principal is
    /// the request owner and may need provisioning.
    Federated,
    /// SFTP-style drop point, also owned by the request owner.
    Sftp,
}

impl DeliveryType {
    /// Ledger representation (stored uppercase).
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryType::Web => "WEB",
            DeliveryType::Federated => "FEDERATED",
            DeliveryType::Sftp => "SFTP",
        }
    }

    /// All known delivery types, in resolver table order.
    pub fn all() -> [DeliveryType; 3] {
        [DeliveryType::Web, DeliveryType::Federated, DeliveryType::Sftp]
    }

    /// Whether the remote principal is the request owner rather than a
    /// fixed service identity.
    pub fn owner_is_principal(&self) -> bool {
        !matches!(self, DeliveryType::Web)
    }
}

impl fmt::Display for DeliveryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeliveryType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "WEB" => Ok(DeliveryType::Web),
            "FEDERATED" => Ok(DeliveryType::Federated),
            "SFTP" => Ok(DeliveryType::Sftp),
            other => Err(format!("unknown delivery type: {}", other)),
        }
    }
}

/// Lifecycle state of a staging request.
///
/// ```text
/// REQUESTED -> PENDING -> { QUEUED, FAILED, SUCCESS }
/// ```
///
/// QUEUED returns the request to the eligible pool for the next poll cycle;
/// FAILED and SUCCESS are terminal and only the reaper acts on them after
/// that.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    /// Created by the intake process, not yet claimed.
    Requested,
    /// Claimed by an orchestrator via compare-and-swap.
    Pending,
    /// Admission denied this cycle; re-evaluated on a later cycle.
    Queued,
    /// A file-level or provisioning error occurred; needs operator action.
    Failed,
    /// Every file transferred; expiry clock is running.
    Success,
}

impl RequestStatus {
    /// Ledger representation (stored uppercase).
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Requested => "REQUESTED",
            RequestStatus::Pending => "PENDING",
            RequestStatus::Queued => "QUEUED",
            RequestStatus::Failed => "FAILED",
            RequestStatus::Success => "SUCCESS",
        }
    }

    /// Terminal states are eligible for the reaper and nothing else.
    pub fn is_terminal(&self) -> bool {
        matches!(self, RequestStatus::Failed | RequestStatus::Success)
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RequestStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "REQUESTED" => Ok(RequestStatus::Requested),
            "PENDING" => Ok(RequestStatus::Pending),
            "QUEUED" => Ok(RequestStatus::Queued),
            "FAILED" => Ok(RequestStatus::Failed),
            "SUCCESS" => Ok(RequestStatus::Success),
            other => Err(format!("unknown request status: {}", other)),
        }
    }
}

/// One unit of staging work.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Request {
    /// Dataset being staged.
    pub dataset_id: String,
    /// Delivery transport; together with `dataset_id` this is the identity.
    pub delivery_type: DeliveryType,
    /// Project/account id; the remote principal for non-web deliveries.
    pub owner: String,
    /// Current lifecycle state.
    pub status: RequestStatus,
    /// Set when the request transitions to FAILED.
    pub failure_date: Option<DateTime<Utc>>,
    /// Set when the request transitions to SUCCESS.
    pub completion_date: Option<DateTime<Utc>>,
    /// Completion plus the retention window; drives the reaper.
    pub expiry_date: Option<DateTime<Utc>>,
    /// Operator-set flag forcing reclamation before expiry.
    pub force_delete: bool,
    /// When the orchestrator claimed the request (stale-claim recovery).
    pub claimed_at: Option<DateTime<Utc>>,
}

impl Request {
    /// Whether the reaper should reclaim this request's delivery artifacts.
    pub fn should_reap(&self, now: DateTime<Utc>) -> bool {
        if !self.status.is_terminal() {
            return false;
        }
        self.force_delete || self.expiry_date.map(|e| e < now).unwrap_or(false)
    }
}

/// One file of a dataset; belongs to exactly one dataset and is immutable
/// while any request for that dataset is live.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FileEntry {
    /// Dataset this file belongs to.
    pub dataset_id: String,
    /// Absolute path in the archive.
    pub source_path: PathBuf,
    /// Path under the destination dataset directory.
    pub relative_destination: PathBuf,
}

/// Per-delivery-type project quota ceilings, loaded once from the ledger at
/// startup and refreshed only by an explicit reload.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct QuotaConstants {
    pub web_project_bytes: u64,
    pub federated_project_bytes: u64,
    pub sftp_project_bytes: u64,
}

/// 1 TB, the ceiling applied when the constants row is absent.
pub const DEFAULT_PROJECT_QUOTA_BYTES: u64 = 1_000_000_000_000;

impl Default for QuotaConstants {
    fn default() -> Self {
        Self {
            web_project_bytes: DEFAULT_PROJECT_QUOTA_BYTES,
            federated_project_bytes: DEFAULT_PROJECT_QUOTA_BYTES,
            sftp_project_bytes: DEFAULT_PROJECT_QUOTA_BYTES,
        }
    }
}

impl QuotaConstants {
    /// Quota ceiling for one delivery type.
    pub fn for_delivery(&self, delivery_type: DeliveryType) -> u64 {
        match delivery_type {
            DeliveryType::Web => self.web_project_bytes,
            DeliveryType::Federated => self.federated_project_bytes,
            DeliveryType::Sftp => self.sftp_project_bytes,
        }
    }
}
