use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Static description of one delivery endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeliveryProfile {
    /// Fixed remote identity, for endpoints not owned by the requester.
    pub principal: Option<String>,
    pub host: String,
    pub path_prefix: PathBuf,
}

/// Resolved placement target for one request.
#[derive(Debug, Clone, PartialEq)]
pub struct Destination {
    /// Identity all remote operations run as.
    pub remote_principal: String,
    pub remote_host: String,
    pub path_prefix: PathBuf,
    /// Quota ceiling for the owning project on this endpoint.
    pub quota_bytes: u64,
}

impl Destination {
    /// Directory holding every dataset staged for `owner` on this endpoint.
    pub fn project_root(&self, owner: &str) -> PathBuf {
        self.path_prefix.join(owner)
    }

    /// Directory holding one staged dataset.
    pub fn dataset_root(&self, owner: &str, dataset_id: &str) -> PathBuf {
        self.path_prefix.join(owner).join(dataset_id)
    }

    /// Full remote path for one file of a dataset.
    pub fn file_path(&self, owner: &str, dataset_id: &str, relative: &Path) -> PathBuf {
        self.dataset_root(owner, dataset_id).join(relative)
    }
}
