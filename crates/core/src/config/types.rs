use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::remote::RemoteShell;
use crate::resolver::{DeliveryProfile, ResolverProfiles};

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub destinations: DestinationsConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
    #[serde(default)]
    pub reaper: ReaperConfig,
    #[serde(default)]
    pub remote: RemoteConfig,
}

/// Database configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("portage.db")
}

/// One delivery endpoint
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DestinationProfileConfig {
    /// Fixed remote identity; omit where the request owner is the principal.
    #[serde(default)]
    pub principal: Option<String>,
    pub host: String,
    pub path_prefix: PathBuf,
}

/// The three delivery endpoints
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DestinationsConfig {
    pub web: DestinationProfileConfig,
    pub federated: DestinationProfileConfig,
    pub sftp: DestinationProfileConfig,
}

/// Orchestrator configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OrchestratorConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Seconds between poll cycles
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    /// PENDING claims older than this are returned to REQUESTED
    #[serde(default = "default_stale_claim_timeout")]
    pub stale_claim_timeout_secs: u64,
    /// Days a delivered dataset stays before expiry
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            poll_interval_secs: default_poll_interval(),
            stale_claim_timeout_secs: default_stale_claim_timeout(),
            retention_days: default_retention_days(),
        }
    }
}

fn default_enabled() -> bool {
    true
}

fn default_poll_interval() -> u64 {
    5
}

fn default_stale_claim_timeout() -> u64 {
    3600
}

fn default_retention_days() -> u32 {
    7
}

/// Reaper configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReaperConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Seconds between reclamation sweeps
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
}

impl Default for ReaperConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            sweep_interval_secs: default_sweep_interval(),
        }
    }
}

fn default_sweep_interval() -> u64 {
    60
}

/// Remote execution configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RemoteConfig {
    /// Timeout for short remote commands (probes, mkdir, rm)
    #[serde(default = "default_command_timeout")]
    pub command_timeout_secs: u64,
    /// Timeout for file copies
    #[serde(default = "default_copy_timeout")]
    pub copy_timeout_secs: u64,
    /// Extra options passed to ssh and scp
    #[serde(default = "default_ssh_options")]
    pub ssh_options: Vec<String>,
    /// Local command run per file before copying, expanded with `{path}`;
    /// its result is ignored
    #[serde(default)]
    pub recall_hint_cmd: Option<String>,
    /// Identity the provisioning command runs as
    #[serde(default)]
    pub provision_admin: Option<String>,
    /// Remote command creating an account, expanded with `{principal}`
    #[serde(default)]
    pub provision_cmd: Option<String>,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            command_timeout_secs: default_command_timeout(),
            copy_timeout_secs: default_copy_timeout(),
            ssh_options: default_ssh_options(),
            recall_hint_cmd: None,
            provision_admin: None,
            provision_cmd: None,
        }
    }
}

fn default_command_timeout() -> u64 {
    30
}

fn default_copy_timeout() -> u64 {
    3600
}

fn default_ssh_options() -> Vec<String> {
    vec!["-o".to_string(), "BatchMode=yes".to_string()]
}

impl Config {
    /// Endpoint profiles in the shape the resolver wants.
    pub fn resolver_profiles(&self) -> ResolverProfiles {
        let to_profile = |c: &DestinationProfileConfig| DeliveryProfile {
            principal: c.principal.clone(),
            host: c.host.clone(),
            path_prefix: c.path_prefix.clone(),
        };
        ResolverProfiles {
            web: to_profile(&self.destinations.web),
            federated: to_profile(&self.destinations.federated),
            sftp: to_profile(&self.destinations.sftp),
        }
    }

    /// Remote shell built from the `[remote]` section.
    pub fn remote_shell(&self) -> RemoteShell {
        RemoteShell::new(
            Duration::from_secs(self.remote.command_timeout_secs),
            Duration::from_secs(self.remote.copy_timeout_secs),
            self.remote.ssh_options.clone(),
        )
    }
}
