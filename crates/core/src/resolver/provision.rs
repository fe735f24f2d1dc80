use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

use crate::remote::RemoteShell;

#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("provisioning {principal} on {host} failed: {detail}")]
    CommandFailed {
        principal: String,
        host: String,
        detail: String,
    },
}

/// Ensures a remote account exists before delivery.
///
/// Only federated deliveries provision; failure is a hard failure for the
/// request, never a silent fallback to another identity.
#[async_trait]
pub trait AccountProvisioner: Send + Sync {
    async fn ensure_account(&self, principal: &str, host: &str) -> Result<(), ProvisionError>;
}

/// Provisioner for deployments whose accounts are managed out of band.
/// Every account is assumed to already exist.
pub struct NoopProvisioner;

#[async_trait]
impl AccountProvisioner for NoopProvisioner {
    async fn ensure_account(&self, _principal: &str, _host: &str) -> Result<(), ProvisionError> {
        Ok(())
    }
}

/// Runs an administrative provisioning command over ssh.
///
/// The command template is expanded with `{principal}` and executed on the
/// destination host as the configured admin identity. The command must be
/// idempotent for already-provisioned accounts.
pub struct SshProvisioner {
    shell: RemoteShell,
    admin_principal: String,
    command_template: String,
}

impl SshProvisioner {
    pub fn new(shell: RemoteShell, admin_principal: String, command_template: String) -> Self {
        Self {
            shell,
            admin_principal,
            command_template,
        }
    }
}

#[async_trait]
impl AccountProvisioner for SshProvisioner {
    async fn ensure_account(&self, principal: &str, host: &str) -> Result<(), ProvisionError> {
        let command = self.command_template.replace("{principal}", principal);
        self.shell
            .ssh(&self.admin_principal, host, &command)
            .await
            .map_err(|e| ProvisionError::CommandFailed {
                principal: principal.to_string(),
                host: host.to_string(),
                detail: e.to_string(),
            })?;
        info!(principal, host, "account provisioned");
        Ok(())
    }
}
