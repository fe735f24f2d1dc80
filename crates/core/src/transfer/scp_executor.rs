//! File delivery over scp, with ssh-managed remote directories.

use std::path::Path;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, warn};

use super::error::TransferError;
use super::traits::TransferExecutor;
use crate::ledger::FileEntry;
use crate::remote::{shell_quote, RemoteShell};
use crate::resolver::Destination;

pub struct ScpExecutor {
    shell: RemoteShell,
    /// Optional local command run per file before the copy, expanded with
    /// `{path}`. Nudges tiered storage to recall the file; its outcome is
    /// ignored.
    recall_hint_cmd: Option<String>,
}

impl ScpExecutor {
    pub fn new(shell: RemoteShell, recall_hint_cmd: Option<String>) -> Self {
        Self {
            shell,
            recall_hint_cmd,
        }
    }

    async fn hint_recall(&self, path: &Path) {
        let Some(template) = &self.recall_hint_cmd else {
            return;
        };
        let command = template.replace("{path}", &path.to_string_lossy());
        let result = Command::new("sh").arg("-c").arg(&command).output().await;
        match result {
            Ok(output) if output.status.success() => {
                debug!(path = %path.display(), "recall hint issued");
            }
            Ok(output) => {
                debug!(
                    path = %path.display(),
                    code = output.status.code().unwrap_or(-1),
                    "recall hint exited nonzero, ignoring"
                );
            }
            Err(e) => {
                debug!(path = %path.display(), error = %e, "recall hint failed to run, ignoring");
            }
        }
    }
}

#[async_trait]
impl TransferExecutor for ScpExecutor {
    async fn place(
        &self,
        file: &FileEntry,
        destination: &Destination,
        owner: &str,
    ) -> Result<(), TransferError> {
        if tokio::fs::metadata(&file.source_path).await.is_err() {
            return Err(TransferError::SourceMissing {
                path: file.source_path.clone(),
            });
        }

        self.hint_recall(&file.source_path).await;

        let remote_file =
            destination.file_path(owner, &file.dataset_id, &file.relative_destination);
        let remote_dir = remote_file
            .parent()
            .unwrap_or(&destination.path_prefix)
            .to_path_buf();

        let mkdir = format!("mkdir -p {}", shell_quote(&remote_dir.to_string_lossy()));
        self.shell
            .ssh(&destination.remote_principal, &destination.remote_host, &mkdir)
            .await
            .map_err(|e| TransferError::DirectoryCreateFailed {
                path: remote_dir.clone(),
                detail: e.to_string(),
            })?;

        self.shell
            .scp(
                &file.source_path.to_string_lossy(),
                &destination.remote_principal,
                &destination.remote_host,
                &remote_file.to_string_lossy(),
            )
            .await
            .map_err(|e| TransferError::CopyFailed {
                source_path: file.source_path.clone(),
                destination: remote_file.clone(),
                detail: e.to_string(),
            })?;

        debug!(
            source = %file.source_path.display(),
            destination = %remote_file.display(),
            host = %destination.remote_host,
            "file placed"
        );
        Ok(())
    }

    async fn remove_dataset(
        &self,
        destination: &Destination,
        owner: &str,
        dataset_id: &str,
    ) -> Result<(), TransferError> {
        let dataset_root = destination.dataset_root(owner, dataset_id);
        let command = format!("rm -rf {}", shell_quote(&dataset_root.to_string_lossy()));
        self.shell
            .ssh(
                &destination.remote_principal,
                &destination.remote_host,
                &command,
            )
            .await
            .map_err(|e| {
                warn!(
                    path = %dataset_root.display(),
                    host = %destination.remote_host,
                    "dataset removal failed"
                );
                TransferError::RemovalFailed {
                    path: dataset_root.clone(),
                    detail: e.to_string(),
                }
            })?;
        Ok(())
    }
}

/// Sum the on-disk sizes of a dataset's source files.
///
/// Fails on the first missing file so a partially recalled dataset never
/// reaches admission.
pub async fn dataset_size(files: &[FileEntry]) -> Result<u64, TransferError> {
    let mut total = 0u64;
    for file in files {
        let metadata = tokio::fs::metadata(&file.source_path).await.map_err(|_| {
            TransferError::SourceMissing {
                path: file.source_path.clone(),
            }
        })?;
        total += metadata.len();
    }
    Ok(total)
}
