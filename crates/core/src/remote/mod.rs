//! Remote command execution over ssh/scp.
//!
//! Every remote interaction in the system goes through [`RemoteShell`]:
//! capacity probes, directory management, file copies, account
//! provisioning, and reclamation. Commands run as `principal@host` and
//! are bounded by a timeout so a wedged remote never stalls a poll loop.

use std::process::Stdio;
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

use crate::metrics::REMOTE_COMMAND_DURATION;

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("failed to spawn {program}: {detail}")]
    Spawn { program: String, detail: String },

    #[error("remote command timed out after {0:?}")]
    Timeout(Duration),

    /// The pid identifies the local ssh/scp child for log correlation.
    #[error("remote command (pid {pid}) exited with {code}: {stderr}")]
    Failed { pid: u32, code: i32, stderr: String },
}

/// Captured output of a successful remote command.
#[derive(Debug, Clone)]
pub struct RemoteOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Runs commands on remote hosts via the system ssh/scp binaries.
#[derive(Debug, Clone)]
pub struct RemoteShell {
    command_timeout: Duration,
    copy_timeout: Duration,
    ssh_options: Vec<String>,
}

impl RemoteShell {
    pub fn new(
        command_timeout: Duration,
        copy_timeout: Duration,
        ssh_options: Vec<String>,
    ) -> Self {
        Self {
            command_timeout,
            copy_timeout,
            ssh_options,
        }
    }

    /// Run `command` on `host` as `principal`, bounded by the command
    /// timeout.
    pub async fn ssh(
        &self,
        principal: &str,
        host: &str,
        command: &str,
    ) -> Result<RemoteOutput, RemoteError> {
        let mut cmd = Command::new("ssh");
        cmd.args(&self.ssh_options)
            .arg(format!("{}@{}", principal, host))
            .arg(command);
        self.run(cmd, "ssh", self.command_timeout).await
    }

    /// Copy a local file to `principal@host:remote_path`, bounded by the
    /// copy timeout.
    pub async fn scp(
        &self,
        local_path: &str,
        principal: &str,
        host: &str,
        remote_path: &str,
    ) -> Result<RemoteOutput, RemoteError> {
        let mut cmd = Command::new("scp");
        cmd.args(&self.ssh_options)
            .arg(local_path)
            .arg(format!("{}@{}:{}", principal, host, remote_path));
        self.run(cmd, "scp", self.copy_timeout).await
    }

    async fn run(
        &self,
        mut cmd: Command,
        program: &str,
        timeout: Duration,
    ) -> Result<RemoteOutput, RemoteError> {
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let started = Instant::now();
        let child = cmd.spawn().map_err(|e| RemoteError::Spawn {
            program: program.to_string(),
            detail: e.to_string(),
        })?;
        let pid = child.id().unwrap_or_default();
        debug!(program, pid, "spawned remote command");

        let waited = tokio::time::timeout(timeout, child.wait_with_output()).await;
        REMOTE_COMMAND_DURATION
            .with_label_values(&[program])
            .observe(started.elapsed().as_secs_f64());

        let output = waited
            .map_err(|_| RemoteError::Timeout(timeout))?
            .map_err(|e| RemoteError::Spawn {
                program: program.to_string(),
                detail: e.to_string(),
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        if !output.status.success() {
            return Err(RemoteError::Failed {
                pid,
                code: output.status.code().unwrap_or(-1),
                stderr: stderr.trim().to_string(),
            });
        }

        Ok(RemoteOutput { stdout, stderr })
    }
}

/// Quote a path for interpolation into a remote shell command line.
pub fn shell_quote(path: &str) -> String {
    format!("'{}'", path.replace('\'', r"'\''"))
}
