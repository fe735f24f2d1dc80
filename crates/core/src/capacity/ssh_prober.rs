//! Capacity probes over ssh: `df -P` for free space, `du -bs` for usage.

use async_trait::async_trait;
use tracing::debug;

use super::traits::{CapacityProber, ProbeError};
use crate::remote::{shell_quote, RemoteShell};

pub struct SshProber {
    shell: RemoteShell,
}

impl SshProber {
    pub fn new(shell: RemoteShell) -> Self {
        Self { shell }
    }
}

#[async_trait]
impl CapacityProber for SshProber {
    async fn disk_free(
        &self,
        principal: &str,
        host: &str,
        path: &str,
    ) -> Result<u64, ProbeError> {
        let command = format!("df -P {}", shell_quote(path));
        let output = self.shell.ssh(principal, host, &command).await?;
        let free = parse_df_available(&output.stdout)?;
        debug!(host, path, free, "disk free probe");
        Ok(free)
    }

    async fn tree_size(
        &self,
        principal: &str,
        host: &str,
        path: &str,
    ) -> Result<u64, ProbeError> {
        let command = format!("du -bs {}", shell_quote(path));
        let output = self.shell.ssh(principal, host, &command).await?;
        let size = parse_du_total(&output.stdout)?;
        debug!(host, path, size, "tree size probe");
        Ok(size)
    }
}

/// Parse POSIX `df -P` output and return the available column in bytes.
///
/// `df -P` reports 1024-byte blocks; field 3 of the data line (0-based,
/// after the filesystem name) is "Available".
pub fn parse_df_available(output: &str) -> Result<u64, ProbeError> {
    let data_line = output
        .lines()
        .nth(1)
        .ok_or_else(|| ProbeError::Unparseable(format!("df output too short: {:?}", output)))?;
    let field = data_line
        .split_whitespace()
        .nth(3)
        .ok_or_else(|| ProbeError::Unparseable(format!("df line too short: {:?}", data_line)))?;
    let blocks: u64 = field
        .parse()
        .map_err(|_| ProbeError::Unparseable(format!("df available field: {:?}", field)))?;
    Ok(blocks * 1024)
}

/// Parse `du -bs` output: a byte count, a tab, the path.
pub fn parse_du_total(output: &str) -> Result<u64, ProbeError> {
    let first_line = output
        .lines()
        .next()
        .ok_or_else(|| ProbeError::Unparseable("empty du output".to_string()))?;
    let field = first_line
        .split_whitespace()
        .next()
        .ok_or_else(|| ProbeError::Unparseable(format!("du line: {:?}", first_line)))?;
    field
        .parse()
        .map_err(|_| ProbeError::Unparseable(format!("du total field: {:?}", field)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_df_available() {
        let output = "Filesystem     1024-blocks      Used Available Capacity Mounted on\n\
                      /dev/sda1        102400000  51200000  46080000      53% /srv\n";
        assert_eq!(parse_df_available(output).unwrap(), 46_080_000 * 1024);
    }

    #[test]
    fn test_parse_df_rejects_header_only() {
        let output = "Filesystem     1024-blocks      Used Available Capacity Mounted on\n";
        assert!(parse_df_available(output).is_err());
    }

    #[test]
    fn test_parse_df_rejects_garbage_field() {
        let output = "header\n/dev/sda1 100 50 lots 53% /srv\n";
        assert!(parse_df_available(output).is_err());
    }

    #[test]
    fn test_parse_du_total() {
        assert_eq!(parse_du_total("123456\t/srv/projects/p1\n").unwrap(), 123_456);
        assert_eq!(parse_du_total("0\t/srv/empty\n").unwrap(), 0);
    }

    #[test]
    fn test_parse_du_rejects_empty() {
        assert!(parse_du_total("").is_err());
        assert!(parse_du_total("not-a-number\t/srv\n").is_err());
    }
}
