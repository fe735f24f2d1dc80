use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("remote probe failed: {0}")]
    Remote(#[from] crate::remote::RemoteError),

    #[error("unparseable probe output: {0}")]
    Unparseable(String),
}

/// Measures free space and tree usage on a destination host.
#[async_trait]
pub trait CapacityProber: Send + Sync {
    /// Free bytes on the filesystem holding `path`, as `principal` sees it.
    async fn disk_free(
        &self,
        principal: &str,
        host: &str,
        path: &str,
    ) -> Result<u64, ProbeError>;

    /// Total bytes consumed by the tree rooted at `path`. The path may not
    /// exist yet (a first delivery), in which case usage is zero.
    async fn tree_size(
        &self,
        principal: &str,
        host: &str,
        path: &str,
    ) -> Result<u64, ProbeError>;
}
