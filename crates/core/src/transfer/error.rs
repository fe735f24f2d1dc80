use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransferError {
    /// The archive no longer has the file; the request cannot succeed.
    #[error("source file missing: {path}")]
    SourceMissing { path: PathBuf },

    #[error("failed to create remote directory {path}: {detail}")]
    DirectoryCreateFailed { path: PathBuf, detail: String },

    // Field is not called `source`; thiserror reserves that name for the
    // error's cause and requires it to be an error type.
    #[error("copy of {source_path} to {destination} failed: {detail}")]
    CopyFailed {
        source_path: PathBuf,
        destination: PathBuf,
        detail: String,
    },

    #[error("failed to remove remote tree {path}: {detail}")]
    RemovalFailed { path: PathBuf, detail: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_copy_failed_message_names_both_paths() {
        let err = TransferError::CopyFailed {
            source_path: PathBuf::from("/archive/ds-1/a.bin"),
            destination: PathBuf::from("/srv/web/projects/proj-1/ds-1/a.bin"),
            detail: "exit 1".to_string(),
        };
        let message = err.to_string();
        assert!(message.contains("/archive/ds-1/a.bin"));
        assert!(message.contains("/srv/web/projects/proj-1/ds-1/a.bin"));
        // The path is plain context, not a wrapped cause.
        assert!(std::error::Error::source(&err).is_none());
    }
}
