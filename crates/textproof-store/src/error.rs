use std::path::PathBuf;

/// Errors produced by storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// The canonical chain file exists but its content does not parse.
    /// Distinct from the file being absent, which is not an error.
    #[error("canonical chain file is corrupt: {source}")]
    CorruptChain {
        path: PathBuf,
        source: serde_json::Error,
    },

    /// The WAL file exists but its content does not parse.
    #[error("write-ahead log is corrupt: {source}")]
    CorruptWal {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("failed to serialize chain data: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("no backups available to restore from")]
    NoBackups,
}

pub type StoreResult<T> = Result<T, StoreError>;
