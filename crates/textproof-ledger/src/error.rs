use textproof_store::StoreError;
use textproof_types::{BlockError, IdError};

/// Errors produced by ledger operations.
///
/// A duplicate content digest is deliberately not represented here: appending
/// an already-deposited text returns the existing block, not an error.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// ID lookup miss; recoverable, surfaced to the caller.
    #[error("block {id} not found")]
    NotFound { id: String },

    /// A block's stored hash does not match its recomputed hash.
    #[error("block {id} hash does not match its contents")]
    InvalidHash { id: String },

    /// A mined block's hash lacks the required leading-zero prefix.
    #[error("block {id} does not meet the difficulty requirement")]
    DifficultyNotMet { id: String },

    /// A block's `prev_hash` does not match its predecessor's hash.
    #[error("block {id} previous hash does not match the chain tip")]
    PrevHashMismatch { id: String },

    #[error("invalid block range: start={start}, end={end}")]
    InvalidRange { start: usize, end: usize },

    /// Difficulty or data directory outside the allowed range; fails fast at
    /// construction.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Id(#[from] IdError),

    #[error(transparent)]
    Block(#[from] BlockError),

    #[error(transparent)]
    Store(#[from] StoreError),
}
