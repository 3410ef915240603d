use std::path::PathBuf;

use crate::error::LedgerError;

/// Lowest allowed mining difficulty.
pub const MIN_DIFFICULTY: usize = 1;
/// Highest allowed mining difficulty. The proof-of-work search has no
/// iteration bound, so the contract caps difficulty here.
pub const MAX_DIFFICULTY: usize = 6;

/// Ledger construction parameters, immutable for the process lifetime.
#[derive(Clone, Debug)]
pub struct LedgerConfig {
    /// Directory holding the canonical chain file, WAL, and backups.
    pub data_dir: PathBuf,
    /// Required count of leading zero hex characters in mined block hashes.
    pub difficulty: usize,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            difficulty: 4,
        }
    }
}

impl LedgerConfig {
    pub fn new(data_dir: impl Into<PathBuf>, difficulty: usize) -> Self {
        Self {
            data_dir: data_dir.into(),
            difficulty,
        }
    }

    pub fn validate(&self) -> Result<(), LedgerError> {
        if !(MIN_DIFFICULTY..=MAX_DIFFICULTY).contains(&self.difficulty) {
            return Err(LedgerError::InvalidConfig(format!(
                "difficulty must be between {MIN_DIFFICULTY} and {MAX_DIFFICULTY}, got {}",
                self.difficulty
            )));
        }
        if self.data_dir.as_os_str().is_empty() {
            return Err(LedgerError::InvalidConfig(
                "data directory must not be empty".into(),
            ));
        }
        Ok(())
    }
}
