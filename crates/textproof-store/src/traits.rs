use textproof_types::Block;

use crate::document::ChainDocument;
use crate::error::StoreResult;

/// Storage boundary for the ledger.
///
/// Implementations must satisfy these invariants:
/// - A canonical save is all-or-nothing: the chain file is never observable
///   in a partially written state.
/// - A backup snapshot of the previous canonical content is taken before
///   each overwrite, and the backup set is pruned to a bounded count.
/// - An absent file is not an error (`load_chain` returns `Ok(None)`,
///   `read_wal` returns an empty list); unparseable content is
///   (`CorruptChain` / `CorruptWal`).
/// - All I/O errors are propagated, never silently ignored.
pub trait ChainStore: Send + Sync {
    /// Load the canonical chain document, or `Ok(None)` if none was ever
    /// saved.
    fn load_chain(&self) -> StoreResult<Option<ChainDocument>>;

    /// Atomically replace the canonical chain document, snapshotting the
    /// previous content into the backup set first.
    fn save_chain(&self, document: &ChainDocument) -> StoreResult<()>;

    /// Record a block in the write-ahead log.
    fn append_wal(&self, block: &Block) -> StoreResult<()>;

    /// Read all pending WAL blocks; empty if the WAL is absent.
    fn read_wal(&self) -> StoreResult<Vec<Block>>;

    /// Drop the write-ahead log.
    fn clear_wal(&self) -> StoreResult<()>;

    /// Replace the canonical chain document with the most recent backup.
    ///
    /// Fails with `NoBackups` if the backup set is empty.
    fn restore_backup(&self) -> StoreResult<()>;
}

/// Shared stores are stores too; lets callers keep a handle to a store they
/// hand to a ledger (used heavily by tests for fault injection).
impl<S: ChainStore + ?Sized> ChainStore for std::sync::Arc<S> {
    fn load_chain(&self) -> StoreResult<Option<ChainDocument>> {
        (**self).load_chain()
    }

    fn save_chain(&self, document: &ChainDocument) -> StoreResult<()> {
        (**self).save_chain(document)
    }

    fn append_wal(&self, block: &Block) -> StoreResult<()> {
        (**self).append_wal(block)
    }

    fn read_wal(&self) -> StoreResult<Vec<Block>> {
        (**self).read_wal()
    }

    fn clear_wal(&self) -> StoreResult<()> {
        (**self).clear_wal()
    }

    fn restore_backup(&self) -> StoreResult<()> {
        (**self).restore_backup()
    }
}
