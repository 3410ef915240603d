use std::io;
use std::path::PathBuf;
use std::sync::Mutex;

use textproof_types::Block;

use crate::document::ChainDocument;
use crate::error::{StoreError, StoreResult};
use crate::traits::ChainStore;

/// In-memory [`ChainStore`] for tests and embedding.
///
/// Mirrors the semantics of the file-backed store, including the bounded
/// backup ring, and adds fault-injection hooks so ledger recovery paths can
/// be exercised without a filesystem.
#[derive(Default)]
pub struct InMemoryStore {
    inner: Mutex<State>,
}

#[derive(Default)]
struct State {
    chain: Slot<ChainDocument>,
    wal: Slot<Vec<Block>>,
    backups: Vec<ChainDocument>,
    fail_writes: bool,
}

/// A stored artifact that may be absent, valid, or corrupted by a test hook.
enum Slot<T> {
    Absent,
    Valid(T),
    Corrupt,
}

impl<T> Default for Slot<T> {
    fn default() -> Self {
        Slot::Absent
    }
}

const BACKUP_RETENTION: usize = 5;

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the stored canonical chain as unparseable.
    pub fn corrupt_chain(&self) {
        self.lock().chain = Slot::Corrupt;
    }

    /// Mark the stored WAL as unparseable.
    pub fn corrupt_wal(&self) {
        self.lock().wal = Slot::Corrupt;
    }

    /// Drop every backup snapshot.
    pub fn drop_backups(&self) {
        self.lock().backups.clear();
    }

    /// When enabled, every write operation fails with an I/O error.
    pub fn set_fail_writes(&self, fail: bool) {
        self.lock().fail_writes = fail;
    }

    pub fn backup_count(&self) -> usize {
        self.lock().backups.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.inner.lock().expect("store mutex poisoned")
    }
}

/// A synthetic parse error for corruption injection.
fn parse_error() -> serde_json::Error {
    serde_json::from_str::<ChainDocument>("corrupt").expect_err("must not parse")
}

fn write_failure() -> StoreError {
    StoreError::Io(io::Error::other("injected write failure"))
}

impl ChainStore for InMemoryStore {
    fn load_chain(&self) -> StoreResult<Option<ChainDocument>> {
        match &self.lock().chain {
            Slot::Absent => Ok(None),
            Slot::Valid(doc) => Ok(Some(doc.clone())),
            Slot::Corrupt => Err(StoreError::CorruptChain {
                path: PathBuf::from("<memory>"),
                source: parse_error(),
            }),
        }
    }

    fn save_chain(&self, document: &ChainDocument) -> StoreResult<()> {
        let mut state = self.lock();
        if state.fail_writes {
            return Err(write_failure());
        }

        if let Slot::Valid(previous) = &state.chain {
            let previous = previous.clone();
            state.backups.push(previous);
            if state.backups.len() > BACKUP_RETENTION {
                let excess = state.backups.len() - BACKUP_RETENTION;
                state.backups.drain(..excess);
            }
        }

        state.chain = Slot::Valid(document.clone());
        Ok(())
    }

    fn append_wal(&self, block: &Block) -> StoreResult<()> {
        let mut state = self.lock();
        if state.fail_writes {
            return Err(write_failure());
        }

        let mut pending = match std::mem::take(&mut state.wal) {
            Slot::Valid(pending) => pending,
            // Same behavior as the file store: a torn WAL found while
            // appending is restarted from empty.
            Slot::Absent | Slot::Corrupt => Vec::new(),
        };
        pending.push(block.clone());
        state.wal = Slot::Valid(pending);
        Ok(())
    }

    fn read_wal(&self) -> StoreResult<Vec<Block>> {
        match &self.lock().wal {
            Slot::Absent => Ok(Vec::new()),
            Slot::Valid(pending) => Ok(pending.clone()),
            Slot::Corrupt => Err(StoreError::CorruptWal {
                path: PathBuf::from("<memory>"),
                source: parse_error(),
            }),
        }
    }

    fn clear_wal(&self) -> StoreResult<()> {
        self.lock().wal = Slot::Absent;
        Ok(())
    }

    fn restore_backup(&self) -> StoreResult<()> {
        let mut state = self.lock();
        let latest = state.backups.last().cloned().ok_or(StoreError::NoBackups)?;
        state.chain = Slot::Valid(latest);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use textproof_types::{content_digest, Record};

    fn document(texts: &[&str]) -> ChainDocument {
        let chain = texts
            .iter()
            .enumerate()
            .map(|(i, text)| {
                let mut block = Block::new(
                    format!("000-000-{i:03}"),
                    "prev".into(),
                    Record {
                        author_name: "Author".into(),
                        title: text.to_string(),
                        text_start: "start".into(),
                        text_end: "end".into(),
                        content_hash: content_digest(text),
                        public_key: None,
                    },
                );
                block.hash = block.calculate_hash().unwrap();
                block
            })
            .collect();
        ChainDocument::new(chain, 1)
    }

    #[test]
    fn behaves_like_an_empty_store_initially() {
        let store = InMemoryStore::new();
        assert!(store.load_chain().unwrap().is_none());
        assert!(store.read_wal().unwrap().is_empty());
        assert!(matches!(
            store.restore_backup().unwrap_err(),
            StoreError::NoBackups
        ));
    }

    #[test]
    fn save_snapshots_previous_chain_as_backup() {
        let store = InMemoryStore::new();
        let first = document(&["a"]);
        let second = document(&["a", "b"]);

        store.save_chain(&first).unwrap();
        assert_eq!(store.backup_count(), 0);

        store.save_chain(&second).unwrap();
        assert_eq!(store.backup_count(), 1);

        store.restore_backup().unwrap();
        assert_eq!(store.load_chain().unwrap().unwrap(), first);
    }

    #[test]
    fn backups_are_bounded() {
        let store = InMemoryStore::new();
        for i in 0..10 {
            store.save_chain(&document(&[&format!("t{i}")])).unwrap();
        }
        assert!(store.backup_count() <= BACKUP_RETENTION);
    }

    #[test]
    fn corruption_hooks_surface_as_errors() {
        let store = InMemoryStore::new();
        store.save_chain(&document(&["a"])).unwrap();

        store.corrupt_chain();
        assert!(matches!(
            store.load_chain().unwrap_err(),
            StoreError::CorruptChain { .. }
        ));

        store.corrupt_wal();
        assert!(matches!(
            store.read_wal().unwrap_err(),
            StoreError::CorruptWal { .. }
        ));
    }

    #[test]
    fn injected_write_failures_propagate() {
        let store = InMemoryStore::new();
        store.set_fail_writes(true);
        assert!(matches!(
            store.save_chain(&document(&["a"])).unwrap_err(),
            StoreError::Io(_)
        ));
    }
}
