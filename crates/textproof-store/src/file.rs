use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use textproof_types::Block;
use tracing::{debug, info, warn};

use crate::document::ChainDocument;
use crate::error::{StoreError, StoreResult};
use crate::traits::ChainStore;

/// Maximum number of backup snapshots retained in the backup directory.
pub const MAX_BACKUPS: usize = 5;

const CHAIN_FILE: &str = "blockchain.json";
const WAL_FILE: &str = "wal.json";
const BACKUP_DIR: &str = "backups";

/// Filesystem-backed [`ChainStore`].
///
/// An explicit object holding configured paths — no process-global state —
/// so multiple stores can coexist (one tempdir each in tests). All writes go
/// through a temp-file + atomic-rename helper; the canonical file is never
/// observable in a partially written state.
pub struct FileStore {
    chain_file: PathBuf,
    wal_file: PathBuf,
    backup_dir: PathBuf,
    /// Serializes mutations: concurrent writers share the temp-file paths.
    /// Readers need no lock; rename keeps them safe.
    write_lock: Mutex<()>,
}

impl FileStore {
    /// Open a store rooted at `data_dir`, creating the directory layout if
    /// needed.
    pub fn open(data_dir: &Path) -> StoreResult<Self> {
        let backup_dir = data_dir.join(BACKUP_DIR);
        fs::create_dir_all(data_dir)?;
        fs::create_dir_all(&backup_dir)?;

        Ok(Self {
            chain_file: data_dir.join(CHAIN_FILE),
            wal_file: data_dir.join(WAL_FILE),
            backup_dir,
            write_lock: Mutex::new(()),
        })
    }

    /// Path to the canonical chain file.
    pub fn chain_path(&self) -> &Path {
        &self.chain_file
    }

    /// Path to the WAL file.
    pub fn wal_path(&self) -> &Path {
        &self.wal_file
    }

    /// Path to the backup directory.
    pub fn backup_path(&self) -> &Path {
        &self.backup_dir
    }

    /// Snapshot the current canonical file into the backup directory, then
    /// prune old backups. A missing canonical file means there is nothing to
    /// back up.
    fn create_backup(&self) -> StoreResult<()> {
        let data = match fs::read(&self.chain_file) {
            Ok(data) => data,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
        };

        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        let backup_path = self
            .backup_dir
            .join(format!("blockchain_backup_{nanos}.json"));
        fs::write(&backup_path, data)?;
        debug!(path = %backup_path.display(), "created backup");

        if let Err(e) = self.cleanup_old_backups() {
            // Pruning failure leaves extra snapshots behind; the next save
            // retries.
            warn!(error = %e, "failed to clean up old backups");
        }

        Ok(())
    }

    /// Delete the oldest backups beyond [`MAX_BACKUPS`], ordered by file
    /// modification time.
    fn cleanup_old_backups(&self) -> StoreResult<()> {
        let mut backups = self.list_backups()?;
        if backups.len() <= MAX_BACKUPS {
            return Ok(());
        }

        // Modification time first; the nanosecond-stamped file name breaks
        // ties on filesystems with coarse mtime granularity.
        backups.sort_by(|a, b| (a.1, &a.0).cmp(&(b.1, &b.0)));
        let excess = backups.len() - MAX_BACKUPS;
        for (path, _) in backups.into_iter().take(excess) {
            fs::remove_file(&path)?;
            debug!(path = %path.display(), "pruned old backup");
        }

        Ok(())
    }

    fn list_backups(&self) -> StoreResult<Vec<(PathBuf, SystemTime)>> {
        let mut backups = Vec::new();
        for entry in fs::read_dir(&self.backup_dir)? {
            let entry = entry?;
            let metadata = entry.metadata()?;
            if metadata.is_dir() {
                continue;
            }
            backups.push((entry.path(), metadata.modified()?));
        }
        Ok(backups)
    }
}

/// Write `data` to a sibling temp file, fsync, then rename over `path`.
/// Rename is atomic on POSIX filesystems.
fn write_atomic(path: &Path, data: &[u8]) -> StoreResult<()> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp = path.with_file_name(format!("{file_name}.tmp"));

    let mut file = File::create(&tmp)?;
    file.write_all(data)?;
    file.sync_all()?;
    fs::rename(&tmp, path)?;
    Ok(())
}

impl ChainStore for FileStore {
    fn load_chain(&self) -> StoreResult<Option<ChainDocument>> {
        let data = match fs::read(&self.chain_file) {
            Ok(data) => data,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let document = serde_json::from_slice(&data).map_err(|source| StoreError::CorruptChain {
            path: self.chain_file.clone(),
            source,
        })?;
        Ok(Some(document))
    }

    fn save_chain(&self, document: &ChainDocument) -> StoreResult<()> {
        let _guard = self.write_lock.lock().expect("store mutex poisoned");

        // Snapshot the previous canonical content first. A failed backup is
        // not fatal: the canonical save itself is still atomic.
        if let Err(e) = self.create_backup() {
            warn!(error = %e, "failed to create backup before save");
        }

        let data = serde_json::to_vec_pretty(document)?;
        write_atomic(&self.chain_file, &data)?;
        debug!(blocks = document.chain.len(), "saved canonical chain");
        Ok(())
    }

    fn append_wal(&self, block: &Block) -> StoreResult<()> {
        let _guard = self.write_lock.lock().expect("store mutex poisoned");

        let mut blocks: Vec<Block> = match fs::read(&self.wal_file) {
            Ok(data) => serde_json::from_slice(&data).unwrap_or_else(|e| {
                // A torn WAL found while appending is restarted from empty;
                // the canonical file still holds everything committed.
                warn!(error = %e, "corrupt WAL found during append; restarting it");
                Vec::new()
            }),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e.into()),
        };

        blocks.push(block.clone());
        let data = serde_json::to_vec_pretty(&blocks)?;
        write_atomic(&self.wal_file, &data)?;
        debug!(id = %block.id, pending = blocks.len(), "WAL append");
        Ok(())
    }

    fn read_wal(&self) -> StoreResult<Vec<Block>> {
        let data = match fs::read(&self.wal_file) {
            Ok(data) => data,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        serde_json::from_slice(&data).map_err(|source| StoreError::CorruptWal {
            path: self.wal_file.clone(),
            source,
        })
    }

    fn clear_wal(&self) -> StoreResult<()> {
        let _guard = self.write_lock.lock().expect("store mutex poisoned");

        match fs::remove_file(&self.wal_file) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn restore_backup(&self) -> StoreResult<()> {
        let _guard = self.write_lock.lock().expect("store mutex poisoned");

        let mut backups = self.list_backups()?;
        backups.sort_by(|a, b| (a.1, &a.0).cmp(&(b.1, &b.0)));
        let latest = backups.pop().ok_or(StoreError::NoBackups)?;

        let data = fs::read(&latest.0)?;
        write_atomic(&self.chain_file, &data)?;
        info!(path = %latest.0.display(), "restored canonical chain from backup");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use textproof_types::{content_digest, Record};

    fn record(text: &str) -> Record {
        Record {
            author_name: "Author".into(),
            title: text.to_string(),
            text_start: "start".into(),
            text_end: "end".into(),
            content_hash: content_digest(text),
            public_key: None,
        }
    }

    fn block(id: &str, text: &str) -> Block {
        let mut b = Block::new(id.into(), "prev".into(), record(text));
        b.hash = b.calculate_hash().unwrap();
        b
    }

    fn document(texts: &[&str]) -> ChainDocument {
        let chain = texts
            .iter()
            .enumerate()
            .map(|(i, t)| block(&format!("000-000-{i:03}"), t))
            .collect();
        ChainDocument::new(chain, 2)
    }

    #[test]
    fn load_absent_chain_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        assert!(store.load_chain().unwrap().is_none());
    }

    #[test]
    fn save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();

        let doc = document(&["one", "two"]);
        store.save_chain(&doc).unwrap();

        let loaded = store.load_chain().unwrap().unwrap();
        assert_eq!(loaded, doc);
    }

    #[test]
    fn corrupt_chain_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();

        fs::write(store.chain_path(), b"{not json").unwrap();
        let err = store.load_chain().unwrap_err();
        assert!(matches!(err, StoreError::CorruptChain { .. }));
    }

    #[test]
    fn wal_append_read_clear() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();

        assert!(store.read_wal().unwrap().is_empty());

        let b1 = block("000-000-001", "one");
        let b2 = block("000-000-002", "two");
        store.append_wal(&b1).unwrap();
        store.append_wal(&b2).unwrap();

        let pending = store.read_wal().unwrap();
        assert_eq!(pending, vec![b1, b2]);

        store.clear_wal().unwrap();
        assert!(store.read_wal().unwrap().is_empty());

        // Clearing an absent WAL is a no-op.
        store.clear_wal().unwrap();
    }

    #[test]
    fn corrupt_wal_is_an_error_on_read() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();

        fs::write(store.wal_path(), b"[{broken").unwrap();
        let err = store.read_wal().unwrap_err();
        assert!(matches!(err, StoreError::CorruptWal { .. }));
    }

    #[test]
    fn corrupt_wal_is_restarted_on_append() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();

        fs::write(store.wal_path(), b"garbage").unwrap();
        let b = block("000-000-001", "fresh");
        store.append_wal(&b).unwrap();

        assert_eq!(store.read_wal().unwrap(), vec![b]);
    }

    #[test]
    fn backup_is_taken_before_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();

        let first = document(&["first"]);
        let second = document(&["first", "second"]);
        store.save_chain(&first).unwrap();
        // The first save had no previous canonical file, so no backup yet.
        assert!(store.list_backups().unwrap().is_empty());

        store.save_chain(&second).unwrap();
        assert_eq!(store.list_backups().unwrap().len(), 1);
    }

    #[test]
    fn restore_recovers_previous_canonical_content() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();

        let first = document(&["first"]);
        let second = document(&["first", "second"]);
        store.save_chain(&first).unwrap();
        store.save_chain(&second).unwrap();

        // Simulate canonical-file corruption, then restore.
        fs::write(store.chain_path(), b"corrupted").unwrap();
        store.restore_backup().unwrap();

        let restored = store.load_chain().unwrap().unwrap();
        assert_eq!(restored, first);
    }

    #[test]
    fn restore_without_backups_fails() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        let err = store.restore_backup().unwrap_err();
        assert!(matches!(err, StoreError::NoBackups));
    }

    #[test]
    fn backups_are_pruned_to_retention_count() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();

        for i in 0..(MAX_BACKUPS + 3) {
            let doc = document(&[&format!("text-{i}")]);
            store.save_chain(&doc).unwrap();
        }

        assert!(store.list_backups().unwrap().len() <= MAX_BACKUPS);
    }

    #[test]
    fn canonical_file_never_half_written() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();

        store.save_chain(&document(&["one"])).unwrap();

        // The temp file must not linger after a successful save.
        let tmp = store.chain_path().with_file_name("blockchain.json.tmp");
        assert!(!tmp.exists());
        assert!(store.load_chain().unwrap().is_some());
    }
}
