use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use textproof_store::{ChainDocument, ChainStore, FileStore, StoreError};
use textproof_types::{next_id, Block, Record, GENESIS_ID};
use tracing::{debug, info, warn};

use crate::config::{LedgerConfig, MAX_DIFFICULTY, MIN_DIFFICULTY};
use crate::error::LedgerError;
use crate::info::ChainInfo;

/// The append-only hash-chained ledger.
///
/// Holds the ordered chain and a content-digest index behind one
/// reader/writer lock. The index is always a structural projection of the
/// chain and is rebuilt whenever a chain is adopted from disk. After a
/// successful [`Ledger::open`] the chain is never empty: a genesis block is
/// always present.
pub struct Ledger {
    difficulty: usize,
    store: Box<dyn ChainStore>,
    state: RwLock<ChainState>,
}

impl std::fmt::Debug for Ledger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ledger")
            .field("difficulty", &self.difficulty)
            .finish_non_exhaustive()
    }
}

#[derive(Default)]
struct ChainState {
    chain: Vec<Block>,
    /// Content digest -> position in `chain`; O(1) duplicate detection.
    digest_index: HashMap<String, usize>,
}

/// Outcome of the locked in-memory commit step.
enum CommitError {
    /// The digest is already present; carries the existing block.
    Duplicate(Block),
    /// The chain tip moved while mining ran outside the lock; the caller
    /// discards the mined block and re-mines against the new tip.
    TipMoved,
    /// The block failed hash or difficulty re-validation despite having just
    /// been mined. Indicates a bug, not a race.
    Rejected(LedgerError),
}

impl Ledger {
    /// Open a file-backed ledger, running the startup recovery sequence:
    /// load the canonical chain, replay the WAL, validate, restore from
    /// backup if needed, and fall back to a fresh genesis chain as a last
    /// resort.
    pub fn open(config: LedgerConfig) -> Result<Self, LedgerError> {
        config.validate()?;
        let store = FileStore::open(&config.data_dir)?;
        Self::with_store(Box::new(store), config.difficulty)
    }

    /// Open a ledger over any [`ChainStore`] implementation. Used by tests
    /// to run several ledgers side by side without touching the filesystem.
    pub fn with_store(store: Box<dyn ChainStore>, difficulty: usize) -> Result<Self, LedgerError> {
        if !(MIN_DIFFICULTY..=MAX_DIFFICULTY).contains(&difficulty) {
            return Err(LedgerError::InvalidConfig(format!(
                "difficulty must be between {MIN_DIFFICULTY} and {MAX_DIFFICULTY}, got {difficulty}"
            )));
        }

        let ledger = Self {
            difficulty,
            store,
            state: RwLock::new(ChainState::default()),
        };
        ledger.bootstrap()?;
        Ok(ledger)
    }

    /// Append a record to the chain.
    ///
    /// If a block with the same content digest already exists it is returned
    /// unchanged — idempotent deduplication, not an error. Otherwise the
    /// record is wrapped in a block linked to the current tip, mined outside
    /// any lock, durably recorded in the WAL, committed (with the invariants
    /// re-checked inside the write lock), and folded into the canonical
    /// file. If the tip moved while mining, the mined block is discarded and
    /// the append re-mines against the new tip, so no appends are lost under
    /// concurrency.
    pub fn append(&self, record: Record) -> Result<Block, LedgerError> {
        if let Some(existing) = self.has_content_digest(&record.content_hash) {
            debug!(id = %existing.id, "duplicate content digest; returning existing block");
            return Ok(existing);
        }

        loop {
            // Snapshot the tip under a read lock; the ID and prev-hash are
            // re-checked at commit time, so a stale snapshot only costs a
            // re-mine.
            let (id, prev_hash) = {
                let state = self.read_state();
                match state.chain.last() {
                    Some(tail) => (next_id(&tail.id)?, tail.hash.clone()),
                    None => (GENESIS_ID.to_string(), String::new()),
                }
            };

            let mut block = Block::new(id, prev_hash, record.clone());
            block.mine(self.difficulty)?;

            // Write-ahead: the mined block is durable before the in-memory
            // commit, so a crash here is repaired by WAL replay at startup.
            self.store.append_wal(&block)?;

            match self.commit(block) {
                Ok(committed) => {
                    self.persist()?;
                    if let Err(e) = self.store.clear_wal() {
                        // Non-fatal: the next startup replays an already
                        // committed block, which dedup turns into a no-op.
                        warn!(error = %e, "failed to clear WAL after canonical save");
                    }
                    return Ok(committed);
                }
                Err(CommitError::Duplicate(existing)) => return Ok(existing),
                Err(CommitError::TipMoved) => {
                    debug!("chain tip moved during mining; re-mining");
                    continue;
                }
                Err(CommitError::Rejected(err)) => return Err(err),
            }
        }
    }

    /// Look up a block by sequence ID. Linear scan; acceptable at expected
    /// ledger sizes.
    pub fn get_by_id(&self, id: &str) -> Result<Block, LedgerError> {
        let state = self.read_state();
        state
            .chain
            .iter()
            .find(|block| block.id == id)
            .cloned()
            .ok_or_else(|| LedgerError::NotFound { id: id.to_string() })
    }

    /// O(1) lookup of a block by its record's content digest.
    pub fn has_content_digest(&self, digest: &str) -> Option<Block> {
        let state = self.read_state();
        state
            .digest_index
            .get(digest)
            .map(|&position| state.chain[position].clone())
    }

    /// Walk the chain once: every stored hash must match its recomputed
    /// hash, every non-genesis block must meet the difficulty prefix, and
    /// every `prev_hash` must equal the predecessor's hash. An empty chain
    /// is vacuously valid.
    pub fn validate_chain(&self) -> bool {
        let state = self.read_state();
        validate_blocks(&state.chain, self.difficulty)
    }

    /// Read-only snapshot of the chain, taken under a single read lock.
    pub fn chain_info(&self) -> ChainInfo {
        let state = self.read_state();
        ChainInfo {
            length: state.chain.len(),
            difficulty: self.difficulty,
            valid: validate_blocks(&state.chain, self.difficulty),
            first_id: state.chain.first().map(|block| block.id.clone()),
            last_id: state.chain.last().map(|block| block.id.clone()),
        }
    }

    /// All blocks in order, as a defensive copy.
    pub fn list_all(&self) -> Vec<Block> {
        self.read_state().chain.clone()
    }

    /// Blocks in the half-open position range `[start, end)`.
    pub fn blocks_range(&self, start: usize, end: usize) -> Result<Vec<Block>, LedgerError> {
        let state = self.read_state();
        if start >= end || end > state.chain.len() {
            return Err(LedgerError::InvalidRange { start, end });
        }
        Ok(state.chain[start..end].to_vec())
    }

    /// The current chain tip.
    pub fn last_block(&self) -> Option<Block> {
        self.read_state().chain.last().cloned()
    }

    pub fn difficulty(&self) -> usize {
        self.difficulty
    }

    /// Startup sequence: Empty -> GenesisOnly | Loaded -> Validated -> Ready.
    fn bootstrap(&self) -> Result<(), LedgerError> {
        match self.store.load_chain() {
            Ok(Some(document)) => {
                self.adopt(document.chain);
                self.replay_wal();
                if !self.validate_chain() {
                    warn!("loaded chain failed validation; attempting backup restore");
                    self.recover_or_reset()?;
                }
            }
            Ok(None) => {
                info!("no canonical chain found; creating genesis block");
                self.adopt(vec![Block::genesis()?]);
                self.persist()?;
            }
            Err(StoreError::CorruptChain { .. }) => {
                warn!("canonical chain file is corrupt; attempting backup restore");
                self.recover_or_reset()?;
            }
            Err(e) => return Err(e.into()),
        }
        Ok(())
    }

    /// Backup restore, re-validated once; a fresh genesis chain is the last
    /// resort and discards data, so it is logged loudly rather than applied
    /// silently.
    fn recover_or_reset(&self) -> Result<(), LedgerError> {
        if self.try_restore_backup() && self.validate_chain() {
            info!("chain recovered from backup");
            return Ok(());
        }

        warn!("chain unrecoverable; resetting to a fresh genesis chain (data will be lost)");
        self.adopt(vec![Block::genesis()?]);
        self.persist()?;
        if let Err(e) = self.store.clear_wal() {
            warn!(error = %e, "failed to clear WAL after genesis reset");
        }
        Ok(())
    }

    /// Replay blocks recorded in the WAL since the last canonical save
    /// through the same commit path used by `append`. Already committed
    /// blocks are dedup no-ops; a block that no longer extends the tip stops
    /// the replay and leaves the decision to chain validation.
    fn replay_wal(&self) {
        let pending = match self.store.read_wal() {
            Ok(pending) => pending,
            Err(e @ StoreError::CorruptWal { .. }) => {
                warn!(error = %e, "WAL is corrupt; attempting backup restore");
                if self.try_restore_backup() {
                    info!("chain reloaded from backup after WAL corruption");
                    // Drop the unusable WAL so the regression is not
                    // repeated on every startup.
                    if let Err(e) = self.store.clear_wal() {
                        warn!(error = %e, "failed to clear corrupt WAL");
                    }
                }
                return;
            }
            Err(e) => {
                warn!(error = %e, "failed to read WAL; skipping replay");
                return;
            }
        };

        if pending.is_empty() {
            return;
        }

        info!(pending = pending.len(), "replaying write-ahead log");
        let mut replayed = 0usize;
        for block in pending {
            let id = block.id.clone();
            match self.commit(block) {
                Ok(_) => replayed += 1,
                Err(CommitError::Duplicate(_)) => {
                    // Committed before the crash; the canonical save simply
                    // never cleared the WAL.
                    debug!(%id, "WAL block already present; skipping");
                }
                Err(CommitError::TipMoved) => {
                    let err = LedgerError::PrevHashMismatch { id };
                    warn!(error = %err, "WAL block does not extend the chain; stopping replay");
                    break;
                }
                Err(CommitError::Rejected(err)) => {
                    warn!(error = %err, "WAL block rejected; stopping replay");
                    break;
                }
            }
        }

        if replayed > 0 {
            info!(replayed, "WAL replay complete; folding into canonical file");
        }
        if let Err(e) = self.persist() {
            warn!(error = %e, "failed to save chain after WAL replay");
            return;
        }
        if let Err(e) = self.store.clear_wal() {
            warn!(error = %e, "failed to clear WAL after replay");
        }
    }

    fn try_restore_backup(&self) -> bool {
        if let Err(e) = self.store.restore_backup() {
            warn!(error = %e, "backup restore failed");
            return false;
        }
        match self.store.load_chain() {
            Ok(Some(document)) => {
                self.adopt(document.chain);
                true
            }
            Ok(None) => {
                warn!("backup restore produced no canonical chain");
                false
            }
            Err(e) => {
                warn!(error = %e, "failed to load chain restored from backup");
                false
            }
        }
    }

    /// The locked in-memory commit step. Re-checks the duplicate index, the
    /// linkage to the current tip, the block's own hash, and the difficulty
    /// prefix — closing the race between mining (outside the lock) and
    /// commit.
    fn commit(&self, block: Block) -> Result<Block, CommitError> {
        let mut state = self.write_state();

        if let Some(&position) = state.digest_index.get(&block.data.content_hash) {
            return Err(CommitError::Duplicate(state.chain[position].clone()));
        }

        match state.chain.last() {
            Some(tail) if block.prev_hash != tail.hash => return Err(CommitError::TipMoved),
            None if !block.prev_hash.is_empty() => return Err(CommitError::TipMoved),
            _ => {}
        }

        if !block.validate_hash() {
            return Err(CommitError::Rejected(LedgerError::InvalidHash {
                id: block.id.clone(),
            }));
        }

        // Genesis is exempt from the difficulty requirement.
        if !state.chain.is_empty() && !block.meets_difficulty(self.difficulty) {
            return Err(CommitError::Rejected(LedgerError::DifficultyNotMet {
                id: block.id.clone(),
            }));
        }

        let position = state.chain.len();
        state
            .digest_index
            .insert(block.data.content_hash.clone(), position);
        state.chain.push(block.clone());
        Ok(block)
    }

    /// Replace the in-memory chain and rebuild the digest index from it.
    fn adopt(&self, chain: Vec<Block>) {
        let mut state = self.write_state();
        state.digest_index = rebuild_index(&chain);
        state.chain = chain;
    }

    /// Serialize a snapshot taken under the read lock, then save it outside
    /// any lock.
    fn persist(&self) -> Result<(), LedgerError> {
        let document = {
            let state = self.read_state();
            ChainDocument::new(state.chain.clone(), self.difficulty)
        };
        self.store.save_chain(&document)?;
        Ok(())
    }

    fn read_state(&self) -> RwLockReadGuard<'_, ChainState> {
        self.state.read().expect("ledger lock poisoned")
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, ChainState> {
        self.state.write().expect("ledger lock poisoned")
    }
}

fn rebuild_index(chain: &[Block]) -> HashMap<String, usize> {
    chain
        .iter()
        .enumerate()
        .filter(|(_, block)| !block.data.content_hash.is_empty())
        .map(|(position, block)| (block.data.content_hash.clone(), position))
        .collect()
}

fn validate_blocks(chain: &[Block], difficulty: usize) -> bool {
    let Some(genesis) = chain.first() else {
        return true;
    };
    if !genesis.validate_hash() {
        return false;
    }

    chain.windows(2).all(|pair| {
        let (previous, current) = (&pair[0], &pair[1]);
        current.validate_hash()
            && current.prev_hash == previous.hash
            && current.meets_difficulty(difficulty)
    })
}
