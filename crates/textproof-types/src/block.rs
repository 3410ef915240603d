use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::record::Record;
use crate::seq::GENESIS_ID;

/// One entry in the hash chain.
///
/// A block links a [`Record`] to its predecessor via `prev_hash`, carries the
/// nonce found by the proof-of-work search, and stores its own hash over all
/// other fields. Blocks are created once, mined once, appended once, and
/// never mutated again.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// Sequence ID, e.g. `000-000-001` (see [`crate::seq`]).
    pub id: String,
    /// Hash of the preceding block; empty only for the genesis block.
    pub prev_hash: String,
    pub timestamp: DateTime<Utc>,
    pub data: Record,
    /// Mutated only during mining.
    pub nonce: u64,
    /// SHA-256 hex over all other fields.
    pub hash: String,
}

/// Hash pre-image: every block field except `hash` itself, serialized in
/// declaration order.
#[derive(Serialize)]
struct HashInput<'a> {
    id: &'a str,
    prev_hash: &'a str,
    timestamp: &'a DateTime<Utc>,
    data: &'a Record,
    nonce: u64,
}

/// Errors from block hashing and mining.
#[derive(Debug, thiserror::Error)]
pub enum BlockError {
    #[error("failed to serialize block for hashing: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Block {
    /// Create an unmined block. The hash is empty until [`Block::mine`] (or a
    /// direct [`Block::calculate_hash`] for genesis) fills it in.
    pub fn new(id: String, prev_hash: String, data: Record) -> Self {
        Self {
            id,
            prev_hash,
            timestamp: Utc::now(),
            data,
            nonce: 0,
            hash: String::new(),
        }
    }

    /// The well-known genesis block: fixed record, empty `prev_hash`, hash
    /// computed directly without mining. Exempt from the difficulty check.
    pub fn genesis() -> Result<Self, BlockError> {
        let data = Record {
            author_name: "Alexander Pushkin".into(),
            title: "Eugene Onegin".into(),
            text_start: "My uncle, man of firm convictions".into(),
            text_end: "Some are no more, and distant others".into(),
            content_hash: "genesis".into(),
            public_key: None,
        };
        let mut block = Block::new(GENESIS_ID.to_string(), String::new(), data);
        block.hash = block.calculate_hash()?;
        Ok(block)
    }

    /// Compute the block's hash: JSON-serialize the pre-image (all fields
    /// except `hash`) and SHA-256 it, lowercase hex.
    ///
    /// Pure and reproducible across processes: field order follows the struct
    /// declaration and the timestamp round-trips at stored precision.
    pub fn calculate_hash(&self) -> Result<String, BlockError> {
        let input = HashInput {
            id: &self.id,
            prev_hash: &self.prev_hash,
            timestamp: &self.timestamp,
            data: &self.data,
            nonce: self.nonce,
        };
        let encoded = serde_json::to_vec(&input)?;
        Ok(hex::encode(Sha256::digest(&encoded)))
    }

    /// Recompute the hash and compare to the stored value.
    pub fn validate_hash(&self) -> bool {
        match self.calculate_hash() {
            Ok(computed) => computed == self.hash,
            Err(_) => false,
        }
    }

    /// Whether the stored hash has at least `difficulty` leading `'0'` hex
    /// characters.
    pub fn meets_difficulty(&self, difficulty: usize) -> bool {
        self.hash.len() >= difficulty && self.hash.bytes().take(difficulty).all(|b| b == b'0')
    }

    /// Proof-of-work search: increment the nonce from its current value and
    /// recompute until the hash has `difficulty` leading zero hex characters,
    /// then store the winning hash.
    ///
    /// No iteration bound — callers must keep difficulty within the 1–6
    /// configuration contract.
    pub fn mine(&mut self, difficulty: usize) -> Result<(), BlockError> {
        loop {
            let hash = self.calculate_hash()?;
            if hash.bytes().take(difficulty).all(|b| b == b'0') {
                self.hash = hash;
                return Ok(());
            }
            self.nonce += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::content_digest;

    fn sample_record(text: &str) -> Record {
        Record {
            author_name: "Test Author".into(),
            title: "Test Title".into(),
            text_start: "first few words".into(),
            text_end: "last few words".into(),
            content_hash: content_digest(text),
            public_key: None,
        }
    }

    #[test]
    fn calculate_hash_is_deterministic() {
        let block = Block::new("000-000-001".into(), "abc".into(), sample_record("x"));
        let h1 = block.calculate_hash().unwrap();
        let h2 = block.calculate_hash().unwrap();
        assert_eq!(h1, h2);
        assert_eq!(h1.len(), 64);
    }

    #[test]
    fn hash_changes_with_nonce() {
        let mut block = Block::new("000-000-001".into(), "abc".into(), sample_record("x"));
        let before = block.calculate_hash().unwrap();
        block.nonce += 1;
        let after = block.calculate_hash().unwrap();
        assert_ne!(before, after);
    }

    #[test]
    fn hash_survives_json_roundtrip() {
        let mut block = Block::new("000-000-001".into(), "abc".into(), sample_record("x"));
        block.hash = block.calculate_hash().unwrap();

        let json = serde_json::to_string(&block).unwrap();
        let reloaded: Block = serde_json::from_str(&json).unwrap();
        assert!(reloaded.validate_hash());
        assert_eq!(reloaded.calculate_hash().unwrap(), block.hash);
    }

    #[test]
    fn mine_meets_difficulty() {
        for difficulty in 1..=2 {
            let mut block =
                Block::new("000-000-001".into(), "prev".into(), sample_record("mined"));
            block.mine(difficulty).unwrap();
            assert!(block.meets_difficulty(difficulty));
            assert!(block.validate_hash());
        }
    }

    #[test]
    fn mine_resumes_from_current_nonce() {
        let mut block = Block::new("000-000-001".into(), "prev".into(), sample_record("y"));
        block.nonce = 17;
        block.mine(1).unwrap();
        assert!(block.nonce >= 17);
    }

    #[test]
    fn validate_hash_detects_tampering() {
        let mut block = Block::new("000-000-001".into(), "prev".into(), sample_record("z"));
        block.mine(1).unwrap();
        assert!(block.validate_hash());

        block.data.title = "tampered".into();
        assert!(!block.validate_hash());
    }

    #[test]
    fn genesis_is_valid_without_mining() {
        let genesis = Block::genesis().unwrap();
        assert_eq!(genesis.id, GENESIS_ID);
        assert!(genesis.prev_hash.is_empty());
        assert_eq!(genesis.nonce, 0);
        assert!(genesis.validate_hash());
    }

    #[test]
    fn meets_difficulty_checks_prefix() {
        let mut block = Block::new("000-000-001".into(), "prev".into(), sample_record("p"));
        block.hash = "00ab".repeat(16);
        assert!(block.meets_difficulty(1));
        assert!(block.meets_difficulty(2));
        assert!(!block.meets_difficulty(3));
    }
}
