use serde::{Deserialize, Serialize};
use textproof_types::Block;

/// The persisted form of the full chain: the ordered blocks plus the
/// difficulty they were mined at.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainDocument {
    pub chain: Vec<Block>,
    pub difficulty: usize,
}

impl ChainDocument {
    pub fn new(chain: Vec<Block>, difficulty: usize) -> Self {
        Self { chain, difficulty }
    }
}
