//! Foundation types for the TextProof ledger.
//!
//! This crate defines the immutable content unit ([`Record`]), the
//! hash-chained block wrapping it ([`Block`], including hash computation and
//! the proof-of-work search), and the strictly increasing sequence-ID
//! generator ([`seq`]). It has no storage or orchestration concerns; those
//! live in `textproof-store` and `textproof-ledger`.

pub mod block;
pub mod record;
pub mod seq;

pub use block::{Block, BlockError};
pub use record::{content_digest, Record};
pub use seq::{next_id, IdError, GENESIS_ID};
