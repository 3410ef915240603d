//! Core orchestrator for the TextProof ledger.
//!
//! The [`Ledger`] holds the in-memory ordered chain and a content-digest
//! index behind a single reader/writer lock, and coordinates mining,
//! write-ahead logging, canonical persistence, backup recovery, and chain
//! validation. Mining and file I/O always run outside the lock; only the
//! in-memory commit step is locked, so lookups are never blocked by an
//! in-progress proof-of-work search.
//!
//! Public operations: [`Ledger::append`], [`Ledger::get_by_id`],
//! [`Ledger::has_content_digest`], [`Ledger::validate_chain`],
//! [`Ledger::chain_info`], [`Ledger::list_all`].

pub mod config;
pub mod error;
pub mod info;
pub mod ledger;

pub use config::{LedgerConfig, MAX_DIFFICULTY, MIN_DIFFICULTY};
pub use error::LedgerError;
pub use info::ChainInfo;
pub use ledger::Ledger;
