//! Durable storage for the TextProof ledger.
//!
//! Three persisted artifacts, all JSON:
//!
//! - the **canonical chain file** — the authoritative serialization of the
//!   full chain, overwritten atomically (temp-write + rename) on every commit
//! - the **write-ahead log** — blocks accepted but not yet folded into a
//!   canonical save
//! - a **backup directory** — a bounded ring of timestamped canonical-file
//!   snapshots, one taken before each canonical overwrite
//!
//! All backends implement the [`ChainStore`] trait so the ledger can be
//! wired to a [`FileStore`] in production or an [`InMemoryStore`] in tests.

pub mod document;
pub mod error;
pub mod file;
pub mod memory;
pub mod traits;

pub use document::ChainDocument;
pub use error::{StoreError, StoreResult};
pub use file::FileStore;
pub use memory::InMemoryStore;
pub use traits::ChainStore;
