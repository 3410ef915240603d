use serde::Serialize;

/// Read-only snapshot of the chain, taken under a single read lock.
///
/// A fixed struct with named fields rather than a loosely typed map, so
/// callers never need runtime type assertions.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ChainInfo {
    pub length: usize,
    pub difficulty: usize,
    pub valid: bool,
    pub first_id: Option<String>,
    pub last_id: Option<String>,
}
