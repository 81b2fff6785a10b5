//! The three concurrent key-value indexes (C3, C4, C5) and the status enum
//! their operations share.

pub mod array;
pub mod hash;
pub mod tree;

use serde::Serialize;

pub use array::ArrayIndex;
pub use hash::HashIndex;
pub use tree::TreeIndex;

/// Outcome of an index operation, shared across the array, hash and tree
/// backends so the dispatcher (C6) can format all three identically.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// The operation completed and mutated or read the index successfully.
    Ok,
    /// `set` found the key already present; no mutation occurred.
    Exist,
    /// `get`/`mod`/`del`/`exist` found no entry for the key.
    NoExist,
    /// `set` found the index at capacity.
    Full,
    /// Invalid input (nil/empty key or value) or an internal failure.
    Error,
}

/// Occupancy snapshot of a single index, as exposed by `GET /api/stats`.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct IndexStats {
    /// Number of live entries.
    pub count: u64,
    /// Capacity of the backing store (bucket count, for the hash index).
    pub max: u64,
    /// `max - count`. Can go negative for the hash index, whose `max` is a
    /// bucket count rather than a key-count ceiling: chains are allowed to
    /// grow past one entry per bucket, matching the original C
    /// implementation's `kvs_get_stats`.
    pub remaining: i64,
}

impl IndexStats {
    fn new(count: u64, max: u64) -> Self {
        Self {
            count,
            max,
            remaining: max as i64 - count as i64,
        }
    }
}

/// Rejects `nil`/empty keys and values, matching the original source's
/// blanket `ERROR` on missing input.
pub(crate) fn validate_non_empty(bytes: &[u8]) -> bool {
    !bytes.is_empty()
}
