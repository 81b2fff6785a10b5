//! Ordered-tree index keyed by byte-wise string order (C5).
//!
//! Backed by `BTreeMap`, whose keys are stored in a self-balancing B-tree
//! ordered by `Ord`: a balanced, lexicographically ordered, O(log n) index
//! without hand-rolling a red-black tree.

use std::collections::BTreeMap;
use std::sync::RwLock;

use super::{validate_non_empty, IndexStats, Status};

struct Inner {
    entries: BTreeMap<Vec<u8>, Vec<u8>>,
}

/// Ordered key-value tree of fixed capacity `N_R`.
///
/// Capacity is enforced the same way as the array index: the original C
/// server's stats endpoint reports a `max`/`remaining` pair for the rbtree
/// identical in shape to array and hash (`kvs_get_stats`), so this rewrite
/// gives the tree the same bounded-capacity discipline rather than leaving
/// `max`/`remaining` meaningless for an unbounded structure. See DESIGN.md.
pub struct TreeIndex {
    capacity: usize,
    inner: RwLock<Inner>,
}

impl TreeIndex {
    /// Creates an empty tree with room for `capacity` entries.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            inner: RwLock::new(Inner {
                entries: BTreeMap::new(),
            }),
        }
    }

    /// Inserts `key`/`value` if `key` isn't already present.
    pub fn set(&self, key: &[u8], value: &[u8]) -> Status {
        if !validate_non_empty(key) || !validate_non_empty(value) {
            return Status::Error;
        }

        let mut inner = self.inner.write().unwrap();
        if inner.entries.contains_key(key) {
            return Status::Exist;
        }
        if inner.entries.len() == self.capacity {
            return Status::Full;
        }

        inner.entries.insert(key.to_vec(), value.to_vec());
        Status::Ok
    }

    /// Returns a copy of the stored value, if present.
    pub fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        if !validate_non_empty(key) {
            return None;
        }

        let inner = self.inner.read().unwrap();
        inner.entries.get(key).cloned()
    }

    /// Replaces the value for an existing key.
    pub fn modify(&self, key: &[u8], value: &[u8]) -> Status {
        if !validate_non_empty(key) || !validate_non_empty(value) {
            return Status::Error;
        }

        let mut inner = self.inner.write().unwrap();
        match inner.entries.get_mut(key) {
            Some(v) => {
                *v = value.to_vec();
                Status::Ok
            }
            None => Status::NoExist,
        }
    }

    /// Removes an entry.
    pub fn del(&self, key: &[u8]) -> Status {
        if !validate_non_empty(key) {
            return Status::Error;
        }

        let mut inner = self.inner.write().unwrap();
        match inner.entries.remove(key) {
            Some(_) => Status::Ok,
            None => Status::NoExist,
        }
    }

    /// Reports whether `key` is present.
    pub fn exist(&self, key: &[u8]) -> Status {
        if !validate_non_empty(key) {
            return Status::Error;
        }

        let inner = self.inner.read().unwrap();
        if inner.entries.contains_key(key) {
            Status::Exist
        } else {
            Status::NoExist
        }
    }

    /// Occupancy snapshot for the stats endpoint.
    pub fn stats(&self) -> IndexStats {
        let inner = self.inner.read().unwrap();
        IndexStats::new(inner.entries.len() as u64, self.capacity as u64)
    }

    #[cfg(test)]
    fn ordered_keys(&self) -> Vec<Vec<u8>> {
        self.inner.read().unwrap().entries.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_get_modify_del_lifecycle() {
        let idx = TreeIndex::new(8);

        assert_eq!(idx.set(b"m", b"1"), Status::Ok);
        assert_eq!(idx.get(b"m"), Some(b"1".to_vec()));
        assert_eq!(idx.set(b"m", b"2"), Status::Exist);

        assert_eq!(idx.modify(b"m", b"2"), Status::Ok);
        assert_eq!(idx.get(b"m"), Some(b"2".to_vec()));

        assert_eq!(idx.del(b"m"), Status::Ok);
        assert_eq!(idx.del(b"m"), Status::NoExist);
    }

    #[test]
    fn in_order_traversal_is_strictly_increasing() {
        let idx = TreeIndex::new(16);
        for key in [b"delta" as &[u8], b"alpha", b"charlie", b"bravo"] {
            idx.set(key, b"v");
        }

        let keys = idx.ordered_keys();
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);
        assert!(keys.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn full_when_at_capacity() {
        let idx = TreeIndex::new(1);
        assert_eq!(idx.set(b"a", b"1"), Status::Ok);
        assert_eq!(idx.set(b"b", b"1"), Status::Full);
    }
}
