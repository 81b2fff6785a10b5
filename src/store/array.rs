//! Fixed-capacity, linearly-probed array index (C3).

use std::sync::RwLock;

use super::{validate_non_empty, IndexStats, Status};

struct Inner {
    slots: Vec<Option<(Vec<u8>, Vec<u8>)>>,
    total: usize,
}

/// Array-backed key-value table of fixed capacity `N_A`.
///
/// Invariant: `total == slots.iter().filter(|s| s.is_some()).count()`, and
/// keys among occupied slots are pairwise distinct.
pub struct ArrayIndex {
    capacity: usize,
    inner: RwLock<Inner>,
}

impl ArrayIndex {
    /// Creates an empty index with room for `capacity` entries.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            inner: RwLock::new(Inner {
                slots: (0..capacity).map(|_| None).collect(),
                total: 0,
            }),
        }
    }

    /// Inserts `key`/`value` if `key` isn't already present.
    pub fn set(&self, key: &[u8], value: &[u8]) -> Status {
        if !validate_non_empty(key) || !validate_non_empty(value) {
            return Status::Error;
        }

        let mut inner = self.inner.write().unwrap();
        if inner.total == self.capacity {
            return Status::Full;
        }

        if inner.slots.iter().flatten().any(|(k, _)| k == key) {
            return Status::Exist;
        }

        let free = inner
            .slots
            .iter()
            .position(|s| s.is_none())
            .expect("total < capacity implies a free slot exists");
        inner.slots[free] = Some((key.to_vec(), value.to_vec()));
        inner.total += 1;
        Status::Ok
    }

    /// Returns a copy of the stored value, if present.
    pub fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        if !validate_non_empty(key) {
            return None;
        }

        let inner = self.inner.read().unwrap();
        inner
            .slots
            .iter()
            .flatten()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
    }

    /// Replaces the value for an existing key.
    pub fn modify(&self, key: &[u8], value: &[u8]) -> Status {
        if !validate_non_empty(key) || !validate_non_empty(value) {
            return Status::Error;
        }

        let mut inner = self.inner.write().unwrap();
        match inner.slots.iter_mut().flatten().find(|(k, _)| k == key) {
            Some((_, v)) => {
                *v = value.to_vec();
                Status::Ok
            }
            None => Status::NoExist,
        }
    }

    /// Removes an entry, freeing its slot.
    pub fn del(&self, key: &[u8]) -> Status {
        if !validate_non_empty(key) {
            return Status::Error;
        }

        let mut inner = self.inner.write().unwrap();
        match inner.slots.iter().position(|s| matches!(s, Some((k, _)) if k == key)) {
            Some(idx) => {
                inner.slots[idx] = None;
                inner.total -= 1;
                Status::Ok
            }
            None => Status::NoExist,
        }
    }

    /// Reports whether `key` is present.
    pub fn exist(&self, key: &[u8]) -> Status {
        if !validate_non_empty(key) {
            return Status::Error;
        }

        let inner = self.inner.read().unwrap();
        if inner.slots.iter().flatten().any(|(k, _)| k == key) {
            Status::Exist
        } else {
            Status::NoExist
        }
    }

    /// Occupancy snapshot for the stats endpoint.
    pub fn stats(&self) -> IndexStats {
        let inner = self.inner.read().unwrap();
        IndexStats::new(inner.total as u64, self.capacity as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_get_modify_del_lifecycle() {
        let idx = ArrayIndex::new(4);

        assert_eq!(idx.set(b"a", b"1"), Status::Ok);
        assert_eq!(idx.get(b"a"), Some(b"1".to_vec()));

        assert_eq!(idx.set(b"a", b"2"), Status::Exist);
        assert_eq!(idx.get(b"a"), Some(b"1".to_vec()));

        assert_eq!(idx.modify(b"a", b"2"), Status::Ok);
        assert_eq!(idx.get(b"a"), Some(b"2".to_vec()));

        assert_eq!(idx.del(b"a"), Status::Ok);
        assert_eq!(idx.get(b"a"), None);
        assert_eq!(idx.exist(b"a"), Status::NoExist);

        assert_eq!(idx.del(b"a"), Status::NoExist);
    }

    #[test]
    fn full_when_at_capacity() {
        let idx = ArrayIndex::new(2);
        assert_eq!(idx.set(b"a", b"1"), Status::Ok);
        assert_eq!(idx.set(b"b", b"1"), Status::Ok);
        assert_eq!(idx.set(b"c", b"1"), Status::Full);

        // Freeing a slot makes room again.
        assert_eq!(idx.del(b"a"), Status::Ok);
        assert_eq!(idx.set(b"c", b"1"), Status::Ok);
    }

    #[test]
    fn empty_key_or_value_is_error() {
        let idx = ArrayIndex::new(4);
        assert_eq!(idx.set(b"", b"1"), Status::Error);
        assert_eq!(idx.set(b"a", b""), Status::Error);
        assert_eq!(idx.exist(b""), Status::Error);
    }

    #[test]
    fn count_matches_live_entries_after_mixed_ops() {
        let idx = ArrayIndex::new(8);
        for k in [b"a" as &[u8], b"b", b"c"] {
            idx.set(k, b"v");
        }
        idx.del(b"b");
        assert_eq!(idx.stats().count, 2);
    }
}
