//! Chained hash index with a fixed bucket count (C4).

use std::collections::VecDeque;
use std::sync::RwLock;

use super::{validate_non_empty, IndexStats, Status};

type Bucket = VecDeque<(Vec<u8>, Vec<u8>)>;

struct Inner {
    buckets: Vec<Bucket>,
    count: usize,
}

/// Hash table keyed by a byte-sum-mod-bucket-count function, chosen for test
/// reproducibility rather than distribution quality.
pub struct HashIndex {
    bucket_count: usize,
    inner: RwLock<Inner>,
}

impl HashIndex {
    /// Creates an empty table with `bucket_count` buckets.
    pub fn new(bucket_count: usize) -> Self {
        assert!(bucket_count > 0, "hash index needs at least one bucket");
        Self {
            bucket_count,
            inner: RwLock::new(Inner {
                buckets: (0..bucket_count).map(|_| VecDeque::new()).collect(),
                count: 0,
            }),
        }
    }

    /// Reference hash: sum of byte values mod the bucket count.
    pub fn bucket_of(&self, key: &[u8]) -> usize {
        let sum: u64 = key.iter().map(|&b| b as u64).sum();
        (sum % self.bucket_count as u64) as usize
    }

    /// Inserts at the head of the target chain if `key` is not already
    /// present anywhere in that chain.
    pub fn set(&self, key: &[u8], value: &[u8]) -> Status {
        if !validate_non_empty(key) || !validate_non_empty(value) {
            return Status::Error;
        }

        let idx = self.bucket_of(key);
        let mut inner = self.inner.write().unwrap();
        if inner.buckets[idx].iter().any(|(k, _)| k == key) {
            return Status::Exist;
        }

        inner.buckets[idx].push_front((key.to_vec(), value.to_vec()));
        inner.count += 1;
        Status::Ok
    }

    /// Returns a copy of the stored value, if present.
    pub fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        if !validate_non_empty(key) {
            return None;
        }

        let idx = self.bucket_of(key);
        let inner = self.inner.read().unwrap();
        inner
            .buckets[idx]
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
    }

    /// Replaces the value for an existing key.
    pub fn modify(&self, key: &[u8], value: &[u8]) -> Status {
        if !validate_non_empty(key) || !validate_non_empty(value) {
            return Status::Error;
        }

        let idx = self.bucket_of(key);
        let mut inner = self.inner.write().unwrap();
        match inner.buckets[idx].iter_mut().find(|(k, _)| k == key) {
            Some((_, v)) => {
                *v = value.to_vec();
                Status::Ok
            }
            None => Status::NoExist,
        }
    }

    /// Unlinks the node for `key`, preserving the chain order of the
    /// remaining nodes. Returns `NoExist` whenever the key is absent,
    /// including past the chain head (the original C implementation
    /// returns an ambiguous error code in that case; this rewrite
    /// normalizes it to `NoExist`).
    pub fn del(&self, key: &[u8]) -> Status {
        if !validate_non_empty(key) {
            return Status::Error;
        }

        let idx = self.bucket_of(key);
        let mut inner = self.inner.write().unwrap();
        match inner.buckets[idx].iter().position(|(k, _)| k == key) {
            Some(pos) => {
                inner.buckets[idx].remove(pos);
                inner.count -= 1;
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

        let idx = self.bucket_of(key);
        let inner = self.inner.read().unwrap();
        if inner.buckets[idx].iter().any(|(k, _)| k == key) {
            Status::Exist
        } else {
            Status::NoExist
        }
    }

    /// Occupancy snapshot for the stats endpoint.
    pub fn stats(&self) -> IndexStats {
        let inner = self.inner.read().unwrap();
        IndexStats::new(inner.count as u64, self.bucket_count as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_get_modify_del_lifecycle() {
        let idx = HashIndex::new(8);

        assert_eq!(idx.set(b"x", b"y"), Status::Ok);
        assert_eq!(idx.get(b"x"), Some(b"y".to_vec()));
        assert_eq!(idx.set(b"x", b"z"), Status::Exist);

        assert_eq!(idx.modify(b"x", b"z"), Status::Ok);
        assert_eq!(idx.get(b"x"), Some(b"z".to_vec()));

        assert_eq!(idx.del(b"x"), Status::Ok);
        assert_eq!(idx.del(b"x"), Status::NoExist);
    }

    #[test]
    fn bucket_matches_byte_sum_mod_size() {
        let idx = HashIndex::new(97);
        for key in [b"abc" as &[u8], b"kv-store", b"z", b"a-much-longer-key-here"] {
            idx.set(key, b"v");
            let expected: u64 = key.iter().map(|&b| b as u64).sum::<u64>() % 97;
            assert_eq!(idx.bucket_of(key), expected as usize);
        }
    }

    #[test]
    fn chained_keys_preserve_order_on_delete() {
        let idx = HashIndex::new(1); // force every key into the same bucket
        idx.set(b"a", b"1");
        idx.set(b"b", b"2");
        idx.set(b"c", b"3");

        // head is "c" (most recently inserted); delete a middle node and
        // confirm the remaining two are still reachable.
        assert_eq!(idx.del(b"b"), Status::Ok);
        assert_eq!(idx.get(b"a"), Some(b"1".to_vec()));
        assert_eq!(idx.get(b"c"), Some(b"3".to_vec()));
        assert_eq!(idx.stats().count, 2);
    }

    #[test]
    fn delete_past_head_miss_is_no_exist() {
        let idx = HashIndex::new(1);
        idx.set(b"a", b"1");
        idx.set(b"b", b"2");
        assert_eq!(idx.del(b"does-not-exist"), Status::NoExist);
    }
}
