//! Idle-connection timer wheel (C7): an expiry-ordered set of per-connection
//! timeout records, swept by a periodic tick.

use std::collections::{BTreeMap, HashMap};

/// A connection's expiry, in whole seconds since some fixed epoch (the
/// reactor uses `Instant::elapsed`-derived seconds so the wheel never needs
/// wall-clock time).
type ExpirySecs = u64;

/// Monotonically increasing tie-breaker so two records with the same
/// expiry keep FIFO order instead of colliding as `BTreeMap` keys.
type Seq = u64;

/// Sorted set of per-connection expiry records, ordered by expiry ascending
/// then by insertion order. Slot identity is the connection's `slab` key.
#[derive(Default)]
pub struct TimerWheel {
    records: BTreeMap<(ExpirySecs, Seq), usize>,
    by_slot: HashMap<usize, (ExpirySecs, Seq)>,
    next_seq: Seq,
}

impl TimerWheel {
    /// Creates an empty wheel.
    pub fn new() -> Self {
        Self::default()
    }

    /// Arms a new timer for `slot`, expiring at `expiry`. Invariant: at
    /// most one live timer per slot; callers must `del` (or `adjust`) an
    /// existing timer for the same slot before calling `add` again.
    pub fn add(&mut self, slot: usize, expiry: ExpirySecs) {
        debug_assert!(
            !self.by_slot.contains_key(&slot),
            "slot already has a live timer; use adjust instead"
        );
        let key = (expiry, self.next_seq);
        self.next_seq += 1;
        self.records.insert(key, slot);
        self.by_slot.insert(slot, key);
    }

    /// Re-arms `slot`'s timer at a new (monotonically increasing) expiry,
    /// keeping the record unique but moving it to its new sorted position.
    /// A no-op if `slot` has no live timer.
    pub fn adjust(&mut self, slot: usize, new_expiry: ExpirySecs) {
        if let Some(old_key) = self.by_slot.remove(&slot) {
            self.records.remove(&old_key);
        }
        self.add(slot, new_expiry);
    }

    /// Removes `slot`'s timer, if any.
    pub fn del(&mut self, slot: usize) {
        if let Some(key) = self.by_slot.remove(&slot) {
            self.records.remove(&key);
        }
    }

    /// Returns the slot with the earliest expiry, if the wheel isn't empty.
    pub fn head(&self) -> Option<usize> {
        self.records.values().next().copied()
    }

    /// Sweeps the wheel, removing and returning every slot whose expiry is
    /// `<= now`, in ascending expiry order.
    pub fn tick(&mut self, now: ExpirySecs) -> Vec<usize> {
        let mut expired = Vec::new();

        while let Some((&key, &slot)) = self.records.iter().next() {
            if key.0 > now {
                break;
            }
            self.records.remove(&key);
            self.by_slot.remove(&slot);
            expired.push(slot);
        }

        expired
    }

    /// Number of live timers.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the wheel holds no live timers.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Default idle-connection expiry: `now + IDLE_TICKS * TIMESLOT`.
pub fn default_expiry(now: ExpirySecs) -> ExpirySecs {
    now + crate::config::IDLE_TICKS as u64 * crate::config::TIMESLOT.as_secs()
}
