//! In-Memory Cache Tiers
//!
//! Two tier flavors, both keyed by 64-bit fingerprints and sized at
//! construction:
//!
//! - [`BoundedCache`] — reader-writer guarded map with **insertion-order
//!   (FIFO) eviction**, the simplest policy that bounds memory. Used for
//!   the translation, bytecode and root-signature tiers.
//! - [`LruCache`] — mutex-guarded map with **least-recently-used
//!   eviction**. Used for the pipeline-state tier, where the displaced
//!   value must reach the orchestrator so the backend object can be
//!   released exactly once.
//!
//! Values are `Arc`-wrapped by callers and inserted whole under the
//! tier's own lock, so a concurrent `get` never observes a partially
//! constructed value. No lock is shared between tiers.

use std::collections::VecDeque;

use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;

/// What a `put` pushed out of a tier, if anything.
///
/// `Replaced` and `Evicted` are mutually exclusive: replacing an existing
/// key never triggers an eviction.
#[derive(Debug)]
pub enum Displaced<V> {
    None,
    /// The key was already present; this is its previous value.
    Replaced(V),
    /// The tier was full; this entry was evicted to make room.
    Evicted(u64, V),
}

impl<V> Displaced<V> {
    #[must_use]
    pub fn is_eviction(&self) -> bool {
        matches!(self, Self::Evicted(..))
    }
}

// ─── BoundedCache (FIFO) ──────────────────────────────────────────────────────

struct BoundedInner<V> {
    map: FxHashMap<u64, V>,
    /// Insertion order; front is the eviction candidate.
    order: VecDeque<u64>,
}

/// Fixed-capacity cache with insertion-order eviction.
pub struct BoundedCache<V> {
    inner: RwLock<BoundedInner<V>>,
    capacity: usize,
}

impl<V: Clone> BoundedCache<V> {
    /// `capacity` must be non-zero and is never resized afterwards.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "cache capacity must be non-zero");
        Self {
            inner: RwLock::new(BoundedInner {
                map: FxHashMap::default(),
                order: VecDeque::with_capacity(capacity),
            }),
            capacity,
        }
    }

    #[must_use]
    pub fn get(&self, key: u64) -> Option<V> {
        self.inner.read().map.get(&key).cloned()
    }

    /// Inserts `value`, evicting the oldest entry first when full.
    pub fn put(&self, key: u64, value: V) -> Displaced<V> {
        let mut inner = self.inner.write();
        if let Some(slot) = inner.map.get_mut(&key) {
            return Displaced::Replaced(std::mem::replace(slot, value));
        }

        let mut displaced = Displaced::None;
        if inner.map.len() >= self.capacity {
            // Entries removed via `remove` leave stale queue slots behind;
            // skip those until a live key turns up.
            while let Some(old_key) = inner.order.pop_front() {
                if let Some(old_value) = inner.map.remove(&old_key) {
                    displaced = Displaced::Evicted(old_key, old_value);
                    break;
                }
            }
        }
        inner.map.insert(key, value);
        inner.order.push_back(key);
        displaced
    }

    pub fn remove(&self, key: u64) -> Option<V> {
        self.inner.write().map.remove(&key)
    }

    /// Removes every entry; returns how many were removed.
    pub fn clear(&self) -> usize {
        let mut inner = self.inner.write();
        let count = inner.map.len();
        inner.map.clear();
        inner.order.clear();
        count
    }

    /// Removes and returns every entry, for release by the caller.
    pub fn drain(&self) -> Vec<(u64, V)> {
        let mut inner = self.inner.write();
        inner.order.clear();
        inner.map.drain().collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().map.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

// ─── LruCache ─────────────────────────────────────────────────────────────────

struct LruEntry<V> {
    value: V,
    last_used: u64,
}

struct LruInner<V> {
    map: FxHashMap<u64, LruEntry<V>>,
    tick: u64,
}

/// Fixed-capacity cache with least-recently-used eviction.
///
/// Recency is a monotonic tick bumped on every `get` hit and `put`;
/// eviction scans for the minimum tick. O(n) on eviction only, which is
/// fine at pipeline-tier capacities.
pub struct LruCache<V> {
    inner: Mutex<LruInner<V>>,
    capacity: usize,
}

impl<V: Clone> LruCache<V> {
    /// `capacity` must be non-zero and is never resized afterwards.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "cache capacity must be non-zero");
        Self {
            inner: Mutex::new(LruInner {
                map: FxHashMap::default(),
                tick: 0,
            }),
            capacity,
        }
    }

    /// Returns the value and marks it most-recently-used.
    #[must_use]
    pub fn get(&self, key: u64) -> Option<V> {
        let mut inner = self.inner.lock();
        inner.tick += 1;
        let tick = inner.tick;
        inner.map.get_mut(&key).map(|entry| {
            entry.last_used = tick;
            entry.value.clone()
        })
    }

    /// Inserts `value` as most-recently-used.
    ///
    /// The displaced entry (replaced value or LRU eviction victim) is
    /// returned so the caller can release the backing object exactly once.
    pub fn put(&self, key: u64, value: V) -> Displaced<V> {
        let mut inner = self.inner.lock();
        inner.tick += 1;
        let tick = inner.tick;

        if let Some(entry) = inner.map.get_mut(&key) {
            entry.last_used = tick;
            return Displaced::Replaced(std::mem::replace(&mut entry.value, value));
        }

        let mut displaced = Displaced::None;
        if inner.map.len() >= self.capacity {
            let victim = inner
                .map
                .iter()
                .min_by_key(|(_, entry)| entry.last_used)
                .map(|(key, _)| *key);
            if let Some(victim) = victim {
                if let Some(entry) = inner.map.remove(&victim) {
                    displaced = Displaced::Evicted(victim, entry.value);
                }
            }
        }
        inner.map.insert(
            key,
            LruEntry {
                value,
                last_used: tick,
            },
        );
        displaced
    }

    pub fn remove(&self, key: u64) -> Option<V> {
        self.inner.lock().map.remove(&key).map(|e| e.value)
    }

    /// Removes and returns every entry, for release by the caller.
    pub fn drain(&self) -> Vec<(u64, V)> {
        let mut inner = self.inner.lock();
        inner.map.drain().map(|(k, e)| (k, e.value)).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().map.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounded_put_get_round_trip() {
        let cache = BoundedCache::new(4);
        assert!(cache.get(1).is_none());
        cache.put(1, "a");
        assert_eq!(cache.get(1), Some("a"));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn bounded_evicts_oldest_first() {
        let cache = BoundedCache::new(2);
        cache.put(1, "a");
        cache.put(2, "b");
        let displaced = cache.put(3, "c");

        assert!(matches!(displaced, Displaced::Evicted(1, "a")));
        assert!(cache.get(1).is_none());
        assert_eq!(cache.get(2), Some("b"));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn bounded_replace_does_not_evict() {
        let cache = BoundedCache::new(2);
        cache.put(1, "a");
        cache.put(2, "b");
        let displaced = cache.put(1, "a2");

        assert!(matches!(displaced, Displaced::Replaced("a")));
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get(1), Some("a2"));
    }

    #[test]
    fn bounded_clear_reports_count() {
        let cache = BoundedCache::new(8);
        cache.put(1, ());
        cache.put(2, ());
        assert_eq!(cache.clear(), 2);
        assert!(cache.is_empty());
    }

    #[test]
    fn lru_get_refreshes_recency() {
        let cache = LruCache::new(2);
        cache.put(1, "a");
        cache.put(2, "b");
        // Touch 1 so 2 becomes the LRU victim.
        assert_eq!(cache.get(1), Some("a"));
        let displaced = cache.put(3, "c");

        assert!(matches!(displaced, Displaced::Evicted(2, "b")));
        assert_eq!(cache.get(1), Some("a"));
        assert_eq!(cache.get(3), Some("c"));
    }

    #[test]
    fn lru_capacity_overflow_evicts_exactly_one() {
        let cache = LruCache::new(3);
        for key in 0..3 {
            assert!(!cache.put(key, key).is_eviction());
        }
        for key in 3..6 {
            assert!(cache.put(key, key).is_eviction());
            assert_eq!(cache.len(), 3);
        }
    }

    #[test]
    fn lru_drain_returns_everything() {
        let cache = LruCache::new(4);
        cache.put(1, "a");
        cache.put(2, "b");
        let mut drained = cache.drain();
        drained.sort_by_key(|(k, _)| *k);

        assert_eq!(drained, vec![(1, "a"), (2, "b")]);
        assert!(cache.is_empty());
    }
}
