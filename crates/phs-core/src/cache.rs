//! Byte-budgeted in-memory cache with insertion-order eviction.
//!
//! [`SizeBoundedCache`] maps keys to values together with a caller-supplied
//! size estimate. Whenever the aggregate size exceeds the configured budget,
//! the oldest-inserted entries are evicted until it fits again. Lookups never
//! change eviction order, so a hot read workload cannot keep stale entries
//! alive at the expense of newly flushed ones.
//!
//! The cache is internally synchronized: lookups take a shared lock and
//! never block each other; `put`/`remove` (and the eviction they trigger)
//! take the exclusive lock so size accounting stays exact.

use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;

use parking_lot::RwLock;
use tracing::trace;

/// A cached value with its accounted size and insertion sequence number.
#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    size: usize,
    seq: u64,
}

#[derive(Debug)]
struct Inner<K, V> {
    /// Primary storage: key → entry.
    entries: HashMap<K, CacheEntry<V>>,
    /// Insertion order: sequence number → key. Lowest is evicted first.
    order: BTreeMap<u64, K>,
    next_seq: u64,
    total_bytes: usize,
}

impl<K: Hash + Eq + Clone, V> Inner<K, V> {
    fn remove_entry(&mut self, key: &K) -> Option<CacheEntry<V>> {
        let entry = self.entries.remove(key)?;
        self.order.remove(&entry.seq);
        self.total_bytes -= entry.size;
        Some(entry)
    }

    /// Evict oldest entries until the budget is met or the cache is empty.
    fn evict_to(&mut self, max_bytes: usize) -> usize {
        let mut evicted = 0;
        while self.total_bytes > max_bytes {
            let Some((_, key)) = self.order.pop_first() else {
                break;
            };
            if let Some(entry) = self.entries.remove(&key) {
                self.total_bytes -= entry.size;
                evicted += 1;
            }
        }
        evicted
    }
}

/// Keyed cache bounded by the sum of its entries' sizes.
#[derive(Debug)]
pub struct SizeBoundedCache<K, V> {
    inner: RwLock<Inner<K, V>>,
    max_bytes: usize,
}

impl<K: Hash + Eq + Clone, V: Clone> SizeBoundedCache<K, V> {
    /// Create an empty cache holding at most `max_bytes` of accounted size.
    pub fn new(max_bytes: usize) -> Self {
        Self {
            inner: RwLock::new(Inner {
                entries: HashMap::new(),
                order: BTreeMap::new(),
                next_seq: 0,
                total_bytes: 0,
            }),
            max_bytes,
        }
    }

    /// Insert or replace `key`, then evict until the budget holds.
    ///
    /// A replaced key counts as a fresh insertion for eviction order. An
    /// entry larger than the whole budget is admitted and immediately
    /// evicted along with everything else. Returns the number of entries
    /// evicted.
    pub fn put(&self, key: K, value: V, size: usize) -> usize {
        let mut inner = self.inner.write();
        inner.remove_entry(&key);

        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.order.insert(seq, key.clone());
        inner.total_bytes += size;
        inner.entries.insert(key, CacheEntry { value, size, seq });

        let evicted = inner.evict_to(self.max_bytes);
        if evicted > 0 {
            trace!(
                evicted,
                total_bytes = inner.total_bytes,
                max_bytes = self.max_bytes,
                "cache eviction"
            );
        }
        evicted
    }

    /// Look up a value. Does not affect eviction order.
    pub fn get(&self, key: &K) -> Option<V> {
        self.inner.read().entries.get(key).map(|e| e.value.clone())
    }

    /// Whether `key` is cached.
    pub fn contains(&self, key: &K) -> bool {
        self.inner.read().entries.contains_key(key)
    }

    /// Remove `key`, returning its value. No-op if absent.
    pub fn remove(&self, key: &K) -> Option<V> {
        self.inner.write().remove_entry(key).map(|e| e.value)
    }

    /// Drop every entry.
    pub fn clear(&self) {
        let mut inner = self.inner.write();
        inner.entries.clear();
        inner.order.clear();
        inner.total_bytes = 0;
    }

    /// Number of cached entries.
    pub fn len(&self) -> usize {
        self.inner.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().entries.is_empty()
    }

    /// Sum of the sizes of all cached entries.
    pub fn total_bytes(&self) -> usize {
        self.inner.read().total_bytes
    }

    /// Configured byte budget.
    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    // ------------------------------------------------------------------
    // Basic operations
    // ------------------------------------------------------------------

    #[test]
    fn new_cache_is_empty() {
        let cache: SizeBoundedCache<u64, String> = SizeBoundedCache::new(100);
        assert!(cache.is_empty());
        assert_eq!(cache.len(), 0);
        assert_eq!(cache.total_bytes(), 0);
        assert_eq!(cache.max_bytes(), 100);
    }

    #[test]
    fn put_and_get() {
        let cache = SizeBoundedCache::new(100);
        cache.put(1u64, "one", 10);
        assert_eq!(cache.get(&1), Some("one"));
        assert!(cache.contains(&1));
        assert_eq!(cache.get(&2), None);
        assert_eq!(cache.total_bytes(), 10);
    }

    #[test]
    fn put_replaces_and_reaccounts_size() {
        let cache = SizeBoundedCache::new(100);
        cache.put(1u64, "a", 10);
        cache.put(1u64, "b", 25);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(&1), Some("b"));
        assert_eq!(cache.total_bytes(), 25);
    }

    #[test]
    fn remove_decrements_size() {
        let cache = SizeBoundedCache::new(100);
        cache.put(1u64, "a", 10);
        cache.put(2u64, "b", 20);
        assert_eq!(cache.remove(&1), Some("a"));
        assert_eq!(cache.total_bytes(), 20);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn remove_missing_is_noop() {
        let cache: SizeBoundedCache<u64, &str> = SizeBoundedCache::new(100);
        cache.put(1, "a", 10);
        assert_eq!(cache.remove(&9), None);
        assert_eq!(cache.total_bytes(), 10);
    }

    #[test]
    fn clear_resets_accounting() {
        let cache = SizeBoundedCache::new(100);
        cache.put(1u64, "a", 10);
        cache.put(2u64, "b", 10);
        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.total_bytes(), 0);
    }

    // ------------------------------------------------------------------
    // Eviction
    // ------------------------------------------------------------------

    #[test]
    fn evicts_oldest_inserted_first() {
        let cache = SizeBoundedCache::new(30);
        cache.put(1u64, "a", 10);
        cache.put(2u64, "b", 10);
        cache.put(3u64, "c", 10);
        let evicted = cache.put(4u64, "d", 10);
        assert_eq!(evicted, 1);
        assert!(!cache.contains(&1));
        assert!(cache.contains(&2) && cache.contains(&3) && cache.contains(&4));
        assert_eq!(cache.total_bytes(), 30);
    }

    #[test]
    fn get_does_not_refresh_eviction_order() {
        let cache = SizeBoundedCache::new(20);
        cache.put(1u64, "a", 10);
        cache.put(2u64, "b", 10);
        // Hot reads on key 1 must not save it.
        for _ in 0..10 {
            assert!(cache.get(&1).is_some());
        }
        cache.put(3u64, "c", 10);
        assert!(!cache.contains(&1));
        assert!(cache.contains(&2));
    }

    #[test]
    fn replacement_moves_key_to_back() {
        let cache = SizeBoundedCache::new(20);
        cache.put(1u64, "a", 10);
        cache.put(2u64, "b", 10);
        cache.put(1u64, "a2", 10);
        cache.put(3u64, "c", 10);
        assert!(!cache.contains(&2));
        assert_eq!(cache.get(&1), Some("a2"));
    }

    #[test]
    fn evicts_several_for_one_large_entry() {
        let cache = SizeBoundedCache::new(50);
        for k in 0u64..5 {
            cache.put(k, k, 10);
        }
        let evicted = cache.put(99u64, 99, 35);
        assert_eq!(evicted, 4);
        assert_eq!(cache.len(), 2);
        assert!(cache.total_bytes() <= 50);
    }

    #[test]
    fn oversized_entry_leaves_cache_empty() {
        let cache = SizeBoundedCache::new(5);
        cache.put(1u64, "a", 3);
        cache.put(2u64, "huge", 100);
        assert!(cache.is_empty());
        assert_eq!(cache.total_bytes(), 0);
    }

    #[test]
    fn zero_budget_terminates() {
        let cache = SizeBoundedCache::new(0);
        cache.put(1u64, "a", 1);
        cache.put(2u64, "free", 0);
        assert!(!cache.contains(&1));
        assert!(cache.contains(&2));
        assert_eq!(cache.total_bytes(), 0);
    }

    // ------------------------------------------------------------------
    // Properties
    // ------------------------------------------------------------------

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(256))]

        #[test]
        fn total_never_exceeds_budget(
            max in 0usize..2_000,
            ops in proptest::collection::vec((0u64..64, 0usize..600, any::<bool>()), 1..200),
        ) {
            let cache = SizeBoundedCache::new(max);
            for (key, size, is_remove) in ops {
                if is_remove {
                    cache.remove(&key);
                } else {
                    cache.put(key, key, size);
                }
                prop_assert!(cache.total_bytes() <= max);
            }
        }

        #[test]
        fn accounted_total_matches_live_entries(
            ops in proptest::collection::vec((0u64..32, 1usize..100), 1..100),
        ) {
            let cache = SizeBoundedCache::new(1_000);
            let mut sizes = HashMap::new();
            for (key, size) in ops {
                cache.put(key, size, size);
                sizes.insert(key, size);
            }
            let live: usize = sizes
                .iter()
                .filter(|(k, _)| cache.contains(k))
                .map(|(_, s)| *s)
                .sum();
            prop_assert_eq!(live, cache.total_bytes());
        }
    }
}
