//! In-memory LRU cache backend.
//!
//! O(1) get/set backed by the `lru` crate's intrusive doubly-linked list;
//! each entry carries a TTL enforced lazily on read. Evicts least-recently
//! used on capacity. Never returns an error — a miss is the worst case.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use lru::LruCache;
use std::num::NonZeroUsize;

use crate::key::CacheKey;
use crate::stats::CacheStats;

struct Slot<V> {
    value: V,
    created_at: Instant,
    size_bytes: usize,
}

/// Thread-safe, capacity- and TTL-bounded in-memory cache.
pub struct MemoryCache<V> {
    inner: Mutex<LruCache<CacheKey, Slot<V>>>,
    ttl: Option<Duration>,
    hits: Mutex<u64>,
    misses: Mutex<u64>,
}

impl<V: Clone> MemoryCache<V> {
    /// Creates a cache bounded by `capacity` entries (minimum 1) with an
    /// optional uniform TTL.
    pub fn new(capacity: usize, ttl: Option<Duration>) -> Self {
        let cap = NonZeroUsize::new(capacity.max(1)).unwrap();
        Self {
            inner: Mutex::new(LruCache::new(cap)),
            ttl,
            hits: Mutex::new(0),
            misses: Mutex::new(0),
        }
    }

    /// Returns `(value, hit)`. A `Some` with `hit = false` never happens;
    /// `None` always implies a miss (not present, or TTL-expired).
    pub fn get(&self, key: &CacheKey) -> (Option<V>, bool) {
        let mut guard = self.inner.lock().unwrap();
        if let Some(slot) = guard.get(key) {
            if self.is_expired(slot) {
                guard.pop(key);
                drop(guard);
                *self.misses.lock().unwrap() += 1;
                return (None, false);
            }
            let value = slot.value.clone();
            drop(guard);
            *self.hits.lock().unwrap() += 1;
            return (Some(value), true);
        }
        drop(guard);
        *self.misses.lock().unwrap() += 1;
        (None, false)
    }

    /// Inserts or overwrites an entry, evicting the least-recently-used
    /// entry if the cache is at capacity.
    pub fn set(&self, key: CacheKey, value: V, size_bytes: usize) {
        let slot = Slot {
            value,
            created_at: Instant::now(),
            size_bytes,
        };
        self.inner.lock().unwrap().put(key, slot);
    }

    pub fn clear(&self) {
        self.inner.lock().unwrap().clear();
    }

    pub fn stats(&self) -> CacheStats {
        let guard = self.inner.lock().unwrap();
        let entries = guard.len();
        let total_bytes: usize = guard.iter().map(|(_, s)| s.size_bytes).sum();
        drop(guard);
        CacheStats {
            entries,
            total_bytes,
            hits: *self.hits.lock().unwrap(),
            misses: *self.misses.lock().unwrap(),
        }
    }

    fn is_expired(&self, slot: &Slot<V>) -> bool {
        match self.ttl {
            Some(ttl) => slot.created_at.elapsed() > ttl,
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    fn key(s: &str) -> CacheKey {
        CacheKey(s.to_string())
    }

    #[test]
    fn set_then_get_hits() {
        let c: MemoryCache<String> = MemoryCache::new(4, None);
        c.set(key("a"), "one".into(), 3);
        let (v, hit) = c.get(&key("a"));
        assert_eq!(v.as_deref(), Some("one"));
        assert!(hit);
    }

    #[test]
    fn miss_on_absent_key() {
        let c: MemoryCache<String> = MemoryCache::new(4, None);
        let (v, hit) = c.get(&key("nope"));
        assert!(v.is_none());
        assert!(!hit);
    }

    #[test]
    fn evicts_least_recently_used_at_capacity() {
        let c: MemoryCache<i32> = MemoryCache::new(2, None);
        c.set(key("a"), 1, 1);
        c.set(key("b"), 2, 1);
        // touch "a" so "b" becomes the LRU victim.
        let _ = c.get(&key("a"));
        c.set(key("c"), 3, 1);
        assert!(c.get(&key("b")).0.is_none());
        assert!(c.get(&key("a")).0.is_some());
        assert!(c.get(&key("c")).0.is_some());
    }

    #[test]
    fn ttl_expires_entries_on_read() {
        let c: MemoryCache<i32> = MemoryCache::new(4, Some(Duration::from_millis(5)));
        c.set(key("a"), 1, 1);
        sleep(Duration::from_millis(20));
        let (v, hit) = c.get(&key("a"));
        assert!(v.is_none());
        assert!(!hit);
    }

    #[test]
    fn stats_reflect_entries_and_hit_counts() {
        let c: MemoryCache<i32> = MemoryCache::new(4, None);
        c.set(key("a"), 1, 10);
        let _ = c.get(&key("a"));
        let _ = c.get(&key("missing"));
        let s = c.stats();
        assert_eq!(s.entries, 1);
        assert_eq!(s.total_bytes, 10);
        assert_eq!(s.hits, 1);
        assert_eq!(s.misses, 1);
    }
}
