//! Deterministic-keyed cache of past review responses.
//!
//! Mirrors the bundle cache a single-purpose review pipeline keeps next to
//! its provider calls: a cache key is a pure function of the inputs that
//! determine a review's content, lookups and stores never fail loudly, and
//! a miss is always a safe fallback to recomputation.
//!
//! Two backends share one key space and one [`CacheStats`] shape:
//! [`MemoryCache`] for process-local hot data, [`DiskCache`] for a bounded
//! on-disk store that survives restarts. [`ContentCache`] picks one at
//! construction time and dispatches to it.

mod disk;
mod errors;
mod key;
mod memory;
mod stats;

use std::path::PathBuf;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;

pub use disk::DiskCache;
pub use errors::{CacheError, CacheResult};
pub use key::{compute_key, CacheKey, CacheKeyInput};
pub use memory::MemoryCache;
pub use stats::CacheStats;

/// Where a [`ContentCache`] keeps its entries.
pub enum ContentCache<V> {
    Memory(MemoryCache<V>),
    Disk(DiskCache<V>),
}

impl<V: Clone + Serialize + DeserializeOwned + Send + Sync> ContentCache<V> {
    /// An in-memory cache bounded by entry count with an optional TTL.
    pub fn in_memory(capacity: usize, ttl: Option<Duration>) -> Self {
        Self::Memory(MemoryCache::new(capacity, ttl))
    }

    /// An on-disk cache bounded by total bytes and entry count, rooted at
    /// `dir`. Rebuilds its index from whatever is already present.
    pub async fn on_disk(dir: impl Into<PathBuf>, max_size_bytes: u64, max_entries: usize) -> Self {
        Self::Disk(DiskCache::open(dir, max_size_bytes, max_entries).await)
    }

    /// Looks up `key`, returning `(value, hit)`. Never errors: a storage
    /// failure on the disk backend degrades to a miss.
    pub async fn get(&self, key: &CacheKey) -> (Option<V>, bool) {
        match self {
            Self::Memory(c) => c.get(key),
            Self::Disk(c) => c.get(key).await,
        }
    }

    /// Stores `value` under `key`. `size_bytes` is only meaningful for the
    /// memory backend's byte accounting; the disk backend measures its
    /// serialized form directly.
    pub async fn set(&self, key: CacheKey, value: V, size_bytes: usize) {
        match self {
            Self::Memory(c) => c.set(key, value, size_bytes),
            Self::Disk(c) => c.set(key, value).await,
        }
    }

    pub async fn clear(&self) {
        match self {
            Self::Memory(c) => c.clear(),
            Self::Disk(c) => c.clear().await,
        }
    }

    pub fn stats(&self) -> CacheStats {
        match self {
            Self::Memory(c) => c.stats(),
            Self::Disk(c) => c.stats(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_backend_round_trips() {
        let cache: ContentCache<String> = ContentCache::in_memory(4, None);
        let key = compute_key(&CacheKeyInput {
            diff_text: "diff",
            language_tag: "rust",
            file_path: "a.rs",
            rule_set_identity: "default",
            tool_version: "1.0.0",
        });
        cache.set(key.clone(), "reviewed".to_string(), 8).await;
        let (v, hit) = cache.get(&key).await;
        assert_eq!(v.as_deref(), Some("reviewed"));
        assert!(hit);
    }

    #[tokio::test]
    async fn disk_backend_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let cache: ContentCache<String> = ContentCache::on_disk(dir.path(), 1_000_000, 100).await;
        let key = compute_key(&CacheKeyInput {
            diff_text: "diff",
            language_tag: "rust",
            file_path: "a.rs",
            rule_set_identity: "default",
            tool_version: "1.0.0",
        });
        cache.set(key.clone(), "reviewed".to_string(), 8).await;
        let (v, hit) = cache.get(&key).await;
        assert_eq!(v.as_deref(), Some("reviewed"));
        assert!(hit);
        assert_eq!(cache.stats().entries, 1);
    }
}
