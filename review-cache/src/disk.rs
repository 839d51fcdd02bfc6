//! On-disk cache backend: two-level sharded layout with atomic writes.
//!
//! Layout: `<dir>/<first-2-hex-chars>/<key>.json`. Writes go to a `.tmp`
//! sibling and are renamed into place so a reader never observes a partial
//! file. Size/count bounds are enforced lazily: after a `set` that could
//! have pushed the cache over budget, oldest-accessed entries are evicted
//! until both bounds hold again.
//!
//! Fails open: every fallible operation logs and degrades to a no-op/miss
//! rather than propagating to the caller, per the component contract.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::warn;

use crate::errors::CacheResult;
use crate::key::CacheKey;
use crate::stats::CacheStats;

#[derive(Clone)]
struct EntryMeta {
    path: PathBuf,
    size_bytes: u64,
    accessed_at_unix: i64,
}

#[derive(serde::Serialize, serde::Deserialize)]
struct OnDiskEnvelope<V> {
    value: V,
    created_at: DateTime<Utc>,
}

/// Size- and count-bounded on-disk cache.
pub struct DiskCache<V> {
    root: PathBuf,
    max_size_bytes: u64,
    max_entries: usize,
    index: Mutex<BTreeMap<String, EntryMeta>>,
    hits: Mutex<u64>,
    misses: Mutex<u64>,
    _marker: std::marker::PhantomData<V>,
}

impl<V: Serialize + DeserializeOwned + Clone> DiskCache<V> {
    /// Opens (creating if absent) a disk cache rooted at `root`, rebuilding
    /// its size/entry index from whatever is already on disk.
    pub async fn open(root: impl Into<PathBuf>, max_size_bytes: u64, max_entries: usize) -> Self {
        let root = root.into();
        if let Err(e) = tokio::fs::create_dir_all(&root).await {
            warn!(error = %e, dir = %root.display(), "review-cache: failed to create cache root");
        }
        let index = rebuild_index(&root).await;
        Self {
            root,
            max_size_bytes,
            max_entries,
            index: Mutex::new(index),
            hits: Mutex::new(0),
            misses: Mutex::new(0),
            _marker: std::marker::PhantomData,
        }
    }

    fn path_for(&self, key: &CacheKey) -> PathBuf {
        self.root.join(key.shard()).join(format!("{}.json", key.0))
    }

    pub async fn get(&self, key: &CacheKey) -> (Option<V>, bool) {
        match self.try_get(key).await {
            Ok(Some(v)) => {
                *self.hits.lock().unwrap() += 1;
                (Some(v), true)
            }
            Ok(None) => {
                *self.misses.lock().unwrap() += 1;
                (None, false)
            }
            Err(e) => {
                warn!(error = %e, key = %key, "review-cache: disk read failed, treating as miss");
                *self.misses.lock().unwrap() += 1;
                (None, false)
            }
        }
    }

    async fn try_get(&self, key: &CacheKey) -> CacheResult<Option<V>> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }
        let bytes = tokio::fs::read(&path).await?;
        let envelope: OnDiskEnvelope<V> = serde_json::from_slice(&bytes)?;
        self.touch(key);
        Ok(Some(envelope.value))
    }

    pub async fn set(&self, key: CacheKey, value: V) {
        if let Err(e) = self.try_set(&key, value).await {
            warn!(error = %e, key = %key, "review-cache: disk write failed, dropping entry");
        }
        self.enforce_bounds().await;
    }

    async fn try_set(&self, key: &CacheKey, value: V) -> CacheResult<()> {
        let envelope = OnDiskEnvelope {
            value,
            created_at: Utc::now(),
        };
        let bytes = serde_json::to_vec(&envelope)?;

        let path = self.path_for(key);
        if let Some(dir) = path.parent() {
            tokio::fs::create_dir_all(dir).await?;
        }
        let tmp_path = path.with_extension("json.tmp");
        tokio::fs::write(&tmp_path, &bytes).await?;
        tokio::fs::rename(&tmp_path, &path).await?;

        self.index.lock().unwrap().insert(
            key.0.clone(),
            EntryMeta {
                path,
                size_bytes: bytes.len() as u64,
                accessed_at_unix: now_unix(),
            },
        );
        Ok(())
    }

    fn touch(&self, key: &CacheKey) {
        if let Some(meta) = self.index.lock().unwrap().get_mut(&key.0) {
            meta.accessed_at_unix = now_unix();
        }
    }

    /// Evicts oldest-accessed entries until both bounds hold.
    async fn enforce_bounds(&self) {
        loop {
            let victim = {
                let index = self.index.lock().unwrap();
                let total: u64 = index.values().map(|m| m.size_bytes).sum();
                let over_size = total > self.max_size_bytes;
                let over_count = index.len() > self.max_entries;
                if !over_size && !over_count {
                    None
                } else {
                    index
                        .iter()
                        .min_by_key(|(_, m)| m.accessed_at_unix)
                        .map(|(k, m)| (k.clone(), m.path.clone()))
                }
            };
            let Some((key, path)) = victim else {
                break;
            };
            if let Err(e) = tokio::fs::remove_file(&path).await {
                warn!(error = %e, path = %path.display(), "review-cache: failed to evict entry");
            }
            self.index.lock().unwrap().remove(&key);
        }
    }

    pub async fn clear(&self) {
        let paths: Vec<PathBuf> = {
            let index = self.index.lock().unwrap();
            index.values().map(|m| m.path.clone()).collect()
        };
        for p in paths {
            let _ = tokio::fs::remove_file(&p).await;
        }
        self.index.lock().unwrap().clear();
    }

    pub fn stats(&self) -> CacheStats {
        let index = self.index.lock().unwrap();
        let entries = index.len();
        let total_bytes = index.values().map(|m| m.size_bytes).sum::<u64>() as usize;
        drop(index);
        CacheStats {
            entries,
            total_bytes,
            hits: *self.hits.lock().unwrap(),
            misses: *self.misses.lock().unwrap(),
        }
    }
}

fn now_unix() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

async fn rebuild_index(root: &Path) -> BTreeMap<String, EntryMeta> {
    let mut out = BTreeMap::new();
    let Ok(mut shards) = tokio::fs::read_dir(root).await else {
        return out;
    };
    while let Ok(Some(shard)) = shards.next_entry().await {
        let shard_path = shard.path();
        if !shard_path.is_dir() {
            continue;
        }
        let Ok(mut files) = tokio::fs::read_dir(&shard_path).await else {
            continue;
        };
        while let Ok(Some(file)) = files.next_entry().await {
            let path = file.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let Ok(meta) = file.metadata().await else {
                continue;
            };
            let accessed_at_unix = meta
                .accessed()
                .or_else(|_| meta.modified())
                .ok()
                .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
                .map(|d| d.as_secs() as i64)
                .unwrap_or(0);
            out.insert(
                stem.to_string(),
                EntryMeta {
                    path,
                    size_bytes: meta.len(),
                    accessed_at_unix,
                },
            );
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(s: &str) -> CacheKey {
        CacheKey(s.repeat(8))
    }

    #[tokio::test]
    async fn round_trips_a_value() {
        let dir = tempfile::tempdir().unwrap();
        let cache: DiskCache<String> = DiskCache::open(dir.path(), 1_000_000, 1000).await;
        cache.set(key("a"), "hello".to_string()).await;
        let (v, hit) = cache.get(&key("a")).await;
        assert_eq!(v.as_deref(), Some("hello"));
        assert!(hit);
    }

    #[tokio::test]
    async fn missing_key_is_a_miss_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let cache: DiskCache<String> = DiskCache::open(dir.path(), 1_000_000, 1000).await;
        let (v, hit) = cache.get(&key("nope")).await;
        assert!(v.is_none());
        assert!(!hit);
    }

    #[tokio::test]
    async fn enforces_entry_count_bound() {
        let dir = tempfile::tempdir().unwrap();
        let cache: DiskCache<String> = DiskCache::open(dir.path(), 1_000_000, 2).await;
        cache.set(key("a"), "1".into()).await;
        cache.set(key("b"), "2".into()).await;
        cache.set(key("c"), "3".into()).await;
        let stats = cache.stats();
        assert!(stats.entries <= 2);
    }

    #[tokio::test]
    async fn clear_removes_all_entries() {
        let dir = tempfile::tempdir().unwrap();
        let cache: DiskCache<String> = DiskCache::open(dir.path(), 1_000_000, 1000).await;
        cache.set(key("a"), "1".into()).await;
        cache.clear().await;
        assert_eq!(cache.stats().entries, 0);
    }
}
