//! Long-term memory (C5): durable embedded KV store with semantic search
//! and background garbage collection.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use review_embedder::cosine_similarity;
use tracing::{debug, info};

use crate::entry::MemoryEntry;
use crate::errors::{MemoryError, MemoryResult};

const ENTRY_PREFIX: &str = "entry:";

fn entry_key(id: &str) -> String {
    format!("{ENTRY_PREFIX}{id}")
}

/// Observability snapshot for the long-term tier.
#[derive(Debug, Clone, Copy, Default)]
pub struct LongTermStats {
    pub entries: usize,
    pub total_bytes: usize,
}

/// Stops a running [`LongTermMemory::spawn_gc`] loop on drop or explicit
/// `stop()`, so no background task outlives its owner.
pub struct GcHandle {
    stop: Arc<AtomicBool>,
    task: Option<tokio::task::JoinHandle<()>>,
}

impl GcHandle {
    pub async fn stop(mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for GcHandle {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
    }
}

pub struct LongTermMemory {
    db: Arc<sled::Db>,
}

impl LongTermMemory {
    pub fn open(path: impl AsRef<std::path::Path>) -> MemoryResult<Self> {
        Ok(Self {
            db: crate::shared::open_db(path)?,
        })
    }

    /// Builds on a database already opened elsewhere (e.g. shared with the
    /// Hebbian graph via [`crate::shared::open_db`]).
    pub fn from_shared(db: Arc<sled::Db>) -> Self {
        Self { db }
    }

    pub fn db(&self) -> Arc<sled::Db> {
        Arc::clone(&self.db)
    }

    pub fn store(&self, entry: &MemoryEntry) -> MemoryResult<()> {
        let bytes = serde_json::to_vec(entry)?;
        self.db.insert(entry_key(&entry.id), bytes)?;
        Ok(())
    }

    pub fn get(&self, id: &str) -> MemoryResult<Option<MemoryEntry>> {
        match self.db.get(entry_key(id))? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn delete(&self, id: &str) -> MemoryResult<()> {
        self.db.remove(entry_key(id))?;
        Ok(())
    }

    pub fn clear(&self) -> MemoryResult<()> {
        for key in self.all_keys()? {
            self.db.remove(key)?;
        }
        Ok(())
    }

    /// Cosine-similarity search over every entry carrying an embedding.
    /// Non-positive scores are dropped (§4.1's "≤0 is no match").
    pub fn semantic_search(&self, query: &[f32], limit: usize) -> MemoryResult<Vec<MemoryEntry>> {
        let mut scored: Vec<(f32, MemoryEntry)> = Vec::new();
        for entry in self.all_entries()? {
            let Some(embedding) = &entry.embedding else {
                continue;
            };
            let score = cosine_similarity(query, embedding);
            if score > 0.0 {
                scored.push((score, entry));
            }
        }
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit);
        Ok(scored.into_iter().map(|(_, e)| e).collect())
    }

    /// Promotes working-memory entries into long-term storage. Only
    /// entries with strength ≥ 0.5 survive the promotion.
    pub fn consolidate(&self, entries: &[MemoryEntry]) -> MemoryResult<usize> {
        let mut stored = 0;
        for entry in entries {
            if entry.strength >= 0.5 {
                self.store(entry)?;
                stored += 1;
            }
        }
        Ok(stored)
    }

    /// Deletes entries whose TTL elapsed, or whose strength is below 0.1
    /// and whose last access is older than 7 days. Then flushes the
    /// storage engine, sled's analogue of value-log compaction.
    pub async fn garbage_collect(&self) -> MemoryResult<usize> {
        let now = Utc::now();
        let stale_after = chrono::Duration::days(7);
        let mut removed = 0;
        for entry in self.all_entries()? {
            let ttl_expired = entry.is_expired(now);
            let weak_and_stale = entry.strength < 0.1 && now - entry.accessed_at > stale_after;
            if ttl_expired || weak_and_stale {
                self.delete(&entry.id)?;
                removed += 1;
            }
        }
        self.db.flush_async().await.map_err(MemoryError::Storage)?;
        debug!(removed, "review-memory: long-term GC pass complete");
        Ok(removed)
    }

    /// Runs `garbage_collect` on a fixed interval until the returned handle
    /// is stopped or dropped. The only long-lived background task in this
    /// crate.
    pub fn spawn_gc(self: &Arc<Self>, interval: Duration) -> GcHandle {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_clone = Arc::clone(&stop);
        let this = Arc::clone(self);
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                if stop_clone.load(Ordering::SeqCst) {
                    break;
                }
                match this.garbage_collect().await {
                    Ok(removed) if removed > 0 => info!(removed, "review-memory: GC reclaimed entries"),
                    Ok(_) => {}
                    Err(e) => tracing::warn!(error = %e, "review-memory: GC pass failed"),
                }
            }
        });
        GcHandle {
            stop,
            task: Some(task),
        }
    }

    pub fn stats(&self) -> MemoryResult<LongTermStats> {
        let mut entries = 0usize;
        let mut total_bytes = 0usize;
        for item in self.db.scan_prefix(ENTRY_PREFIX) {
            let (_, value) = item?;
            entries += 1;
            total_bytes += value.len();
        }
        Ok(LongTermStats {
            entries,
            total_bytes,
        })
    }

    fn all_keys(&self) -> MemoryResult<Vec<sled::IVec>> {
        let mut out = Vec::new();
        for item in self.db.scan_prefix(ENTRY_PREFIX) {
            let (key, _) = item?;
            out.push(key);
        }
        Ok(out)
    }

    fn all_entries(&self) -> MemoryResult<Vec<MemoryEntry>> {
        let mut out = Vec::new();
        for item in self.db.scan_prefix(ENTRY_PREFIX) {
            let (_, value) = item?;
            out.push(serde_json::from_slice(&value)?);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_then_get_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let mem = LongTermMemory::open(dir.path()).unwrap();
        mem.store(&MemoryEntry::new("a", "hello", "review")).unwrap();
        assert_eq!(mem.get("a").unwrap().unwrap().content, "hello");
    }

    #[test]
    fn semantic_search_drops_non_positive_scores_and_sorts_descending() {
        let dir = tempfile::tempdir().unwrap();
        let mem = LongTermMemory::open(dir.path()).unwrap();
        mem.store(&MemoryEntry::new("a", "x", "review").with_embedding(vec![1.0, 0.0])).unwrap();
        mem.store(&MemoryEntry::new("b", "y", "review").with_embedding(vec![-1.0, 0.0])).unwrap();
        mem.store(&MemoryEntry::new("c", "z", "review").with_embedding(vec![0.9, 0.1])).unwrap();
        let hits = mem.semantic_search(&[1.0, 0.0], 10).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].id, "a");
    }

    #[test]
    fn consolidate_only_stores_strong_entries() {
        let dir = tempfile::tempdir().unwrap();
        let mem = LongTermMemory::open(dir.path()).unwrap();
        let entries = vec![
            MemoryEntry::new("a", "x", "review").with_strength(0.9),
            MemoryEntry::new("b", "y", "review").with_strength(0.2),
        ];
        let stored = mem.consolidate(&entries).unwrap();
        assert_eq!(stored, 1);
        assert!(mem.get("a").unwrap().is_some());
        assert!(mem.get("b").unwrap().is_none());
    }

    #[tokio::test]
    async fn garbage_collect_removes_ttl_expired_entries() {
        let dir = tempfile::tempdir().unwrap();
        let mem = LongTermMemory::open(dir.path()).unwrap();
        mem.store(&MemoryEntry::new("a", "x", "review").with_ttl(Duration::from_millis(0)))
            .unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
        let removed = mem.garbage_collect().await.unwrap();
        assert_eq!(removed, 1);
    }
}
