//! Session memory (C4): a working-memory-like map with file-per-session
//! persistence. Each session's non-empty state is flushed to
//! `<dir>/<uuid>.json` on close or when a new session starts.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::entry::{MatchCriteria, MemoryEntry};
use crate::errors::MemoryResult;
use crate::working::{WorkingMemory, WorkingMemoryStats};

#[derive(Serialize, Deserialize)]
struct SessionFile {
    session_id: Uuid,
    entries: Vec<MemoryEntry>,
}

/// File-backed session state, layered on a [`WorkingMemory`] for the
/// in-process view of the current session.
pub struct SessionMemory {
    dir: PathBuf,
    max_sessions: usize,
    session_id: std::sync::Mutex<Uuid>,
    inner: WorkingMemory,
}

impl SessionMemory {
    pub async fn open(dir: impl Into<PathBuf>, capacity: usize, max_sessions: usize) -> MemoryResult<Self> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self {
            dir,
            max_sessions: max_sessions.max(1),
            session_id: std::sync::Mutex::new(Uuid::new_v4()),
            inner: WorkingMemory::new(capacity, None),
        })
    }

    pub fn session_id(&self) -> Uuid {
        *self.session_id.lock().unwrap()
    }

    pub fn store(&self, entry: MemoryEntry) {
        self.inner.store(entry);
    }

    pub fn get(&self, id: &str) -> Option<MemoryEntry> {
        self.inner.get(id)
    }

    pub fn search(&self, criteria: &MatchCriteria, limit: usize) -> Vec<MemoryEntry> {
        self.inner.search(criteria, limit)
    }

    pub fn delete(&self, id: &str) -> bool {
        self.inner.delete(id)
    }

    pub fn clear(&self) {
        self.inner.clear();
    }

    pub fn stats(&self) -> WorkingMemoryStats {
        self.inner.stats()
    }

    /// Flushes the current session to disk if non-empty, then starts a
    /// fresh session id with an empty in-process state.
    pub async fn new_session(&self) -> MemoryResult<Uuid> {
        self.flush().await?;
        let next = Uuid::new_v4();
        *self.session_id.lock().unwrap() = next;
        self.inner.clear();
        self.prune_oldest().await?;
        Ok(next)
    }

    /// Writes the current session's entries to `<dir>/<uuid>.json`, skipping
    /// the write entirely when there is nothing to persist.
    pub async fn flush(&self) -> MemoryResult<()> {
        let entries = self.inner.search(&MatchCriteria::default(), usize::MAX);
        if entries.is_empty() {
            return Ok(());
        }
        let id = self.session_id();
        let file = SessionFile {
            session_id: id,
            entries,
        };
        let bytes = serde_json::to_vec_pretty(&file)?;
        let path = self.path_for(id);
        tokio::fs::write(&path, bytes).await?;
        Ok(())
    }

    /// Loads a previously persisted session into the in-process state,
    /// replacing whatever is currently held.
    pub async fn load_session(&self, id: Uuid) -> MemoryResult<()> {
        let path = self.path_for(id);
        let bytes = tokio::fs::read(&path).await?;
        let file: SessionFile = serde_json::from_slice(&bytes)?;
        self.inner.clear();
        for entry in file.entries {
            self.inner.store(entry);
        }
        *self.session_id.lock().unwrap() = id;
        Ok(())
    }

    pub async fn list_sessions(&self) -> MemoryResult<Vec<Uuid>> {
        let mut out = Vec::new();
        let mut read_dir = tokio::fs::read_dir(&self.dir).await?;
        while let Some(entry) = read_dir.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                if let Ok(id) = Uuid::parse_str(stem) {
                    out.push(id);
                }
            }
        }
        Ok(out)
    }

    fn path_for(&self, id: Uuid) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }

    /// Removes sessions beyond `max_sessions`, oldest-first by mtime.
    async fn prune_oldest(&self) -> MemoryResult<()> {
        let mut entries: Vec<(PathBuf, std::time::SystemTime)> = Vec::new();
        let mut read_dir = tokio::fs::read_dir(&self.dir).await?;
        while let Some(entry) = read_dir.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let modified = entry.metadata().await?.modified()?;
            entries.push((path, modified));
        }
        if entries.len() <= self.max_sessions {
            return Ok(());
        }
        entries.sort_by_key(|(_, m)| *m);
        let excess = entries.len() - self.max_sessions;
        for (path, _) in entries.into_iter().take(excess) {
            if let Err(e) = tokio::fs::remove_file(&path).await {
                warn!(error = %e, path = %path.display(), "review-memory: failed to prune old session");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn flush_then_load_round_trips_entries() {
        let dir = tempfile::tempdir().unwrap();
        let session = SessionMemory::open(dir.path(), 16, 10).await.unwrap();
        session.store(MemoryEntry::new("a", "hello", "context"));
        let id = session.session_id();
        session.flush().await.unwrap();

        let reloaded = SessionMemory::open(dir.path(), 16, 10).await.unwrap();
        reloaded.load_session(id).await.unwrap();
        assert!(reloaded.get("a").is_some());
    }

    #[tokio::test]
    async fn new_session_flushes_and_starts_fresh() {
        let dir = tempfile::tempdir().unwrap();
        let session = SessionMemory::open(dir.path(), 16, 10).await.unwrap();
        session.store(MemoryEntry::new("a", "hello", "context"));
        let old_id = session.session_id();
        let new_id = session.new_session().await.unwrap();
        assert_ne!(old_id, new_id);
        assert!(session.get("a").is_none());
        assert!(dir.path().join(format!("{old_id}.json")).exists());
    }

    #[tokio::test]
    async fn empty_session_does_not_write_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let session = SessionMemory::open(dir.path(), 16, 10).await.unwrap();
        let id = session.session_id();
        session.flush().await.unwrap();
        assert!(!dir.path().join(format!("{id}.json")).exists());
    }

    #[tokio::test]
    async fn prune_keeps_only_max_sessions_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        let session = SessionMemory::open(dir.path(), 16, 2).await.unwrap();
        for i in 0..4 {
            session.store(MemoryEntry::new(format!("e{i}"), "x", "context"));
            session.new_session().await.unwrap();
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        let remaining = session.list_sessions().await.unwrap();
        assert!(remaining.len() <= 2);
    }
}
