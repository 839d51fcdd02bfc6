//! Working memory (C3): bounded in-process map with LRU order and a
//! uniform TTL, guarded by a single mutex.

use std::collections::HashMap;
use std::time::Duration;

use chrono::Utc;

use crate::entry::{MatchCriteria, MemoryEntry};

struct State {
    entries: HashMap<String, MemoryEntry>,
    /// Most-recently-used at the back.
    order: Vec<String>,
    hits: u64,
    misses: u64,
}

impl State {
    fn touch_order(&mut self, id: &str) {
        if let Some(pos) = self.order.iter().position(|x| x == id) {
            self.order.remove(pos);
        }
        self.order.push(id.to_string());
    }

    fn remove(&mut self, id: &str) -> Option<MemoryEntry> {
        if let Some(pos) = self.order.iter().position(|x| x == id) {
            self.order.remove(pos);
        }
        self.entries.remove(id)
    }
}

/// Observability snapshot for a working-memory tier.
#[derive(Debug, Clone, Copy, Default)]
pub struct WorkingMemoryStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
}

pub struct WorkingMemory {
    capacity: usize,
    ttl: Option<Duration>,
    state: std::sync::Mutex<State>,
}

impl WorkingMemory {
    pub fn new(capacity: usize, ttl: Option<Duration>) -> Self {
        Self {
            capacity: capacity.max(1),
            ttl,
            state: std::sync::Mutex::new(State {
                entries: HashMap::new(),
                order: Vec::new(),
                hits: 0,
                misses: 0,
            }),
        }
    }

    /// Stores `entry`, evicting the oldest entry first if at capacity.
    /// Applies this tier's uniform TTL unless the entry already carries one.
    pub fn store(&self, mut entry: MemoryEntry) {
        if entry.ttl.is_none() {
            entry.ttl = self.ttl;
        }
        let mut state = self.state.lock().unwrap();
        if !state.entries.contains_key(&entry.id) && state.entries.len() >= self.capacity {
            if let Some(oldest) = state.order.first().cloned() {
                state.remove(&oldest);
            }
        }
        let id = entry.id.clone();
        state.entries.insert(id.clone(), entry);
        state.touch_order(&id);
    }

    /// Fetches an entry, bumping its LRU position and access count. Lazily
    /// evicts if the entry has expired.
    pub fn get(&self, id: &str) -> Option<MemoryEntry> {
        let mut state = self.state.lock().unwrap();
        let now = Utc::now();
        let expired = state.entries.get(id).map(|e| e.is_expired(now)).unwrap_or(false);
        if expired {
            state.remove(id);
            state.misses += 1;
            return None;
        }
        match state.entries.get_mut(id) {
            Some(entry) => {
                entry.touch(now);
                let out = entry.clone();
                state.touch_order(id);
                state.hits += 1;
                Some(out)
            }
            None => {
                state.misses += 1;
                None
            }
        }
    }

    /// Full scan scored by `criteria`, descending by score, truncated to
    /// `limit`. Entries scoring `0.0` are excluded.
    pub fn search(&self, criteria: &MatchCriteria, limit: usize) -> Vec<MemoryEntry> {
        let state = self.state.lock().unwrap();
        let mut scored: Vec<(f64, MemoryEntry)> = state
            .entries
            .values()
            .map(|e| (criteria.score(e), e.clone()))
            .filter(|(score, _)| *score > 0.0)
            .collect();
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit);
        scored.into_iter().map(|(_, e)| e).collect()
    }

    pub fn update(&self, id: &str, f: impl FnOnce(&mut MemoryEntry)) -> bool {
        let mut state = self.state.lock().unwrap();
        match state.entries.get_mut(id) {
            Some(entry) => {
                f(entry);
                entry.updated_at = Utc::now();
                true
            }
            None => false,
        }
    }

    pub fn delete(&self, id: &str) -> bool {
        self.state.lock().unwrap().remove(id).is_some()
    }

    pub fn clear(&self) {
        let mut state = self.state.lock().unwrap();
        state.entries.clear();
        state.order.clear();
    }

    pub fn touch(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    pub fn evict_oldest(&self) -> Option<MemoryEntry> {
        let mut state = self.state.lock().unwrap();
        let oldest = state.order.first().cloned()?;
        state.remove(&oldest)
    }

    /// Removes every entry whose TTL has elapsed.
    pub fn clean_expired(&self) -> usize {
        let mut state = self.state.lock().unwrap();
        let now = Utc::now();
        let expired: Vec<String> = state
            .entries
            .values()
            .filter(|e| e.is_expired(now))
            .map(|e| e.id.clone())
            .collect();
        for id in &expired {
            state.remove(id);
        }
        expired.len()
    }

    pub fn stats(&self) -> WorkingMemoryStats {
        let state = self.state.lock().unwrap();
        WorkingMemoryStats {
            entries: state.entries.len(),
            hits: state.hits,
            misses: state.misses,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_then_get_bumps_access_count() {
        let m = WorkingMemory::new(4, None);
        m.store(MemoryEntry::new("a", "hello", "review"));
        let e = m.get("a").unwrap();
        assert_eq!(e.access_count, 1);
    }

    #[test]
    fn evicts_oldest_when_full() {
        let m = WorkingMemory::new(2, None);
        m.store(MemoryEntry::new("a", "1", "review"));
        m.store(MemoryEntry::new("b", "2", "review"));
        m.store(MemoryEntry::new("c", "3", "review"));
        assert!(m.get("a").is_none());
        assert!(m.get("b").is_some());
        assert!(m.get("c").is_some());
    }

    #[test]
    fn get_refreshes_lru_order() {
        let m = WorkingMemory::new(2, None);
        m.store(MemoryEntry::new("a", "1", "review"));
        m.store(MemoryEntry::new("b", "2", "review"));
        let _ = m.get("a");
        m.store(MemoryEntry::new("c", "3", "review"));
        assert!(m.get("b").is_none());
        assert!(m.get("a").is_some());
    }

    #[test]
    fn ttl_expires_on_access() {
        let m = WorkingMemory::new(4, Some(Duration::from_millis(0)));
        m.store(MemoryEntry::new("a", "1", "review"));
        std::thread::sleep(Duration::from_millis(5));
        assert!(m.get("a").is_none());
    }

    #[test]
    fn search_sorts_descending_and_respects_limit() {
        let m = WorkingMemory::new(10, None);
        m.store(MemoryEntry::new("a", "rust code", "review").with_tags(vec!["rust".into()]));
        m.store(MemoryEntry::new("b", "go code", "review").with_tags(vec!["go".into()]));
        m.store(MemoryEntry::new("c", "rust again", "review").with_tags(vec!["rust".into()]));
        let criteria = MatchCriteria {
            tags: vec!["rust".into()],
            ..Default::default()
        };
        let hits = m.search(&criteria, 1);
        assert_eq!(hits.len(), 1);
    }

    #[test]
    fn clean_expired_removes_only_expired_entries() {
        let m = WorkingMemory::new(4, None);
        m.store(MemoryEntry::new("a", "1", "review").with_ttl(Duration::from_millis(0)));
        m.store(MemoryEntry::new("b", "2", "review"));
        std::thread::sleep(Duration::from_millis(5));
        let removed = m.clean_expired();
        assert_eq!(removed, 1);
        assert!(m.get("b").is_some());
    }
}
