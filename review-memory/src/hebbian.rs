//! Hebbian association graph (C6): directed, value-typed edges between
//! memory entry ids, stored in the same embedded KV backend as long-term
//! memory under a dedicated key prefix.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::{MemoryError, MemoryResult};

const EDGE_PREFIX: &str = "hebbian:";

/// Tunables for the Hebbian update rules.
#[derive(Debug, Clone, Copy)]
pub struct HebbianParams {
    pub learning_rate: f32,
    pub decay_rate: f32,
    pub min_strength: f32,
}

impl Default for HebbianParams {
    fn default() -> Self {
        Self {
            learning_rate: 0.1,
            decay_rate: 0.01,
            min_strength: 0.05,
        }
    }
}

/// A directed association between two memory entries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Association {
    pub source_id: String,
    pub target_id: String,
    pub strength: f32,
    pub co_activation_count: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn edge_key(src: &str, tgt: &str) -> String {
    format!("{EDGE_PREFIX}{src}\0{tgt}")
}

/// All mutating calls are serialised under a writer lock so
/// read-modify-write on a single edge is atomic; reads bypass it.
pub struct HebbianGraph {
    db: Arc<sled::Db>,
    params: HebbianParams,
    writer: Mutex<()>,
}

impl HebbianGraph {
    pub fn open(path: impl AsRef<std::path::Path>, params: HebbianParams) -> MemoryResult<Self> {
        Ok(Self {
            db: crate::shared::open_db(path)?,
            params,
            writer: Mutex::new(()),
        })
    }

    pub fn from_shared(db: Arc<sled::Db>, params: HebbianParams) -> Self {
        Self {
            db,
            params,
            writer: Mutex::new(()),
        }
    }

    fn load(&self, src: &str, tgt: &str) -> MemoryResult<Option<Association>> {
        match self.db.get(edge_key(src, tgt))? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn save(&self, edge: &Association) -> MemoryResult<()> {
        let bytes = serde_json::to_vec(edge)?;
        self.db.insert(edge_key(&edge.source_id, &edge.target_id), bytes)?;
        Ok(())
    }

    fn remove(&self, src: &str, tgt: &str) -> MemoryResult<()> {
        self.db.remove(edge_key(src, tgt))?;
        Ok(())
    }

    /// `s ← s + lr·(1 − s)`, asymptotic toward 1. Creates the edge at
    /// `strength = lr` if absent.
    pub fn strengthen(&self, src: &str, tgt: &str) -> MemoryResult<Association> {
        let _guard = self.writer.lock().unwrap();
        let now = Utc::now();
        let edge = match self.load(src, tgt)? {
            Some(mut e) => {
                e.strength = e.strength + self.params.learning_rate * (1.0 - e.strength);
                e.co_activation_count += 1;
                e.updated_at = now;
                e
            }
            None => Association {
                source_id: src.to_string(),
                target_id: tgt.to_string(),
                strength: self.params.learning_rate,
                co_activation_count: 1,
                created_at: now,
                updated_at: now,
            },
        };
        self.save(&edge)?;
        Ok(edge)
    }

    /// `s ← s − dr·s`. Removes the edge once `s` drops below `min-strength`.
    pub fn weaken(&self, src: &str, tgt: &str) -> MemoryResult<Option<Association>> {
        let _guard = self.writer.lock().unwrap();
        let Some(mut edge) = self.load(src, tgt)? else {
            return Ok(None);
        };
        edge.strength -= self.params.decay_rate * edge.strength;
        edge.updated_at = Utc::now();
        if edge.strength < self.params.min_strength {
            self.remove(src, tgt)?;
            return Ok(None);
        }
        self.save(&edge)?;
        Ok(Some(edge))
    }

    /// Forward (id as source) and reverse (id as target) edges.
    pub fn get_associations(&self, id: &str) -> MemoryResult<Vec<Association>> {
        let mut out = Vec::new();
        for item in self.db.scan_prefix(EDGE_PREFIX) {
            let (_, value) = item?;
            let edge: Association = serde_json::from_slice(&value)?;
            if edge.source_id == id || edge.target_id == id {
                out.push(edge);
            }
        }
        Ok(out)
    }

    /// Exponential decay by wall-clock days since `updated_at`:
    /// `s ← s·exp(−dr·Δ_days)`. Edges that fall below `min-strength` are
    /// deleted.
    pub fn decay(&self) -> MemoryResult<usize> {
        let _guard = self.writer.lock().unwrap();
        let now = Utc::now();
        let mut touched = 0;
        let edges = self.all_edges()?;
        for mut edge in edges {
            let delta_days = (now - edge.updated_at).num_seconds() as f64 / 86_400.0;
            edge.strength = (edge.strength as f64 * (-(self.params.decay_rate as f64) * delta_days).exp()) as f32;
            if edge.strength < self.params.min_strength {
                self.remove(&edge.source_id, &edge.target_id)?;
            } else {
                edge.updated_at = now;
                self.save(&edge)?;
            }
            touched += 1;
        }
        Ok(touched)
    }

    /// Removes every edge below `min` strength in one batch.
    pub fn prune(&self, min: f32) -> MemoryResult<usize> {
        let _guard = self.writer.lock().unwrap();
        let mut removed = 0;
        for edge in self.all_edges()? {
            if edge.strength < min {
                self.remove(&edge.source_id, &edge.target_id)?;
                removed += 1;
            }
        }
        Ok(removed)
    }

    fn all_edges(&self) -> MemoryResult<Vec<Association>> {
        let mut out = Vec::new();
        for item in self.db.scan_prefix(EDGE_PREFIX) {
            let (_, value) = item.map_err(MemoryError::Storage)?;
            out.push(serde_json::from_slice(&value)?);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph() -> (tempfile::TempDir, HebbianGraph) {
        let dir = tempfile::tempdir().unwrap();
        let g = HebbianGraph::open(dir.path(), HebbianParams::default()).unwrap();
        (dir, g)
    }

    #[test]
    fn strengthen_creates_edge_at_learning_rate() {
        let (_dir, g) = graph();
        let edge = g.strengthen("a", "b").unwrap();
        assert_eq!(edge.strength, 0.1);
        assert_eq!(edge.co_activation_count, 1);
    }

    #[test]
    fn repeated_strengthen_approaches_but_never_reaches_one() {
        let (_dir, g) = graph();
        let mut last = 0.0;
        for _ in 0..200 {
            let edge = g.strengthen("a", "b").unwrap();
            assert!(edge.strength >= last);
            assert!(edge.strength < 1.0);
            last = edge.strength;
        }
    }

    #[test]
    fn weaken_removes_edge_below_min_strength() {
        let (_dir, g) = graph();
        g.strengthen("a", "b").unwrap();
        for _ in 0..500 {
            let _ = g.weaken("a", "b").unwrap();
        }
        assert!(g.load("a", "b").unwrap().is_none());
    }

    #[test]
    fn get_associations_returns_forward_and_reverse_edges() {
        let (_dir, g) = graph();
        g.strengthen("a", "b").unwrap();
        g.strengthen("c", "a").unwrap();
        let assoc = g.get_associations("a").unwrap();
        assert_eq!(assoc.len(), 2);
    }

    #[test]
    fn prune_removes_edges_below_threshold() {
        let (_dir, g) = graph();
        g.strengthen("a", "b").unwrap();
        g.strengthen("c", "d").unwrap();
        let removed = g.prune(0.2).unwrap();
        assert_eq!(removed, 2);
    }
}
