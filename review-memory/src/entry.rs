//! The unit stored by every memory tier.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A piece of remembered content: review findings, recognised patterns, or
/// free-form context, carried with an optional embedding for semantic
/// retrieval and a strength that governs how long it survives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryEntry {
    pub id: String,
    pub content: String,
    pub entry_type: String,
    pub tags: Vec<String>,
    pub metadata: HashMap<String, serde_json::Value>,
    pub embedding: Option<Vec<f32>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub accessed_at: DateTime<Utc>,
    pub access_count: u64,
    /// In `[0.0, 1.0]`. Governs long-term GC survival alongside TTL.
    pub strength: f32,
    pub ttl: Option<Duration>,
}

impl MemoryEntry {
    /// A freshly created entry: zero access count, full strength, "now" for
    /// every timestamp.
    pub fn new(id: impl Into<String>, content: impl Into<String>, entry_type: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            content: content.into(),
            entry_type: entry_type.into(),
            tags: Vec::new(),
            metadata: HashMap::new(),
            embedding: None,
            created_at: now,
            updated_at: now,
            accessed_at: now,
            access_count: 0,
            strength: 1.0,
            ttl: None,
        }
    }

    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn with_strength(mut self, strength: f32) -> Self {
        self.strength = strength.clamp(0.0, 1.0);
        self
    }

    /// True once `now - created_at` exceeds the entry's TTL, if any.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match self.ttl {
            Some(ttl) => match chrono::Duration::from_std(ttl) {
                Ok(d) => now - self.created_at > d,
                Err(_) => false,
            },
            None => false,
        }
    }

    /// Records an access: bumps the counter and moves `accessed_at` to now.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.access_count += 1;
        self.accessed_at = now;
    }
}

/// Search criteria combined with AND semantics (§4.12 "Matching").
///
/// With no field set, every entry scores 1.0. An `exact_id` match
/// short-circuits to a perfect score regardless of other fields.
#[derive(Debug, Clone, Default)]
pub struct MatchCriteria {
    pub exact_id: Option<String>,
    pub entry_type: Option<String>,
    pub tags: Vec<String>,
    pub content_substring: Option<String>,
    pub min_strength: Option<f32>,
}

impl MatchCriteria {
    /// Score this entry against the criteria, in `[0.0, 1.0]`.
    pub fn score(&self, entry: &MemoryEntry) -> f64 {
        if let Some(exact_id) = &self.exact_id {
            return if &entry.id == exact_id { 1.0 } else { 0.0 };
        }

        let mut score = 1.0f64;

        if let Some(entry_type) = &self.entry_type {
            score *= if &entry.entry_type == entry_type { 1.0 } else { 0.0 };
        }

        if !self.tags.is_empty() {
            let matches = self
                .tags
                .iter()
                .filter(|t| entry.tags.iter().any(|et| et == *t))
                .count();
            score *= matches as f64 / self.tags.len() as f64;
        }

        if let Some(substring) = &self.content_substring {
            let needle = substring.to_lowercase();
            let haystack = entry.content.to_lowercase();
            score *= if haystack.contains(&needle) { 1.0 } else { 0.0 };
        }

        if let Some(min_strength) = self.min_strength {
            score *= if entry.strength >= min_strength { 1.0 } else { 0.0 };
        }

        score
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_criteria_scores_everything_at_one() {
        let e = MemoryEntry::new("a", "hello world", "review");
        assert_eq!(MatchCriteria::default().score(&e), 1.0);
    }

    #[test]
    fn exact_id_short_circuits() {
        let e = MemoryEntry::new("a", "hello", "review").with_strength(0.0);
        let c = MatchCriteria {
            exact_id: Some("a".into()),
            min_strength: Some(0.9),
            ..Default::default()
        };
        assert_eq!(c.score(&e), 1.0);
    }

    #[test]
    fn tag_overlap_is_fractional() {
        let e = MemoryEntry::new("a", "x", "review").with_tags(vec!["rust".into(), "security".into()]);
        let c = MatchCriteria {
            tags: vec!["rust".into(), "perf".into()],
            ..Default::default()
        };
        assert_eq!(c.score(&e), 0.5);
    }

    #[test]
    fn content_substring_is_case_folded() {
        let e = MemoryEntry::new("a", "SQL Injection found", "review");
        let c = MatchCriteria {
            content_substring: Some("sql injection".into()),
            ..Default::default()
        };
        assert_eq!(c.score(&e), 1.0);
    }

    #[test]
    fn strength_below_threshold_zeroes_score() {
        let e = MemoryEntry::new("a", "x", "review").with_strength(0.2);
        let c = MatchCriteria {
            min_strength: Some(0.5),
            ..Default::default()
        };
        assert_eq!(c.score(&e), 0.0);
    }
}
