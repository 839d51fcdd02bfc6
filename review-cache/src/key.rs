//! Deterministic cache key computation.
//!
//! Key (stable across re-runs): `SHA256("{diff}:{language}:{path}:{rules}:{tool_version}")`.
//! Invariant: the key alone determines the value — two writes under the same
//! key are interchangeable, and changing any keyed field yields a miss.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// The five fields that determine a cache key.
///
/// `rule_set_identity` should be a stable fingerprint of the active rule
/// configuration (e.g. a hash of enabled/disabled rule ids), not the rules
/// themselves — callers own that fingerprinting.
#[derive(Debug, Clone)]
pub struct CacheKeyInput<'a> {
    pub diff_text: &'a str,
    pub language_tag: &'a str,
    pub file_path: &'a str,
    pub rule_set_identity: &'a str,
    pub tool_version: &'a str,
}

/// Opaque, deterministic cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey(pub String);

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl CacheKey {
    /// First two hex characters, used as the on-disk shard directory.
    pub fn shard(&self) -> &str {
        &self.0[..2]
    }
}

/// Computes the deterministic key for a review request.
pub fn compute_key(input: &CacheKeyInput<'_>) -> CacheKey {
    let mut hasher = Sha256::new();
    hasher.update(input.diff_text.as_bytes());
    hasher.update(b"\0");
    hasher.update(input.language_tag.as_bytes());
    hasher.update(b"\0");
    hasher.update(input.file_path.as_bytes());
    hasher.update(b"\0");
    hasher.update(input.rule_set_identity.as_bytes());
    hasher.update(b"\0");
    hasher.update(input.tool_version.as_bytes());
    let digest = hasher.finalize();
    CacheKey(format!("{digest:x}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input<'a>(diff: &'a str, rules: &'a str) -> CacheKeyInput<'a> {
        CacheKeyInput {
            diff_text: diff,
            language_tag: "rust",
            file_path: "src/a.rs",
            rule_set_identity: rules,
            tool_version: "1.0.0",
        }
    }

    #[test]
    fn same_fields_same_key() {
        let a = compute_key(&input("diff-a", "default"));
        let b = compute_key(&input("diff-a", "default"));
        assert_eq!(a, b);
    }

    #[test]
    fn different_rules_different_key() {
        let a = compute_key(&input("diff-a", "default"));
        let b = compute_key(&input("diff-a", "strict"));
        assert_ne!(a, b);
    }

    #[test]
    fn shard_is_first_two_hex_chars() {
        let k = compute_key(&input("x", "y"));
        assert_eq!(k.shard(), &k.0[..2]);
        assert_eq!(k.shard().len(), 2);
    }
}
