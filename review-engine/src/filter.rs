//! File filtering: ignore-glob matching and drop-deleted/drop-binary rules
//! (§4 file selection).

use globset::{Glob, GlobSet, GlobSetBuilder};
use tracing::debug;

use crate::diff::{ChangeSet, FileStatus};
use crate::errors::EngineResult;

/// Default globs skipped even without user configuration: lockfiles,
/// generated/vendored trees, and binary-ish blobs that a diff can't
/// usefully review.
pub const DEFAULT_IGNORES: &[&str] = &[
    "**/Cargo.lock",
    "**/package-lock.json",
    "**/yarn.lock",
    "**/pnpm-lock.yaml",
    "**/node_modules/**",
    "**/vendor/**",
    "**/dist/**",
    "**/target/**",
    "**/.git/**",
    "**/*.lock",
    "**/*.min.js",
    "**/*.svg",
    "**/*.png",
    "**/*.jpg",
    "**/*.jpeg",
    "**/*.gif",
    "**/*.ico",
    "**/*.woff",
    "**/*.woff2",
];

pub struct IgnoreSet {
    set: GlobSet,
}

impl IgnoreSet {
    pub fn new(extra_patterns: &[String]) -> EngineResult<Self> {
        let mut builder = GlobSetBuilder::new();
        for pattern in DEFAULT_IGNORES.iter().map(|s| s.to_string()).chain(extra_patterns.iter().cloned()) {
            let glob = Glob::new(&pattern)
                .map_err(|e| crate::errors::EngineError::NoProvider(format!("invalid ignore glob {pattern:?}: {e}")))?;
            builder.add(glob);
        }
        let set = builder
            .build()
            .map_err(|e| crate::errors::EngineError::NoProvider(format!("could not compile ignore globs: {e}")))?;
        Ok(Self { set })
    }

    pub fn is_ignored(&self, path: &str) -> bool {
        self.set.is_match(path)
    }
}

/// Applies ignore globs and drops deleted/binary files, leaving only files
/// a provider can meaningfully review. Returns the surviving files and a
/// count of how many were dropped, for run-summary logging.
pub fn apply(changes: ChangeSet, ignores: &IgnoreSet) -> (ChangeSet, usize) {
    let mut dropped = 0usize;
    let files = changes
        .files
        .into_iter()
        .filter(|file| {
            if file.status == FileStatus::Deleted {
                debug!(path = %file.path, "review-engine: skipping deleted file");
                dropped += 1;
                return false;
            }
            if file.is_binary {
                debug!(path = %file.path, "review-engine: skipping binary file");
                dropped += 1;
                return false;
            }
            if ignores.is_ignored(&file.path) {
                debug!(path = %file.path, "review-engine: skipping ignored file");
                dropped += 1;
                return false;
            }
            if file.hunks.is_empty() {
                dropped += 1;
                return false;
            }
            true
        })
        .collect();
    (
        ChangeSet {
            files,
            is_truncated: changes.is_truncated,
        },
        dropped,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::{DiffHunk, DiffLine, FileDiff};

    fn file(path: &str, status: FileStatus, is_binary: bool) -> FileDiff {
        FileDiff {
            path: path.to_string(),
            old_path: None,
            status,
            language_tag: "rust".into(),
            is_binary,
            hunks: if is_binary {
                Vec::new()
            } else {
                vec![DiffHunk {
                    header: "@@ -1 +1 @@".into(),
                    old_start: 1,
                    old_lines: 1,
                    new_start: 1,
                    new_lines: 1,
                    lines: vec![DiffLine::Added { new_line: 1, content: "x".into() }],
                }]
            },
        }
    }

    #[test]
    fn drops_deleted_binary_and_ignored_files() {
        let ignores = IgnoreSet::new(&[]).unwrap();
        let changes = ChangeSet {
            files: vec![
                file("src/main.rs", FileStatus::Modified, false),
                file("Cargo.lock", FileStatus::Modified, false),
                file("assets/logo.png", FileStatus::Added, true),
                file("src/old.rs", FileStatus::Deleted, false),
            ],
            is_truncated: false,
        };
        let (filtered, dropped) = apply(changes, &ignores);
        assert_eq!(filtered.files.len(), 1);
        assert_eq!(filtered.files[0].path, "src/main.rs");
        assert_eq!(dropped, 3);
    }

    #[test]
    fn custom_ignore_pattern_applies() {
        let ignores = IgnoreSet::new(&["**/*.generated.rs".to_string()]).unwrap();
        assert!(ignores.is_ignored("src/schema.generated.rs"));
        assert!(!ignores.is_ignored("src/main.rs"));
    }
}
