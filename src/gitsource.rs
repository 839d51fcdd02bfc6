//! A concrete [`DiffSource`] over a local git checkout.
//!
//! Version-control diff extraction is, per the core's own contract,
//! "specified only as an interface" (§6) — the engine only ever depends on
//! [`DiffSource`]. This module is the thin, swappable implementation that
//! makes `revcore` runnable standalone; a webhook/PR front-end would supply
//! its own instead. Built on `git2`, the same libgit2 binding the retrieval
//! pack uses elsewhere for repository access.

use std::path::{Path, PathBuf};
use std::pin::Pin;

use git2::{Delta, Diff as GitDiff, DiffOptions, Repository};
use review_engine::{ChangeSet, DiffHunk, DiffLine, DiffSource, EngineError, EngineResult, FileDiff, FileStatus, language_tag_for};

pub struct GitDiffSource {
    repo_path: PathBuf,
}

impl GitDiffSource {
    pub fn open(repo_path: impl Into<PathBuf>) -> Self {
        Self { repo_path: repo_path.into() }
    }

    fn repo(&self) -> EngineResult<Repository> {
        Repository::open(&self.repo_path).map_err(|e| EngineError::DiffUnavailable(e.to_string()))
    }
}

type BoxFuture<'a, T> = Pin<Box<dyn std::future::Future<Output = T> + Send + 'a>>;

impl DiffSource for GitDiffSource {
    fn staged_diff(&self) -> BoxFuture<'_, EngineResult<ChangeSet>> {
        Box::pin(async move {
            let repo = self.repo()?;
            let head_tree = repo.head().ok().and_then(|h| h.peel_to_tree().ok());
            let diff = repo
                .diff_tree_to_index(head_tree.as_ref(), None, None)
                .map_err(|e| EngineError::DiffUnavailable(e.to_string()))?;
            Ok(changeset_from_diff(&diff))
        })
    }

    fn commit_diff<'a>(&'a self, sha: &'a str) -> BoxFuture<'a, EngineResult<ChangeSet>> {
        Box::pin(async move {
            let repo = self.repo()?;
            let oid = git2::Oid::from_str(sha).map_err(|e| EngineError::DiffUnavailable(e.to_string()))?;
            let commit = repo.find_commit(oid).map_err(|e| EngineError::DiffUnavailable(e.to_string()))?;
            let tree = commit.tree().map_err(|e| EngineError::DiffUnavailable(e.to_string()))?;
            let parent_tree = commit.parent(0).ok().and_then(|p| p.tree().ok());
            let diff = repo
                .diff_tree_to_tree(parent_tree.as_ref(), Some(&tree), None)
                .map_err(|e| EngineError::DiffUnavailable(e.to_string()))?;
            Ok(changeset_from_diff(&diff))
        })
    }

    fn branch_diff<'a>(&'a self, base_branch: &'a str) -> BoxFuture<'a, EngineResult<ChangeSet>> {
        Box::pin(async move {
            let repo = self.repo()?;
            let base = repo
                .find_branch(base_branch, git2::BranchType::Local)
                .or_else(|_| repo.find_branch(base_branch, git2::BranchType::Remote))
                .map_err(|e| EngineError::DiffUnavailable(e.to_string()))?;
            let base_tree = base
                .get()
                .peel_to_tree()
                .map_err(|e| EngineError::DiffUnavailable(e.to_string()))?;
            let head_tree = repo
                .head()
                .and_then(|h| h.peel_to_tree())
                .map_err(|e| EngineError::DiffUnavailable(e.to_string()))?;
            let diff = repo
                .diff_tree_to_tree(Some(&base_tree), Some(&head_tree), None)
                .map_err(|e| EngineError::DiffUnavailable(e.to_string()))?;
            Ok(changeset_from_diff(&diff))
        })
    }

    fn explicit_files<'a>(&'a self, paths: &'a [PathBuf]) -> BoxFuture<'a, EngineResult<ChangeSet>> {
        Box::pin(async move {
            let repo = self.repo()?;
            let head_tree = repo.head().ok().and_then(|h| h.peel_to_tree().ok());
            let mut opts = DiffOptions::new();
            for path in paths {
                opts.pathspec(path.to_string_lossy().as_ref());
            }
            let diff = repo
                .diff_tree_to_workdir_with_index(head_tree.as_ref(), Some(&mut opts))
                .map_err(|e| EngineError::DiffUnavailable(e.to_string()))?;
            Ok(changeset_from_diff(&diff))
        })
    }
}

fn changeset_from_diff(diff: &GitDiff) -> ChangeSet {
    let mut files: Vec<FileDiff> = Vec::new();

    let _ = diff.foreach(
        &mut |delta, _progress| {
            let status = match delta.status() {
                Delta::Added => FileStatus::Added,
                Delta::Deleted => FileStatus::Deleted,
                Delta::Renamed => FileStatus::Renamed,
                _ => FileStatus::Modified,
            };
            let path = delta.new_file().path().or_else(|| delta.old_file().path()).unwrap_or_else(|| Path::new(""));
            let old_path = delta.old_file().path().map(|p| p.to_string_lossy().to_string());
            files.push(FileDiff {
                path: path.to_string_lossy().to_string(),
                old_path,
                status,
                language_tag: language_tag_for(path),
                is_binary: delta.new_file().is_binary() || delta.old_file().is_binary(),
                hunks: Vec::new(),
            });
            true
        },
        None,
        Some(&mut |_delta, hunk| {
            if let Some(file) = files.last_mut() {
                file.hunks.push(DiffHunk {
                    header: String::from_utf8_lossy(hunk.header()).trim_end().to_string(),
                    old_start: hunk.old_start(),
                    old_lines: hunk.old_lines(),
                    new_start: hunk.new_start(),
                    new_lines: hunk.new_lines(),
                    lines: Vec::new(),
                });
            }
            true
        }),
        Some(&mut |_delta, _hunk, line| {
            if let Some(file) = files.last_mut() {
                if let Some(current_hunk) = file.hunks.last_mut() {
                    let content = String::from_utf8_lossy(line.content()).trim_end_matches('\n').to_string();
                    let diff_line = match line.origin() {
                        '+' => DiffLine::Added { new_line: line.new_lineno().unwrap_or(0), content },
                        '-' => DiffLine::Removed { old_line: line.old_lineno().unwrap_or(0), content },
                        _ => DiffLine::Context {
                            old_line: line.old_lineno().unwrap_or(0),
                            new_line: line.new_lineno().unwrap_or(0),
                            content,
                        },
                    };
                    current_hunk.lines.push(diff_line);
                }
            }
            true
        }),
    );

    ChangeSet { files, is_truncated: false }
}
