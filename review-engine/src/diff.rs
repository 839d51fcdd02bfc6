//! The file-diff data model (§3) and the diff-source contract the engine
//! depends on but does not implement (§6 — "specified only as an
//! interface").

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use crate::errors::EngineResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileStatus {
    Added,
    Modified,
    Deleted,
    Renamed,
}

#[derive(Debug, Clone)]
pub enum DiffLine {
    Added { new_line: u32, content: String },
    Removed { old_line: u32, content: String },
    Context { old_line: u32, new_line: u32, content: String },
}

#[derive(Debug, Clone)]
pub struct DiffHunk {
    pub header: String,
    pub old_start: u32,
    pub old_lines: u32,
    pub new_start: u32,
    pub new_lines: u32,
    pub lines: Vec<DiffLine>,
}

/// One changed file, as yielded by a [`DiffSource`].
#[derive(Debug, Clone)]
pub struct FileDiff {
    pub path: String,
    pub old_path: Option<String>,
    pub status: FileStatus,
    pub language_tag: String,
    pub is_binary: bool,
    pub hunks: Vec<DiffHunk>,
}

impl FileDiff {
    /// Total bytes across every hunk's line content, used for cache-size
    /// bookkeeping and per-file error reporting.
    pub fn diff_size_bytes(&self) -> usize {
        self.hunks
            .iter()
            .flat_map(|h| &h.lines)
            .map(|line| match line {
                DiffLine::Added { content, .. } => content.len(),
                DiffLine::Removed { content, .. } => content.len(),
                DiffLine::Context { content, .. } => content.len(),
            })
            .sum()
    }

    /// Renders this file's hunks back into unified-diff text, the shape a
    /// review request's `diff_text` field expects.
    pub fn render_unified(&self) -> String {
        let mut out = String::new();
        for hunk in &self.hunks {
            out.push_str(&hunk.header);
            out.push('\n');
            for line in &hunk.lines {
                match line {
                    DiffLine::Added { content, .. } => {
                        out.push('+');
                        out.push_str(content);
                        out.push('\n');
                    }
                    DiffLine::Removed { content, .. } => {
                        out.push('-');
                        out.push_str(content);
                        out.push('\n');
                    }
                    DiffLine::Context { content, .. } => {
                        out.push(' ');
                        out.push_str(content);
                        out.push('\n');
                    }
                }
            }
        }
        out
    }
}

#[derive(Debug, Clone, Default)]
pub struct ChangeSet {
    pub files: Vec<FileDiff>,
    pub is_truncated: bool,
}

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// The repository abstraction the engine depends on (§6): staged diff,
/// commit diff by SHA, branch diff vs. a base, or an explicit file list.
/// No concrete implementation lives in this crate — version-control diff
/// extraction is an external collaborator.
pub trait DiffSource: Send + Sync {
    fn staged_diff(&self) -> BoxFuture<'_, EngineResult<ChangeSet>>;
    fn commit_diff<'a>(&'a self, sha: &'a str) -> BoxFuture<'a, EngineResult<ChangeSet>>;
    fn branch_diff<'a>(&'a self, base_branch: &'a str) -> BoxFuture<'a, EngineResult<ChangeSet>>;
    fn explicit_files<'a>(&'a self, paths: &'a [PathBuf]) -> BoxFuture<'a, EngineResult<ChangeSet>>;
}

/// Which of the four `DiffSource` operations a run should use.
#[derive(Debug, Clone)]
pub enum ReviewMode {
    Staged,
    Commit(String),
    Branch(String),
    Files(Vec<PathBuf>),
}

pub async fn acquire(source: &dyn DiffSource, mode: &ReviewMode) -> EngineResult<ChangeSet> {
    match mode {
        ReviewMode::Staged => source.staged_diff().await,
        ReviewMode::Commit(sha) => source.commit_diff(sha).await,
        ReviewMode::Branch(base) => source.branch_diff(base).await,
        ReviewMode::Files(paths) => source.explicit_files(paths).await,
    }
}

/// Guesses a language tag from a file extension. Best-effort; an unknown
/// extension yields `"text"` rather than failing the file.
pub fn language_tag_for(path: &Path) -> String {
    match path.extension().and_then(|e| e.to_str()) {
        Some("rs") => "rust",
        Some("go") => "go",
        Some("py") => "python",
        Some("js") => "javascript",
        Some("ts") => "typescript",
        Some("java") => "java",
        Some("rb") => "ruby",
        Some("c") | Some("h") => "c",
        Some("cpp") | Some("cc") | Some("hpp") => "cpp",
        _ => "text",
    }
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn language_tag_falls_back_to_text() {
        assert_eq!(language_tag_for(Path::new("README")), "text");
        assert_eq!(language_tag_for(Path::new("main.rs")), "rust");
    }

    #[test]
    fn diff_size_bytes_sums_every_line() {
        let diff = FileDiff {
            path: "a.rs".into(),
            old_path: None,
            status: FileStatus::Modified,
            language_tag: "rust".into(),
            is_binary: false,
            hunks: vec![DiffHunk {
                header: "@@ -1,1 +1,2 @@".into(),
                old_start: 1,
                old_lines: 1,
                new_start: 1,
                new_lines: 2,
                lines: vec![
                    DiffLine::Context { old_line: 1, new_line: 1, content: "fn main() {".into() },
                    DiffLine::Added { new_line: 2, content: "    println!(\"hi\");".into() },
                ],
            }],
        };
        assert_eq!(diff.diff_size_bytes(), "fn main() {".len() + "    println!(\"hi\");".len());
    }
}
