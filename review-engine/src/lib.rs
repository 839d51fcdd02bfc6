//! Orchestrates a single review run: acquire a diff, filter it down to
//! reviewable files, dispatch each through cache-then-provider with
//! bounded concurrency, and aggregate the results.

mod diff;
mod errors;
mod filter;
mod run;

pub use diff::{
    acquire, language_tag_for, ChangeSet, DiffHunk, DiffLine, DiffSource, FileDiff, FileStatus, ReviewMode,
};
pub use errors::{EngineError, EngineResult};
pub use filter::{apply as apply_filters, IgnoreSet, DEFAULT_IGNORES};
pub use run::{default_concurrency, run, FileError, FileReview, RunConfig, RunResult};
