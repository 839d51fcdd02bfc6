//! Crate-wide error hierarchy for `review-engine`.
//!
//! Only two failure modes are fatal to a run (§7): no diff could be
//! acquired at all, or no provider could be constructed. Everything else
//! is captured per-file in the aggregate [`crate::run::RunResult`].

use thiserror::Error;

pub type EngineResult<T> = Result<T, EngineError>;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("could not acquire a diff: {0}")]
    DiffUnavailable(String),

    #[error("no provider available: {0}")]
    NoProvider(String),
}
