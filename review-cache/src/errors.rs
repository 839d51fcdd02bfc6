//! Crate-wide error hierarchy for `review-cache`.
//!
//! Cache errors are never meant to reach a caller of [`crate::ContentCache`] —
//! they are logged and absorbed internally so the component "fails open"
//! (a storage error degrades to a miss, not a propagated error). This type
//! exists so internal plumbing has a `?`-ergonomic `Result` to work with.

use thiserror::Error;

/// Convenient alias for crate-internal results.
pub type CacheResult<T> = Result<T, CacheError>;

/// Storage-layer failures for the on-disk cache backend.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),
}
