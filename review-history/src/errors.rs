//! Crate-wide error hierarchy for `review-history`.

use thiserror::Error;

pub type HistoryResult<T> = Result<T, HistoryError>;

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("disallowed column name: {0}")]
    DisallowedColumn(String),

    #[error("background task panicked: {0}")]
    Join(#[from] tokio::task::JoinError),
}
