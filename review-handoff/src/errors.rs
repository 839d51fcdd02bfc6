use thiserror::Error;

pub type HandoffResult<T> = Result<T, HandoffError>;

#[derive(Debug, Error)]
pub enum HandoffError {
    #[error("could not serialise handoff status: {0}")]
    Serde(#[from] serde_json::Error),
}
