//! Crate-wide error hierarchy for `review-llm`.

use reqwest::StatusCode;
use thiserror::Error;

pub type LlmResult<T> = Result<T, LlmError>;
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Transport-level failure from a concrete provider's HTTP call.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("request timed out")]
    Timeout,

    #[error("rate limited (retry after {retry_after_secs:?}s)")]
    RateLimited { retry_after_secs: Option<u64> },

    #[error("server error: {0}")]
    Server(StatusCode),

    #[error("unexpected http status {status}: {snippet}")]
    HttpStatus { status: StatusCode, snippet: String },

    #[error("network error: {0}")]
    Network(String),

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("failed to decode response: {0}")]
    Decode(String),

    #[error("missing credential for remote provider {0}")]
    MissingCredential(&'static str),
}

impl ProviderError {
    /// Only these kinds are worth retrying (§4.10): timeout, rate-limit,
    /// and 5xx responses.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Timeout | Self::RateLimited { .. } | Self::Server(_)
        )
    }

    pub fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return Self::Timeout;
        }
        if let Some(status) = err.status() {
            if status.is_server_error() {
                return Self::Server(status);
            }
            if status == StatusCode::TOO_MANY_REQUESTS {
                return Self::RateLimited {
                    retry_after_secs: None,
                };
            }
        }
        if err.is_connect() {
            return Self::Network(err.to_string());
        }
        Self::Transport(err)
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("[review-llm] missing required environment variable: {0}")]
    MissingVar(&'static str),

    #[error("[review-llm] invalid number in {var}: {reason}")]
    InvalidNumber { var: &'static str, reason: &'static str },

    #[error("[review-llm] invalid format in {var}: {reason}")]
    InvalidFormat { var: &'static str, reason: &'static str },

    #[error("[review-llm] unsupported provider kind: {0}")]
    UnsupportedProvider(String),
}

#[derive(Debug, Error)]
pub enum LlmError {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("no provider succeeded: {0}")]
    AllProvidersFailed(String),

    #[error("rate limiter cancelled")]
    Cancelled,
}
