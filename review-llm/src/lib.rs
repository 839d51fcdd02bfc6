//! Uniform LLM provider contract.
//!
//! [`providers::Provider`] is an enum-dispatch contract over heterogeneous
//! backends (local, no-API-key; remote, API-key-required). [`prompt`]
//! composes personality/mode text blocks into a single request body.
//! [`ratelimit`] bounds and retries individual calls; [`fallback::FallbackDispatcher`]
//! holds an ordered list of providers and fails over between them.

mod config;
mod contract;
mod errors;
mod fallback;
mod prompt;
mod providers;
mod ratelimit;

pub use config::ProviderConfig;
pub use contract::{
    compute_issue_id, parse_review_response, Issue, IssueType, Location, ReviewRequest, ReviewResponse,
    RootCause, Severity,
};
pub use errors::{ConfigError, ConfigResult, LlmError, LlmResult, ProviderError};
pub use fallback::{auto_detect, FallbackDispatcher};
pub use prompt::{build_prompt, Mode, Personality};
pub use providers::{HealthStatus, LocalProvider, Provider, RemoteProvider};
pub use ratelimit::{shared_bucket, with_retry, TokenBucket};
