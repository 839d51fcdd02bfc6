//! Environment-driven provider configuration.

use std::time::Duration;

use crate::errors::{ConfigError, ConfigResult};

fn must_env(name: &'static str) -> ConfigResult<String> {
    match std::env::var(name) {
        Ok(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(ConfigError::MissingVar(name)),
    }
}

fn env_opt(name: &'static str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn env_opt_u32(name: &'static str) -> ConfigResult<Option<u32>> {
    match env_opt(name) {
        Some(v) => v.parse().map(Some).map_err(|_| ConfigError::InvalidNumber {
            var: name,
            reason: "expected u32",
        }),
        None => Ok(None),
    }
}

fn env_opt_f32(name: &'static str) -> ConfigResult<Option<f32>> {
    match env_opt(name) {
        Some(v) => v.parse().map(Some).map_err(|_| ConfigError::InvalidNumber {
            var: name,
            reason: "expected f32",
        }),
        None => Ok(None),
    }
}

fn validate_http_endpoint(var: &'static str, value: &str) -> ConfigResult<()> {
    if value.starts_with("http://") || value.starts_with("https://") {
        Ok(())
    } else {
        Err(ConfigError::InvalidFormat {
            var,
            reason: "must start with http:// or https://",
        })
    }
}

/// Configuration shared by every concrete provider.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub name: String,
    pub model: String,
    pub base_url: String,
    pub api_key: Option<String>,
    pub timeout: Duration,
    pub max_tokens: u32,
    pub temperature: f32,
    /// Requests per second allowed by the rate limiter.
    pub rate_limit: f32,
}

impl ProviderConfig {
    /// Reads a provider's settings from `{PREFIX}_MODEL`, `{PREFIX}_ENDPOINT`,
    /// etc. `api_key_required` controls whether a missing
    /// `{PREFIX}_API_KEY` is fatal (remote providers) or tolerated (local).
    pub fn from_env(prefix: &'static str, name: &str, api_key_required: bool) -> ConfigResult<Self> {
        let model_var = Box::leak(format!("{prefix}_MODEL").into_boxed_str());
        let endpoint_var = Box::leak(format!("{prefix}_ENDPOINT").into_boxed_str());
        let api_key_var = Box::leak(format!("{prefix}_API_KEY").into_boxed_str());
        let timeout_var = Box::leak(format!("{prefix}_TIMEOUT_SECS").into_boxed_str());
        let max_tokens_var = Box::leak(format!("{prefix}_MAX_TOKENS").into_boxed_str());
        let temperature_var = Box::leak(format!("{prefix}_TEMPERATURE").into_boxed_str());
        let rate_limit_var = Box::leak(format!("{prefix}_RATE_LIMIT").into_boxed_str());

        let model = must_env(model_var)?;
        let base_url = must_env(endpoint_var)?;
        validate_http_endpoint(endpoint_var, &base_url)?;

        let api_key = env_opt(api_key_var);
        if api_key_required && api_key.is_none() {
            return Err(ConfigError::MissingVar(api_key_var));
        }

        let timeout = Duration::from_secs(env_opt_u32(timeout_var)?.unwrap_or(60) as u64);
        let max_tokens = env_opt_u32(max_tokens_var)?.unwrap_or(1024);
        let temperature = env_opt_f32(temperature_var)?.unwrap_or(0.2);
        let rate_limit = env_opt_f32(rate_limit_var)?.unwrap_or(2.0);

        Ok(Self {
            name: name.to_string(),
            model,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            timeout,
            max_tokens,
            temperature,
            rate_limit,
        })
    }
}
