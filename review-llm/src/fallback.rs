//! Ordered provider list with failover (C11).

use std::sync::atomic::AtomicBool;
use std::sync::Mutex;

use tracing::{info, warn};

use crate::config::ProviderConfig;
use crate::contract::{ReviewRequest, ReviewResponse};
use crate::errors::{LlmError, LlmResult};
use crate::providers::{HealthStatus, Provider};
use crate::ratelimit::{with_retry, TokenBucket};

struct Slot {
    provider: Provider,
    bucket: TokenBucket,
}

/// Holds an ordered list of providers and prefers whichever last succeeded
/// within the current run, falling back to the next candidate on failure.
pub struct FallbackDispatcher {
    slots: Vec<Slot>,
    sticky: Mutex<Option<usize>>,
}

impl FallbackDispatcher {
    pub fn new(providers: Vec<Provider>) -> Self {
        let slots = providers
            .into_iter()
            .map(|provider| {
                let rate = 2.0; // refined per-provider below via `with_configs`
                Slot {
                    provider,
                    bucket: TokenBucket::new(rate),
                }
            })
            .collect();
        Self {
            slots,
            sticky: Mutex::new(None),
        }
    }

    pub fn with_configs(providers: Vec<(Provider, &ProviderConfig)>) -> Self {
        let slots = providers
            .into_iter()
            .map(|(provider, cfg)| Slot {
                provider,
                bucket: TokenBucket::new(cfg.rate_limit),
            })
            .collect();
        Self {
            slots,
            sticky: Mutex::new(None),
        }
    }

    fn start_index(&self) -> usize {
        self.sticky.lock().unwrap().unwrap_or(0)
    }

    /// Tries providers from the sticky index forward; the first success
    /// updates the sticky index for subsequent calls in this run.
    pub async fn review(&self, request: &ReviewRequest, cancel: &AtomicBool) -> LlmResult<ReviewResponse> {
        let start = self.start_index();
        let mut last_err = None;
        for (offset, slot) in self.slots.iter().enumerate().skip(start) {
            slot.bucket.acquire(cancel).await?;
            let result = with_retry(|| async { slot.provider.review(request).await.map_err(|e| e.into_provider()) }).await;
            match result {
                Ok(response) => {
                    *self.sticky.lock().unwrap() = Some(offset);
                    return Ok(response);
                }
                Err(e) => {
                    warn!(provider = slot.provider.name(), error = %e, "review-llm: provider failed, trying next");
                    last_err = Some(e);
                }
            }
        }
        Err(LlmError::AllProvidersFailed(
            last_err.map(|e| e.to_string()).unwrap_or_else(|| "no providers configured".to_string()),
        ))
    }

    /// Queries every provider's health, in order.
    pub async fn health_check_all(&self) -> Vec<HealthStatus> {
        let mut out = Vec::with_capacity(self.slots.len());
        for slot in &self.slots {
            out.push(slot.provider.health_check().await);
        }
        out
    }

    pub fn provider_names(&self) -> Vec<&str> {
        self.slots.iter().map(|s| s.provider.name()).collect()
    }
}

/// Builds a default ordering at startup: the local provider first if its
/// health check succeeds, otherwise the first remote provider with a
/// credential configured.
pub async fn auto_detect(local: Option<Provider>, remotes: Vec<Provider>) -> FallbackDispatcher {
    let mut ordered = Vec::new();
    if let Some(local) = local {
        let health = local.health_check().await;
        if health.ok {
            info!(provider = local.name(), "review-llm: local provider reachable, preferring it");
            ordered.push(local);
            ordered.extend(remotes);
            return FallbackDispatcher::new(ordered);
        }
        warn!(provider = local.name(), "review-llm: local provider unreachable at startup, deprioritising");
        ordered.extend(remotes);
        ordered.push(local);
        return FallbackDispatcher::new(ordered);
    }
    FallbackDispatcher::new(remotes)
}

trait IntoProviderError {
    fn into_provider(self) -> crate::errors::ProviderError;
}

impl IntoProviderError for LlmError {
    fn into_provider(self) -> crate::errors::ProviderError {
        match self {
            LlmError::Provider(e) => e,
            other => crate::errors::ProviderError::Decode(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_dispatcher_starts_at_index_zero() {
        let dispatcher = FallbackDispatcher::new(Vec::new());
        assert_eq!(dispatcher.start_index(), 0);
    }
}
