//! Per-provider token bucket (C10) and the retry wrapper layered around
//! each provider call.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::Rng;
use tokio::sync::Mutex;
use tracing::warn;

use crate::errors::{LlmError, LlmResult, ProviderError};

/// Bounds calls to `rate` per second. Calls that would exceed it block
/// until a token refills or the caller's cancel flag is set.
pub struct TokenBucket {
    capacity: f64,
    rate_per_sec: f64,
    state: Mutex<(f64, Instant)>,
}

impl TokenBucket {
    pub fn new(rate_per_sec: f32) -> Self {
        let rate = rate_per_sec.max(0.01) as f64;
        Self {
            capacity: rate.max(1.0),
            rate_per_sec: rate,
            state: Mutex::new((rate.max(1.0), Instant::now())),
        }
    }

    /// Waits until a token is available, or returns [`LlmError::Cancelled`]
    /// once `cancel` is observed set.
    pub async fn acquire(&self, cancel: &AtomicBool) -> LlmResult<()> {
        loop {
            {
                let mut state = self.state.lock().await;
                let (tokens, last_refill) = &mut *state;
                let elapsed = last_refill.elapsed().as_secs_f64();
                *tokens = (*tokens + elapsed * self.rate_per_sec).min(self.capacity);
                *last_refill = Instant::now();
                if *tokens >= 1.0 {
                    *tokens -= 1.0;
                    return Ok(());
                }
            }
            if cancel.load(Ordering::SeqCst) {
                return Err(LlmError::Cancelled);
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }
}

/// Up to 3 attempts, exponential backoff 1s/2s/4s plus small random jitter,
/// retrying only on timeout, rate-limit, and 5xx. Non-retryable errors
/// propagate immediately (§4.10).
pub async fn with_retry<F, Fut, T>(mut call: F) -> Result<T, ProviderError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ProviderError>>,
{
    const MAX_ATTEMPTS: u32 = 3;
    let mut last_err = None;
    for attempt in 0..MAX_ATTEMPTS {
        match call().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if !err.is_retryable() || attempt + 1 == MAX_ATTEMPTS {
                    return Err(err);
                }
                let backoff = Duration::from_secs(1 << attempt);
                let jitter = Duration::from_millis(rand::thread_rng().gen_range(0..250));
                warn!(attempt, error = %err, "review-llm: retrying after backoff");
                last_err = Some(err);
                tokio::time::sleep(backoff + jitter).await;
            }
        }
    }
    Err(last_err.expect("loop always executes at least once"))
}

pub fn shared_bucket(rate_per_sec: f32) -> Arc<TokenBucket> {
    Arc::new(TokenBucket::new(rate_per_sec))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;

    #[tokio::test]
    async fn retries_on_retryable_error_and_eventually_succeeds() {
        let attempts = AtomicU32::new(0);
        let result = with_retry(|| {
            let n = attempts.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 1 {
                    Err(ProviderError::Timeout)
                } else {
                    Ok(42)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn non_retryable_error_propagates_immediately() {
        let attempts = AtomicU32::new(0);
        let result: Result<(), ProviderError> = with_retry(|| {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Err(ProviderError::MissingCredential("API_KEY")) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn token_bucket_blocks_until_refill() {
        let bucket = TokenBucket::new(1000.0);
        let cancel = AtomicBool::new(false);
        bucket.acquire(&cancel).await.unwrap();
        bucket.acquire(&cancel).await.unwrap();
    }

    #[tokio::test]
    async fn token_bucket_respects_cancellation() {
        let bucket = TokenBucket::new(0.01);
        let cancel = AtomicBool::new(false);
        bucket.acquire(&cancel).await.unwrap();
        cancel.store(true, Ordering::SeqCst);
        let result = bucket.acquire(&cancel).await;
        assert!(matches!(result, Err(LlmError::Cancelled)));
    }
}
