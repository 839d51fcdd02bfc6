//! Bounded-concurrency fan-out over a filtered [`ChangeSet`] (§5/§7):
//! one cache lookup, provider dispatch on miss, cache store on success,
//! all isolated so a single file's failure never aborts the run.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, Semaphore};
use tracing::{info, instrument, warn};

use review_cache::{compute_key, CacheKeyInput, ContentCache};
use review_llm::{FallbackDispatcher, Mode, Personality, ReviewRequest, ReviewResponse};

use crate::diff::{ChangeSet, FileDiff};

/// Concurrency cap: twice the CPU count, clamped to `[1, 10]` unless the
/// caller supplies an explicit override.
pub fn default_concurrency() -> usize {
    (num_cpus::get() * 2).clamp(1, 10)
}

#[derive(Debug, Clone)]
pub struct RunConfig {
    pub concurrency: Option<usize>,
    pub modes: Vec<Mode>,
    pub personality: Personality,
    pub rule_set_identity: String,
    pub tool_version: String,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            concurrency: None,
            modes: vec![Mode::Clean],
            personality: Personality::Balanced,
            rule_set_identity: "default".to_string(),
            tool_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

impl RunConfig {
    fn resolved_concurrency(&self) -> usize {
        self.concurrency.unwrap_or_else(default_concurrency)
    }
}

/// One file's failure to review, captured rather than propagated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileError {
    pub path: String,
    pub language_tag: String,
    pub diff_size_bytes: usize,
    pub message: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileReview {
    pub path: String,
    pub response: ReviewResponse,
    pub from_cache: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    pub reviews: Vec<FileReview>,
    pub errors: Vec<FileError>,
    pub files_skipped: usize,
    pub cache_hits: usize,
    pub total_issues: usize,
    pub critical_count: usize,
    pub duration: Duration,
    pub was_cancelled: bool,
}

impl RunResult {
    fn empty() -> Self {
        Self {
            reviews: Vec::new(),
            errors: Vec::new(),
            files_skipped: 0,
            cache_hits: 0,
            total_issues: 0,
            critical_count: 0,
            duration: Duration::ZERO,
            was_cancelled: false,
        }
    }
}

enum Outcome {
    Review(FileReview),
    Error(FileError),
}

/// Runs every file in `changes` through cache-then-provider dispatch,
/// bounded by `config`'s concurrency, stopping new dispatches once
/// `cancel` is observed set but still draining in-flight work so the
/// result reflects whatever completed.
#[instrument(skip_all, fields(files = changes.files.len()))]
pub async fn run(
    changes: ChangeSet,
    dispatcher: Arc<FallbackDispatcher>,
    cache: Arc<ContentCache<ReviewResponse>>,
    config: RunConfig,
    cancel: Arc<AtomicBool>,
) -> RunResult {
    let started = Instant::now();
    if changes.files.is_empty() {
        let mut result = RunResult::empty();
        result.duration = started.elapsed();
        return result;
    }

    let semaphore = Arc::new(Semaphore::new(config.resolved_concurrency()));
    let (tx, mut rx) = mpsc::channel::<Outcome>(changes.files.len().max(1));
    let modes = Arc::new(config.modes.clone());
    let personality = config.personality;
    let rule_set_identity = Arc::new(config.rule_set_identity.clone());
    let tool_version = Arc::new(config.tool_version.clone());

    for file in changes.files {
        if cancel.load(std::sync::atomic::Ordering::Relaxed) {
            break;
        }
        let semaphore = Arc::clone(&semaphore);
        let dispatcher = Arc::clone(&dispatcher);
        let cache = Arc::clone(&cache);
        let tx = tx.clone();
        let modes = Arc::clone(&modes);
        let rule_set_identity = Arc::clone(&rule_set_identity);
        let tool_version = Arc::clone(&tool_version);
        let cancel = Arc::clone(&cancel);

        tokio::spawn(async move {
            let Ok(_permit) = semaphore.acquire_owned().await else {
                return;
            };
            let outcome = review_one(
                &file,
                &dispatcher,
                &cache,
                &modes,
                personality,
                &rule_set_identity,
                &tool_version,
                &cancel,
            )
            .await;
            let _ = tx.send(outcome).await;
        });
    }
    drop(tx);

    let mut result = RunResult::empty();
    while let Some(outcome) = rx.recv().await {
        match outcome {
            Outcome::Review(review) => {
                result.total_issues += review.response.issues.len();
                result.critical_count += review.response.critical_count();
                if review.from_cache {
                    result.cache_hits += 1;
                }
                result.reviews.push(review);
            }
            Outcome::Error(err) => result.errors.push(err),
        }
    }

    result.was_cancelled = cancel.load(std::sync::atomic::Ordering::Relaxed);
    result.duration = started.elapsed();
    info!(
        reviewed = result.reviews.len(),
        errors = result.errors.len(),
        cache_hits = result.cache_hits,
        cancelled = result.was_cancelled,
        "review-engine: run complete"
    );
    result
}

#[allow(clippy::too_many_arguments)]
async fn review_one(
    file: &FileDiff,
    dispatcher: &FallbackDispatcher,
    cache: &ContentCache<ReviewResponse>,
    modes: &[Mode],
    personality: Personality,
    rule_set_identity: &str,
    tool_version: &str,
    cancel: &AtomicBool,
) -> Outcome {
    let diff_text = file.render_unified();
    let key = compute_key(&CacheKeyInput {
        diff_text: &diff_text,
        language_tag: &file.language_tag,
        file_path: &file.path,
        rule_set_identity,
        tool_version,
    });

    let (cached, hit) = cache.get(&key).await;
    if hit {
        if let Some(response) = cached {
            return Outcome::Review(FileReview {
                path: file.path.clone(),
                response,
                from_cache: true,
            });
        }
    }

    let request = ReviewRequest {
        diff_text: diff_text.clone(),
        language_tag: file.language_tag.clone(),
        file_path: file.path.clone(),
        modes: modes.to_vec(),
        personality,
        extra_context: None,
    };

    match dispatcher.review(&request, cancel).await {
        Ok(response) => {
            cache.set(key, response.clone(), diff_text.len()).await;
            Outcome::Review(FileReview {
                path: file.path.clone(),
                response,
                from_cache: false,
            })
        }
        Err(e) => {
            warn!(path = %file.path, error = %e, "review-engine: file review failed");
            Outcome::Error(FileError {
                path: file.path.clone(),
                language_tag: file.language_tag.clone(),
                diff_size_bytes: file.diff_size_bytes(),
                message: e.to_string(),
                occurred_at: Utc::now(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_concurrency_is_clamped() {
        let c = default_concurrency();
        assert!(c >= 1 && c <= 10);
    }

    #[tokio::test]
    async fn empty_changeset_returns_empty_result_immediately() {
        let dispatcher = Arc::new(FallbackDispatcher::new(Vec::new()));
        let cache: Arc<ContentCache<ReviewResponse>> = Arc::new(ContentCache::in_memory(4, None));
        let result = run(
            ChangeSet::default(),
            dispatcher,
            cache,
            RunConfig::default(),
            Arc::new(AtomicBool::new(false)),
        )
        .await;
        assert!(result.reviews.is_empty());
        assert!(result.errors.is_empty());
    }
}
