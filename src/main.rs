//! Thin wiring binary: loads provider configuration from the environment,
//! constructs the cache/history/provider stack, runs the review engine
//! once against the local checkout, persists the findings, and prints the
//! handoff block for the next round.
//!
//! CLI parsing, config-file loading, and exit-code mapping are explicitly
//! out of scope for the core (§1) — this binary is the minimal front-end
//! that exercises it end to end, not the CLI surface itself.

mod gitsource;

use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use chrono::Utc;
use review_cache::ContentCache;
use review_engine::{acquire, apply_filters, run, IgnoreSet, ReviewMode, RunConfig};
use review_handoff::{build_handoff_status, generate_handoff_block, parse_existing_status, CurrentRun, InactivityThresholds};
use review_history::{HistoryStore, IssueRecord, IssueType as HistoryIssueType, Severity as HistorySeverity};
use review_llm::{auto_detect, FallbackDispatcher, Provider, ProviderConfig, ReviewResponse};
use review_memory::{LongTermMemory, MemoryEntry};
use tracing::{info, warn};

use crate::gitsource::GitDiffSource;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables from .env file, if present.
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::from_default_env()).init();

    let dispatcher = Arc::new(build_dispatcher().await?);
    let cache = Arc::new(build_cache().await);
    let history = HistoryStore::open(history_path()).await?;

    let repo_path = std::env::var("REVIEW_GIT_REPO_PATH").unwrap_or_else(|_| ".".to_string());
    let source = GitDiffSource::open(PathBuf::from(repo_path));
    let mode = review_mode_from_env();

    let changes = acquire(&source, &mode).await?;
    let ignores = IgnoreSet::new(&ignore_patterns_from_env())?;
    let (filtered, skipped) = apply_filters(changes, &ignores);
    info!(files = filtered.files.len(), skipped, "revcore: diff acquired and filtered");

    if filtered.files.is_empty() {
        println!("No changes found to review.");
        return Ok(());
    }

    let cancel = Arc::new(AtomicBool::new(false));
    let result = run(filtered, dispatcher, cache, RunConfig::default(), cancel).await;

    let records = issue_records(&result);
    if !records.is_empty() {
        if let Err(e) = history.store_batch(records).await {
            warn!(error = %e, "revcore: failed to persist issue history");
        }
    }

    if let Err(e) = write_memory(&result) {
        warn!(error = %e, "revcore: failed to write review findings to long-term memory");
    }

    let previous_status = previous_status_path()
        .and_then(|path| std::fs::read_to_string(path).ok())
        .and_then(|text| parse_existing_status(&text));

    let clean_files: Vec<String> = result
        .reviews
        .iter()
        .filter(|r| r.response.issues.is_empty())
        .map(|r| r.path.clone())
        .collect();
    let all_issues = result.reviews.iter().flat_map(|r| r.response.issues.clone()).collect();
    let average_score = if result.reviews.is_empty() {
        70
    } else {
        (result.reviews.iter().map(|r| r.response.score as u32).sum::<u32>() / result.reviews.len() as u32) as u8
    };
    let current = CurrentRun { score: average_score, issues: all_issues, clean_files };
    let status = build_handoff_status(&current, previous_status.as_ref(), Utc::now());
    let block = generate_handoff_block(&status, Utc::now(), InactivityThresholds::default());

    println!("{block}");
    println!(
        "total issues: {}, critical: {}, cache hits: {}, errors: {}, duration: {:?}",
        result.total_issues,
        result.critical_count,
        result.cache_hits,
        result.errors.len(),
        result.duration
    );

    Ok(())
}

async fn build_dispatcher() -> Result<FallbackDispatcher, Box<dyn std::error::Error>> {
    let local_cfg = ProviderConfig::from_env("LOCAL_PROVIDER", "ollama", false).ok();
    let remote_cfg = ProviderConfig::from_env("REMOTE_PROVIDER", "openai", true).ok();

    let local = local_cfg.map(Provider::local).transpose()?;
    let remotes: Vec<Provider> = remote_cfg.map(Provider::remote).transpose()?.into_iter().collect();

    if local.is_none() && remotes.is_empty() {
        return Err("no provider configured: set LOCAL_PROVIDER_MODEL/LOCAL_PROVIDER_ENDPOINT or REMOTE_PROVIDER_MODEL/REMOTE_PROVIDER_ENDPOINT/REMOTE_PROVIDER_API_KEY".into());
    }

    Ok(auto_detect(local, remotes).await)
}

async fn build_cache() -> ContentCache<ReviewResponse> {
    let dir = std::env::var("REVIEW_CACHE_DIR").unwrap_or_else(|_| ".revcore/cache".to_string());
    let max_size_mb: u64 = std::env::var("REVIEW_CACHE_MAX_SIZE_MB").ok().and_then(|v| v.parse().ok()).unwrap_or(500);
    let max_entries: usize = std::env::var("REVIEW_CACHE_MAX_ENTRIES").ok().and_then(|v| v.parse().ok()).unwrap_or(10_000);
    ContentCache::on_disk(dir, max_size_mb * 1_000_000, max_entries).await
}

/// Turns this round's per-file summaries into memory entries and promotes
/// the significant ones into long-term storage (§2 "aggregate → History
/// Store + Memory writes"). Entry strength tracks how issue-heavy the file
/// was, so a clean file never survives [`LongTermMemory::consolidate`]'s
/// ≥0.5 threshold while a file full of findings does.
fn write_memory(result: &review_engine::RunResult) -> Result<(), Box<dyn std::error::Error>> {
    let memory = LongTermMemory::open(memory_path())?;
    let candidates: Vec<MemoryEntry> = result
        .reviews
        .iter()
        .filter(|r| !r.response.issues.is_empty())
        .map(|r| {
            let strength = (r.response.issues.len() as f32 / 5.0).clamp(0.2, 1.0);
            MemoryEntry::new(format!("review:{}", r.path), r.response.summary.clone(), "review")
                .with_embedding(review_embedder::embed(&r.response.summary))
                .with_tags(vec![r.path.clone()])
                .with_strength(strength)
        })
        .collect();
    let stored = memory.consolidate(&candidates)?;
    info!(candidates = candidates.len(), stored, "revcore: consolidated findings into long-term memory");
    Ok(())
}

fn memory_path() -> PathBuf {
    PathBuf::from(std::env::var("REVIEW_MEMORY_DIR").unwrap_or_else(|_| ".revcore/memory".to_string()))
}

fn history_path() -> PathBuf {
    PathBuf::from(std::env::var("REVIEW_HISTORY_DB").unwrap_or_else(|_| ".revcore/history.sqlite3".to_string()))
}

fn previous_status_path() -> Option<PathBuf> {
    std::env::var("REVIEW_HANDOFF_FILE").ok().map(PathBuf::from)
}

fn ignore_patterns_from_env() -> Vec<String> {
    std::env::var("REVIEW_IGNORE_PATTERNS")
        .ok()
        .map(|v| v.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect())
        .unwrap_or_default()
}

fn review_mode_from_env() -> ReviewMode {
    match std::env::var("REVIEW_MODE").as_deref() {
        Ok("commit") => ReviewMode::Commit(std::env::var("REVIEW_COMMIT_SHA").unwrap_or_default()),
        Ok("branch") => ReviewMode::Branch(std::env::var("REVIEW_BASE_BRANCH").unwrap_or_else(|_| "main".to_string())),
        Ok("files") => ReviewMode::Files(
            std::env::var("REVIEW_FILES")
                .unwrap_or_default()
                .split(',')
                .map(PathBuf::from)
                .collect(),
        ),
        _ => ReviewMode::Staged,
    }
}

fn issue_records(result: &review_engine::RunResult) -> Vec<IssueRecord> {
    let commit_hash = std::env::var("REVIEW_COMMIT_HASH").unwrap_or_else(|_| "HEAD".to_string());
    let author = std::env::var("REVIEW_AUTHOR").unwrap_or_else(|_| "unknown".to_string());
    let branch = std::env::var("REVIEW_BASE_BRANCH").unwrap_or_else(|_| "main".to_string());
    let now = Utc::now();

    result
        .reviews
        .iter()
        .flat_map(|review| review.response.issues.iter())
        .map(|issue| IssueRecord {
            id: None,
            commit_hash: commit_hash.clone(),
            file_path: issue.location.file.clone(),
            issue_type: convert_issue_type(issue.issue_type),
            severity: convert_severity(issue.severity),
            message: issue.message.clone(),
            suggestion: issue.suggestion.clone(),
            line: issue.location.line,
            author: author.clone(),
            branch: branch.clone(),
            created_at: now,
            resolved: false,
            resolved_at: None,
            review_round: 1,
        })
        .collect()
}

fn convert_issue_type(t: review_llm::IssueType) -> HistoryIssueType {
    match t {
        review_llm::IssueType::Bug => HistoryIssueType::Bug,
        review_llm::IssueType::Security => HistoryIssueType::Security,
        review_llm::IssueType::Performance => HistoryIssueType::Performance,
        review_llm::IssueType::Style => HistoryIssueType::Style,
        review_llm::IssueType::Maintenance => HistoryIssueType::Maintenance,
        review_llm::IssueType::BestPractice => HistoryIssueType::BestPractice,
    }
}

fn convert_severity(s: review_llm::Severity) -> HistorySeverity {
    match s {
        review_llm::Severity::Info => HistorySeverity::Info,
        review_llm::Severity::Warning => HistorySeverity::Warning,
        review_llm::Severity::Error => HistorySeverity::Error,
        review_llm::Severity::Critical => HistorySeverity::Critical,
    }
}
