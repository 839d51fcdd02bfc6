//! Provider-facing request/response shapes and the review JSON contract.
//!
//! These types are the common currency between providers and the engine
//! that dispatches to them — defined here because every provider must
//! produce (and gracefully degrade into) exactly this shape.

use serde::{Deserialize, Serialize};

use crate::prompt::{Mode, Personality};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IssueType {
    Bug,
    Security,
    Performance,
    Style,
    Maintenance,
    BestPractice,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Location {
    pub file: String,
    pub line: u32,
    pub end_line: Option<u32>,
    pub column: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RootCause {
    pub origin: Location,
    /// Ordered `file:line` propagation path from origin to symptom.
    pub propagation_path: Vec<String>,
    pub recommendation: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Issue {
    /// Deterministic 32-bit hash of `file:line:message[0..100]` (§3).
    pub id: u32,
    pub issue_type: IssueType,
    pub severity: Severity,
    pub message: String,
    pub suggestion: Option<String>,
    pub location: Location,
    pub rule_id: Option<String>,
    pub suggested_fix: Option<String>,
    pub root_cause: Option<RootCause>,
}

/// Computes the deterministic issue id: `H(file:line:message[0..100])`.
/// Stable across runs and across provider/model changes, so round-over-round
/// diffing never depends on a backend-assigned id.
pub fn compute_issue_id(file: &str, line: u32, message: &str) -> u32 {
    let clipped = clip_to_byte_boundary(message, 100);
    let key = format!("{file}:{line}:{clipped}");
    fnv1a_32(key.as_bytes())
}

fn clip_to_byte_boundary(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

fn fnv1a_32(bytes: &[u8]) -> u32 {
    let mut hash: u32 = 0x811c_9dc5;
    for &b in bytes {
        hash ^= b as u32;
        hash = hash.wrapping_mul(0x0100_0193);
    }
    hash
}

/// Immutable once built: tuple of (diff, language, path, modes, personality,
/// extra context), one per (file, round).
#[derive(Debug, Clone)]
pub struct ReviewRequest {
    pub diff_text: String,
    pub language_tag: String,
    pub file_path: String,
    pub modes: Vec<Mode>,
    pub personality: Personality,
    pub extra_context: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewResponse {
    pub issues: Vec<Issue>,
    /// `[0, 100]`. Never invented by the engine — it's the provider's score,
    /// or 70 on parse failure / when the provider omits it.
    pub score: u8,
    pub summary: String,
    pub tokens_used: u32,
    pub processing_time_ms: u64,
}

impl ReviewResponse {
    pub fn critical_count(&self) -> usize {
        self.issues.iter().filter(|i| i.severity == Severity::Critical).count()
    }
}

/// Raw shape a provider's JSON payload is expected to carry before issue
/// ids are computed and attached.
#[derive(Debug, Deserialize)]
struct RawReviewJson {
    issues: Vec<RawIssueJson>,
    summary: Option<String>,
    score: Option<u8>,
}

#[derive(Debug, Deserialize)]
struct RawIssueJson {
    #[serde(rename = "type")]
    issue_type: IssueType,
    severity: Severity,
    message: String,
    suggestion: Option<String>,
    line: u32,
    end_line: Option<u32>,
    column: Option<u32>,
    rule_id: Option<String>,
    suggested_fix: Option<String>,
    root_cause: Option<RootCause>,
}

/// Parses a provider's raw text into a [`ReviewResponse`], attaching
/// deterministic issue ids. On any parse failure, degrades gracefully to an
/// empty-issues response carrying the raw text as summary and score 70
/// (§4.8) rather than propagating an error.
pub fn parse_review_response(
    file_path: &str,
    raw_text: &str,
    tokens_used: u32,
    processing_time_ms: u64,
) -> ReviewResponse {
    match serde_json::from_str::<RawReviewJson>(raw_text) {
        Ok(parsed) => {
            let issues = parsed
                .issues
                .into_iter()
                .map(|raw| Issue {
                    id: compute_issue_id(file_path, raw.line, &raw.message),
                    issue_type: raw.issue_type,
                    severity: raw.severity,
                    message: raw.message,
                    suggestion: raw.suggestion,
                    location: Location {
                        file: file_path.to_string(),
                        line: raw.line,
                        end_line: raw.end_line,
                        column: raw.column,
                    },
                    rule_id: raw.rule_id,
                    suggested_fix: raw.suggested_fix,
                    root_cause: raw.root_cause,
                })
                .collect();
            ReviewResponse {
                issues,
                score: parsed.score.unwrap_or(70),
                summary: parsed.summary.unwrap_or_default(),
                tokens_used,
                processing_time_ms,
            }
        }
        Err(_) => ReviewResponse {
            issues: Vec::new(),
            score: 70,
            summary: raw_text.to_string(),
            tokens_used,
            processing_time_ms,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_inputs_produce_same_issue_id() {
        let a = compute_issue_id("src/a.go", 12, "SQL injection");
        let b = compute_issue_id("src/a.go", 12, "SQL injection");
        assert_eq!(a, b);
    }

    #[test]
    fn different_line_produces_different_id() {
        let a = compute_issue_id("src/a.go", 12, "SQL injection");
        let b = compute_issue_id("src/a.go", 13, "SQL injection");
        assert_ne!(a, b);
    }

    #[test]
    fn clip_to_byte_boundary_never_splits_a_char() {
        let s = "a".repeat(99) + "\u{1F980}\u{1F980}";
        let clipped = clip_to_byte_boundary(&s, 100);
        assert!(std::str::from_utf8(clipped.as_bytes()).is_ok());
    }

    #[test]
    fn well_formed_json_parses_into_issues_with_ids() {
        let raw = r#"{"issues":[{"type":"security","severity":"critical","message":"SQL injection","line":12}],"summary":"found one issue","score":40}"#;
        let resp = parse_review_response("src/a.go", raw, 120, 50);
        assert_eq!(resp.issues.len(), 1);
        assert_eq!(resp.score, 40);
        assert_eq!(resp.issues[0].id, compute_issue_id("src/a.go", 12, "SQL injection"));
    }

    #[test]
    fn malformed_json_degrades_to_empty_issues_and_score_70() {
        let resp = parse_review_response("src/a.go", "not json", 10, 5);
        assert!(resp.issues.is_empty());
        assert_eq!(resp.score, 70);
        assert_eq!(resp.summary, "not json");
    }
}
