//! Renders a [`ReviewStatus`] into the markdown block embedded in review
//! commentary, and recovers it back out on the next round.
//!
//! The opaque marker reuses a familiar comment-marker convention for
//! round-trip idempotency markers: a single HTML comment line carrying
//! base64-encoded JSON, invisible when the host substrate renders the
//! commentary.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{DateTime, Utc};
use regex::Regex;

use crate::status::ReviewStatus;

const MARKER_PREFIX: &str = "<!-- revcore:status=";
const MARKER_SUFFIX: &str = " -->";

/// Inactivity thresholds in hours, configurable per §4.13 / config surface.
#[derive(Debug, Clone, Copy)]
pub struct InactivityThresholds {
    pub warning_hours: i64,
    pub critical_hours: i64,
}

impl Default for InactivityThresholds {
    fn default() -> Self {
        Self { warning_hours: 48, critical_hours: 72 }
    }
}

fn severity_emoji(critical: u32, total: u32) -> &'static str {
    if critical > 0 {
        "\u{1F6A8}" // rotating light
    } else if total > 0 {
        "\u{26A0}\u{FE0F}" // warning sign
    } else {
        "\u{2705}" // check mark
    }
}

/// Renders the human-facing handoff block: a status line, a progress
/// section once `round > 1`, a critical warning when warranted, an
/// inactivity message when stale, a collapsible approved-files list, and
/// the opaque marker carrying the full status for the next round.
pub fn generate_handoff_block(status: &ReviewStatus, now: DateTime<Utc>, thresholds: InactivityThresholds) -> String {
    let mut out = String::new();

    let emoji = severity_emoji(status.critical, status.total);
    out.push_str(&format!(
        "{emoji} **Review score: {}/100** — {} issue(s) found (round {})\n\n",
        status.score, status.total, status.round
    ));

    if status.round > 1 {
        out.push_str("**Progress since last round**\n\n");
        out.push_str(&format!(
            "- Resolved: {}\n- Persistent: {}\n- New: {}\n\n",
            status.resolved, status.persistent, status.new_issues
        ));
    }

    if status.critical > 0 {
        out.push_str(&format!(
            "> \u{1F6A8} **{} critical issue(s) require attention before merge.**\n\n",
            status.critical
        ));
    }

    let since_last = now.signed_duration_since(status.last_review_at);
    let hours_since = since_last.num_hours();
    if hours_since >= thresholds.critical_hours {
        out.push_str(&format!(
            "> \u{1F6A8} No review activity in over {hours_since}h (critical threshold: {}h).\n\n",
            thresholds.critical_hours
        ));
    } else if hours_since >= thresholds.warning_hours {
        out.push_str(&format!(
            "> \u{26A0}\u{FE0F} No review activity in over {hours_since}h (warning threshold: {}h).\n\n",
            thresholds.warning_hours
        ));
    }

    if !status.approved_files.is_empty() {
        out.push_str("<details>\n<summary>Approved files (");
        out.push_str(&status.approved_files.len().to_string());
        out.push_str(")</summary>\n\n");
        for file in &status.approved_files {
            out.push_str(&format!("- {file}\n"));
        }
        out.push_str("\n</details>\n\n");
    }

    out.push_str(&marker_line(status));
    out.push('\n');
    out
}

fn marker_line(status: &ReviewStatus) -> String {
    let payload = serde_json::to_string(status).unwrap_or_default();
    let encoded = BASE64.encode(payload.as_bytes());
    format!("{MARKER_PREFIX}{encoded}{MARKER_SUFFIX}")
}

/// Extracts the previous round's [`ReviewStatus`] from existing review
/// commentary. Tolerant by design (§9 open question): any malformed marker
/// — wrong prefix, truncated base64, invalid JSON, or the line-wrapped form
/// a lossy host substrate can produce — returns `None` rather than an
/// error, which silently resets the round to 1 on the next build. Also
/// accepts a two-line fenced form (marker split across two lines by a
/// substrate that wraps long comments) as a more robust alternative.
pub fn parse_existing_status(text: &str) -> Option<ReviewStatus> {
    if let Some(status) = parse_single_line(text) {
        return Some(status);
    }
    parse_fenced_form(text)
}

fn parse_single_line(text: &str) -> Option<ReviewStatus> {
    let start = text.find(MARKER_PREFIX)?;
    let rest = &text[start + MARKER_PREFIX.len()..];
    let end = rest.find(MARKER_SUFFIX)?;
    decode_and_parse(&rest[..end])
}

fn parse_fenced_form(text: &str) -> Option<ReviewStatus> {
    // ```revcore-status
    // <base64>
    // ```
    let re = Regex::new(r"(?s)```revcore-status\s*\n(.*?)\n```").ok()?;
    let caps = re.captures(text)?;
    let raw = caps.get(1)?.as_str().trim();
    decode_and_parse(raw)
}

fn decode_and_parse(encoded: &str) -> Option<ReviewStatus> {
    let bytes = BASE64.decode(encoded.trim()).ok()?;
    serde_json::from_slice(&bytes).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::{build_handoff_status, CurrentRun};

    #[test]
    fn marker_round_trips_through_render_and_parse() {
        let current = CurrentRun { score: 90, issues: vec![], clean_files: vec!["a.rs".to_string()] };
        let status = build_handoff_status(&current, None, Utc::now());
        let block = generate_handoff_block(&status, Utc::now(), InactivityThresholds::default());
        let recovered = parse_existing_status(&block).expect("marker should parse");
        assert_eq!(recovered.round, status.round);
        assert_eq!(recovered.score, status.score);
        assert_eq!(recovered.approved_files, status.approved_files);
    }

    #[test]
    fn malformed_marker_returns_none_without_error() {
        let text = "some commentary\n<!-- revcore:status=not-valid-base64!!! -->\n";
        assert!(parse_existing_status(text).is_none());
    }

    #[test]
    fn missing_marker_returns_none() {
        assert!(parse_existing_status("no marker here").is_none());
    }

    #[test]
    fn fenced_form_is_accepted_as_a_more_robust_alternative() {
        let current = CurrentRun { score: 80, issues: vec![], clean_files: vec![] };
        let status = build_handoff_status(&current, None, Utc::now());
        let payload = serde_json::to_string(&status).unwrap();
        let encoded = BASE64.encode(payload.as_bytes());
        let text = format!("body text\n```revcore-status\n{encoded}\n```\n");
        let recovered = parse_existing_status(&text).expect("fenced marker should parse");
        assert_eq!(recovered.round, status.round);
    }

    #[test]
    fn critical_warning_rendered_when_critical_count_positive() {
        use review_llm::{Issue, IssueType, Location, Severity};
        let current = CurrentRun {
            score: 40,
            issues: vec![Issue {
                id: 1,
                issue_type: IssueType::Security,
                severity: Severity::Critical,
                message: "SQL injection".to_string(),
                suggestion: None,
                location: Location { file: "a.rs".to_string(), line: 1, end_line: None, column: None },
                rule_id: None,
                suggested_fix: None,
                root_cause: None,
            }],
            clean_files: vec![],
        };
        let status = build_handoff_status(&current, None, Utc::now());
        let block = generate_handoff_block(&status, Utc::now(), InactivityThresholds::default());
        assert!(block.contains("critical issue(s)"));
    }

    #[test]
    fn inactivity_warning_at_50h_critical_at_75h() {
        let current = CurrentRun { score: 90, issues: vec![], clean_files: vec![] };
        let last_review_at = Utc::now() - chrono::Duration::hours(50);
        let mut status = build_handoff_status(&current, None, last_review_at);
        status.last_review_at = last_review_at;
        let now = last_review_at + chrono::Duration::hours(50);
        let block = generate_handoff_block(&status, now, InactivityThresholds::default());
        assert!(block.contains("warning threshold"));
        assert!(!block.contains("critical threshold"));

        let now_critical = last_review_at + chrono::Duration::hours(75);
        let block2 = generate_handoff_block(&status, now_critical, InactivityThresholds::default());
        assert!(block2.contains("critical threshold"));
    }
}
