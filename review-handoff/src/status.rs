//! The review status object (§3): round-tracking, issue diffing, and the
//! serialised shape carried in the opaque handoff marker.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use review_llm::{Issue, Severity};
use serde::{Deserialize, Serialize};

/// One issue as carried across rounds, trimmed to what the handoff block
/// needs for diffing and display — not the full provider `Issue`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueStatus {
    pub id: u32,
    pub file: String,
    pub severity: Severity,
    pub message: String,
    pub first_seen_round: u32,
}

/// The current run's findings, as handed to [`build_handoff_status`]. Kept
/// decoupled from `review-engine`'s `RunResult` so this crate has no
/// dependency on the orchestration crate — callers adapt.
#[derive(Debug, Clone, Default)]
pub struct CurrentRun {
    pub score: u8,
    pub issues: Vec<Issue>,
    /// Files reviewed this round with zero issues.
    pub clean_files: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewStatus {
    pub round: u32,
    pub generated_at: DateTime<Utc>,
    pub last_review_at: DateTime<Utc>,
    pub score: u8,
    pub total: u32,
    pub critical: u32,
    pub resolved: u32,
    pub persistent: u32,
    pub new_issues: u32,
    pub issues: Vec<IssueStatus>,
    pub approved_files: Vec<String>,
}

/// Derives the next round's status from the current run's findings and the
/// previous round's status, if any (§4.13).
pub fn build_handoff_status(current: &CurrentRun, previous: Option<&ReviewStatus>, now: DateTime<Utc>) -> ReviewStatus {
    let round = previous.map(|p| p.round + 1).unwrap_or(1);

    let mut seen = HashSet::new();
    let mut issues = Vec::new();
    for issue in &current.issues {
        if !seen.insert(issue.id) {
            continue;
        }
        let first_seen_round = previous
            .and_then(|p| p.issues.iter().find(|i| i.id == issue.id))
            .map(|i| i.first_seen_round)
            .unwrap_or(round);
        issues.push(IssueStatus {
            id: issue.id,
            file: issue.location.file.clone(),
            severity: issue.severity,
            message: issue.message.clone(),
            first_seen_round,
        });
    }

    let current_ids: HashSet<u32> = issues.iter().map(|i| i.id).collect();
    let prev_ids: HashSet<u32> = previous.map(|p| p.issues.iter().map(|i| i.id).collect()).unwrap_or_default();

    let resolved = prev_ids.difference(&current_ids).count() as u32;
    let persistent = prev_ids.intersection(&current_ids).count() as u32;
    let total = issues.len() as u32;
    let new_issues = total.saturating_sub(persistent);
    let critical = issues.iter().filter(|i| i.severity == Severity::Critical).count() as u32;

    let dirty_files: HashSet<&str> = issues.iter().map(|i| i.file.as_str()).collect();
    let mut approved_files: Vec<String> = previous
        .map(|p| p.approved_files.iter().filter(|f| !dirty_files.contains(f.as_str())).cloned().collect())
        .unwrap_or_default();
    for file in &current.clean_files {
        if !approved_files.contains(file) {
            approved_files.push(file.clone());
        }
    }

    ReviewStatus {
        round,
        generated_at: now,
        last_review_at: now,
        score: current.score,
        total,
        critical,
        resolved,
        persistent,
        new_issues,
        issues,
        approved_files,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use review_llm::Location;

    fn issue(id: u32, file: &str, severity: Severity) -> Issue {
        Issue {
            id,
            issue_type: review_llm::IssueType::Bug,
            severity,
            message: format!("issue {id}"),
            suggestion: None,
            location: Location { file: file.to_string(), line: 1, end_line: None, column: None },
            rule_id: None,
            suggested_fix: None,
            root_cause: None,
        }
    }

    #[test]
    fn first_round_has_no_resolved_and_all_new() {
        let current = CurrentRun {
            score: 80,
            issues: vec![issue(1, "a.rs", Severity::Warning), issue(2, "b.rs", Severity::Critical)],
            clean_files: vec!["c.rs".to_string()],
        };
        let status = build_handoff_status(&current, None, Utc::now());
        assert_eq!(status.round, 1);
        assert_eq!(status.total, 2);
        assert_eq!(status.new_issues, 2);
        assert_eq!(status.resolved, 0);
        assert_eq!(status.persistent, 0);
        assert_eq!(status.critical, 1);
        assert!(status.approved_files.contains(&"c.rs".to_string()));
    }

    #[test]
    fn second_round_tracks_resolved_persistent_and_new() {
        let first = CurrentRun {
            score: 70,
            issues: vec![issue(1, "a.rs", Severity::Warning), issue(2, "b.rs", Severity::Error)],
            clean_files: vec![],
        };
        let prev = build_handoff_status(&first, None, Utc::now());

        let second = CurrentRun {
            score: 85,
            issues: vec![issue(2, "b.rs", Severity::Error), issue(3, "a.rs", Severity::Info)],
            clean_files: vec![],
        };
        let status = build_handoff_status(&second, Some(&prev), Utc::now());
        assert_eq!(status.round, 2);
        assert_eq!(status.total, 2);
        assert_eq!(status.resolved, 1); // issue 1 gone
        assert_eq!(status.persistent, 1); // issue 2 survived
        assert_eq!(status.new_issues, 1); // issue 3
        let surviving = status.issues.iter().find(|i| i.id == 2).unwrap();
        assert_eq!(surviving.first_seen_round, 1);
        let fresh = status.issues.iter().find(|i| i.id == 3).unwrap();
        assert_eq!(fresh.first_seen_round, 2);
    }

    #[test]
    fn duplicate_issue_ids_in_one_round_do_not_inflate_total() {
        let current = CurrentRun {
            score: 90,
            issues: vec![issue(1, "a.rs", Severity::Warning), issue(1, "a.rs", Severity::Warning)],
            clean_files: vec![],
        };
        let status = build_handoff_status(&current, None, Utc::now());
        assert_eq!(status.total, 1);
    }

    #[test]
    fn approved_file_dropped_once_it_becomes_dirty() {
        let first = CurrentRun { score: 100, issues: vec![], clean_files: vec!["a.rs".to_string()] };
        let prev = build_handoff_status(&first, None, Utc::now());
        assert!(prev.approved_files.contains(&"a.rs".to_string()));

        let second = CurrentRun { score: 60, issues: vec![issue(9, "a.rs", Severity::Warning)], clean_files: vec![] };
        let status = build_handoff_status(&second, Some(&prev), Utc::now());
        assert!(!status.approved_files.contains(&"a.rs".to_string()));
    }
}
