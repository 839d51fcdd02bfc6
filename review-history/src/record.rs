//! Types for persisted issue records, search filters, and aggregates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Totally ordered: `Info < Warning < Error < Critical`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    Info,
    Warning,
    Error,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Critical => "critical",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "info" => Some(Self::Info),
            "warning" => Some(Self::Warning),
            "error" => Some(Self::Error),
            "critical" => Some(Self::Critical),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IssueType {
    Bug,
    Security,
    Performance,
    Style,
    Maintenance,
    BestPractice,
}

impl IssueType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bug => "bug",
            Self::Security => "security",
            Self::Performance => "performance",
            Self::Style => "style",
            Self::Maintenance => "maintenance",
            Self::BestPractice => "best-practice",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "bug" => Some(Self::Bug),
            "security" => Some(Self::Security),
            "performance" => Some(Self::Performance),
            "style" => Some(Self::Style),
            "maintenance" => Some(Self::Maintenance),
            "best-practice" => Some(Self::BestPractice),
            _ => None,
        }
    }
}

/// A persisted row in the `reviews` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssueRecord {
    pub id: Option<i64>,
    pub commit_hash: String,
    pub file_path: String,
    pub issue_type: IssueType,
    pub severity: Severity,
    pub message: String,
    pub suggestion: Option<String>,
    pub line: u32,
    pub author: String,
    pub branch: String,
    pub created_at: DateTime<Utc>,
    pub resolved: bool,
    pub resolved_at: Option<DateTime<Utc>>,
    pub review_round: u32,
}

/// Combinable search criteria. Every field is optional; absent fields do
/// not constrain the search.
#[derive(Debug, Clone, Default)]
pub struct SearchFilter {
    pub full_text: Option<String>,
    pub file_glob: Option<String>,
    pub author: Option<String>,
    pub severity: Option<Severity>,
    pub issue_type: Option<IssueType>,
    pub branch: Option<String>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub resolved: Option<bool>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

/// Per-file aggregation: totals, resolution split, severity/type
/// breakdown, first/last review, and the highest round seen.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileHistory {
    pub file_path: String,
    pub total: u32,
    pub resolved: u32,
    pub pending: u32,
    pub by_severity: std::collections::HashMap<String, u32>,
    pub by_type: std::collections::HashMap<String, u32>,
    pub first_reviewed_at: Option<DateTime<Utc>>,
    pub last_reviewed_at: Option<DateTime<Utc>>,
    pub max_round: u32,
}

/// Repository-wide stats.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AggregateStats {
    pub total: u32,
    pub by_severity: std::collections::HashMap<String, u32>,
    pub by_type: std::collections::HashMap<String, u32>,
    pub top_files: Vec<(String, u32)>,
}
