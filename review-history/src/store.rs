//! The history store: single/batch insert, filtered search, per-file and
//! aggregate statistics, resolution tracking.
//!
//! `rusqlite` is synchronous; every public method hands the blocking work
//! to `spawn_blocking` so callers stay on the async executor.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};

use crate::errors::{HistoryError, HistoryResult};
use crate::record::{AggregateStats, FileHistory, IssueRecord, IssueType, SearchFilter, Severity};
use crate::schema;

/// Columns a caller may ask to sort or filter by glob — never accept a raw
/// caller-supplied column name without checking this list first.
const ALLOWED_COLUMNS: &[&str] = &[
    "file_path",
    "commit_hash",
    "author",
    "severity",
    "created_at",
    "resolved",
    "review_round",
];

fn validate_column(name: &str) -> HistoryResult<&str> {
    ALLOWED_COLUMNS
        .iter()
        .find(|c| **c == name)
        .copied()
        .ok_or_else(|| HistoryError::DisallowedColumn(name.to_string()))
}

/// Converts a shell-style glob (`*`, `?`) into a SQL `LIKE` pattern.
fn glob_to_like(glob: &str) -> String {
    glob.chars()
        .map(|c| match c {
            '*' => '%',
            '?' => '_',
            other => other,
        })
        .collect()
}

pub struct HistoryStore {
    conn: Arc<Mutex<Connection>>,
}

impl HistoryStore {
    pub async fn open(path: impl Into<std::path::PathBuf>) -> HistoryResult<Self> {
        let path = path.into();
        let conn = tokio::task::spawn_blocking(move || -> HistoryResult<Connection> {
            let conn = Connection::open(&path)?;
            schema::init(&conn)?;
            Ok(conn)
        })
        .await??;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// In-memory store, for tests and short-lived processes.
    pub async fn open_in_memory() -> HistoryResult<Self> {
        let conn = tokio::task::spawn_blocking(|| -> HistoryResult<Connection> {
            let conn = Connection::open_in_memory()?;
            schema::init(&conn)?;
            Ok(conn)
        })
        .await??;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub async fn store(&self, record: IssueRecord) -> HistoryResult<i64> {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().unwrap();
            insert_one(&conn, &record)
        })
        .await?
    }

    /// Stores every record in a single transaction: all rows commit, or
    /// none do.
    pub async fn store_batch(&self, records: Vec<IssueRecord>) -> HistoryResult<Vec<i64>> {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut conn = conn.lock().unwrap();
            let tx = conn.transaction()?;
            let mut ids = Vec::with_capacity(records.len());
            for record in &records {
                ids.push(insert_one(&tx, record)?);
            }
            tx.commit()?;
            Ok(ids)
        })
        .await?
    }

    pub async fn search(&self, filter: SearchFilter) -> HistoryResult<Vec<IssueRecord>> {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || run_search(&conn.lock().unwrap(), &filter)).await?
    }

    pub async fn mark_resolved(&self, id: i64, resolved_at: DateTime<Utc>) -> HistoryResult<()> {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().unwrap();
            conn.execute(
                "UPDATE reviews SET resolved = 1, resolved_at = ?1 WHERE id = ?2",
                params![resolved_at.to_rfc3339(), id],
            )?;
            Ok(())
        })
        .await?
    }

    pub async fn file_history(&self, file_path: String) -> HistoryResult<FileHistory> {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || compute_file_history(&conn.lock().unwrap(), &file_path)).await?
    }

    pub async fn aggregate_stats(&self) -> HistoryResult<AggregateStats> {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || compute_aggregate_stats(&conn.lock().unwrap())).await?
    }
}

fn insert_one(conn: &Connection, record: &IssueRecord) -> HistoryResult<i64> {
    conn.execute(
        "INSERT INTO reviews
            (commit_hash, file_path, issue_type, severity, message, suggestion,
             line, author, branch, created_at, resolved, resolved_at, review_round)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
        params![
            record.commit_hash,
            record.file_path,
            record.issue_type.as_str(),
            record.severity.as_str(),
            record.message,
            record.suggestion,
            record.line,
            record.author,
            record.branch,
            record.created_at.to_rfc3339(),
            record.resolved as i64,
            record.resolved_at.map(|t| t.to_rfc3339()),
            record.review_round,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

fn row_to_record(row: &Row) -> rusqlite::Result<IssueRecord> {
    let created_at: String = row.get("created_at")?;
    let resolved_at: Option<String> = row.get("resolved_at")?;
    let issue_type: String = row.get("issue_type")?;
    let severity: String = row.get("severity")?;
    Ok(IssueRecord {
        id: row.get("id")?,
        commit_hash: row.get("commit_hash")?,
        file_path: row.get("file_path")?,
        issue_type: IssueType::parse(&issue_type).unwrap_or(IssueType::Maintenance),
        severity: Severity::parse(&severity).unwrap_or(Severity::Info),
        message: row.get("message")?,
        suggestion: row.get("suggestion")?,
        line: row.get("line")?,
        author: row.get("author")?,
        branch: row.get("branch")?,
        created_at: DateTime::parse_from_rfc3339(&created_at)
            .map(|d| d.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now()),
        resolved: row.get::<_, i64>("resolved")? != 0,
        resolved_at: resolved_at.and_then(|s| DateTime::parse_from_rfc3339(&s).ok()).map(|d| d.with_timezone(&Utc)),
        review_round: row.get("review_round")?,
    })
}

fn run_search(conn: &Connection, filter: &SearchFilter) -> HistoryResult<Vec<IssueRecord>> {
    let mut clauses: Vec<String> = Vec::new();
    let mut values: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

    let mut base = String::from("SELECT r.* FROM reviews r");
    if filter.full_text.is_some() {
        base.push_str(" JOIN reviews_fts f ON f.rowid = r.id");
    }

    if let Some(text) = &filter.full_text {
        clauses.push("reviews_fts MATCH ?".to_string());
        values.push(Box::new(text.clone()));
    }
    if let Some(glob) = &filter.file_glob {
        let column = validate_column("file_path")?;
        clauses.push(format!("r.{column} LIKE ?"));
        values.push(Box::new(glob_to_like(glob)));
    }
    if let Some(author) = &filter.author {
        clauses.push(format!("r.{} = ?", validate_column("author")?));
        values.push(Box::new(author.clone()));
    }
    if let Some(severity) = filter.severity {
        clauses.push(format!("r.{} = ?", validate_column("severity")?));
        values.push(Box::new(severity.as_str().to_string()));
    }
    if let Some(issue_type) = filter.issue_type {
        clauses.push("r.issue_type = ?".to_string());
        values.push(Box::new(issue_type.as_str().to_string()));
    }
    if let Some(branch) = &filter.branch {
        clauses.push("r.branch = ?".to_string());
        values.push(Box::new(branch.clone()));
    }
    if let Some(since) = filter.since {
        clauses.push(format!("r.{} >= ?", validate_column("created_at")?));
        values.push(Box::new(since.to_rfc3339()));
    }
    if let Some(until) = filter.until {
        clauses.push(format!("r.{} <= ?", validate_column("created_at")?));
        values.push(Box::new(until.to_rfc3339()));
    }
    if let Some(resolved) = filter.resolved {
        clauses.push(format!("r.{} = ?", validate_column("resolved")?));
        values.push(Box::new(resolved as i64));
    }

    let mut sql = base;
    if !clauses.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&clauses.join(" AND "));
    }
    sql.push_str(" ORDER BY r.created_at DESC");
    if let Some(limit) = filter.limit {
        sql.push_str(&format!(" LIMIT {limit}"));
        if let Some(offset) = filter.offset {
            sql.push_str(&format!(" OFFSET {offset}"));
        }
    }

    let mut stmt = conn.prepare(&sql)?;
    let params_slice: Vec<&dyn rusqlite::ToSql> = values.iter().map(|v| v.as_ref()).collect();
    let rows = stmt.query_map(params_slice.as_slice(), row_to_record)?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

fn compute_file_history(conn: &Connection, file_path: &str) -> HistoryResult<FileHistory> {
    let mut stmt = conn.prepare("SELECT * FROM reviews WHERE file_path = ?1")?;
    let rows = stmt.query_map(params![file_path], row_to_record)?;

    let mut history = FileHistory {
        file_path: file_path.to_string(),
        ..Default::default()
    };
    for row in rows {
        let record = row?;
        history.total += 1;
        if record.resolved {
            history.resolved += 1;
        } else {
            history.pending += 1;
        }
        *history.by_severity.entry(record.severity.as_str().to_string()).or_insert(0) += 1;
        *history.by_type.entry(record.issue_type.as_str().to_string()).or_insert(0) += 1;
        history.max_round = history.max_round.max(record.review_round);
        history.first_reviewed_at = Some(match history.first_reviewed_at {
            Some(existing) if existing <= record.created_at => existing,
            _ => record.created_at,
        });
        history.last_reviewed_at = Some(match history.last_reviewed_at {
            Some(existing) if existing >= record.created_at => existing,
            _ => record.created_at,
        });
    }
    Ok(history)
}

fn compute_aggregate_stats(conn: &Connection) -> HistoryResult<AggregateStats> {
    let mut stmt = conn.prepare("SELECT * FROM reviews")?;
    let rows = stmt.query_map([], row_to_record)?;

    let mut stats = AggregateStats::default();
    let mut per_file: HashMap<String, u32> = HashMap::new();
    for row in rows {
        let record = row?;
        stats.total += 1;
        *stats.by_severity.entry(record.severity.as_str().to_string()).or_insert(0) += 1;
        *stats.by_type.entry(record.issue_type.as_str().to_string()).or_insert(0) += 1;
        *per_file.entry(record.file_path).or_insert(0) += 1;
    }
    let mut top: Vec<(String, u32)> = per_file.into_iter().collect();
    top.sort_by(|a, b| b.1.cmp(&a.1));
    top.truncate(10);
    stats.top_files = top;
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(file: &str, severity: Severity, round: u32) -> IssueRecord {
        IssueRecord {
            id: None,
            commit_hash: "abc123".into(),
            file_path: file.into(),
            issue_type: IssueType::Bug,
            severity,
            message: "possible SQL injection".into(),
            suggestion: Some("use a parameterised query".into()),
            line: 12,
            author: "alice".into(),
            branch: "main".into(),
            created_at: Utc::now(),
            resolved: false,
            resolved_at: None,
            review_round: round,
        }
    }

    #[tokio::test]
    async fn store_then_search_by_full_text() {
        let store = HistoryStore::open_in_memory().await.unwrap();
        store.store(sample("src/a.rs", Severity::Critical, 1)).await.unwrap();
        let hits = store
            .search(SearchFilter {
                full_text: Some("injection".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[tokio::test]
    async fn store_batch_is_all_or_nothing() {
        let store = HistoryStore::open_in_memory().await.unwrap();
        let ids = store
            .store_batch(vec![
                sample("src/a.rs", Severity::Warning, 1),
                sample("src/b.rs", Severity::Error, 1),
            ])
            .await
            .unwrap();
        assert_eq!(ids.len(), 2);
    }

    #[tokio::test]
    async fn search_by_glob_expands_to_like() {
        let store = HistoryStore::open_in_memory().await.unwrap();
        store.store(sample("src/foo.rs", Severity::Info, 1)).await.unwrap();
        store.store(sample("tests/foo.rs", Severity::Info, 1)).await.unwrap();
        let hits = store
            .search(SearchFilter {
                file_glob: Some("src/*".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].file_path, "src/foo.rs");
    }

    #[tokio::test]
    async fn mark_resolved_flips_the_flag() {
        let store = HistoryStore::open_in_memory().await.unwrap();
        let id = store.store(sample("src/a.rs", Severity::Warning, 1)).await.unwrap();
        store.mark_resolved(id, Utc::now()).await.unwrap();
        let hits = store
            .search(SearchFilter {
                resolved: Some(true),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[tokio::test]
    async fn file_history_aggregates_counts_and_max_round() {
        let store = HistoryStore::open_in_memory().await.unwrap();
        store.store(sample("src/a.rs", Severity::Critical, 1)).await.unwrap();
        store.store(sample("src/a.rs", Severity::Warning, 2)).await.unwrap();
        let history = store.file_history("src/a.rs".to_string()).await.unwrap();
        assert_eq!(history.total, 2);
        assert_eq!(history.max_round, 2);
        assert_eq!(history.pending, 2);
    }

    #[tokio::test]
    async fn aggregate_stats_ranks_top_files() {
        let store = HistoryStore::open_in_memory().await.unwrap();
        for _ in 0..3 {
            store.store(sample("src/hot.rs", Severity::Warning, 1)).await.unwrap();
        }
        store.store(sample("src/cold.rs", Severity::Warning, 1)).await.unwrap();
        let stats = store.aggregate_stats().await.unwrap();
        assert_eq!(stats.total, 4);
        assert_eq!(stats.top_files[0].0, "src/hot.rs");
        assert_eq!(stats.top_files[0].1, 3);
    }
}
