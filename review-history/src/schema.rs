//! Table, index, and full-text-search trigger definitions.

use rusqlite::Connection;

use crate::errors::HistoryResult;

pub fn init(conn: &Connection) -> HistoryResult<()> {
    conn.execute_batch(
        "
        PRAGMA journal_mode=WAL;

        CREATE TABLE IF NOT EXISTS reviews (
            id            INTEGER PRIMARY KEY AUTOINCREMENT,
            commit_hash   TEXT NOT NULL,
            file_path     TEXT NOT NULL,
            issue_type    TEXT NOT NULL,
            severity      TEXT NOT NULL,
            message       TEXT NOT NULL,
            suggestion    TEXT,
            line          INTEGER NOT NULL,
            author        TEXT NOT NULL,
            branch        TEXT NOT NULL,
            created_at    TEXT NOT NULL,
            resolved      INTEGER NOT NULL DEFAULT 0,
            resolved_at   TEXT,
            review_round  INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_reviews_file_path   ON reviews(file_path);
        CREATE INDEX IF NOT EXISTS idx_reviews_commit_hash ON reviews(commit_hash);
        CREATE INDEX IF NOT EXISTS idx_reviews_author      ON reviews(author);
        CREATE INDEX IF NOT EXISTS idx_reviews_severity    ON reviews(severity);
        CREATE INDEX IF NOT EXISTS idx_reviews_created_at  ON reviews(created_at);
        CREATE INDEX IF NOT EXISTS idx_reviews_resolved    ON reviews(resolved);

        CREATE VIRTUAL TABLE IF NOT EXISTS reviews_fts USING fts5(
            message, suggestion, content='reviews', content_rowid='id'
        );

        CREATE TRIGGER IF NOT EXISTS reviews_ai AFTER INSERT ON reviews BEGIN
            INSERT INTO reviews_fts(rowid, message, suggestion)
            VALUES (new.id, new.message, new.suggestion);
        END;

        CREATE TRIGGER IF NOT EXISTS reviews_ad AFTER DELETE ON reviews BEGIN
            INSERT INTO reviews_fts(reviews_fts, rowid, message, suggestion)
            VALUES ('delete', old.id, old.message, old.suggestion);
        END;

        CREATE TRIGGER IF NOT EXISTS reviews_au AFTER UPDATE ON reviews BEGIN
            INSERT INTO reviews_fts(reviews_fts, rowid, message, suggestion)
            VALUES ('delete', old.id, old.message, old.suggestion);
            INSERT INTO reviews_fts(rowid, message, suggestion)
            VALUES (new.id, new.message, new.suggestion);
        END;
        ",
    )?;
    Ok(())
}
