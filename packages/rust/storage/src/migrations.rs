//! SQL migration definitions for the newsreel database.
//!
//! Migrations are applied in order on database open. Each migration has a
//! version number and a set of SQL statements executed as one batch.

/// A database migration with a version and SQL statements.
pub(crate) struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub sql: &'static str,
}

/// All migrations, in ascending version order.
pub(crate) fn all_migrations() -> Vec<Migration> {
    vec![Migration {
        version: 1,
        description: "Initial schema: ingestion_operations, articles",
        sql: r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_migrations (
    version    INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- One row per ingestion run
CREATE TABLE IF NOT EXISTS ingestion_operations (
    id                 TEXT PRIMARY KEY,
    started_at         TEXT NOT NULL,
    finished_at        TEXT,
    status             TEXT NOT NULL,
    git_commit         TEXT,
    git_branch         TEXT,
    git_repo           TEXT,
    articles_attempted INTEGER NOT NULL DEFAULT 0,
    articles_succeeded INTEGER NOT NULL DEFAULT 0,
    articles_failed    INTEGER NOT NULL DEFAULT 0,
    parameters_json    TEXT
);

-- One row per distinct article URL ever ingested.
-- The UNIQUE constraint on url is the dedup enforcement point.
CREATE TABLE IF NOT EXISTS articles (
    id            TEXT PRIMARY KEY,
    run_id        TEXT NOT NULL REFERENCES ingestion_operations(id),
    source_feed   TEXT NOT NULL,
    url           TEXT NOT NULL UNIQUE,
    title         TEXT,
    published_at  TEXT,
    fetched_at    TEXT NOT NULL,
    html_content  TEXT,
    text_content  TEXT,
    content_hash  TEXT,
    status        TEXT NOT NULL,
    error_kind    TEXT,
    error_message TEXT
);

CREATE INDEX IF NOT EXISTS idx_articles_run_id ON articles(run_id);
CREATE INDEX IF NOT EXISTS idx_articles_status ON articles(status);

INSERT INTO schema_migrations (version) VALUES (1);
"#,
    }]
}
