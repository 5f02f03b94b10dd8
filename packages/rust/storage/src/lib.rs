//! libSQL storage layer for articles and ingestion run records.
//!
//! The [`Store`] struct wraps a local libSQL database holding two tables:
//! `articles` (one row per distinct URL ever ingested) and
//! `ingestion_operations` (one row per run). The store is the single source
//! of truth for what has already been ingested — the URL-uniqueness
//! invariant is enforced here, by the `articles.url` UNIQUE constraint, not
//! by callers.
//!
//! **Access rules:** one ingestion run owns the store exclusively; there is
//! no cross-run locking discipline.

mod migrations;

use std::path::Path;

use chrono::{DateTime, Utc};
use libsql::{Connection, Database, params};
use uuid::Uuid;

use newsreel_shared::{
    Article, ArticleStatus, GitMetadata, IngestionOperation, NewsreelError, Result, RunCounters,
    RunId, RunStatus,
};

/// Primary storage handle wrapping a libSQL database.
pub struct Store {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
}

impl Store {
    /// Open or create a database at `path`, applying pending migrations.
    pub async fn open(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| NewsreelError::io(parent, e))?;
            }
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| NewsreelError::Storage(e.to_string()))?;

        let conn = db
            .connect()
            .map_err(|e| NewsreelError::Storage(e.to_string()))?;

        let store = Self { db, conn };
        store.run_migrations().await?;
        Ok(store)
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                tracing::info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn.execute_batch(migration.sql).await.map_err(|e| {
                    NewsreelError::Storage(format!(
                        "migration v{} failed: {e}",
                        migration.version
                    ))
                })?;
            }
        }
        Ok(())
    }

    /// Get the current schema version, or 0 if no migrations have been applied.
    async fn schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => {
                if let Ok(Some(row)) = rows.next().await {
                    row.get::<u32>(0).unwrap_or(0)
                } else {
                    0
                }
            }
            Err(_) => 0, // Table doesn't exist yet
        }
    }

    // -----------------------------------------------------------------------
    // Article operations
    // -----------------------------------------------------------------------

    /// Check whether an article URL is already stored.
    pub async fn article_exists(&self, url: &str) -> Result<bool> {
        let mut rows = self
            .conn
            .query("SELECT 1 FROM articles WHERE url = ?1", params![url])
            .await
            .map_err(|e| NewsreelError::Storage(e.to_string()))?;

        match rows.next().await {
            Ok(Some(_)) => Ok(true),
            Ok(None) => Ok(false),
            Err(e) => Err(NewsreelError::Storage(e.to_string())),
        }
    }

    /// Insert a new article row.
    ///
    /// Fails with [`NewsreelError::DuplicateArticle`] when the URL is
    /// already stored; any other failure is a storage error.
    pub async fn insert_article(&self, article: &Article) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO articles
                   (id, run_id, source_feed, url, title, published_at, fetched_at,
                    html_content, text_content, content_hash, status, error_kind, error_message)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
                params![
                    article.id.as_str(),
                    article.run_id.as_str(),
                    article.source_feed.as_str(),
                    article.url.as_str(),
                    article.title.as_deref(),
                    article.published_at.map(|dt| dt.to_rfc3339()),
                    article.fetched_at.to_rfc3339(),
                    article.html_content.as_deref(),
                    article.text_content.as_deref(),
                    article.content_hash.as_deref(),
                    article.status.as_str(),
                    article.error_kind.as_deref(),
                    article.error_message.as_deref(),
                ],
            )
            .await
            .map_err(|e| {
                let msg = e.to_string();
                if msg.contains("UNIQUE constraint failed") {
                    NewsreelError::DuplicateArticle {
                        url: article.url.clone(),
                    }
                } else {
                    NewsreelError::Storage(msg)
                }
            })?;
        Ok(())
    }

    /// Get an article by URL.
    pub async fn get_article_by_url(&self, url: &str) -> Result<Option<Article>> {
        let mut rows = self
            .conn
            .query(
                &format!("SELECT {ARTICLE_COLUMNS} FROM articles WHERE url = ?1"),
                params![url],
            )
            .await
            .map_err(|e| NewsreelError::Storage(e.to_string()))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_article(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(NewsreelError::Storage(e.to_string())),
        }
    }

    /// List all articles created by a run, in fetch order.
    pub async fn list_articles_for_run(&self, run_id: &RunId) -> Result<Vec<Article>> {
        let mut rows = self
            .conn
            .query(
                &format!(
                    "SELECT {ARTICLE_COLUMNS} FROM articles
                     WHERE run_id = ?1 ORDER BY fetched_at, id"
                ),
                params![run_id.to_string()],
            )
            .await
            .map_err(|e| NewsreelError::Storage(e.to_string()))?;

        let mut results = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            results.push(row_to_article(&row)?);
        }
        Ok(results)
    }

    /// Count all articles created by a run.
    pub async fn count_articles_for_run(&self, run_id: &RunId) -> Result<u64> {
        self.count_where(
            "SELECT COUNT(*) FROM articles WHERE run_id = ?1",
            run_id.to_string(),
        )
        .await
    }

    /// Count the error rows created by a run.
    pub async fn count_errors_for_run(&self, run_id: &RunId) -> Result<u64> {
        self.count_where(
            "SELECT COUNT(*) FROM articles WHERE run_id = ?1 AND status = 'error'",
            run_id.to_string(),
        )
        .await
    }

    /// Total number of stored articles, across all runs.
    pub async fn count_articles(&self) -> Result<u64> {
        let mut rows = self
            .conn
            .query("SELECT COUNT(*) FROM articles", params![])
            .await
            .map_err(|e| NewsreelError::Storage(e.to_string()))?;

        match rows.next().await {
            Ok(Some(row)) => row
                .get::<i64>(0)
                .map(|n| n as u64)
                .map_err(|e| NewsreelError::Storage(e.to_string())),
            Ok(None) => Ok(0),
            Err(e) => Err(NewsreelError::Storage(e.to_string())),
        }
    }

    async fn count_where(&self, sql: &str, param: String) -> Result<u64> {
        let mut rows = self
            .conn
            .query(sql, params![param])
            .await
            .map_err(|e| NewsreelError::Storage(e.to_string()))?;

        match rows.next().await {
            Ok(Some(row)) => row
                .get::<i64>(0)
                .map(|n| n as u64)
                .map_err(|e| NewsreelError::Storage(e.to_string())),
            Ok(None) => Ok(0),
            Err(e) => Err(NewsreelError::Storage(e.to_string())),
        }
    }

    // -----------------------------------------------------------------------
    // Ingestion operation records
    // -----------------------------------------------------------------------

    /// Create the run record at run start. Returns the generated run ID.
    pub async fn insert_operation(
        &self,
        git: &GitMetadata,
        parameters_json: Option<&str>,
    ) -> Result<RunId> {
        let id = RunId(Uuid::now_v7());
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "INSERT INTO ingestion_operations
                   (id, started_at, status, git_commit, git_branch, git_repo, parameters_json)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    id.to_string(),
                    now.as_str(),
                    RunStatus::Running.as_str(),
                    git.commit.as_deref(),
                    git.branch.as_deref(),
                    git.repo.as_deref(),
                    parameters_json,
                ],
            )
            .await
            .map_err(|e| NewsreelError::Storage(e.to_string()))?;
        Ok(id)
    }

    /// Finalize a run record with its counters and terminal status.
    pub async fn finalize_operation(
        &self,
        run_id: &RunId,
        counters: &RunCounters,
        status: RunStatus,
    ) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "UPDATE ingestion_operations SET
                   finished_at = ?1,
                   status = ?2,
                   articles_attempted = ?3,
                   articles_succeeded = ?4,
                   articles_failed = ?5
                 WHERE id = ?6",
                params![
                    now.as_str(),
                    status.as_str(),
                    counters.attempted as i64,
                    counters.succeeded as i64,
                    counters.failed as i64,
                    run_id.to_string(),
                ],
            )
            .await
            .map_err(|e| NewsreelError::Storage(e.to_string()))?;
        Ok(())
    }

    /// Get a run record by ID.
    pub async fn get_operation(&self, run_id: &RunId) -> Result<Option<IngestionOperation>> {
        let mut rows = self
            .conn
            .query(
                &format!(
                    "SELECT {OPERATION_COLUMNS} FROM ingestion_operations WHERE id = ?1"
                ),
                params![run_id.to_string()],
            )
            .await
            .map_err(|e| NewsreelError::Storage(e.to_string()))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_operation(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(NewsreelError::Storage(e.to_string())),
        }
    }

    /// List all run records, newest first.
    pub async fn list_operations(&self) -> Result<Vec<IngestionOperation>> {
        let mut rows = self
            .conn
            .query(
                &format!(
                    "SELECT {OPERATION_COLUMNS} FROM ingestion_operations
                     ORDER BY started_at DESC, id DESC"
                ),
                params![],
            )
            .await
            .map_err(|e| NewsreelError::Storage(e.to_string()))?;

        let mut results = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            results.push(row_to_operation(&row)?);
        }
        Ok(results)
    }

    /// Delete a run record and every article it created.
    ///
    /// Returns `false` when no such run exists.
    pub async fn delete_operation(&self, run_id: &RunId) -> Result<bool> {
        let id = run_id.to_string();
        self.conn
            .execute("DELETE FROM articles WHERE run_id = ?1", params![id.as_str()])
            .await
            .map_err(|e| NewsreelError::Storage(e.to_string()))?;

        let deleted = self
            .conn
            .execute(
                "DELETE FROM ingestion_operations WHERE id = ?1",
                params![id.as_str()],
            )
            .await
            .map_err(|e| NewsreelError::Storage(e.to_string()))?;

        Ok(deleted > 0)
    }
}

const ARTICLE_COLUMNS: &str = "id, run_id, source_feed, url, title, published_at, fetched_at, \
     html_content, text_content, content_hash, status, error_kind, error_message";

const OPERATION_COLUMNS: &str = "id, started_at, finished_at, status, git_commit, git_branch, \
     git_repo, articles_attempted, articles_succeeded, articles_failed, parameters_json";

fn parse_datetime(s: &str, column: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| NewsreelError::Storage(format!("invalid {column} timestamp '{s}': {e}")))
}

/// Convert a database row to an [`Article`].
fn row_to_article(row: &libsql::Row) -> Result<Article> {
    let status_raw: String = row
        .get(10)
        .map_err(|e| NewsreelError::Storage(e.to_string()))?;
    let status = ArticleStatus::parse(&status_raw)
        .ok_or_else(|| NewsreelError::Storage(format!("unknown article status '{status_raw}'")))?;

    Ok(Article {
        id: row
            .get::<String>(0)
            .map_err(|e| NewsreelError::Storage(e.to_string()))?,
        run_id: row
            .get::<String>(1)
            .map_err(|e| NewsreelError::Storage(e.to_string()))?,
        source_feed: row
            .get::<String>(2)
            .map_err(|e| NewsreelError::Storage(e.to_string()))?,
        url: row
            .get::<String>(3)
            .map_err(|e| NewsreelError::Storage(e.to_string()))?,
        title: row.get::<String>(4).ok(),
        published_at: match row.get::<String>(5).ok() {
            Some(s) => Some(parse_datetime(&s, "published_at")?),
            None => None,
        },
        fetched_at: {
            let s: String = row
                .get(6)
                .map_err(|e| NewsreelError::Storage(e.to_string()))?;
            parse_datetime(&s, "fetched_at")?
        },
        html_content: row.get::<String>(7).ok(),
        text_content: row.get::<String>(8).ok(),
        content_hash: row.get::<String>(9).ok(),
        status,
        error_kind: row.get::<String>(11).ok(),
        error_message: row.get::<String>(12).ok(),
    })
}

/// Convert a database row to an [`IngestionOperation`].
fn row_to_operation(row: &libsql::Row) -> Result<IngestionOperation> {
    let id_raw: String = row
        .get(0)
        .map_err(|e| NewsreelError::Storage(e.to_string()))?;
    let id: RunId = id_raw
        .parse()
        .map_err(|e| NewsreelError::Storage(format!("invalid run id '{id_raw}': {e}")))?;

    let status_raw: String = row
        .get(3)
        .map_err(|e| NewsreelError::Storage(e.to_string()))?;
    let status = RunStatus::parse(&status_raw)
        .ok_or_else(|| NewsreelError::Storage(format!("unknown run status '{status_raw}'")))?;

    Ok(IngestionOperation {
        id,
        started_at: {
            let s: String = row
                .get(1)
                .map_err(|e| NewsreelError::Storage(e.to_string()))?;
            parse_datetime(&s, "started_at")?
        },
        finished_at: match row.get::<String>(2).ok() {
            Some(s) => Some(parse_datetime(&s, "finished_at")?),
            None => None,
        },
        status,
        git: GitMetadata {
            commit: row.get::<String>(4).ok(),
            branch: row.get::<String>(5).ok(),
            repo: row.get::<String>(6).ok(),
        },
        counters: RunCounters {
            attempted: row.get::<i64>(7).unwrap_or(0) as u64,
            succeeded: row.get::<i64>(8).unwrap_or(0) as u64,
            failed: row.get::<i64>(9).unwrap_or(0) as u64,
        },
        parameters_json: row.get::<String>(10).ok(),
    })
}
