//! Core domain types for newsreel ingestion runs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// RunId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper for ingestion run identifiers (time-sortable).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub Uuid);

impl RunId {
    /// Generate a new time-sortable run identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for RunId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

// ---------------------------------------------------------------------------
// Article
// ---------------------------------------------------------------------------

/// Outcome of an article fetch, stored in the `status` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArticleStatus {
    Success,
    Error,
}

impl ArticleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Error => "error",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "success" => Some(Self::Success),
            "error" => Some(Self::Error),
            _ => None,
        }
    }
}

/// A single ingested article, one row per distinct URL ever seen.
///
/// Error rows keep the RSS metadata but have no content; `error_kind` holds
/// the stable failure identifier and `error_message` the human detail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Article {
    /// Unique article identifier (UUID v7).
    pub id: String,
    /// The run that created this row. Never reassigned.
    pub run_id: String,
    /// URL of the feed this article was discovered in.
    pub source_feed: String,
    /// Article URL. Unique across the entire store.
    pub url: String,
    /// Title from the RSS entry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Publication date from the RSS entry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<DateTime<Utc>>,
    /// When the fetch was attempted.
    pub fetched_at: DateTime<Utc>,
    /// Raw page HTML. `None` for error rows.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html_content: Option<String>,
    /// Extracted plain text. `None` for error rows.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_content: Option<String>,
    /// SHA-256 of the raw HTML. `None` for error rows.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_hash: Option<String>,
    /// Fetch outcome.
    pub status: ArticleStatus,
    /// Stable failure identifier (e.g. `timeout_error`). `None` on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<String>,
    /// Human-readable failure detail. `None` on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

// ---------------------------------------------------------------------------
// IngestionOperation
// ---------------------------------------------------------------------------

/// Lifecycle status of an ingestion run, stored in the `status` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Run record created, ingestion in progress.
    Running,
    /// Finalized with no failed articles.
    Success,
    /// Finalized with a mix of succeeded and failed articles.
    Partial,
    /// Finalized after a fatal error, or every attempted article failed.
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Success => "success",
            Self::Partial => "partial",
            Self::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "success" => Some(Self::Success),
            "partial" => Some(Self::Partial),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// Source-control provenance captured once at run start.
///
/// All fields are best-effort: outside a git checkout they are `None` and
/// the run proceeds without provenance.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GitMetadata {
    pub commit: Option<String>,
    pub branch: Option<String>,
    pub repo: Option<String>,
}

/// Per-run article counters.
///
/// Invariant: `succeeded + failed == attempted`. Duplicate skips and
/// date-threshold skips are not attempted and do not appear here.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunCounters {
    pub attempted: u64,
    pub succeeded: u64,
    pub failed: u64,
}

/// One execution of the ingestion pipeline: the run summary record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestionOperation {
    pub id: RunId,
    pub started_at: DateTime<Utc>,
    /// Set when the run is finalized.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    pub status: RunStatus,
    #[serde(default)]
    pub git: GitMetadata,
    #[serde(default)]
    pub counters: RunCounters,
    /// JSON snapshot of the effective run parameters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters_json: Option<String>,
}
