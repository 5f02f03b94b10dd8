//! Error types for newsreel.
//!
//! Library crates use [`NewsreelError`] via `thiserror`; the CLI wraps it
//! with `color-eyre` for rich diagnostics. Per-article fetch failures are a
//! separate taxonomy ([`FetchError`]) because they are recorded as data, not
//! propagated: the run loop converts them into stored `error_kind` values.

use std::path::PathBuf;

/// Top-level error type for all newsreel operations.
#[derive(Debug, thiserror::Error)]
pub enum NewsreelError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Database or storage layer error. Run-fatal.
    #[error("storage error: {0}")]
    Storage(String),

    /// An article with this URL is already stored. Expected during
    /// ingestion; callers skip and continue.
    #[error("article already stored: {url}")]
    DuplicateArticle { url: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (bad feed entry, invalid date format, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, NewsreelError>;

impl NewsreelError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// A per-article fetch failure.
///
/// These never abort a run; the orchestrator stores [`FetchError::kind`] as
/// the article's `error_kind` and moves on.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// Could not reach the host (DNS, connect, TLS, reset).
    #[error("connection error: {0}")]
    Connection(String),

    /// The server answered with a non-success status.
    #[error("HTTP status {status}")]
    HttpStatus { status: u16 },

    /// The request exceeded the configured timeout.
    #[error("timed out: {0}")]
    Timeout(String),

    /// Response body could not be read or parsed.
    #[error("parse error: {0}")]
    Parse(String),

    /// Fetched content failed validation (too short to be a real article).
    #[error("content too short: {0}")]
    ContentTooShort(String),
}

impl FetchError {
    /// Stable identifier stored in the `error_kind` column.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Connection(_) => "connection_error",
            Self::HttpStatus { .. } => "http_status_error",
            Self::Timeout(_) => "timeout_error",
            Self::Parse(_) => "parse_error",
            Self::ContentTooShort(_) => "content_too_short",
        }
    }
}
