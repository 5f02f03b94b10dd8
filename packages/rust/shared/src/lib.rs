//! Shared types, error model, and configuration for newsreel.
//!
//! This crate is the foundation depended on by all other newsreel crates.
//! It provides:
//! - [`NewsreelError`] — the unified error type
//! - [`FetchError`] — the per-article fetch failure taxonomy
//! - Domain types ([`Article`], [`IngestionOperation`], [`RunId`], [`GitMetadata`])
//! - Configuration ([`IngestConfig`], YAML loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    BackendOptions, FeedSource, GlobalConfig, IngestConfig, ScrapersConfig, load_config,
};
pub use error::{FetchError, NewsreelError, Result};
pub use types::{
    Article, ArticleStatus, GitMetadata, IngestionOperation, RunCounters, RunId, RunStatus,
};
