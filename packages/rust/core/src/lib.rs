//! Ingestion run orchestration.
//!
//! This crate ties the pieces together: it resolves a scraper backend for
//! each configured feed, walks feed entries through dedup and date checks,
//! records per-article outcomes, and maintains the run summary record.

pub mod git;
pub mod pipeline;

pub use git::capture_git_metadata;
pub use pipeline::{ProgressReporter, RunSummary, SilentProgress, run_ingestion};
