//! Feed parsing and pluggable scraper backends.
//!
//! This crate provides:
//! - [`backends`] — the [`ScraperBackend`] fetch contract and its two
//!   variants (plain headless and stealth), plus the [`BackendRegistry`]
//!   that selects one by configuration key
//! - [`feed`] — RSS/Atom feed fetching and entry extraction
//! - [`extract`] — plain-text extraction and content hashing for article
//!   pages

pub mod backends;
pub mod extract;
pub mod feed;

pub use backends::{BackendRegistry, FetchedPage, HeadlessBackend, ScraperBackend, StealthBackend};
pub use extract::{content_hash, extract_text};
pub use feed::{FeedEntry, fetch_feed, parse_feed};
