//! RSS/Atom feed fetching and entry extraction.

use chrono::{DateTime, Utc};
use feed_rs::parser;
use tracing::debug;
use url::Url;

use newsreel_shared::FetchError;

use crate::backends::ScraperBackend;

/// One article candidate discovered in a feed.
#[derive(Debug, Clone)]
pub struct FeedEntry {
    /// Entry title, when the feed provides one.
    pub title: Option<String>,
    /// Link to the article page.
    pub url: String,
    /// Publication date, falling back to the updated date.
    pub published: Option<DateTime<Utc>>,
}

/// Fetch a feed through the given backend and extract its entries.
pub async fn fetch_feed(
    backend: &dyn ScraperBackend,
    url: &Url,
) -> Result<Vec<FeedEntry>, FetchError> {
    let page = backend.fetch(url).await?;
    parse_feed(&page.body)
}

/// Parse an RSS/Atom document into article candidates.
///
/// Entries without a usable link are dropped; everything else is kept in
/// feed order.
pub fn parse_feed(body: &str) -> Result<Vec<FeedEntry>, FetchError> {
    let feed = parser::parse(body.as_bytes())
        .map_err(|e| FetchError::Parse(format!("feed parse failed: {e}")))?;

    let entries = feed
        .entries
        .into_iter()
        .filter_map(|entry| {
            let url = entry
                .links
                .first()
                .map(|l| l.href.clone())
                .or_else(|| entry.id.starts_with("http").then(|| entry.id.clone()))?;

            Some(FeedEntry {
                title: entry.title.map(|t| t.content),
                url,
                published: entry.published.or(entry.updated),
            })
        })
        .collect::<Vec<_>>();

    if entries.is_empty() {
        debug!("feed contained no entries with links");
    }

    Ok(entries)
}
