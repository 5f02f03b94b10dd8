//! Ingestion configuration for newsreel.
//!
//! Runs are driven by a YAML file passed via `--config`: a `global` section,
//! feeds grouped by scraper backend under `rss_feeds`, and per-backend fetch
//! options under `scrapers`. Feeds are immutable for the duration of a run.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{NewsreelError, Result};

// ---------------------------------------------------------------------------
// Config structs (matching the YAML schema)
// ---------------------------------------------------------------------------

/// Top-level ingestion config, deserialized from YAML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Global run settings.
    #[serde(default)]
    pub global: GlobalConfig,

    /// Feeds grouped by scraper backend key. `BTreeMap` keeps iteration
    /// order deterministic across runs.
    #[serde(default)]
    pub rss_feeds: BTreeMap<String, Vec<FeedSource>>,

    /// Per-backend fetch options.
    #[serde(default)]
    pub scrapers: ScrapersConfig,
}

/// `global` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalConfig {
    /// Path to the article database file.
    #[serde(default = "default_db_path")]
    pub db_path: String,

    /// Maximum attempted articles per run.
    #[serde(default = "default_articles_limit")]
    pub articles_limit: usize,

    /// Skip entries published before this date (`YYYY-MM-DD`).
    #[serde(default)]
    pub date_threshold: Option<String>,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Successful fetches with less raw HTML than this are stored as
    /// `content_too_short` error rows.
    #[serde(default = "default_min_html_len")]
    pub min_html_len: usize,

    /// Same cutoff for the extracted text.
    #[serde(default = "default_min_text_len")]
    pub min_text_len: usize,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            articles_limit: default_articles_limit(),
            date_threshold: None,
            timeout: default_timeout(),
            min_html_len: default_min_html_len(),
            min_text_len: default_min_text_len(),
        }
    }
}

fn default_db_path() -> String {
    "data/newsreel.db".into()
}
fn default_articles_limit() -> usize {
    100
}
fn default_timeout() -> u64 {
    30
}
fn default_min_html_len() -> usize {
    200
}
fn default_min_text_len() -> usize {
    80
}

/// A single configured RSS feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedSource {
    /// Human-readable name, used in logs.
    pub name: String,
    /// Feed URL.
    pub url: String,
    /// Disabled feeds are skipped entirely: no article or error rows.
    #[serde(default = "default_true")]
    pub enabled: bool,
}

/// `scrapers` section: one options block per backend key.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScrapersConfig {
    #[serde(default)]
    pub headless: BackendOptions,
    #[serde(default)]
    pub stealth: BackendOptions,
}

/// Fetch options for one scraper backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendOptions {
    /// User-Agent override. Each backend has its own default.
    #[serde(default)]
    pub user_agent: Option<String>,

    /// `Accept-Language` header, sent when present.
    #[serde(default)]
    pub accept_language: Option<String>,

    /// Politeness delay between article fetches, in milliseconds.
    #[serde(default)]
    pub request_delay_ms: u64,

    /// Retries for connection failures and 5xx responses.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for BackendOptions {
    fn default() -> Self {
        Self {
            user_agent: None,
            accept_language: None,
            request_delay_ms: 0,
            max_retries: default_max_retries(),
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_max_retries() -> u32 {
    2
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Load and validate an ingestion config from a YAML file.
pub fn load_config(path: &Path) -> Result<IngestConfig> {
    tracing::debug!(?path, "loading ingestion config");
    let content = std::fs::read_to_string(path).map_err(|e| NewsreelError::io(path, e))?;

    let config: IngestConfig = serde_yaml::from_str(&content).map_err(|e| {
        NewsreelError::config(format!("failed to parse {}: {e}", path.display()))
    })?;

    config.validate()?;
    Ok(config)
}

impl IngestConfig {
    /// Validate feed entries and the date threshold format.
    pub fn validate(&self) -> Result<()> {
        for (backend, feeds) in &self.rss_feeds {
            for feed in feeds {
                if feed.url.trim().is_empty() {
                    return Err(NewsreelError::validation(format!(
                        "feed '{}' under '{backend}' has an empty url",
                        feed.name
                    )));
                }
            }
        }
        self.date_threshold()?;
        Ok(())
    }

    /// All enabled feeds, paired with their backend key, in config order.
    pub fn enabled_feeds(&self) -> impl Iterator<Item = (&str, &FeedSource)> {
        self.rss_feeds
            .iter()
            .flat_map(|(backend, feeds)| feeds.iter().map(move |f| (backend.as_str(), f)))
            .filter(|(_, f)| f.enabled)
    }

    /// Parse `global.date_threshold` into a UTC cutoff (midnight of that day).
    pub fn date_threshold(&self) -> Result<Option<DateTime<Utc>>> {
        match &self.global.date_threshold {
            None => Ok(None),
            Some(raw) => {
                let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|e| {
                    NewsreelError::config(format!("invalid date_threshold '{raw}': {e}"))
                })?;
                Ok(Some(date.and_time(NaiveTime::MIN).and_utc()))
            }
        }
    }

    /// Fetch options for a backend key, if it is one we know how to build.
    pub fn backend_options(&self, key: &str) -> Option<&BackendOptions> {
        match key {
            "headless" => Some(&self.scrapers.headless),
            "stealth" => Some(&self.scrapers.stealth),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
global:
  db_path: /tmp/test-newsreel.db
  articles_limit: 25
  date_threshold: "2025-06-01"
  timeout: 10
rss_feeds:
  headless:
    - name: example
      url: https://example.com/feed.xml
    - name: disabled-feed
      url: https://example.com/other.xml
      enabled: false
  stealth:
    - name: hardened
      url: https://hardened.example/rss
scrapers:
  stealth:
    request_delay_ms: 500
"#;

    #[test]
    fn sample_config_parses() {
        let config: IngestConfig = serde_yaml::from_str(SAMPLE).expect("parse");
        assert_eq!(config.global.articles_limit, 25);
        assert_eq!(config.global.timeout, 10);
        assert_eq!(config.rss_feeds["headless"].len(), 2);
        assert_eq!(config.scrapers.stealth.request_delay_ms, 500);
        assert_eq!(config.scrapers.headless.max_retries, 2);
    }

    #[test]
    fn enabled_defaults_to_true() {
        let config: IngestConfig = serde_yaml::from_str(SAMPLE).expect("parse");
        let headless = &config.rss_feeds["headless"];
        assert!(headless[0].enabled);
        assert!(!headless[1].enabled);
    }

    #[test]
    fn enabled_feeds_filters_and_orders() {
        let config: IngestConfig = serde_yaml::from_str(SAMPLE).expect("parse");
        let feeds: Vec<_> = config.enabled_feeds().collect();
        assert_eq!(feeds.len(), 2);
        // BTreeMap order: headless before stealth
        assert_eq!(feeds[0].0, "headless");
        assert_eq!(feeds[0].1.name, "example");
        assert_eq!(feeds[1].0, "stealth");
    }

    #[test]
    fn date_threshold_parses_to_utc_midnight() {
        let config: IngestConfig = serde_yaml::from_str(SAMPLE).expect("parse");
        let cutoff = config.date_threshold().expect("parse").expect("present");
        assert_eq!(cutoff.to_rfc3339(), "2025-06-01T00:00:00+00:00");
    }

    #[test]
    fn empty_url_is_rejected() {
        let bad = r#"
rss_feeds:
  headless:
    - name: broken
      url: ""
"#;
        let config: IngestConfig = serde_yaml::from_str(bad).expect("parse");
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("empty url"));
    }

    #[test]
    fn bad_date_threshold_is_rejected() {
        let bad = r#"
global:
  date_threshold: "June 1st"
"#;
        let config: IngestConfig = serde_yaml::from_str(bad).expect("parse");
        assert!(config.validate().is_err());
    }

    #[test]
    fn defaults_apply_on_empty_config() {
        let config: IngestConfig = serde_yaml::from_str("{}").expect("parse");
        assert_eq!(config.global.db_path, "data/newsreel.db");
        assert_eq!(config.global.articles_limit, 100);
        assert_eq!(config.global.timeout, 30);
        assert!(config.date_threshold().expect("ok").is_none());
        assert_eq!(config.enabled_feeds().count(), 0);
    }

    #[test]
    fn unknown_backend_keys_are_kept() {
        let extra = r#"
rss_feeds:
  selenium:
    - name: legacy
      url: https://example.com/feed
"#;
        let config: IngestConfig = serde_yaml::from_str(extra).expect("parse");
        assert!(config.rss_feeds.contains_key("selenium"));
        assert!(config.backend_options("selenium").is_none());
    }
}
