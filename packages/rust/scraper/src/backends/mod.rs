//! Scraper backend trait and built-in fetch variants.
//!
//! Every backend satisfies the same contract: given a URL, return the page
//! body or a typed [`FetchError`]. The two variants differ only in fetch
//! configuration — the plain [`HeadlessBackend`] identifies itself as
//! newsreel, while the [`StealthBackend`] presents a desktop browser
//! profile for sites that block obvious automation.

mod headless;
mod stealth;

use std::time::Duration;

use reqwest::Client;
use tracing::debug;
use url::Url;

use newsreel_shared::{FetchError, NewsreelError, Result, ScrapersConfig};

pub use headless::HeadlessBackend;
pub use stealth::StealthBackend;

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// A successfully fetched page.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// Final URL after redirects.
    pub url: String,
    /// HTTP status code of the final response.
    pub status: u16,
    /// Raw response body.
    pub body: String,
}

/// The fetch contract every scraper backend satisfies.
///
/// Backends are selected per feed by the configuration group the feed
/// belongs to. Failures are data, not control flow: the run loop records
/// them and continues.
#[async_trait::async_trait]
pub trait ScraperBackend: Send + Sync {
    /// Fetch a URL, returning the page body or a typed failure.
    async fn fetch(&self, url: &Url) -> std::result::Result<FetchedPage, FetchError>;

    /// Configuration key and log name for this backend.
    fn name(&self) -> &'static str;

    /// Politeness delay between consecutive fetches.
    fn request_delay(&self) -> Duration;
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Holds the configured backends, addressable by configuration key.
pub struct BackendRegistry {
    backends: Vec<Box<dyn ScraperBackend>>,
}

impl BackendRegistry {
    /// Build both built-in backends from the `scrapers` config section.
    pub fn from_config(config: &ScrapersConfig, timeout: Duration) -> Result<Self> {
        Ok(Self {
            backends: vec![
                Box::new(HeadlessBackend::new(&config.headless, timeout)?),
                Box::new(StealthBackend::new(&config.stealth, timeout)?),
            ],
        })
    }

    /// Look up a backend by its configuration key.
    ///
    /// Returns `None` for unknown keys; the caller decides whether that
    /// skips a feed or is an error.
    pub fn get(&self, key: &str) -> Option<&dyn ScraperBackend> {
        self.backends
            .iter()
            .find(|b| b.name() == key)
            .map(|b| b.as_ref())
    }
}

// ---------------------------------------------------------------------------
// Shared fetch plumbing
// ---------------------------------------------------------------------------

/// Build an HTTP client with the policy shared by all backends.
pub(crate) fn build_client(
    user_agent: &str,
    extra_headers: reqwest::header::HeaderMap,
    timeout: Duration,
) -> Result<Client> {
    Client::builder()
        .user_agent(user_agent)
        .default_headers(extra_headers)
        .redirect(reqwest::redirect::Policy::limited(5))
        .timeout(timeout)
        .connect_timeout(timeout.min(Duration::from_secs(10)))
        .build()
        .map_err(|e| NewsreelError::config(format!("failed to build HTTP client: {e}")))
}

/// Perform a GET with retry on transient failures.
///
/// Connection failures and 5xx responses are retried up to `max_retries`
/// times; timeouts and 4xx responses are not (matching which failures are
/// plausibly transient).
pub(crate) async fn http_fetch(
    client: &Client,
    url: &Url,
    max_retries: u32,
) -> std::result::Result<FetchedPage, FetchError> {
    let mut attempt = 0;
    loop {
        match try_fetch(client, url).await {
            Ok(page) => return Ok(page),
            Err(e) if attempt < max_retries && is_retryable(&e) => {
                attempt += 1;
                debug!(%url, attempt, error = %e, "retrying fetch");
                tokio::time::sleep(Duration::from_millis(250 * u64::from(attempt))).await;
            }
            Err(e) => return Err(e),
        }
    }
}

fn is_retryable(err: &FetchError) -> bool {
    match err {
        FetchError::Connection(_) => true,
        FetchError::HttpStatus { status } => *status >= 500,
        _ => false,
    }
}

async fn try_fetch(client: &Client, url: &Url) -> std::result::Result<FetchedPage, FetchError> {
    let response = client
        .get(url.as_str())
        .send()
        .await
        .map_err(|e| classify_reqwest_error(url, &e))?;

    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::HttpStatus {
            status: status.as_u16(),
        });
    }

    let final_url = response.url().to_string();
    let body = response.text().await.map_err(|e| {
        if e.is_timeout() {
            FetchError::Timeout(format!("{url}: body read timed out"))
        } else {
            FetchError::Connection(format!("{url}: body read failed: {e}"))
        }
    })?;

    Ok(FetchedPage {
        url: final_url,
        status: status.as_u16(),
        body,
    })
}

fn classify_reqwest_error(url: &Url, err: &reqwest::Error) -> FetchError {
    if err.is_timeout() {
        FetchError::Timeout(format!("{url}: request timed out"))
    } else {
        FetchError::Connection(format!("{url}: {err}"))
    }
}
