//! Stealth backend: fetches with a desktop browser profile to reduce
//! fingerprinting by sites that block obvious automation.

use std::time::Duration;

use reqwest::Client;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, HeaderMap, HeaderValue};
use url::Url;

use newsreel_shared::{BackendOptions, FetchError, NewsreelError, Result};

use super::{FetchedPage, ScraperBackend, build_client, http_fetch};

/// Desktop Chrome profile presented by default.
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

const ACCEPT_VALUE: &str =
    "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8";

const DEFAULT_ACCEPT_LANGUAGE: &str = "en-US,en;q=0.9";

/// Fetch variant for feeds whose sites reject non-browser clients.
pub struct StealthBackend {
    client: Client,
    max_retries: u32,
    request_delay: Duration,
}

impl StealthBackend {
    /// Build the backend from its configuration block.
    pub fn new(options: &BackendOptions, timeout: Duration) -> Result<Self> {
        let user_agent = options.user_agent.as_deref().unwrap_or(USER_AGENT);

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_VALUE));
        let accept_language = options
            .accept_language
            .as_deref()
            .unwrap_or(DEFAULT_ACCEPT_LANGUAGE);
        headers.insert(
            ACCEPT_LANGUAGE,
            HeaderValue::from_str(accept_language).map_err(|e| {
                NewsreelError::config(format!("invalid accept_language '{accept_language}': {e}"))
            })?,
        );

        let client = build_client(user_agent, headers, timeout)?;

        Ok(Self {
            client,
            max_retries: options.max_retries,
            request_delay: Duration::from_millis(options.request_delay_ms),
        })
    }
}

#[async_trait::async_trait]
impl ScraperBackend for StealthBackend {
    async fn fetch(&self, url: &Url) -> std::result::Result<FetchedPage, FetchError> {
        http_fetch(&self.client, url, self.max_retries).await
    }

    fn name(&self) -> &'static str {
        "stealth"
    }

    fn request_delay(&self) -> Duration {
        self.request_delay
    }
}
