//! Plain headless backend: a straightforward HTTP fetcher that identifies
//! itself as newsreel.

use std::time::Duration;

use reqwest::Client;
use reqwest::header::HeaderMap;
use url::Url;

use newsreel_shared::{BackendOptions, FetchError, Result};

use super::{FetchedPage, ScraperBackend, build_client, http_fetch};

/// Default User-Agent for the plain backend.
const USER_AGENT: &str = concat!("newsreel/", env!("CARGO_PKG_VERSION"));

/// The default fetch variant for feeds that do not need anti-detection
/// measures.
pub struct HeadlessBackend {
    client: Client,
    max_retries: u32,
    request_delay: Duration,
}

impl HeadlessBackend {
    /// Build the backend from its configuration block.
    pub fn new(options: &BackendOptions, timeout: Duration) -> Result<Self> {
        let user_agent = options.user_agent.as_deref().unwrap_or(USER_AGENT);
        let client = build_client(user_agent, HeaderMap::new(), timeout)?;

        Ok(Self {
            client,
            max_retries: options.max_retries,
            request_delay: Duration::from_millis(options.request_delay_ms),
        })
    }
}

#[async_trait::async_trait]
impl ScraperBackend for HeadlessBackend {
    async fn fetch(&self, url: &Url) -> std::result::Result<FetchedPage, FetchError> {
        http_fetch(&self.client, url, self.max_retries).await
    }

    fn name(&self) -> &'static str {
        "headless"
    }

    fn request_delay(&self) -> Duration {
        self.request_delay
    }
}
