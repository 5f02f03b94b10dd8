//! The ingestion run: feeds → backend fetch → dedup → stored outcomes.
//!
//! A run moves through three states. It is not started until the operation
//! row exists, running while feeds are processed, and finalized exactly
//! once — on success, after partial failures, and after a fatal storage
//! error alike. Per-article fetch failures are recorded and never abort
//! the run; storage write failures do.

use std::path::Path;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument, warn};
use url::Url;
use uuid::Uuid;

use newsreel_scraper::{BackendRegistry, FetchedPage, ScraperBackend, fetch_feed};
use newsreel_shared::{
    Article, ArticleStatus, FetchError, GlobalConfig, GitMetadata, IngestConfig, NewsreelError,
    Result, RunCounters, RunId, RunStatus,
};
use newsreel_storage::Store;

// ---------------------------------------------------------------------------
// RunSummary
// ---------------------------------------------------------------------------

/// Summary of a completed ingestion run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    /// The run record's identifier.
    pub run_id: RunId,
    /// Terminal status written to the run record.
    pub status: RunStatus,
    /// Attempted/succeeded/failed counters.
    pub counters: RunCounters,
    /// Entries skipped because their URL was already stored.
    pub skipped_duplicates: u64,
    /// Entries skipped because they predate the date threshold.
    pub skipped_old: u64,
    /// Feeds that were fetched and walked.
    pub feeds_processed: u64,
    /// Total duration of the run.
    pub elapsed: Duration,
}

/// Progress callback for reporting run status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called when a feed is about to be processed.
    fn feed_started(&self, name: &str, backend: &str);
    /// Called when an article fetch is attempted.
    fn article_fetched(&self, url: &str, current: usize, limit: usize);
    /// Called when the run completes.
    fn done(&self, summary: &RunSummary);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn feed_started(&self, _name: &str, _backend: &str) {}
    fn article_fetched(&self, _url: &str, _current: usize, _limit: usize) {}
    fn done(&self, _summary: &RunSummary) {}
}

// ---------------------------------------------------------------------------
// Run orchestration
// ---------------------------------------------------------------------------

/// Mutable state threaded through the feed loop.
#[derive(Default)]
struct RunState {
    counters: RunCounters,
    skipped_duplicates: u64,
    skipped_old: u64,
    feeds_processed: u64,
}

/// Run one ingestion pass.
///
/// Provenance is injected by the caller (captured once at startup) rather
/// than looked up here. The operation row is finalized on every exit path;
/// a storage failure inside the loop still produces a `failed` run record
/// before the error propagates.
#[instrument(skip_all, fields(db_path = %config.global.db_path))]
pub async fn run_ingestion(
    config: &IngestConfig,
    config_path: Option<&Path>,
    git: &GitMetadata,
    store: &Store,
    progress: &dyn ProgressReporter,
) -> Result<RunSummary> {
    let start = Instant::now();

    // Resolve everything that can fail before the run record exists.
    let date_threshold = config.date_threshold()?;
    progress.phase("Preparing backends");
    let registry = BackendRegistry::from_config(
        &config.scrapers,
        Duration::from_secs(config.global.timeout),
    )?;

    let parameters = serde_json::json!({
        "articles_limit": config.global.articles_limit,
        "date_threshold": config.global.date_threshold,
        "timeout": config.global.timeout,
        "db_path": config.global.db_path,
        "config_path": config_path.map(|p| p.display().to_string()),
    });

    progress.phase("Starting run");
    let run_id = store
        .insert_operation(git, Some(&parameters.to_string()))
        .await?;

    info!(
        %run_id,
        commit = git.commit.as_deref().unwrap_or("unknown"),
        branch = git.branch.as_deref().unwrap_or("unknown"),
        "ingestion run started"
    );

    let mut state = RunState::default();
    let loop_result = ingest_feeds(
        config,
        &registry,
        store,
        &run_id,
        date_threshold,
        &mut state,
        progress,
    )
    .await;

    let status = match &loop_result {
        Err(e) => {
            warn!(%run_id, error = %e, "run aborted by storage failure");
            RunStatus::Failed
        }
        Ok(()) => {
            if state.counters.failed == 0 {
                RunStatus::Success
            } else if state.counters.succeeded > 0 {
                RunStatus::Partial
            } else {
                RunStatus::Failed
            }
        }
    };

    store
        .finalize_operation(&run_id, &state.counters, status)
        .await?;

    loop_result?;

    let summary = RunSummary {
        run_id,
        status,
        counters: state.counters,
        skipped_duplicates: state.skipped_duplicates,
        skipped_old: state.skipped_old,
        feeds_processed: state.feeds_processed,
        elapsed: start.elapsed(),
    };

    info!(
        run_id = %summary.run_id,
        status = summary.status.as_str(),
        attempted = summary.counters.attempted,
        succeeded = summary.counters.succeeded,
        failed = summary.counters.failed,
        skipped_duplicates = summary.skipped_duplicates,
        skipped_old = summary.skipped_old,
        elapsed_ms = summary.elapsed.as_millis(),
        "ingestion run finished"
    );

    progress.done(&summary);
    Ok(summary)
}

/// Walk every enabled feed until done or the article limit is reached.
///
/// Only storage errors escape; feed-level and article-level fetch failures
/// are logged or recorded and the walk continues.
async fn ingest_feeds(
    config: &IngestConfig,
    registry: &BackendRegistry,
    store: &Store,
    run_id: &RunId,
    date_threshold: Option<DateTime<Utc>>,
    state: &mut RunState,
    progress: &dyn ProgressReporter,
) -> Result<()> {
    let limit = config.global.articles_limit;

    for (backend_key, feed) in config.enabled_feeds() {
        if state.counters.attempted as usize >= limit {
            info!(limit, "article limit reached, stopping run");
            return Ok(());
        }

        let Some(backend) = registry.get(backend_key) else {
            warn!(
                backend = backend_key,
                feed = %feed.name,
                "unknown scraper backend, skipping feed"
            );
            continue;
        };

        progress.feed_started(&feed.name, backend.name());

        let feed_url = match Url::parse(&feed.url) {
            Ok(url) => url,
            Err(e) => {
                warn!(feed = %feed.name, url = %feed.url, error = %e, "invalid feed url, skipping");
                continue;
            }
        };

        let entries = match fetch_feed(backend, &feed_url).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!(feed = %feed.name, error = %e, "feed fetch failed, skipping feed");
                continue;
            }
        };

        state.feeds_processed += 1;
        info!(feed = %feed.name, backend = backend.name(), entries = entries.len(), "feed fetched");

        for entry in entries {
            if state.counters.attempted as usize >= limit {
                info!(limit, "article limit reached, stopping run");
                return Ok(());
            }

            if let (Some(cutoff), Some(published)) = (date_threshold, entry.published) {
                if published < cutoff {
                    debug!(url = %entry.url, published = %published, "entry predates threshold, skipping");
                    state.skipped_old += 1;
                    continue;
                }
            }

            let article_url = match Url::parse(&entry.url) {
                Ok(url) => url,
                Err(e) => {
                    debug!(url = %entry.url, error = %e, "unparseable entry link, skipping");
                    continue;
                }
            };

            // Dedup against every prior run. The store re-checks on insert;
            // this early exit just avoids a pointless fetch.
            if store.article_exists(&entry.url).await? {
                debug!(url = %entry.url, "already stored, skipping");
                state.skipped_duplicates += 1;
                continue;
            }

            let delay = backend.request_delay();
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }

            state.counters.attempted += 1;
            progress.article_fetched(&entry.url, state.counters.attempted as usize, limit);

            let outcome = backend.fetch(&article_url).await;
            let article = build_article(run_id, &feed.url, &entry, outcome, &config.global);
            let is_success = article.status == ArticleStatus::Success;

            match store.insert_article(&article).await {
                Ok(()) => {
                    if is_success {
                        state.counters.succeeded += 1;
                    } else {
                        state.counters.failed += 1;
                        debug!(
                            url = %entry.url,
                            error_kind = article.error_kind.as_deref().unwrap_or(""),
                            "recorded article error"
                        );
                    }
                }
                Err(NewsreelError::DuplicateArticle { url }) => {
                    // Lost a race we cannot normally lose (single writer);
                    // treat it like the pre-fetch dedup check.
                    debug!(%url, "duplicate on insert, skipping");
                    state.counters.attempted -= 1;
                    state.skipped_duplicates += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    Ok(())
}

/// Turn a fetch outcome into the article row to store.
fn build_article(
    run_id: &RunId,
    source_feed: &str,
    entry: &newsreel_scraper::FeedEntry,
    outcome: std::result::Result<FetchedPage, FetchError>,
    global: &GlobalConfig,
) -> Article {
    let base = Article {
        id: Uuid::now_v7().to_string(),
        run_id: run_id.to_string(),
        source_feed: source_feed.to_string(),
        url: entry.url.clone(),
        title: entry.title.clone(),
        published_at: entry.published,
        fetched_at: Utc::now(),
        html_content: None,
        text_content: None,
        content_hash: None,
        status: ArticleStatus::Error,
        error_kind: None,
        error_message: None,
    };

    let page = match outcome {
        Ok(page) => page,
        Err(e) => {
            return Article {
                error_kind: Some(e.kind().to_string()),
                error_message: Some(e.to_string()),
                ..base
            };
        }
    };

    match validate_content(&page, global) {
        Ok(text) => Article {
            content_hash: Some(newsreel_scraper::content_hash(&page.body)),
            html_content: Some(page.body),
            text_content: Some(text),
            status: ArticleStatus::Success,
            ..base
        },
        Err(e) => Article {
            error_kind: Some(e.kind().to_string()),
            error_message: Some(e.to_string()),
            ..base
        },
    }
}

/// Reject fetches that returned a page but not a plausible article.
fn validate_content(page: &FetchedPage, global: &GlobalConfig) -> std::result::Result<String, FetchError> {
    if page.body.len() < global.min_html_len {
        return Err(FetchError::ContentTooShort(format!(
            "{} bytes of HTML (minimum {})",
            page.body.len(),
            global.min_html_len
        )));
    }

    let text = newsreel_scraper::extract_text(&page.body);
    if text.len() < global.min_text_len {
        return Err(FetchError::ContentTooShort(format!(
            "{} chars of text (minimum {})",
            text.len(),
            global.min_text_len
        )));
    }

    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    use newsreel_shared::FeedSource;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn test_store() -> Store {
        let tmp = std::env::temp_dir().join(format!("newsreel_pipeline_{}.db", Uuid::now_v7()));
        Store::open(&tmp).await.expect("open test db")
    }

    /// A config pointing one enabled headless feed at the mock server.
    fn test_config(server_uri: &str) -> IngestConfig {
        let mut config = IngestConfig::default();
        config.global.timeout = 1;
        config.global.min_html_len = 10;
        config.global.min_text_len = 5;
        config.rss_feeds.insert(
            "headless".into(),
            vec![FeedSource {
                name: "test-feed".into(),
                url: format!("{server_uri}/feed.xml"),
                enabled: true,
            }],
        );
        config
    }

    fn rss_with_items(items: &[(&str, &str, &str)]) -> String {
        let body: String = items
            .iter()
            .map(|(title, link, date)| {
                format!(
                    "<item><title>{title}</title><link>{link}</link><pubDate>{date}</pubDate></item>"
                )
            })
            .collect();
        format!(
            r#"<?xml version="1.0"?><rss version="2.0"><channel><title>t</title>{body}</channel></rss>"#
        )
    }

    const RECENT: &str = "Tue, 03 Jun 2025 10:00:00 GMT";

    fn article_page(text: &str) -> String {
        format!("<html><body><main><h1>Title</h1><p>{text}</p></main></body></html>")
    }

    async fn mount_feed(server: &MockServer, xml: String) {
        Mock::given(method("GET"))
            .and(path("/feed.xml"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(xml)
                    .insert_header("content-type", "application/rss+xml"),
            )
            .mount(server)
            .await;
    }

    async fn mount_page(server: &MockServer, page_path: &str, body: String) {
        Mock::given(method("GET"))
            .and(path(page_path))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn mixed_outcomes_are_counted_and_recorded() {
        let server = MockServer::start().await;
        let uri = server.uri();

        // Three entries: one already stored, one that times out, one good.
        let feed = rss_with_items(&[
            ("Known", &format!("{uri}/known"), RECENT),
            ("Slow", &format!("{uri}/slow"), RECENT),
            ("Fresh", &format!("{uri}/fresh"), RECENT),
        ]);
        mount_feed(&server, feed).await;

        Mock::given(method("GET"))
            .and(path("/slow"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(article_page("late"))
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&server)
            .await;
        mount_page(&server, "/fresh", article_page("fresh article text")).await;
        // /known must never be fetched
        Mock::given(method("GET"))
            .and(path("/known"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let store = test_store().await;
        let mut config = test_config(&uri);
        config.scrapers.headless.max_retries = 0;

        // Seed the store with the pre-existing article from an earlier run.
        let seed_run = store
            .insert_operation(&GitMetadata::default(), None)
            .await
            .unwrap();
        let seeded = build_article(
            &seed_run,
            "https://example.com/feed.xml",
            &newsreel_scraper::FeedEntry {
                title: Some("Known".into()),
                url: format!("{uri}/known"),
                published: None,
            },
            Ok(FetchedPage {
                url: format!("{uri}/known"),
                status: 200,
                body: article_page("previously ingested"),
            }),
            &config.global,
        );
        store.insert_article(&seeded).await.unwrap();

        let summary = run_ingestion(
            &config,
            None,
            &GitMetadata::default(),
            &store,
            &SilentProgress,
        )
        .await
        .expect("run");

        assert_eq!(summary.counters.attempted, 2);
        assert_eq!(summary.counters.succeeded, 1);
        assert_eq!(summary.counters.failed, 1);
        assert_eq!(summary.skipped_duplicates, 1);
        assert_eq!(summary.status, RunStatus::Partial);
        assert_eq!(
            summary.counters.succeeded + summary.counters.failed,
            summary.counters.attempted
        );

        let slow = store
            .get_article_by_url(&format!("{uri}/slow"))
            .await
            .unwrap()
            .expect("error row stored");
        assert_eq!(slow.status, ArticleStatus::Error);
        assert_eq!(slow.error_kind.as_deref(), Some("timeout_error"));
        assert!(slow.html_content.is_none());

        let fresh = store
            .get_article_by_url(&format!("{uri}/fresh"))
            .await
            .unwrap()
            .expect("success row stored");
        assert_eq!(fresh.status, ArticleStatus::Success);
        assert!(fresh.text_content.as_deref().unwrap().contains("fresh article text"));
        assert!(fresh.content_hash.is_some());

        // Dedup invariant: three distinct URLs, three rows, no more.
        assert_eq!(store.count_articles().await.unwrap(), 3);

        let op = store.get_operation(&summary.run_id).await.unwrap().unwrap();
        assert_eq!(op.counters, summary.counters);
        assert!(op.finished_at.is_some());
    }

    #[tokio::test]
    async fn disabled_feeds_produce_no_rows() {
        let server = MockServer::start().await;

        // The feed endpoint must never be hit.
        Mock::given(method("GET"))
            .and(path("/feed.xml"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let mut config = test_config(&server.uri());
        config.rss_feeds.get_mut("headless").unwrap()[0].enabled = false;

        let store = test_store().await;
        let summary = run_ingestion(
            &config,
            None,
            &GitMetadata::default(),
            &store,
            &SilentProgress,
        )
        .await
        .expect("run");

        assert_eq!(summary.counters, RunCounters::default());
        assert_eq!(summary.status, RunStatus::Success);
        assert_eq!(store.count_articles().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn rerun_against_unchanged_feed_adds_nothing() {
        let server = MockServer::start().await;
        let uri = server.uri();

        let feed = rss_with_items(&[("Only", &format!("{uri}/only"), RECENT)]);
        mount_feed(&server, feed).await;
        mount_page(&server, "/only", article_page("the only article")).await;

        let store = test_store().await;
        let config = test_config(&uri);
        let git = GitMetadata::default();

        let first = run_ingestion(&config, None, &git, &store, &SilentProgress)
            .await
            .expect("first run");
        assert_eq!(first.counters.succeeded, 1);
        assert_eq!(store.count_articles().await.unwrap(), 1);

        let second = run_ingestion(&config, None, &git, &store, &SilentProgress)
            .await
            .expect("second run");
        assert_eq!(second.counters.attempted, 0);
        assert_eq!(second.skipped_duplicates, 1);
        assert_eq!(second.status, RunStatus::Success);
        assert_eq!(store.count_articles().await.unwrap(), 1);

        // Two finalized run records, one article owned by the first run.
        let ops = store.list_operations().await.unwrap();
        assert_eq!(ops.len(), 2);
        assert_eq!(
            store.count_articles_for_run(&first.run_id).await.unwrap(),
            1
        );
        assert_eq!(
            store.count_articles_for_run(&second.run_id).await.unwrap(),
            0
        );
    }

    #[tokio::test]
    async fn old_entries_produce_no_row_at_all() {
        let server = MockServer::start().await;
        let uri = server.uri();

        let feed = rss_with_items(&[
            ("Stale", &format!("{uri}/stale"), "Wed, 01 Jan 2020 00:00:00 GMT"),
            ("Current", &format!("{uri}/current"), RECENT),
        ]);
        mount_feed(&server, feed).await;
        mount_page(&server, "/current", article_page("current article text")).await;
        Mock::given(method("GET"))
            .and(path("/stale"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let store = test_store().await;
        let mut config = test_config(&uri);
        config.global.date_threshold = Some("2024-01-01".into());

        let summary = run_ingestion(
            &config,
            None,
            &GitMetadata::default(),
            &store,
            &SilentProgress,
        )
        .await
        .expect("run");

        assert_eq!(summary.counters.attempted, 1);
        assert_eq!(summary.skipped_old, 1);
        assert!(store
            .get_article_by_url(&format!("{uri}/stale"))
            .await
            .unwrap()
            .is_none());
        assert_eq!(store.count_articles().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn article_limit_caps_attempts() {
        let server = MockServer::start().await;
        let uri = server.uri();

        let feed = rss_with_items(&[
            ("One", &format!("{uri}/one"), RECENT),
            ("Two", &format!("{uri}/two"), RECENT),
            ("Three", &format!("{uri}/three"), RECENT),
        ]);
        mount_feed(&server, feed).await;
        mount_page(&server, "/one", article_page("article number one")).await;
        mount_page(&server, "/two", article_page("article number two")).await;
        Mock::given(method("GET"))
            .and(path("/three"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let store = test_store().await;
        let mut config = test_config(&uri);
        config.global.articles_limit = 2;

        let summary = run_ingestion(
            &config,
            None,
            &GitMetadata::default(),
            &store,
            &SilentProgress,
        )
        .await
        .expect("run");

        assert_eq!(summary.counters.attempted, 2);
        assert_eq!(store.count_articles().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn unknown_backend_skips_the_feed() {
        let server = MockServer::start().await;

        let mut config = test_config(&server.uri());
        let feeds = config.rss_feeds.remove("headless").unwrap();
        config.rss_feeds.insert("selenium".into(), feeds);

        let store = test_store().await;
        let summary = run_ingestion(
            &config,
            None,
            &GitMetadata::default(),
            &store,
            &SilentProgress,
        )
        .await
        .expect("run");

        assert_eq!(summary.feeds_processed, 0);
        assert_eq!(summary.counters, RunCounters::default());
        assert_eq!(summary.status, RunStatus::Success);
    }

    #[tokio::test]
    async fn thin_pages_are_recorded_as_content_errors() {
        let server = MockServer::start().await;
        let uri = server.uri();

        let feed = rss_with_items(&[("Thin", &format!("{uri}/thin"), RECENT)]);
        mount_feed(&server, feed).await;
        mount_page(&server, "/thin", "<html><body>hi</body></html>".into()).await;

        let store = test_store().await;
        let mut config = test_config(&uri);
        config.global.min_html_len = 200;

        let summary = run_ingestion(
            &config,
            None,
            &GitMetadata::default(),
            &store,
            &SilentProgress,
        )
        .await
        .expect("run");

        assert_eq!(summary.counters.failed, 1);
        assert_eq!(summary.status, RunStatus::Failed);

        let row = store
            .get_article_by_url(&format!("{uri}/thin"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(row.error_kind.as_deref(), Some("content_too_short"));
    }

    #[tokio::test]
    async fn run_record_carries_provenance_and_parameters() {
        let server = MockServer::start().await;
        mount_feed(&server, rss_with_items(&[])).await;

        let store = test_store().await;
        let config = test_config(&server.uri());
        let git = GitMetadata {
            commit: Some("feedc0de".into()),
            branch: Some("main".into()),
            repo: Some("git@example.com:org/newsreel.git".into()),
        };

        let summary = run_ingestion(
            &config,
            Some(Path::new("config/scraping.yaml")),
            &git,
            &store,
            &SilentProgress,
        )
        .await
        .expect("run");

        let op = store.get_operation(&summary.run_id).await.unwrap().unwrap();
        assert_eq!(op.git.commit.as_deref(), Some("feedc0de"));
        assert_eq!(op.git.branch.as_deref(), Some("main"));
        let params = op.parameters_json.expect("parameters recorded");
        assert!(params.contains("scraping.yaml"));
        assert!(params.contains("articles_limit"));
    }

    #[test]
    fn validate_content_thresholds() {
        let global = GlobalConfig {
            min_html_len: 10,
            min_text_len: 5,
            ..GlobalConfig::default()
        };

        let thin = FetchedPage {
            url: "https://example.com/a".into(),
            status: 200,
            body: "<p>x</p>".into(),
        };
        assert!(matches!(
            validate_content(&thin, &global),
            Err(FetchError::ContentTooShort(_))
        ));

        let fine = FetchedPage {
            url: "https://example.com/b".into(),
            status: 200,
            body: "<html><body><main><p>plenty of article text here</p></main></body></html>"
                .into(),
        };
        let text = validate_content(&fine, &global).expect("valid");
        assert!(text.contains("plenty of article text"));
    }
}
