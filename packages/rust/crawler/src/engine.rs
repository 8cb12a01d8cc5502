//! Breadth-first DOM crawler.
//!
//! Starting from the base URL, each level is fetched by a bounded pool of
//! workers pulling from a shared queue. Links discovered on a level form
//! the next level's frontier. The crawl stops at `max_depth` levels,
//! `max_urls` collected pages, an empty frontier, or cancellation.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use docgate_shared::{CrawlConfig, DocGateError, PageMetadata, Result, urls};
use reqwest::Client;
use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::extract;

/// User-Agent string for crawl requests.
const USER_AGENT: &str = concat!("DocGate/", env!("CARGO_PKG_VERSION"));

const MAX_REDIRECTS: usize = 5;

/// Content types worth parsing for links.
const ACCEPTED_CONTENT_TYPES: &[&str] = &["text/html", "text/plain"];

// ---------------------------------------------------------------------------
// DomCrawlResult
// ---------------------------------------------------------------------------

/// Pages and non-fatal errors from one DOM crawl.
#[derive(Debug, Clone, Default)]
pub struct DomCrawlResult {
    /// Collected pages in discovery order, at most `max_urls`.
    pub pages: Vec<PageMetadata>,
    /// `"{url}: {reason}"` for every fetch that failed.
    pub errors: Vec<String>,
    /// Levels actually fetched.
    pub levels: u32,
}

/// What a worker reports back for one URL.
#[derive(Debug)]
enum FetchOutcome {
    Page {
        meta: PageMetadata,
        links: Vec<String>,
    },
    Failed {
        url: String,
        error: String,
    },
}

// ---------------------------------------------------------------------------
// DomCrawler
// ---------------------------------------------------------------------------

/// Level-by-level crawler with a bounded worker pool.
pub struct DomCrawler {
    config: CrawlConfig,
    client: Client,
    cancel: Option<CancellationToken>,
}

impl DomCrawler {
    pub fn new(config: CrawlConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| DocGateError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            config,
            client,
            cancel: None,
        })
    }

    /// Stop between levels (and before each new fetch) once `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|t| t.is_cancelled())
    }

    /// Crawl from `base`. `on_found` is called with the running page count
    /// after every newly collected page.
    ///
    /// Never fails: fetch errors are recorded in the result and the page
    /// is skipped.
    #[instrument(skip_all, fields(base = %base))]
    pub async fn crawl(
        &self,
        base: &Url,
        on_found: &(dyn Fn(usize) + Send + Sync),
    ) -> DomCrawlResult {
        let base_str = base.as_str();
        let max_urls = self.config.max_urls;
        let seed = urls::normalize(base_str, base_str).unwrap_or_else(|| base_str.to_string());

        let mut visited: HashSet<String> = HashSet::new();
        let mut collected: HashSet<String> = HashSet::new();
        let mut result = DomCrawlResult::default();
        let mut frontier = vec![seed];

        info!(
            max_depth = self.config.max_depth,
            max_urls,
            max_concurrent = self.config.max_concurrent,
            "starting DOM crawl"
        );

        while !frontier.is_empty() && result.levels < self.config.max_depth {
            if self.is_cancelled() {
                debug!(level = result.levels, "crawl cancelled");
                break;
            }

            let level: Vec<String> = frontier
                .into_iter()
                .filter(|url| {
                    result.pages.len() < max_urls && visited.insert(url.clone())
                })
                .collect();
            if level.is_empty() {
                break;
            }

            debug!(level = result.levels, urls = level.len(), "fetching level");

            let mut next: Vec<String> = Vec::new();
            let mut queued: HashSet<String> = HashSet::new();
            let mut rx = self.spawn_workers(level, base_str);

            while let Some(outcome) = rx.recv().await {
                match outcome {
                    FetchOutcome::Page { meta, links } => {
                        if result.pages.len() < max_urls && collected.insert(meta.url.clone()) {
                            result.pages.push(meta);
                            on_found(result.pages.len());
                        }

                        for link in links {
                            if result.pages.len() + next.len() >= max_urls {
                                break;
                            }
                            if visited.contains(&link) || collected.contains(&link) {
                                continue;
                            }
                            if queued.insert(link.clone()) {
                                next.push(link);
                            }
                        }
                    }
                    FetchOutcome::Failed { url, error } => {
                        warn!(%url, %error, "page fetch failed");
                        result.errors.push(format!("{url}: {error}"));
                    }
                }
            }

            result.levels += 1;
            frontier = next;

            let more_levels = result.levels < self.config.max_depth;
            if more_levels && !frontier.is_empty() && self.config.request_delay_ms > 0 {
                tokio::time::sleep(Duration::from_millis(self.config.request_delay_ms)).await;
            }
        }

        info!(
            pages = result.pages.len(),
            errors = result.errors.len(),
            levels = result.levels,
            "DOM crawl completed"
        );

        result
    }

    /// Start up to `max_concurrent` workers draining `urls`; outcomes arrive on
    /// the returned channel, which closes when every worker has finished.
    fn spawn_workers(&self, urls: Vec<String>, base: &str) -> mpsc::Receiver<FetchOutcome> {
        let workers = self.config.max_concurrent.max(1).min(urls.len());
        let queue = Arc::new(Mutex::new(VecDeque::from(urls)));
        let (tx, rx) = mpsc::channel(workers * 2);

        for _ in 0..workers {
            let queue = Arc::clone(&queue);
            let tx = tx.clone();
            let client = self.client.clone();
            let base = base.to_string();
            let cancel = self.cancel.clone();

            tokio::spawn(async move {
                loop {
                    if cancel.as_ref().is_some_and(|t| t.is_cancelled()) {
                        break;
                    }
                    let next = queue.lock().await.pop_front();
                    let Some(url) = next else { break };

                    let outcome = fetch_page(&client, &url, &base).await;
                    if tx.send(outcome).await.is_err() {
                        break;
                    }
                }
            });
        }

        rx
    }
}

// ---------------------------------------------------------------------------
// Page fetching
// ---------------------------------------------------------------------------

async fn fetch_page(client: &Client, url: &str, base: &str) -> FetchOutcome {
    match fetch_html(client, url).await {
        Ok((final_url, body)) => {
            // relative links resolve against where any redirects ended up
            let parsed = extract::parse_page(&body, &final_url, base);
            FetchOutcome::Page {
                meta: PageMetadata {
                    url: url.to_string(),
                    title: parsed.title,
                    description: parsed.description,
                    path: urls::path_of(url),
                    section: urls::extract_section(url),
                },
                links: parsed.links,
            }
        }
        Err(e) => FetchOutcome::Failed {
            url: url.to_string(),
            error: e.to_string(),
        },
    }
}

/// GET a page, rejecting non-2xx and non-HTML responses.
///
/// Returns the URL reached after redirects together with the body.
async fn fetch_html(client: &Client, url: &str) -> Result<(String, String)> {
    debug!(%url, "fetching page");

    let response = client
        .get(url)
        .header(reqwest::header::ACCEPT, "text/html, */*")
        .send()
        .await
        .map_err(|e| DocGateError::Network(format!("{url}: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        return Err(DocGateError::Network(format!("{url}: HTTP {status}")));
    }

    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_ascii_lowercase();
    if !ACCEPTED_CONTENT_TYPES
        .iter()
        .any(|accepted| content_type.contains(accepted))
    {
        return Err(DocGateError::Network(format!(
            "{url}: unsupported content type '{content_type}'"
        )));
    }

    let final_url = response.url().to_string();
    let body = response
        .text()
        .await
        .map_err(|e| DocGateError::Network(format!("{url}: body read failed: {e}")))?;
    Ok((final_url, body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(max_depth: u32, max_urls: usize) -> CrawlConfig {
        CrawlConfig {
            max_urls,
            max_depth,
            max_concurrent: 3,
            request_delay_ms: 0,
            timeout_secs: 5,
        }
    }

    fn html_page(title: &str, nav_links: &[&str]) -> String {
        let anchors: String = nav_links
            .iter()
            .map(|href| format!(r#"<a href="{href}">{href}</a>"#))
            .collect();
        format!(
            r#"<html><head><title>{title}</title>
<meta name="description" content="About {title}"></head>
<body><nav>{anchors}</nav><main><a href="/outside-nav">Ignored</a></main></body></html>"#
        )
    }

    async fn mount_html(server: &MockServer, route: &str, body: String) {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/html; charset=utf-8"))
            .mount(server)
            .await;
    }

    fn no_progress() -> impl Fn(usize) + Send + Sync {
        |_| {}
    }

    #[tokio::test]
    async fn crawls_two_levels_through_navigation() {
        let server = MockServer::start().await;
        mount_html(&server, "/", html_page("Home", &["/docs/a", "/docs/b"])).await;
        mount_html(&server, "/docs/a", html_page("A", &["/docs/c"])).await;
        mount_html(&server, "/docs/b", html_page("B", &["/docs/a"])).await;
        // third level, never fetched at max_depth 2
        Mock::given(path("/docs/c"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let crawler = DomCrawler::new(test_config(2, 50)).unwrap();
        let base = Url::parse(&server.uri()).unwrap();
        let result = crawler.crawl(&base, &no_progress()).await;

        let urls: Vec<&str> = result.pages.iter().map(|p| p.url.as_str()).collect();
        assert_eq!(urls.len(), 3);
        assert!(urls.contains(&format!("{}/docs/a", server.uri()).as_str()));
        assert!(urls.contains(&format!("{}/docs/b", server.uri()).as_str()));
        assert_eq!(result.levels, 2);
        assert!(result.errors.is_empty());

        let a = result
            .pages
            .iter()
            .find(|p| p.url.ends_with("/docs/a"))
            .unwrap();
        assert_eq!(a.title, "A");
        assert_eq!(a.description, "About A");
        assert_eq!(a.path, "/docs/a");
        assert_eq!(a.section, "docs");
    }

    #[tokio::test]
    async fn respects_max_urls() {
        let server = MockServer::start().await;
        let links: Vec<String> = (0..10).map(|i| format!("/docs/p{i}")).collect();
        let refs: Vec<&str> = links.iter().map(String::as_str).collect();
        mount_html(&server, "/", html_page("Home", &refs)).await;
        for link in &links {
            mount_html(&server, link, html_page(link, &[])).await;
        }

        let crawler = DomCrawler::new(test_config(2, 4)).unwrap();
        let base = Url::parse(&server.uri()).unwrap();
        let result = crawler.crawl(&base, &no_progress()).await;

        assert_eq!(result.pages.len(), 4);
    }

    #[tokio::test]
    async fn records_failures_and_skips_non_html() {
        let server = MockServer::start().await;
        mount_html(&server, "/", html_page("Home", &["/broken", "/binary"])).await;
        Mock::given(path("/broken"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        Mock::given(path("/binary"))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw(vec![0u8, 1, 2], "application/octet-stream"),
            )
            .mount(&server)
            .await;

        let crawler = DomCrawler::new(test_config(2, 50)).unwrap();
        let base = Url::parse(&server.uri()).unwrap();
        let result = crawler.crawl(&base, &no_progress()).await;

        assert_eq!(result.pages.len(), 1);
        assert_eq!(result.errors.len(), 2);
        assert!(result.errors.iter().any(|e| e.contains("/broken") && e.contains("500")));
        assert!(result.errors.iter().any(|e| e.contains("unsupported content type")));
    }

    #[tokio::test]
    async fn never_refetches_a_url() {
        let server = MockServer::start().await;
        for (route, links) in [
            ("/", vec!["/x", "/y"]),
            ("/x", vec!["/", "/y"]),
            ("/y", vec!["/x", "/"]),
        ] {
            Mock::given(method("GET"))
                .and(path(route))
                .respond_with(
                    ResponseTemplate::new(200).set_body_raw(html_page(route, &links), "text/html"),
                )
                .expect(1)
                .mount(&server)
                .await;
        }

        let crawler = DomCrawler::new(test_config(4, 50)).unwrap();
        let base = Url::parse(&server.uri()).unwrap();
        let result = crawler.crawl(&base, &no_progress()).await;

        assert_eq!(result.pages.len(), 3);
    }

    #[tokio::test]
    async fn reports_running_count() {
        let server = MockServer::start().await;
        mount_html(&server, "/", html_page("Home", &["/a", "/b"])).await;
        mount_html(&server, "/a", html_page("A", &[])).await;
        mount_html(&server, "/b", html_page("B", &[])).await;

        let calls = AtomicUsize::new(0);
        let last = AtomicUsize::new(0);
        let on_found = |count: usize| {
            calls.fetch_add(1, Ordering::SeqCst);
            last.store(count, Ordering::SeqCst);
        };

        let crawler = DomCrawler::new(test_config(2, 50)).unwrap();
        let base = Url::parse(&server.uri()).unwrap();
        let result = crawler.crawl(&base, &on_found).await;

        assert_eq!(result.pages.len(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(last.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn cancelled_before_start_fetches_nothing() {
        let server = MockServer::start().await;
        Mock::given(path("/"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let token = CancellationToken::new();
        token.cancel();
        let crawler = DomCrawler::new(test_config(2, 50))
            .unwrap()
            .with_cancellation(token);
        let base = Url::parse(&server.uri()).unwrap();
        let result = crawler.crawl(&base, &no_progress()).await;

        assert!(result.pages.is_empty());
        assert_eq!(result.levels, 0);
    }

    #[tokio::test]
    async fn relative_links_resolve_against_redirect_target() {
        let server = MockServer::start().await;
        mount_html(&server, "/", html_page("Home", &["/guide"])).await;
        Mock::given(method("GET"))
            .and(path("/guide"))
            .respond_with(ResponseTemplate::new(301).insert_header("Location", "/guide/"))
            .mount(&server)
            .await;
        mount_html(&server, "/guide/", html_page("Guide", &["install"])).await;
        mount_html(&server, "/guide/install", html_page("Install", &[])).await;

        let crawler = DomCrawler::new(test_config(3, 50)).unwrap();
        let base = Url::parse(&server.uri()).unwrap();
        let result = crawler.crawl(&base, &no_progress()).await;

        assert!(result.errors.is_empty(), "{:?}", result.errors);
        let urls: Vec<&str> = result.pages.iter().map(|p| p.url.as_str()).collect();
        assert!(urls.iter().any(|u| u.ends_with("/guide/install")), "{urls:?}");
        assert!(!urls.iter().any(|u| u.ends_with("/install") && !u.ends_with("/guide/install")));
    }
}
