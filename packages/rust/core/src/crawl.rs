//! Crawl orchestration: sitemap first, DOM crawl as fallback.

use std::time::Instant;

use docgate_crawler::DomCrawler;
use docgate_discovery::{SitemapDiscovery, SitemapOptions};
use docgate_shared::{CrawlConfig, CrawlOutcome, DiscoveryMethod, PageMetadata, urls};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::progress::ProgressReporter;

/// Discover the pages of the documentation site at `raw_url`.
///
/// A scheme-less input gets `https://`. Never fails: problems are recorded
/// in [`CrawlOutcome::errors`] and callers check whether any pages came back.
#[instrument(skip_all, fields(url = %raw_url))]
pub async fn crawl_site(
    raw_url: &str,
    config: &CrawlConfig,
    progress: &dyn ProgressReporter,
    cancel: Option<&CancellationToken>,
) -> CrawlOutcome {
    let start = Instant::now();
    let base_url = urls::ensure_scheme(raw_url);
    let mut errors = Vec::new();

    let finish = |method, pages: Vec<PageMetadata>, errors: Vec<String>| {
        let outcome = CrawlOutcome {
            base_url: base_url.clone(),
            method,
            total_found: pages.len(),
            pages,
            errors,
            duration_ms: start.elapsed().as_millis() as u64,
        };
        info!(
            method = %outcome.method,
            pages = outcome.total_found,
            errors = outcome.errors.len(),
            duration_ms = outcome.duration_ms,
            "crawl complete"
        );
        outcome
    };

    let base = match Url::parse(&base_url) {
        Ok(base) => base,
        Err(e) => {
            errors.push(format!("Invalid base URL {base_url}: {e}"));
            return finish(DiscoveryMethod::DomParsing, Vec::new(), errors);
        }
    };

    match docgate_discovery::discover(&base, &SitemapOptions::from(config)).await {
        Ok(SitemapDiscovery::Found { sitemap_url, pages }) => {
            debug!(%sitemap_url, "using sitemap");
            progress.pages_found(pages.len());
            return finish(DiscoveryMethod::Sitemap, pages, errors);
        }
        Ok(SitemapDiscovery::NotFound) => debug!("no usable sitemap, falling back to DOM crawl"),
        Err(e) => {
            warn!(error = %e, "sitemap discovery failed");
            errors.push(format!("Sitemap crawl failed: {e}"));
        }
    }

    let crawler = match DomCrawler::new(config.clone()) {
        Ok(crawler) => crawler,
        Err(e) => {
            errors.push(format!("DOM crawl failed: {e}"));
            return finish(DiscoveryMethod::DomParsing, Vec::new(), errors);
        }
    };
    let crawler = match cancel {
        Some(token) => crawler.with_cancellation(token.clone()),
        None => crawler,
    };

    let result = crawler
        .crawl(&base, &|count| progress.pages_found(count))
        .await;
    errors.extend(result.errors);

    finish(DiscoveryMethod::DomParsing, result.pages, errors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use docgate_shared::ScoredPage;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::progress::{BatchProgress, SilentProgress};

    #[derive(Default)]
    struct CountRecorder(Mutex<Vec<usize>>);

    impl ProgressReporter for CountRecorder {
        fn pages_found(&self, count: usize) {
            self.0.lock().unwrap().push(count);
        }
        fn batch_scored(&self, _scored: usize, _total: usize) {}
        fn realtime_result(&self, _page: &ScoredPage, _progress: BatchProgress) {}
    }

    fn config() -> CrawlConfig {
        CrawlConfig {
            request_delay_ms: 0,
            timeout_secs: 5,
            ..CrawlConfig::default()
        }
    }

    #[tokio::test]
    async fn prefers_sitemap() {
        let server = MockServer::start().await;
        let base = server.uri();
        let sitemap = format!(
            r#"<urlset><url><loc>{base}/docs/a</loc></url><url><loc>{base}/docs/b</loc></url></urlset>"#
        );
        Mock::given(method("GET"))
            .and(path("/sitemap.xml"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(sitemap, "application/xml"))
            .mount(&server)
            .await;
        // the home page must never be crawled
        Mock::given(path("/"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let recorder = CountRecorder::default();
        let outcome = crawl_site(&base, &config(), &recorder, None).await;

        assert_eq!(outcome.method, DiscoveryMethod::Sitemap);
        assert_eq!(outcome.total_found, 2);
        assert!(outcome.errors.is_empty());
        assert_eq!(*recorder.0.lock().unwrap(), vec![2]);
    }

    #[tokio::test]
    async fn falls_back_to_dom_crawl() {
        let server = MockServer::start().await;
        // sitemap exists but only lists an asset and a foreign page
        let sitemap = r#"<urlset>
            <url><loc>https://cdn.other.org/app.js</loc></url>
            <url><loc>https://other.org/page</loc></url>
        </urlset>"#;
        Mock::given(path("/sitemap.xml"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(sitemap, "application/xml"))
            .mount(&server)
            .await;
        Mock::given(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(
                r#"<html><head><title>Home</title></head><body><nav><a href="/guide">Guide</a></nav></body></html>"#,
                "text/html",
            ))
            .mount(&server)
            .await;
        Mock::given(path("/guide"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(
                "<html><head><title>Guide</title></head><body></body></html>",
                "text/html",
            ))
            .mount(&server)
            .await;

        let recorder = CountRecorder::default();
        let outcome = crawl_site(&server.uri(), &config(), &recorder, None).await;

        assert_eq!(outcome.method, DiscoveryMethod::DomParsing);
        assert_eq!(outcome.total_found, 2);
        assert_eq!(*recorder.0.lock().unwrap(), vec![1, 2]);
    }

    #[tokio::test]
    async fn unreachable_site_yields_empty_outcome() {
        let outcome = crawl_site("http://127.0.0.1:9", &config(), &SilentProgress, None).await;

        assert_eq!(outcome.method, DiscoveryMethod::DomParsing);
        assert!(outcome.pages.is_empty());
        assert_eq!(outcome.errors.len(), 1);
    }

    #[tokio::test]
    async fn adds_missing_scheme() {
        let outcome = crawl_site("127.0.0.1:9", &config(), &SilentProgress, None).await;
        assert_eq!(outcome.base_url, "https://127.0.0.1:9");
    }
}
