//! Sitemap discovery.
//!
//! Before crawling a site, DocGate checks the standard sitemap locations.
//! A sitemap (or a tree of sitemap indexes) lists a site's pages without
//! fetching any of them, which is faster and more respectful than a crawl.

mod parser;

use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use docgate_shared::{CrawlConfig, DocGateError, PageMetadata, Result, urls};
use reqwest::Client;
use tracing::{debug, info, instrument, warn};
use url::Url;

pub use parser::SitemapDocument;

/// Locations probed in order.
pub const SITEMAP_PATHS: &[&str] = &["/sitemap.xml", "/sitemap-index.xml", "/sitemap_index.xml"];

/// Maximum nesting of sitemap indexes (guards against cycles).
const MAX_INDEX_DEPTH: u8 = 3;

/// Maximum number of redirects to follow when fetching a sitemap.
const MAX_REDIRECTS: usize = 3;

/// User-Agent string for discovery requests.
const USER_AGENT: &str = concat!("DocGate/", env!("CARGO_PKG_VERSION"));

// ---------------------------------------------------------------------------
// SitemapDiscovery
// ---------------------------------------------------------------------------

/// Outcome of sitemap discovery.
#[derive(Debug, Clone)]
pub enum SitemapDiscovery {
    /// A sitemap was found and yielded at least one usable page.
    Found {
        /// The root sitemap that was resolved.
        sitemap_url: String,
        /// Filtered, normalized, deduplicated pages.
        pages: Vec<PageMetadata>,
    },
    /// No sitemap, or no page survived filtering; caller should fall back to crawling.
    NotFound,
}

// ---------------------------------------------------------------------------
// Discovery options
// ---------------------------------------------------------------------------

/// Configuration for sitemap discovery.
#[derive(Debug, Clone)]
pub struct SitemapOptions {
    /// Timeout for each sitemap fetch in seconds.
    pub timeout_secs: u64,
    /// Cap on returned pages.
    pub max_urls: usize,
}

impl Default for SitemapOptions {
    fn default() -> Self {
        Self::from(&CrawlConfig::default())
    }
}

impl From<&CrawlConfig> for SitemapOptions {
    fn from(config: &CrawlConfig) -> Self {
        Self {
            timeout_secs: config.timeout_secs,
            max_urls: config.max_urls,
        }
    }
}

// ---------------------------------------------------------------------------
// Main entry point
// ---------------------------------------------------------------------------

/// Discover and resolve the sitemap for `base`.
///
/// Probes [`SITEMAP_PATHS`] in order and resolves the first valid document,
/// following sitemap indexes sequentially. A timeout or non-2xx response at
/// any location counts as "not there", never as an error.
#[instrument(skip_all, fields(base = %base))]
pub async fn discover(base: &Url, opts: &SitemapOptions) -> Result<SitemapDiscovery> {
    let resolver = SitemapResolver::new(opts)?;

    let Some((sitemap_url, document)) = resolver.find_root(base).await else {
        debug!("no sitemap at any standard location");
        return Ok(SitemapDiscovery::NotFound);
    };

    let mut raw_urls = Vec::new();
    resolver.collect_locs(document, 0, &mut raw_urls).await;

    let pages = filter_pages(&raw_urls, base.as_str(), opts.max_urls);

    info!(
        %sitemap_url,
        raw = raw_urls.len(),
        pages = pages.len(),
        "sitemap resolved"
    );

    if pages.is_empty() {
        return Ok(SitemapDiscovery::NotFound);
    }

    Ok(SitemapDiscovery::Found { sitemap_url, pages })
}

// ---------------------------------------------------------------------------
// Resolver
// ---------------------------------------------------------------------------

struct SitemapResolver {
    client: Client,
    max_urls: usize,
}

impl SitemapResolver {
    fn new(opts: &SitemapOptions) -> Result<Self> {
        Ok(Self {
            client: build_client(opts)?,
            max_urls: opts.max_urls,
        })
    }

    /// Return the first standard location holding a valid sitemap.
    async fn find_root(&self, base: &Url) -> Option<(String, SitemapDocument)> {
        for path in SITEMAP_PATHS {
            let Ok(candidate) = base.join(path) else {
                continue;
            };
            if let Some(document) = self.fetch_document(candidate.as_str()).await {
                return Some((candidate.to_string(), document));
            }
        }
        None
    }

    /// Flatten a document into raw `<loc>` URLs, fetching index children one by one.
    fn collect_locs<'a>(
        &'a self,
        document: SitemapDocument,
        depth: u8,
        out: &'a mut Vec<String>,
    ) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>> {
        Box::pin(async move {
            if depth > MAX_INDEX_DEPTH {
                warn!(depth, "sitemap index nesting too deep, skipping");
                return;
            }

            match document {
                SitemapDocument::UrlSet(locs) => out.extend(locs),
                SitemapDocument::Index(children) => {
                    debug!(children = children.len(), depth, "resolving sitemap index");
                    for child in children {
                        if out.len() >= self.max_urls {
                            break;
                        }
                        if let Some(child_doc) = self.fetch_document(&child).await {
                            self.collect_locs(child_doc, depth + 1, out).await;
                        }
                    }
                }
            }
        })
    }

    /// Fetch and parse one sitemap. Any failure yields `None`.
    async fn fetch_document(&self, url: &str) -> Option<SitemapDocument> {
        let body = match fetch_text(&self.client, url).await {
            Ok(body) => body,
            Err(e) => {
                debug!(%url, error = %e, "sitemap not available");
                return None;
            }
        };

        match parser::parse_sitemap(&body) {
            Ok(Some(document)) => Some(document),
            Ok(None) => {
                debug!(%url, "response is not a sitemap");
                None
            }
            Err(e) => {
                debug!(%url, error = %e, "invalid sitemap XML");
                None
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Keep same-domain, non-asset URLs, normalized and deduplicated, up to `max_urls`.
fn filter_pages(raw_urls: &[String], base: &str, max_urls: usize) -> Vec<PageMetadata> {
    let mut seen = HashSet::new();
    let mut pages = Vec::new();

    for raw in raw_urls {
        if pages.len() >= max_urls {
            break;
        }
        if !urls::is_same_registrable_domain(raw, base) || urls::is_asset(raw) {
            continue;
        }
        let Some(url) = urls::normalize(raw, base) else {
            continue;
        };
        if !seen.insert(url.clone()) {
            continue;
        }

        pages.push(PageMetadata {
            path: urls::path_of(&url),
            section: urls::extract_section(&url),
            title: String::new(),
            description: String::new(),
            url,
        });
    }

    pages
}

/// Build a reqwest client with appropriate settings.
fn build_client(opts: &SitemapOptions) -> Result<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
        .timeout(Duration::from_secs(opts.timeout_secs))
        .build()
        .map_err(|e| DocGateError::Network(format!("failed to build HTTP client: {e}")))
}

/// GET a URL and return its body, failing on transport errors and non-2xx.
async fn fetch_text(client: &Client, url: &str) -> Result<String> {
    let response = client
        .get(url)
        .header(reqwest::header::ACCEPT, "application/xml, text/xml, */*")
        .send()
        .await
        .map_err(|e| DocGateError::Network(format!("{url}: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        return Err(DocGateError::Network(format!("{url}: HTTP {status}")));
    }

    response
        .text()
        .await
        .map_err(|e| DocGateError::Network(format!("{url}: failed to read body: {e}")))
}
