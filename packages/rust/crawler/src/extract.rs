//! Metadata and link extraction from fetched HTML.
//!
//! Links are taken from navigation-like regions when the page has any,
//! since documentation sidebars list the pages worth scoring. Pages
//! without such regions fall back to every anchor on the page.

use std::collections::HashSet;
use std::sync::LazyLock;

use docgate_shared::urls;
use scraper::{ElementRef, Html, Selector};

/// Navigation-related selectors, ordered by specificity.
pub const NAV_SELECTORS: &[&str] = &[
    "nav",
    "aside",
    r#"[role="navigation"]"#,
    ".sidebar",
    ".menu",
    ".toc",
    ".docs-nav",
    ".doc-sidebar",
];

/// Link schemes that never lead to a page.
const SKIPPED_SCHEMES: &[&str] = &["mailto:", "tel:", "javascript:"];

static NAV_SEL: LazyLock<Vec<Selector>> = LazyLock::new(|| {
    NAV_SELECTORS
        .iter()
        .map(|s| Selector::parse(s).expect("nav selector"))
        .collect()
});

static ANCHOR_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").expect("anchor selector"));

static TITLE_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("title").expect("title selector"));

static DESCRIPTION_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"meta[name="description"]"#).expect("meta selector"));

/// Everything the crawler needs from one HTML document.
#[derive(Debug, Clone, Default)]
pub struct ParsedPage {
    pub title: String,
    pub description: String,
    /// Normalized, same-domain, non-asset, deduplicated links.
    pub links: Vec<String>,
}

/// Parse `html` fetched from `page_url`, keeping links that belong to `base_url`'s site.
pub fn parse_page(html: &str, page_url: &str, base_url: &str) -> ParsedPage {
    let doc = Html::parse_document(html);
    ParsedPage {
        title: extract_title(&doc),
        description: extract_description(&doc),
        links: extract_links(&doc, page_url, base_url),
    }
}

/// Trimmed `<title>` text, or empty.
pub fn extract_title(doc: &Html) -> String {
    doc.select(&TITLE_SEL)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .unwrap_or_default()
}

/// Trimmed `<meta name="description">` content, or empty.
pub fn extract_description(doc: &Html) -> String {
    doc.select(&DESCRIPTION_SEL)
        .next()
        .and_then(|el| el.value().attr("content"))
        .map(|c| c.trim().to_string())
        .unwrap_or_default()
}

/// Extract crawlable links, preferring navigation regions.
pub fn extract_links(doc: &Html, page_url: &str, base_url: &str) -> Vec<String> {
    let anchors = candidate_anchors(doc);

    let links = anchors.into_iter().filter_map(|anchor| {
        let href = anchor.value().attr("href")?.trim();
        if href.is_empty() || has_skipped_scheme(href) {
            return None;
        }

        let normalized = urls::normalize(href, page_url)?;
        if !(normalized.starts_with("http://") || normalized.starts_with("https://")) {
            return None;
        }
        if !urls::is_same_registrable_domain(&normalized, base_url) || urls::is_asset(&normalized)
        {
            return None;
        }
        Some(normalized)
    });

    urls::dedupe(links)
}

/// Anchors inside navigation regions, or all anchors if the page has none.
fn candidate_anchors(doc: &Html) -> Vec<ElementRef<'_>> {
    let mut seen = HashSet::new();
    let mut anchors = Vec::new();
    let mut found_region = false;

    for selector in NAV_SEL.iter() {
        for region in doc.select(selector) {
            found_region = true;
            for anchor in region.select(&ANCHOR_SEL) {
                if seen.insert(anchor.id()) {
                    anchors.push(anchor);
                }
            }
        }
    }

    if found_region {
        anchors
    } else {
        doc.select(&ANCHOR_SEL).collect()
    }
}

fn has_skipped_scheme(href: &str) -> bool {
    let lower = href.to_ascii_lowercase();
    SKIPPED_SCHEMES.iter().any(|scheme| lower.starts_with(scheme))
}
