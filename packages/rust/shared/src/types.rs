//! Core domain types: discovered pages, scored pages and pipeline outcomes.

use serde::{Deserialize, Serialize};

/// Highest relevance an AI judge may assign.
pub const MAX_RELEVANCE: f64 = 10.0;

// ---------------------------------------------------------------------------
// PageMetadata
// ---------------------------------------------------------------------------

/// A single discovered documentation page.
///
/// Pages from a sitemap carry an empty title and description; pages from the
/// DOM crawler are populated from the fetched HTML.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageMetadata {
    /// Canonical (normalized) URL. Unique within a crawl.
    pub url: String,
    /// Contents of `<title>`, or empty.
    #[serde(default)]
    pub title: String,
    /// Contents of `<meta name="description">`, or empty.
    #[serde(default)]
    pub description: String,
    /// URL path component.
    pub path: String,
    /// First path segment, `root` or `unknown`.
    pub section: String,
}

// ---------------------------------------------------------------------------
// Category
// ---------------------------------------------------------------------------

/// Documentation type assigned by the AI judge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Tutorial,
    #[default]
    Reference,
    Concept,
    Example,
}

impl Category {
    /// All categories in report order.
    pub const ALL: [Category; 4] = [
        Category::Tutorial,
        Category::Concept,
        Category::Reference,
        Category::Example,
    ];

    /// Map a model-supplied tag onto a category. Unknown tags become `Reference`.
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "tutorial" => Self::Tutorial,
            "concept" => Self::Concept,
            "example" => Self::Example,
            _ => Self::Reference,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tutorial => "tutorial",
            Self::Reference => "reference",
            Self::Concept => "concept",
            Self::Example => "example",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// ScoredPage
// ---------------------------------------------------------------------------

/// A page after AI relevance scoring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredPage {
    #[serde(flatten)]
    pub page: PageMetadata,
    /// Relevance to the user's problem, always within `0..=10`.
    pub relevance: f64,
    pub category: Category,
    /// One-sentence justification from the judge.
    pub reason: String,
}

impl ScoredPage {
    /// Build a scored page, clamping `relevance` into `0..=10` (NaN becomes 0).
    pub fn new(
        page: PageMetadata,
        relevance: f64,
        category: Category,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            page,
            relevance: clamp_relevance(relevance),
            category,
            reason: reason.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.page.url
    }
}

/// Clamp a raw relevance value into `0..=10`. Non-numbers map to 0.
pub fn clamp_relevance(value: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(0.0, MAX_RELEVANCE)
}

// ---------------------------------------------------------------------------
// CrawlOutcome
// ---------------------------------------------------------------------------

/// How the pages of a crawl were discovered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiscoveryMethod {
    #[serde(rename = "sitemap")]
    Sitemap,
    #[serde(rename = "dom-parsing")]
    DomParsing,
}

impl std::fmt::Display for DiscoveryMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sitemap => f.write_str("sitemap"),
            Self::DomParsing => f.write_str("dom-parsing"),
        }
    }
}

/// Result of one crawl invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlOutcome {
    pub base_url: String,
    pub method: DiscoveryMethod,
    pub total_found: usize,
    pub pages: Vec<PageMetadata>,
    /// Non-fatal errors recorded along the way.
    pub errors: Vec<String>,
    pub duration_ms: u64,
}

// ---------------------------------------------------------------------------
// FilterOutcome
// ---------------------------------------------------------------------------

/// Terminal artifact of the filter pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterOutcome {
    pub issue_description: String,
    /// Pages handed to the pipeline.
    pub total_scanned: usize,
    /// Pages excluded by the rule-based pre-filter.
    pub pre_filtered: usize,
    /// Pages sent to the AI judge.
    pub ai_scored: usize,
    /// Sorted by relevance descending, capped, relevance > 0 only.
    pub results: Vec<ScoredPage>,
    /// Display name of the AI provider.
    pub provider_name: String,
    pub duration_ms: u64,
}
