//! Rule-based pre-filter run before any AI call.
//!
//! Pages whose URL, title or path mention legal, account, marketing or
//! housekeeping topics are dropped; they are never what a developer
//! debugging a problem is looking for.

use std::sync::LazyLock;

use docgate_shared::{DocGateError, PageMetadata, Result};
use regex::RegexSet;
use tracing::debug;

/// Built-in exclusion patterns, matched case-insensitively.
pub const EXCLUDE_PATTERNS: &[&str] = &[
    r"privacy",
    r"terms",
    r"contact",
    r"login",
    r"sign-?up",
    r"sign-?in",
    r"404",
    r"changelog",
    r"release-notes",
    r"contributing",
    r"license",
    r"cookie",
    r"legal",
    r"careers",
    // the blog index, not individual posts under blog/
    r"blog(?:[^/]|$)",
    r"pricing",
    r"support/ticket",
];

static BUILTIN: LazyLock<RegexSet> = LazyLock::new(|| {
    RegexSet::new(EXCLUDE_PATTERNS.iter().map(|p| case_insensitive(p)))
        .expect("built-in exclude patterns")
});

fn case_insensitive(pattern: &str) -> String {
    format!("(?i){pattern}")
}

/// Pages that survived, plus how many were excluded.
#[derive(Debug, Clone, Default)]
pub struct PreFilterResult {
    pub passed: Vec<PageMetadata>,
    pub filtered: usize,
}

/// Compiled denylist.
#[derive(Debug, Clone)]
pub struct PreFilter {
    patterns: RegexSet,
}

impl PreFilter {
    /// Built-in patterns plus `extra` user patterns.
    pub fn new(extra: &[String]) -> Result<Self> {
        if extra.is_empty() {
            return Ok(Self::default());
        }

        let patterns = EXCLUDE_PATTERNS
            .iter()
            .copied()
            .chain(extra.iter().map(String::as_str))
            .map(case_insensitive);

        let patterns = RegexSet::new(patterns)
            .map_err(|e| DocGateError::config(format!("invalid exclude pattern: {e}")))?;
        Ok(Self { patterns })
    }

    /// Whether a page should be dropped.
    pub fn is_excluded(&self, page: &PageMetadata) -> bool {
        let text = format!("{} {} {}", page.url, page.title, page.path);
        self.patterns.is_match(&text)
    }

    /// Partition `pages`, preserving order.
    pub fn apply(&self, pages: &[PageMetadata]) -> PreFilterResult {
        let (passed, excluded): (Vec<_>, Vec<_>) =
            pages.iter().cloned().partition(|p| !self.is_excluded(p));

        debug!(passed = passed.len(), filtered = excluded.len(), "pre-filter applied");
        PreFilterResult {
            passed,
            filtered: excluded.len(),
        }
    }
}

impl Default for PreFilter {
    fn default() -> Self {
        Self {
            patterns: BUILTIN.clone(),
        }
    }
}

/// Pre-filter with the built-in patterns only.
pub fn pre_filter(pages: &[PageMetadata]) -> PreFilterResult {
    PreFilter::default().apply(pages)
}
