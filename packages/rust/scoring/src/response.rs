//! Model reply parsing.
//!
//! Replies are expected to hold a JSON array of
//! `{url, relevance, category, reason}` objects, optionally wrapped in a
//! markdown code fence or in an object under `results` / `urls`.
//! Malformed replies yield an empty list rather than an error.

use std::collections::HashSet;
use std::sync::LazyLock;

use docgate_shared::{Category, PageMetadata, ScoredPage, clamp_relevance, urls};
use regex::Regex;
use serde_json::{Map, Value};
use tracing::{debug, warn};

/// Reason used when the model gives none.
pub const MISSING_REASON: &str = "No reason provided";

static JSON_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```json\s*(.*?)```").expect("json fence regex"));

static ANY_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```\s*(.*?)```").expect("fence regex"));

/// Strip a code fence, preferring a `json`-tagged one. Unfenced text is trimmed.
pub fn extract_json(text: &str) -> &str {
    JSON_FENCE
        .captures(text)
        .or_else(|| ANY_FENCE.captures(text))
        .and_then(|caps| caps.get(1))
        .map_or(text, |m| m.as_str())
        .trim()
}

/// Parse a model reply into scored pages.
///
/// Only URLs present in `pages` are kept, each at most once (first
/// occurrence wins). Title, description and path come from the matching
/// entry in `pages` when it has them, falling back to what the model
/// echoed. Items without a URL are dropped.
pub fn parse_scored_pages(text: &str, pages: &[PageMetadata]) -> Vec<ScoredPage> {
    let content = extract_json(text);

    let parsed: Value = match serde_json::from_str(content) {
        Ok(value) => value,
        Err(e) => {
            warn!(error = %e, "failed to parse AI response");
            return Vec::new();
        }
    };

    let items = match parsed {
        Value::Array(items) => items,
        Value::Object(mut obj) => match (obj.remove("results"), obj.remove("urls")) {
            (Some(Value::Array(items)), _) | (_, Some(Value::Array(items))) => items,
            _ => Vec::new(),
        },
        _ => Vec::new(),
    };

    let mut seen = HashSet::new();
    items
        .iter()
        .filter_map(Value::as_object)
        .filter_map(|item| score_item(item, pages))
        .filter(|scored| seen.insert(scored.page.url.clone()))
        .collect()
}

/// Find the submitted page a model-echoed URL refers to, tolerating a
/// trailing slash, fragment or tracking parameters.
fn find_page<'a>(url: &str, pages: &'a [PageMetadata]) -> Option<&'a PageMetadata> {
    pages.iter().find(|p| p.url == url).or_else(|| {
        let normalized = urls::normalize(url, url)?;
        pages.iter().find(|p| p.url == normalized)
    })
}

fn score_item(item: &Map<String, Value>, pages: &[PageMetadata]) -> Option<ScoredPage> {
    let echoed = item
        .get("url")
        .and_then(Value::as_str)
        .filter(|u| !u.is_empty())?;
    let Some(original) = find_page(echoed, pages) else {
        debug!(url = echoed, "dropping URL that was not in the batch");
        return None;
    };

    let pick = |from_page: &str, key: &str| -> String {
        if from_page.is_empty() {
            item.get(key)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        } else {
            from_page.to_string()
        }
    };

    let page = PageMetadata {
        url: original.url.clone(),
        title: pick(&original.title, "title"),
        description: pick(&original.description, "description"),
        path: pick(&original.path, "path"),
        section: original.section.clone(),
    };

    let relevance = clamp_relevance(coerce_number(item.get("relevance")));
    let category = item
        .get("category")
        .and_then(Value::as_str)
        .map(Category::from_tag)
        .unwrap_or_default();
    let reason = item
        .get("reason")
        .and_then(Value::as_str)
        .filter(|r| !r.is_empty())
        .unwrap_or(MISSING_REASON);

    Some(ScoredPage::new(page, relevance, category, reason))
}

/// Loose numeric coercion: numbers as-is, numeric strings parsed,
/// booleans as 1/0, anything else 0.
fn coerce_number(value: Option<&Value>) -> f64 {
    match value {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                0.0
            } else {
                trimmed.parse().unwrap_or(0.0)
            }
        }
        Some(Value::Bool(b)) => f64::from(u8::from(*b)),
        _ => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(url: &str, title: &str) -> PageMetadata {
        PageMetadata {
            url: url.into(),
            title: title.into(),
            description: String::new(),
            path: urls::path_of(url),
            section: urls::extract_section(url),
        }
    }

    #[test]
    fn extract_prefers_json_fence() {
        let text = "Here you go:\n```text\nnot this\n```\n```json\n[1, 2]\n```";
        assert_eq!(extract_json(text), "[1, 2]");
    }

    #[test]
    fn extract_generic_fence_and_bare_text() {
        assert_eq!(extract_json("```\n[{\"a\":1}]\n```"), "[{\"a\":1}]");
        assert_eq!(extract_json("  [] \n"), "[]");
    }

    #[test]
    fn parse_bare_array_with_page_lookup() {
        let pages = vec![page("https://example.com/docs/auth", "Authentication")];
        let reply = r#"[{"url": "https://example.com/docs/auth", "title": "Echoed", "relevance": 9, "category": "tutorial", "reason": "Covers login."}]"#;

        let scored = parse_scored_pages(reply, &pages);
        assert_eq!(scored.len(), 1);
        assert_eq!(scored[0].page.title, "Authentication");
        assert_eq!(scored[0].page.path, "/docs/auth");
        assert_eq!(scored[0].page.section, "docs");
        assert_eq!(scored[0].relevance, 9.0);
        assert_eq!(scored[0].category, Category::Tutorial);
        assert_eq!(scored[0].reason, "Covers login.");
    }

    #[test]
    fn parse_wrapped_objects() {
        let pages = vec![page("https://example.com/a", "A"), page("https://example.com/b", "B")];
        let results = r#"{"results": [{"url": "https://example.com/a", "relevance": 3}]}"#;
        let urls_key = r#"{"urls": [{"url": "https://example.com/b", "relevance": 4}]}"#;

        assert_eq!(parse_scored_pages(results, &pages)[0].url(), "https://example.com/a");
        assert_eq!(parse_scored_pages(urls_key, &pages)[0].url(), "https://example.com/b");
        assert!(parse_scored_pages(r#"{"data": []}"#, &pages).is_empty());
    }

    #[test]
    fn untitled_page_uses_echoed_fields() {
        let pages = vec![page("https://example.com/guide/x", "")];
        let reply = r#"[{"url": "https://example.com/guide/x", "title": "X", "path": "/ignored", "relevance": 5}]"#;
        let scored = parse_scored_pages(reply, &pages);
        assert_eq!(scored[0].page.title, "X");
        assert_eq!(scored[0].page.path, "/guide/x");
        assert_eq!(scored[0].page.section, "guide");
    }

    #[test]
    fn relevance_is_clamped_and_coerced() {
        let pages: Vec<_> = (1..=5)
            .map(|i| page(&format!("https://example.com/{i}"), ""))
            .collect();
        let reply = r#"[
            {"url": "https://example.com/1", "relevance": 15},
            {"url": "https://example.com/2", "relevance": -3},
            {"url": "https://example.com/3", "relevance": "abc"},
            {"url": "https://example.com/4", "relevance": "7.5"},
            {"url": "https://example.com/5"}
        ]"#;
        let scores: Vec<f64> = parse_scored_pages(reply, &pages)
            .iter()
            .map(|s| s.relevance)
            .collect();
        assert_eq!(scores, vec![10.0, 0.0, 0.0, 7.5, 0.0]);
    }

    #[test]
    fn defaults_for_category_and_reason() {
        let pages = vec![page("https://example.com/1", "")];
        let reply = r#"[{"url": "https://example.com/1", "relevance": 2, "category": "howto", "reason": ""}]"#;
        let scored = parse_scored_pages(reply, &pages);
        assert_eq!(scored[0].category, Category::Reference);
        assert_eq!(scored[0].reason, MISSING_REASON);
    }

    #[test]
    fn items_without_url_are_dropped() {
        let pages = vec![page("https://example.com/ok", "Ok")];
        let reply = r#"[{"relevance": 8}, {"url": "", "relevance": 8}, "stray", {"url": "https://example.com/ok", "relevance": 1}]"#;
        let scored = parse_scored_pages(reply, &pages);
        assert_eq!(scored.len(), 1);
        assert_eq!(scored[0].url(), "https://example.com/ok");
    }

    #[test]
    fn only_submitted_pages_are_kept_once() {
        let pages = vec![
            page("https://example.com/docs/a", "A"),
            page("https://example.com/docs/b", "B"),
        ];
        let reply = r#"[
            {"url": "https://evil.com/phish", "relevance": 10},
            {"url": "https://example.com/docs/a", "relevance": 7, "reason": "first"},
            {"url": "https://example.com/docs/a", "relevance": 9, "reason": "second"},
            {"url": "https://example.com/docs/unlisted", "relevance": 8},
            {"url": "https://example.com/docs/b/#intro", "relevance": 3}
        ]"#;

        let scored = parse_scored_pages(reply, &pages);
        let urls: Vec<&str> = scored.iter().map(ScoredPage::url).collect();
        assert_eq!(urls, vec!["https://example.com/docs/a", "https://example.com/docs/b"]);
        assert_eq!(scored[0].reason, "first");
        assert_eq!(scored[0].relevance, 7.0);
    }

    #[test]
    fn malformed_reply_is_empty() {
        assert!(parse_scored_pages("I could not evaluate these pages.", &[]).is_empty());
        assert!(parse_scored_pages("```json\n[{\"url\": \n```", &[]).is_empty());
        assert!(parse_scored_pages("42", &[]).is_empty());
    }
}
