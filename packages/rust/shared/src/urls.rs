//! URL helpers shared by the sitemap resolver and the DOM crawler.
//!
//! All functions are pure and never fail loudly: unparsable input yields
//! `None`, `false` or a sentinel value.

use std::collections::HashSet;

use url::Url;

/// Query parameters stripped during normalization.
pub const TRACKING_PARAMS: &[&str] = &["utm_source", "utm_medium", "utm_campaign", "ref", "source"];

/// Path extensions that identify non-document assets.
pub const ASSET_EXTENSIONS: &[&str] = &[
    ".js", ".css", ".png", ".jpg", ".jpeg", ".gif", ".svg", ".ico", ".woff", ".woff2", ".ttf",
    ".eot", ".pdf", ".zip",
];

/// Resolve `url` against `base` and canonicalize it.
///
/// Strips the fragment and known tracking parameters, and drops a trailing
/// slash unless the path is the root. Returns `None` if the input cannot be
/// parsed.
pub fn normalize(url: &str, base: &str) -> Option<String> {
    let mut parsed = match Url::parse(base) {
        Ok(base) => base.join(url).ok()?,
        Err(_) => Url::parse(url).ok()?,
    };

    parsed.set_fragment(None);
    strip_tracking_params(&mut parsed);

    let mut normalized = parsed.to_string();
    if normalized.ends_with('/') && parsed.path() != "/" {
        normalized.pop();
    }
    Some(normalized)
}

/// Remove tracking keys from the query, keeping the remaining pairs in order.
fn strip_tracking_params(url: &mut Url) {
    if url.query().is_none() {
        return;
    }

    let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
    if !pairs
        .iter()
        .any(|(key, _)| TRACKING_PARAMS.contains(&key.as_str()))
    {
        return;
    }

    let kept: Vec<(String, String)> = pairs
        .into_iter()
        .filter(|(key, _)| !TRACKING_PARAMS.contains(&key.as_str()))
        .collect();

    if kept.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(kept);
    }
}

/// True if both hosts are equal or one is a dot-suffix subdomain of the other.
///
/// The check is symmetric: `docs.x.com` matches `x.com` and vice versa.
pub fn is_same_registrable_domain(url: &str, base: &str) -> bool {
    let (Some(host), Some(base_host)) = (host_of(url), host_of(base)) else {
        return false;
    };

    host == base_host
        || host.ends_with(&format!(".{base_host}"))
        || base_host.ends_with(&format!(".{host}"))
}

fn host_of(url: &str) -> Option<String> {
    Url::parse(url)
        .ok()?
        .host_str()
        .map(|h| h.to_ascii_lowercase())
}

/// True if the URL path ends with a known asset extension.
pub fn is_asset(url: &str) -> bool {
    match Url::parse(url) {
        Ok(parsed) => {
            let path = parsed.path().to_ascii_lowercase();
            ASSET_EXTENSIONS.iter().any(|ext| path.ends_with(ext))
        }
        Err(_) => false,
    }
}

/// First path segment, `root` for paths with at most one segment,
/// `unknown` for unparsable input.
pub fn extract_section(url: &str) -> String {
    let Ok(parsed) = Url::parse(url) else {
        return "unknown".into();
    };

    let parts: Vec<&str> = parsed.path().split('/').filter(|s| !s.is_empty()).collect();
    if parts.len() > 1 {
        parts[0].to_string()
    } else {
        "root".into()
    }
}

/// The path component of an absolute URL, or empty if unparsable.
pub fn path_of(url: &str) -> String {
    Url::parse(url)
        .map(|u| u.path().to_string())
        .unwrap_or_default()
}

/// Remove duplicate URLs, keeping first occurrences in order.
pub fn dedupe(urls: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut seen = HashSet::new();
    urls.into_iter()
        .filter(|url| seen.insert(url.clone()))
        .collect()
}

/// Prefix `https://` when the input carries no http(s) scheme.
pub fn ensure_scheme(input: &str) -> String {
    let trimmed = input.trim();
    let lower = trimmed.to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_strips_fragment() {
        let base = "https://docs.example.com/guide/intro";
        assert_eq!(
            normalize(&format!("{base}#frag"), base),
            normalize(base, base)
        );
        assert_eq!(
            normalize(base, base).as_deref(),
            Some("https://docs.example.com/guide/intro")
        );
    }

    #[test]
    fn normalize_strips_tracking_params_only() {
        let url = "https://x.com/docs?b=2&utm_source=news&a=1&ref=home&utm_campaign=c";
        assert_eq!(
            normalize(url, "https://x.com").as_deref(),
            Some("https://x.com/docs?b=2&a=1")
        );

        let only_tracking = "https://x.com/docs?utm_medium=mail&source=feed";
        assert_eq!(
            normalize(only_tracking, "https://x.com").as_deref(),
            Some("https://x.com/docs")
        );

        let untouched = "https://x.com/search?q=rust&page=2";
        assert_eq!(normalize(untouched, "https://x.com").as_deref(), Some(untouched));
    }

    #[test]
    fn normalize_trailing_slash() {
        assert_eq!(
            normalize("https://x.com/docs/", "https://x.com").as_deref(),
            Some("https://x.com/docs")
        );
        assert_eq!(
            normalize("https://x.com/", "https://x.com").as_deref(),
            Some("https://x.com/")
        );
    }

    #[test]
    fn normalize_resolves_relative() {
        assert_eq!(
            normalize("/api/config", "https://x.com/docs/start").as_deref(),
            Some("https://x.com/api/config")
        );
        assert_eq!(
            normalize("install", "https://x.com/docs/start").as_deref(),
            Some("https://x.com/docs/install")
        );
    }

    #[test]
    fn normalize_rejects_garbage() {
        assert_eq!(normalize("http://[not a host", "also not a url"), None);
    }

    #[test]
    fn same_registrable_domain() {
        assert!(is_same_registrable_domain(
            "https://docs.example.com/x",
            "https://example.com"
        ));
        assert!(is_same_registrable_domain(
            "https://example.com/x",
            "https://docs.example.com"
        ));
        assert!(is_same_registrable_domain(
            "http://example.com/a",
            "https://example.com/b"
        ));
        assert!(!is_same_registrable_domain("https://evil.com", "https://example.com"));
        assert!(!is_same_registrable_domain(
            "https://notexample.com",
            "https://example.com"
        ));
        assert!(!is_same_registrable_domain("not a url", "https://example.com"));
    }

    #[test]
    fn asset_detection() {
        assert!(is_asset("https://x.com/static/app.js"));
        assert!(is_asset("https://x.com/img/Logo.PNG"));
        assert!(is_asset("https://x.com/files/manual.pdf?dl=1"));
        assert!(!is_asset("https://x.com/docs/javascript"));
        assert!(!is_asset("https://x.com/docs/intro.html"));
        assert!(!is_asset("::"));
    }

    #[test]
    fn section_extraction() {
        assert_eq!(extract_section("https://x.com/docs/guide/intro"), "docs");
        assert_eq!(extract_section("https://x.com/docs"), "root");
        assert_eq!(extract_section("https://x.com/"), "root");
        assert_eq!(extract_section("nope"), "unknown");
    }

    #[test]
    fn dedupe_keeps_first_occurrence() {
        let urls = vec![
            "https://x.com/a".to_string(),
            "https://x.com/b".to_string(),
            "https://x.com/a".to_string(),
        ];
        assert_eq!(dedupe(urls), vec!["https://x.com/a", "https://x.com/b"]);
    }

    #[test]
    fn scheme_is_added_when_missing() {
        assert_eq!(ensure_scheme("  docs.rs "), "https://docs.rs");
        assert_eq!(ensure_scheme("http://localhost:8080"), "http://localhost:8080");
        assert_eq!(ensure_scheme("httpbin.org"), "https://httpbin.org");
    }
}
