//! Sitemap XML parser.
//!
//! Recognises the two sitemaps.org document shapes by their root element:
//! - `<urlset><url><loc>…</loc></url></urlset>`
//! - `<sitemapindex><sitemap><loc>…</loc></sitemap></sitemapindex>`
//!
//! Only a `<loc>` that is a direct child of an entry counts, and only when
//! it is unqualified or in the sitemaps.org namespace. Extension elements
//! such as `<image:loc>` are skipped.

use docgate_shared::{DocGateError, Result};
use quick_xml::NsReader;
use quick_xml::events::Event;
use quick_xml::name::{Namespace, ResolveResult};

/// Suffix shared by the http and https forms of the sitemap namespace.
const SITEMAP_NS_SUFFIX: &[u8] = b"sitemaps.org/schemas/sitemap/0.9";

/// Element depths, root = 1.
const ENTRY_DEPTH: usize = 2;
const LOC_DEPTH: usize = 3;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// A parsed sitemap document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SitemapDocument {
    /// Page URLs from a `<urlset>`.
    UrlSet(Vec<String>),
    /// Child sitemap URLs from a `<sitemapindex>`.
    Index(Vec<String>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RootKind {
    UrlSet,
    Index,
}

impl RootKind {
    fn from_tag(name: &[u8]) -> Option<Self> {
        match name {
            b"urlset" => Some(Self::UrlSet),
            b"sitemapindex" => Some(Self::Index),
            _ => None,
        }
    }

    /// Element wrapping each `<loc>`.
    fn entry_tag(&self) -> &'static [u8] {
        match self {
            Self::UrlSet => b"url",
            Self::Index => b"sitemap",
        }
    }
}

fn in_sitemap_namespace(ns: &ResolveResult<'_>) -> bool {
    match ns {
        ResolveResult::Unbound => true,
        ResolveResult::Bound(Namespace(uri)) => uri.ends_with(SITEMAP_NS_SUFFIX),
        ResolveResult::Unknown(_) => false,
    }
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

/// Parse sitemap XML.
///
/// Returns `Ok(None)` when the document is well-formed but its root is
/// neither `<urlset>` nor `<sitemapindex>`, and an error when the XML is
/// malformed.
pub(crate) fn parse_sitemap(xml: &str) -> Result<Option<SitemapDocument>> {
    let mut reader = NsReader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut buf = Vec::new();
    let mut root: Option<RootKind> = None;
    let mut locs: Vec<String> = Vec::new();
    let mut depth = 0usize;
    let mut in_entry = false;
    let mut in_loc = false;
    let mut current = String::new();

    loop {
        match reader.read_resolved_event_into(&mut buf) {
            Ok((ns, Event::Start(e))) => {
                depth += 1;
                let name = e.local_name();
                match (root, depth) {
                    (None, _) => match RootKind::from_tag(name.as_ref()) {
                        Some(kind) => root = Some(kind),
                        None => return Ok(None),
                    },
                    (Some(kind), ENTRY_DEPTH) => {
                        in_entry = name.as_ref() == kind.entry_tag() && in_sitemap_namespace(&ns);
                    }
                    (Some(_), LOC_DEPTH) => {
                        if in_entry && name.as_ref() == b"loc" && in_sitemap_namespace(&ns) {
                            in_loc = true;
                            current.clear();
                        }
                    }
                    _ => {}
                }
            }
            // `<urlset/>`: a valid but empty sitemap
            Ok((_, Event::Empty(e))) if root.is_none() => {
                match RootKind::from_tag(e.local_name().as_ref()) {
                    Some(kind) => root = Some(kind),
                    None => return Ok(None),
                }
            }
            Ok((_, Event::End(_))) => {
                if in_loc && depth == LOC_DEPTH {
                    let loc = current.trim();
                    if !loc.is_empty() {
                        locs.push(loc.to_string());
                    }
                    in_loc = false;
                } else if depth == ENTRY_DEPTH {
                    in_entry = false;
                }
                depth = depth.saturating_sub(1);
            }
            Ok((_, Event::Text(e))) if in_loc && depth == LOC_DEPTH => {
                let text = e
                    .unescape()
                    .map_err(|e| DocGateError::parse(format!("invalid <loc> text: {e}")))?;
                current.push_str(&text);
            }
            Ok((_, Event::CData(e))) if in_loc && depth == LOC_DEPTH => {
                current.push_str(&String::from_utf8_lossy(&e.into_inner()));
            }
            Ok((_, Event::Eof)) => break,
            Err(e) => return Err(DocGateError::parse(format!("XML parse error: {e}"))),
            _ => {}
        }
        buf.clear();
    }

    Ok(root.map(|kind| match kind {
        RootKind::UrlSet => SitemapDocument::UrlSet(locs),
        RootKind::Index => SitemapDocument::Index(locs),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_urlset() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
  <url><loc>https://example.com/docs/intro</loc><lastmod>2024-01-15</lastmod></url>
  <url>
    <loc>
      https://example.com/docs/install
    </loc>
  </url>
  <url><priority>0.5</priority></url>
</urlset>"#;

        let doc = parse_sitemap(xml).unwrap();
        assert_eq!(
            doc,
            Some(SitemapDocument::UrlSet(vec![
                "https://example.com/docs/intro".into(),
                "https://example.com/docs/install".into(),
            ]))
        );
    }

    #[test]
    fn parse_index() {
        let xml = r#"<sitemapindex xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
  <sitemap><loc>https://example.com/sitemap-docs.xml</loc></sitemap>
  <sitemap><loc>https://example.com/sitemap-api.xml</loc></sitemap>
</sitemapindex>"#;

        let doc = parse_sitemap(xml).unwrap();
        assert_eq!(
            doc,
            Some(SitemapDocument::Index(vec![
                "https://example.com/sitemap-docs.xml".into(),
                "https://example.com/sitemap-api.xml".into(),
            ]))
        );
    }

    #[test]
    fn parse_namespaced_and_escaped() {
        let xml = r#"<sm:urlset xmlns:sm="http://www.sitemaps.org/schemas/sitemap/0.9">
  <sm:url><sm:loc>https://example.com/search?a=1&amp;b=2</sm:loc></sm:url>
  <sm:url><sm:loc><![CDATA[https://example.com/cdata]]></sm:loc></sm:url>
</sm:urlset>"#;

        let doc = parse_sitemap(xml).unwrap();
        assert_eq!(
            doc,
            Some(SitemapDocument::UrlSet(vec![
                "https://example.com/search?a=1&b=2".into(),
                "https://example.com/cdata".into(),
            ]))
        );
    }

    #[test]
    fn loc_outside_entry_is_ignored() {
        let xml = "<urlset><loc>https://example.com/stray</loc></urlset>";
        assert_eq!(parse_sitemap(xml).unwrap(), Some(SitemapDocument::UrlSet(vec![])));
    }

    #[test]
    fn empty_root_element() {
        assert_eq!(parse_sitemap("<urlset/>").unwrap(), Some(SitemapDocument::UrlSet(vec![])));
    }

    #[test]
    fn non_sitemap_root_is_none() {
        let html = "<html><head><title>Not found</title></head><body></body></html>";
        assert_eq!(parse_sitemap(html).unwrap(), None);
        assert_eq!(parse_sitemap("").unwrap(), None);
    }

    #[test]
    fn malformed_xml_is_error() {
        let xml = "<urlset><url><loc>https://example.com</url></urlset>";
        assert!(parse_sitemap(xml).is_err());
    }

    #[test]
    fn image_extension_locs_are_not_pages() {
        let xml = r#"<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9"
        xmlns:image="http://www.google.com/schemas/sitemap-image/1.1">
  <url>
    <loc>https://example.com/docs/intro</loc>
    <image:image><image:loc>https://example.com/media/hero-banner</image:loc></image:image>
  </url>
  <url>
    <image:loc>https://example.com/media/logo</image:loc>
    <extra><loc>https://example.com/nested</loc></extra>
  </url>
</urlset>"#;

        assert_eq!(
            parse_sitemap(xml).unwrap(),
            Some(SitemapDocument::UrlSet(vec!["https://example.com/docs/intro".into()]))
        );
    }
}
