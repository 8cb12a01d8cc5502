//! DOM-based page discovery for sites without a usable sitemap.
//!
//! This crate provides:
//! - [`extract`]: title, description and navigation-first link extraction
//! - [`engine`]: level-by-level crawler with a bounded worker pool

pub mod engine;
pub mod extract;

pub use engine::{DomCrawlResult, DomCrawler};
pub use extract::{NAV_SELECTORS, ParsedPage, parse_page};
