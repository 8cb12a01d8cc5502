//! Shared types, error model, configuration and URL helpers for DocGate.
//!
//! This crate is the foundation depended on by all other DocGate crates.
//! It provides:
//! - [`DocGateError`]: the unified error type
//! - Domain types ([`PageMetadata`], [`ScoredPage`], [`CrawlOutcome`], [`FilterOutcome`])
//! - Configuration ([`AppConfig`], [`Settings`], config loading)
//! - [`urls`]: pure URL normalization and classification helpers

pub mod config;
pub mod error;
pub mod types;
pub mod urls;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, BackoffStrategy, CrawlConfig, FilterConfig, ProviderConfig, ProviderName,
    ProviderSection, Settings, config_dir, config_file_path, init_config, load_config,
    load_config_from,
};
pub use error::{DocGateError, ErrorKind, Result};
pub use types::{
    Category, CrawlOutcome, DiscoveryMethod, FilterOutcome, MAX_RELEVANCE, PageMetadata,
    ScoredPage, clamp_relevance,
};
