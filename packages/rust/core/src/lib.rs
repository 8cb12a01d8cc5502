//! Core orchestration and domain logic for DocGate.
//!
//! This crate ties discovery, crawling and AI scoring together into the
//! end-to-end analysis flow: crawl a documentation site, drop obvious
//! non-documentation pages, score the rest against an issue description
//! and report the most relevant few.

pub mod crawl;
pub mod export;
pub mod filter;
pub mod prefilter;
pub mod progress;
pub mod scorer;
pub mod session;

pub use crawl::crawl_site;
pub use export::format_markdown;
pub use filter::FilterPipeline;
pub use prefilter::{EXCLUDE_PATTERNS, PreFilter, PreFilterResult, pre_filter};
pub use progress::{BatchProgress, ProgressReporter, SilentProgress};
pub use scorer::{AiScorer, FAILED_BATCH_REASON, RetryPolicy};
pub use session::{
    AnalysisEvent, AnalysisState, Analyzer, NO_URLS_FOUND, Phase, ProgressUpdate, StartOutcome,
};
