//! Progress reporting hooks for crawl and scoring.

use docgate_shared::ScoredPage;
use serde::{Deserialize, Serialize};

/// Running counter attached to each streamed result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchProgress {
    /// 1-based index of this result among all results so far.
    pub current: usize,
    /// Pages sent to the AI judge in this run.
    pub total: usize,
}

/// Progress callback for crawl and scoring status.
pub trait ProgressReporter: Send + Sync {
    /// Called with the running page count as pages are discovered.
    fn pages_found(&self, count: usize);
    /// Called after every batch with the number of pages scored so far.
    fn batch_scored(&self, scored: usize, total: usize);
    /// Called once per scored page, as soon as its batch completes.
    fn realtime_result(&self, page: &ScoredPage, progress: BatchProgress);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn pages_found(&self, _count: usize) {}
    fn batch_scored(&self, _scored: usize, _total: usize) {}
    fn realtime_result(&self, _page: &ScoredPage, _progress: BatchProgress) {}
}
