//! Batched AI scoring with retry and degradation.
//!
//! Pages are scored in fixed-size batches, one AI call at a time. A batch
//! whose calls keep failing (or keep returning nothing usable) is given
//! zero-relevance placeholder results so the run always completes.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use docgate_scoring::{ScoreRequest, ScoringAdapter};
use docgate_shared::{BackoffStrategy, Category, FilterConfig, PageMetadata, ScoredPage};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::progress::{BatchProgress, ProgressReporter};

/// Reason attached to placeholder results of a batch that could not be scored.
pub const FAILED_BATCH_REASON: &str = "Failed to score - AI error";

// ---------------------------------------------------------------------------
// RetryPolicy
// ---------------------------------------------------------------------------

/// How many times a batch is attempted and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts per batch, including the first.
    pub max_attempts: u32,
    pub strategy: BackoffStrategy,
    pub base: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &FilterConfig) -> Self {
        Self {
            max_attempts: config.max_retries,
            strategy: config.backoff,
            base: Duration::from_millis(config.backoff_base_ms),
        }
    }

    /// Wait before retry number `retry` (1-based).
    ///
    /// Linear: `retry * base`. Exponential: `base * 2^(retry - 1)`.
    pub fn delay_for(&self, retry: u32) -> Duration {
        let retry = retry.max(1);
        match self.strategy {
            BackoffStrategy::Linear => self.base.saturating_mul(retry),
            BackoffStrategy::Exponential => self
                .base
                .saturating_mul(2u32.saturating_pow(retry - 1)),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&FilterConfig::default())
    }
}

// ---------------------------------------------------------------------------
// AiScorer
// ---------------------------------------------------------------------------

/// Drives a [`ScoringAdapter`] over batches of pages.
pub struct AiScorer {
    adapter: Arc<dyn ScoringAdapter>,
    batch_size: usize,
    retry: RetryPolicy,
}

impl AiScorer {
    pub fn new(adapter: Arc<dyn ScoringAdapter>, config: &FilterConfig) -> Self {
        Self {
            adapter,
            batch_size: config.batch_size.max(1),
            retry: RetryPolicy::from_config(config),
        }
    }

    pub fn adapter_name(&self) -> &str {
        self.adapter.name()
    }

    /// Score `pages` against `issue_description`.
    ///
    /// Every scored page is streamed through `progress` as soon as its batch
    /// completes, and `batch_scored` fires after every batch. The returned
    /// list is sorted by relevance, descending; ties keep arrival order.
    /// If `cancel` fires, scoring stops after the current batch.
    #[instrument(skip_all, fields(provider = %self.adapter.name(), pages = pages.len()))]
    pub async fn score(
        &self,
        issue_description: &str,
        pages: &[PageMetadata],
        progress: &dyn ProgressReporter,
        cancel: Option<&CancellationToken>,
    ) -> Vec<ScoredPage> {
        let total = pages.len();
        let mut all: Vec<ScoredPage> = Vec::with_capacity(total);

        for (index, batch) in pages.chunks(self.batch_size).enumerate() {
            let scored = self.score_batch(issue_description, batch, index).await;

            for page in scored {
                let counter = BatchProgress {
                    current: all.len() + 1,
                    total,
                };
                progress.realtime_result(&page, counter);
                all.push(page);
            }
            progress.batch_scored(all.len(), total);

            if cancel.is_some_and(|t| t.is_cancelled()) {
                debug!(batch = index, "scoring cancelled");
                break;
            }
        }

        all.sort_by(|a, b| b.relevance.total_cmp(&a.relevance));

        info!(scored = all.len(), "AI scoring complete");
        all
    }

    /// Score one batch, retrying per the policy. An empty reply for a
    /// non-empty batch counts as a failed attempt.
    async fn score_batch(
        &self,
        issue_description: &str,
        batch: &[PageMetadata],
        index: usize,
    ) -> Vec<ScoredPage> {
        let attempts = self.retry.max_attempts.max(1);
        let request = ScoreRequest {
            issue_description,
            pages: batch,
        };

        for attempt in 1..=attempts {
            match self.adapter.score_urls(&request).await.map(|s| keep_batch_pages(s, batch)) {
                Ok(scored) if !scored.is_empty() => {
                    debug!(batch = index, attempt, results = scored.len(), "batch scored");
                    return scored;
                }
                Ok(_) => warn!(batch = index, attempt, "AI reply contained no usable results"),
                Err(e) => warn!(batch = index, attempt, error = %e, "AI scoring call failed"),
            }

            if attempt < attempts {
                tokio::time::sleep(self.retry.delay_for(attempt)).await;
            }
        }

        error!(
            batch = index,
            attempts,
            pages = batch.len(),
            "batch failed after all attempts, assigning zero scores"
        );
        batch
            .iter()
            .map(|page| ScoredPage::new(page.clone(), 0.0, Category::Reference, FAILED_BATCH_REASON))
            .collect()
    }
}

/// Drop results for URLs outside `batch` and repeats of a URL already seen.
fn keep_batch_pages(scored: Vec<ScoredPage>, batch: &[PageMetadata]) -> Vec<ScoredPage> {
    let mut pending: HashSet<&str> = batch.iter().map(|p| p.url.as_str()).collect();
    let before = scored.len();
    let kept: Vec<ScoredPage> = scored
        .into_iter()
        .filter(|s| pending.remove(s.url()))
        .collect();
    if kept.len() < before {
        debug!(dropped = before - kept.len(), "discarded results outside the batch");
    }
    kept
}
