//! Filter pipeline: pre-filter, AI scoring, then trim to the relevant few.

use std::sync::Arc;
use std::time::Instant;

use docgate_scoring::ScoringAdapter;
use docgate_shared::{FilterConfig, FilterOutcome, PageMetadata, Result};
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};

use crate::prefilter::PreFilter;
use crate::progress::ProgressReporter;
use crate::scorer::AiScorer;

pub struct FilterPipeline {
    prefilter: PreFilter,
    scorer: AiScorer,
    max_results: usize,
}

impl FilterPipeline {
    /// Fails only if `config` carries an invalid extra exclude pattern.
    pub fn new(adapter: Arc<dyn ScoringAdapter>, config: &FilterConfig) -> Result<Self> {
        Ok(Self {
            prefilter: PreFilter::new(&config.extra_exclude_patterns)?,
            scorer: AiScorer::new(adapter, config),
            max_results: config.max_results,
        })
    }

    /// Run the pipeline over `pages`.
    ///
    /// Results keep only pages with relevance above zero, sorted by
    /// relevance descending and capped at `max_results`.
    #[instrument(skip_all, fields(pages = pages.len()))]
    pub async fn run(
        &self,
        pages: &[PageMetadata],
        issue_description: &str,
        progress: &dyn ProgressReporter,
        cancel: Option<&CancellationToken>,
    ) -> FilterOutcome {
        let start = Instant::now();

        let prefiltered = self.prefilter.apply(pages);
        let scored = self
            .scorer
            .score(issue_description, &prefiltered.passed, progress, cancel)
            .await;

        let results: Vec<_> = scored
            .into_iter()
            .filter(|s| s.relevance > 0.0)
            .take(self.max_results)
            .collect();

        let outcome = FilterOutcome {
            issue_description: issue_description.to_string(),
            total_scanned: pages.len(),
            pre_filtered: prefiltered.filtered,
            ai_scored: prefiltered.passed.len(),
            results,
            provider_name: self.scorer.adapter_name().to_string(),
            duration_ms: start.elapsed().as_millis() as u64,
        };

        info!(
            scanned = outcome.total_scanned,
            pre_filtered = outcome.pre_filtered,
            ai_scored = outcome.ai_scored,
            relevant = outcome.results.len(),
            "filter pipeline complete"
        );

        outcome
    }
}
