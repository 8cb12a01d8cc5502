use async_trait::async_trait;
use docgate_shared::{ProviderConfig, Result, ScoredPage};

use super::openai_compat::ChatCompletions;
use super::{ScoreRequest, ScoringAdapter};

/// OpenAI chat completions.
pub struct OpenAiAdapter {
    inner: ChatCompletions,
}

impl OpenAiAdapter {
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        Ok(Self {
            inner: ChatCompletions::new("OpenAI", config)?,
        })
    }
}

#[async_trait]
impl ScoringAdapter for OpenAiAdapter {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn test_connection(&self) -> bool {
        self.inner.test_connection().await
    }

    async fn score_urls(&self, request: &ScoreRequest<'_>) -> Result<Vec<ScoredPage>> {
        self.inner.score_urls(request).await
    }
}
