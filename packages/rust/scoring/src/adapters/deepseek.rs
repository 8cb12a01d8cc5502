use async_trait::async_trait;
use docgate_shared::{ProviderConfig, Result, ScoredPage};

use super::openai_compat::ChatCompletions;
use super::{ScoreRequest, ScoringAdapter};

/// DeepSeek, which speaks the OpenAI chat-completions protocol.
pub struct DeepSeekAdapter {
    inner: ChatCompletions,
}

impl DeepSeekAdapter {
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        Ok(Self {
            inner: ChatCompletions::new("DeepSeek", config)?,
        })
    }
}

#[async_trait]
impl ScoringAdapter for DeepSeekAdapter {
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
