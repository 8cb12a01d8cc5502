//! AI provider adapters.
//!
//! Every provider implements [`ScoringAdapter`]. Adapters differ only in
//! endpoint, auth and response envelope; prompt rendering and reply
//! parsing are shared.

mod anthropic;
mod deepseek;
mod gemini;
mod ollama;
mod openai;
mod openai_compat;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use docgate_shared::{DocGateError, PageMetadata, ProviderConfig, ProviderName, Result, ScoredPage};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::response::parse_scored_pages;

pub use anthropic::AnthropicAdapter;
pub use deepseek::DeepSeekAdapter;
pub use gemini::GeminiAdapter;
pub use ollama::OllamaAdapter;
pub use openai::OpenAiAdapter;

/// User-Agent string for provider requests.
const USER_AGENT: &str = concat!("DocGate/", env!("CARGO_PKG_VERSION"));

/// Longest slice of an error body kept in error messages.
const ERROR_BODY_PREVIEW: usize = 200;

// ---------------------------------------------------------------------------
// ScoringAdapter trait
// ---------------------------------------------------------------------------

/// One batch of pages to score against a problem description.
#[derive(Debug, Clone, Copy)]
pub struct ScoreRequest<'a> {
    pub issue_description: &'a str,
    pub pages: &'a [PageMetadata],
}

/// Uniform scoring contract over AI backends.
#[async_trait]
pub trait ScoringAdapter: Send + Sync {
    /// Display name, e.g. `"OpenAI"`.
    fn name(&self) -> &str;

    /// Cheap reachability/auth probe. Success is judged by HTTP status only.
    async fn test_connection(&self) -> bool;

    /// Score one batch.
    ///
    /// Transport failures, non-2xx statuses and empty replies are errors.
    /// A reply that cannot be parsed yields an empty list.
    async fn score_urls(&self, request: &ScoreRequest<'_>) -> Result<Vec<ScoredPage>>;
}

/// Build the adapter for the configured provider.
pub fn create_adapter(config: &ProviderConfig) -> Result<Arc<dyn ScoringAdapter>> {
    if config.name.requires_api_key() && config.api_key.is_empty() {
        return Err(DocGateError::config(format!(
            "{} requires an API key",
            config.name.display_name()
        )));
    }

    let adapter: Arc<dyn ScoringAdapter> = match config.name {
        ProviderName::OpenAi => Arc::new(OpenAiAdapter::new(config)?),
        ProviderName::Anthropic => Arc::new(AnthropicAdapter::new(config)?),
        ProviderName::Gemini => Arc::new(GeminiAdapter::new(config)?),
        ProviderName::DeepSeek => Arc::new(DeepSeekAdapter::new(config)?),
        ProviderName::Ollama => Arc::new(OllamaAdapter::new(config)?),
    };

    debug!(provider = adapter.name(), model = %config.model, "created scoring adapter");
    Ok(adapter)
}

// ---------------------------------------------------------------------------
// Shared HTTP plumbing
// ---------------------------------------------------------------------------

pub(crate) fn build_client(config: &ProviderConfig) -> Result<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()
        .map_err(|e| DocGateError::Network(format!("failed to build HTTP client: {e}")))
}

/// Send a request and decode its JSON body, failing on transport errors and non-2xx.
pub(crate) async fn send_json<T: DeserializeOwned>(
    provider: &str,
    request: RequestBuilder,
) -> Result<T> {
    let response = request
        .send()
        .await
        .map_err(|e| DocGateError::Network(format!("{provider}: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        let preview: String = body.chars().take(ERROR_BODY_PREVIEW).collect();
        return Err(DocGateError::provider(
            provider,
            format!("HTTP {status}: {}", preview.trim()),
        ));
    }

    response
        .json()
        .await
        .map_err(|e| DocGateError::provider(provider, format!("invalid response body: {e}")))
}

/// Send a probe request and report whether it came back 2xx.
pub(crate) async fn probe(provider: &str, request: RequestBuilder) -> bool {
    match request.send().await {
        Ok(response) => response.status().is_success(),
        Err(e) => {
            debug!(provider, error = %e, "connection test failed");
            false
        }
    }
}

/// Turn the reply text into scored pages. A missing or blank reply is an error.
pub(crate) fn finish_reply(
    provider: &str,
    text: Option<String>,
    pages: &[PageMetadata],
) -> Result<Vec<ScoredPage>> {
    match text {
        Some(text) if !text.trim().is_empty() => Ok(parse_scored_pages(&text, pages)),
        _ => Err(DocGateError::provider(
            provider,
            format!("Empty response from {provider}"),
        )),
    }
}
