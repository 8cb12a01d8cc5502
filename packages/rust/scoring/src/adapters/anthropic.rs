use async_trait::async_trait;
use docgate_shared::{ProviderConfig, Result, ScoredPage};
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::openai_compat::ChatMessage;
use super::{ScoreRequest, ScoringAdapter, build_client, finish_reply, probe, send_json};
use crate::prompt::build_prompt;

const NAME: &str = "Anthropic";
const API_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 4096;
const PROBE_MAX_TOKENS: u32 = 64;
const PROBE_PROMPT: &str = r#"Reply with "ok""#;

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: [ChatMessage<'a>; 1],
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    text: Option<String>,
}

/// Anthropic Messages API.
pub struct AnthropicAdapter {
    config: ProviderConfig,
    client: Client,
}

impl AnthropicAdapter {
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        Ok(Self {
            config: config.clone(),
            client: build_client(config)?,
        })
    }

    fn messages(&self, prompt: &str, max_tokens: u32) -> RequestBuilder {
        let body = MessagesRequest {
            model: &self.config.model,
            max_tokens,
            messages: [ChatMessage::user(prompt)],
        };
        self.client
            .post(format!("{}/messages", self.config.endpoint))
            .header("x-api-key", self.config.api_key.as_str())
            .header("anthropic-version", API_VERSION)
            .json(&body)
    }
}

#[async_trait]
impl ScoringAdapter for AnthropicAdapter {
    fn name(&self) -> &str {
        NAME
    }

    /// Anthropic has no free probe endpoint, so this sends a tiny message.
    async fn test_connection(&self) -> bool {
        probe(NAME, self.messages(PROBE_PROMPT, PROBE_MAX_TOKENS)).await
    }

    async fn score_urls(&self, request: &ScoreRequest<'_>) -> Result<Vec<ScoredPage>> {
        let prompt = build_prompt(request.issue_description, request.pages);
        debug!(provider = NAME, model = %self.config.model, pages = request.pages.len(), "scoring batch");

        let response: MessagesResponse = send_json(NAME, self.messages(&prompt, MAX_TOKENS)).await?;
        let text = response.content.into_iter().next().and_then(|b| b.text);

        finish_reply(NAME, text, request.pages)
    }
}
