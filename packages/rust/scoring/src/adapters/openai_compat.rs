//! Chat-completions client shared by OpenAI-compatible providers.

use docgate_shared::{ProviderConfig, Result, ScoredPage};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{ScoreRequest, build_client, finish_reply, probe, send_json};
use crate::prompt::build_prompt;

const TEMPERATURE: f32 = 0.2;

#[derive(Debug, Serialize)]
pub(crate) struct ChatMessage<'a> {
    pub role: &'static str,
    pub content: &'a str,
}

impl<'a> ChatMessage<'a> {
    pub fn user(content: &'a str) -> Self {
        Self {
            role: "user",
            content,
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Option<ReplyMessage>,
}

#[derive(Debug, Deserialize)]
struct ReplyMessage {
    content: Option<String>,
}

/// `POST {endpoint}/chat/completions` with bearer auth.
pub(crate) struct ChatCompletions {
    provider: &'static str,
    config: ProviderConfig,
    client: Client,
}

impl ChatCompletions {
    pub fn new(provider: &'static str, config: &ProviderConfig) -> Result<Self> {
        Ok(Self {
            provider,
            config: config.clone(),
            client: build_client(config)?,
        })
    }

    pub fn name(&self) -> &'static str {
        self.provider
    }

    pub async fn test_connection(&self) -> bool {
        let request = self
            .client
            .get(format!("{}/models", self.config.endpoint))
            .bearer_auth(&self.config.api_key);
        probe(self.provider, request).await
    }

    pub async fn score_urls(&self, request: &ScoreRequest<'_>) -> Result<Vec<ScoredPage>> {
        let prompt = build_prompt(request.issue_description, request.pages);
        debug!(
            provider = self.provider,
            model = %self.config.model,
            pages = request.pages.len(),
            "scoring batch"
        );

        let body = ChatRequest {
            model: &self.config.model,
            messages: [ChatMessage::user(&prompt)],
            temperature: TEMPERATURE,
        };
        let http = self
            .client
            .post(format!("{}/chat/completions", self.config.endpoint))
            .bearer_auth(&self.config.api_key)
            .json(&body);

        let response: ChatResponse = send_json(self.provider, http).await?;
        let text = response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message)
            .and_then(|m| m.content);

        finish_reply(self.provider, text, request.pages)
    }
}
