use async_trait::async_trait;
use docgate_shared::{ProviderConfig, Result, ScoredPage};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{ScoreRequest, ScoringAdapter, build_client, finish_reply, probe, send_json};
use crate::prompt::build_prompt;

const NAME: &str = "Gemini";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: [Content<'a>; 1],
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: [Part<'a>; 1],
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: &'static str,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ReplyPart>,
}

#[derive(Debug, Deserialize)]
struct ReplyPart {
    text: Option<String>,
}

/// Google Gemini `generateContent`, key passed as a query parameter.
pub struct GeminiAdapter {
    config: ProviderConfig,
    client: Client,
}

impl GeminiAdapter {
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        Ok(Self {
            config: config.clone(),
            client: build_client(config)?,
        })
    }
}

#[async_trait]
impl ScoringAdapter for GeminiAdapter {
    fn name(&self) -> &str {
        NAME
    }

    async fn test_connection(&self) -> bool {
        let request = self
            .client
            .get(format!("{}/models", self.config.endpoint))
            .query(&[("key", self.config.api_key.as_str())]);
        probe(NAME, request).await
    }

    async fn score_urls(&self, request: &ScoreRequest<'_>) -> Result<Vec<ScoredPage>> {
        let prompt = build_prompt(request.issue_description, request.pages);
        debug!(provider = NAME, model = %self.config.model, pages = request.pages.len(), "scoring batch");

        let body = GenerateRequest {
            contents: [Content {
                parts: [Part { text: &prompt }],
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json",
            },
        };
        let http = self
            .client
            .post(format!(
                "{}/models/{}:generateContent",
                self.config.endpoint, self.config.model
            ))
            .query(&[("key", self.config.api_key.as_str())])
            .json(&body);

        let response: GenerateResponse = send_json(NAME, http).await?;
        let text = response
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .and_then(|c| c.parts.into_iter().next())
            .and_then(|p| p.text);

        finish_reply(NAME, text, request.pages)
    }
}
