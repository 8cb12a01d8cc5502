use async_trait::async_trait;
use docgate_shared::{ProviderConfig, Result, ScoredPage};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::openai_compat::ChatMessage;
use super::{ScoreRequest, ScoringAdapter, build_client, finish_reply, probe, send_json};
use crate::prompt::build_prompt;

const NAME: &str = "Ollama";

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
    format: &'static str,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: Option<ReplyMessage>,
}

#[derive(Debug, Deserialize)]
struct ReplyMessage {
    content: Option<String>,
}

/// Local Ollama server (`/api/chat`), no authentication.
pub struct OllamaAdapter {
    config: ProviderConfig,
    client: Client,
}

impl OllamaAdapter {
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        Ok(Self {
            config: config.clone(),
            client: build_client(config)?,
        })
    }
}

#[async_trait]
impl ScoringAdapter for OllamaAdapter {
    fn name(&self) -> &str {
        NAME
    }

    async fn test_connection(&self) -> bool {
        let request = self
            .client
            .get(format!("{}/api/tags", self.config.endpoint));
        probe(NAME, request).await
    }

    async fn score_urls(&self, request: &ScoreRequest<'_>) -> Result<Vec<ScoredPage>> {
        let prompt = build_prompt(request.issue_description, request.pages);
        debug!(provider = NAME, model = %self.config.model, pages = request.pages.len(), "scoring batch");

        let body = ChatRequest {
            model: &self.config.model,
            messages: [ChatMessage::user(&prompt)],
            format: "json",
            stream: false,
        };
        let http = self
            .client
            .post(format!("{}/api/chat", self.config.endpoint))
            .json(&body);

        let response: ChatResponse = send_json(NAME, http).await?;
        let text = response.message.and_then(|m| m.content);

        finish_reply(NAME, text, request.pages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::test_support::pages;
    use docgate_shared::ProviderName;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn adapter(server: &MockServer) -> OllamaAdapter {
        let config = ProviderConfig::new(ProviderName::Ollama, "")
            .with_model("llama-test")
            .with_endpoint(format!("{}/", server.uri()));
        OllamaAdapter::new(&config).unwrap()
    }

    #[tokio::test]
    async fn scores_wrapped_results() {
        let server = MockServer::start().await;
        // format=json makes Ollama return an object rather than a bare array
        let content = r#"{"results": [{"url": "https://docs.example.com/guide/auth", "relevance": 7, "category": "example", "reason": "Sample login flow."}]}"#;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .and(body_partial_json(json!({
                "model": "llama-test",
                "format": "json",
                "stream": false
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "message": {"role": "assistant", "content": content},
                "done": true
            })))
            .expect(1)
            .mount(&server)
            .await;

        let pages = pages();
        let request = ScoreRequest {
            issue_description: "login fails",
            pages: &pages,
        };
        let scored = adapter(&server).score_urls(&request).await.unwrap();

        assert_eq!(scored.len(), 1);
        assert_eq!(scored[0].relevance, 7.0);
        assert_eq!(scored[0].page.section, "guide");
    }

    #[tokio::test]
    async fn connection_test_hits_tags() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/tags"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"models": []})))
            .expect(1)
            .mount(&server)
            .await;

        assert!(adapter(&server).test_connection().await);
    }

    #[tokio::test]
    async fn unreachable_server_fails_connection_test() {
        let config = ProviderConfig::new(ProviderName::Ollama, "")
            .with_endpoint("http://127.0.0.1:9");
        let adapter = OllamaAdapter::new(&config).unwrap();
        assert!(!adapter.test_connection().await);
    }
}
