//! AI relevance scoring for DocGate.
//!
//! This crate provides:
//! - [`ScoringAdapter`]: the provider-neutral scoring contract
//! - [`create_adapter`]: picks the adapter for a [`ProviderConfig`](docgate_shared::ProviderConfig)
//! - [`prompt`]: the shared scoring prompt
//! - [`response`]: tolerant parsing of model replies

pub mod adapters;
pub mod prompt;
pub mod response;

pub use adapters::{
    AnthropicAdapter, DeepSeekAdapter, GeminiAdapter, OllamaAdapter, OpenAiAdapter, ScoreRequest,
    ScoringAdapter, create_adapter,
};
pub use prompt::build_prompt;
pub use response::{MISSING_REASON, extract_json, parse_scored_pages};
