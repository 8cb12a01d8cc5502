//! Application configuration for DocGate.
//!
//! User config lives at `~/.docgate/docgate.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{DocGateError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "docgate.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".docgate";

// ---------------------------------------------------------------------------
// Providers
// ---------------------------------------------------------------------------

/// Supported AI scoring backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderName {
    #[default]
    OpenAi,
    Anthropic,
    Gemini,
    DeepSeek,
    Ollama,
}

impl ProviderName {
    /// Human-readable name reported in outcomes and logs.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::OpenAi => "OpenAI",
            Self::Anthropic => "Anthropic",
            Self::Gemini => "Gemini",
            Self::DeepSeek => "DeepSeek",
            Self::Ollama => "Ollama",
        }
    }

    /// Base URL used when no endpoint override is configured.
    pub fn default_endpoint(&self) -> &'static str {
        match self {
            Self::OpenAi => "https://api.openai.com/v1",
            Self::Anthropic => "https://api.anthropic.com/v1",
            Self::Gemini => "https://generativelanguage.googleapis.com/v1beta",
            Self::DeepSeek => "https://api.deepseek.com/v1",
            Self::Ollama => "http://localhost:11434",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            Self::OpenAi => "gpt-4o-mini",
            Self::Anthropic => "claude-3-5-haiku-20241022",
            Self::Gemini => "gemini-2.0-flash",
            Self::DeepSeek => "deepseek-chat",
            Self::Ollama => "llama3.2",
        }
    }

    /// Env var conventionally holding this provider's key.
    pub fn default_api_key_env(&self) -> &'static str {
        match self {
            Self::OpenAi => "OPENAI_API_KEY",
            Self::Anthropic => "ANTHROPIC_API_KEY",
            Self::Gemini => "GEMINI_API_KEY",
            Self::DeepSeek => "DEEPSEEK_API_KEY",
            Self::Ollama => "OLLAMA_API_KEY",
        }
    }

    /// Local Ollama runs without a key.
    pub fn requires_api_key(&self) -> bool {
        !matches!(self, Self::Ollama)
    }
}

impl std::fmt::Display for ProviderName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tag = match self {
            Self::OpenAi => "openai",
            Self::Anthropic => "anthropic",
            Self::Gemini => "gemini",
            Self::DeepSeek => "deepseek",
            Self::Ollama => "ollama",
        };
        f.write_str(tag)
    }
}

impl std::str::FromStr for ProviderName {
    type Err = DocGateError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "anthropic" => Ok(Self::Anthropic),
            "gemini" => Ok(Self::Gemini),
            "deepseek" => Ok(Self::DeepSeek),
            "ollama" => Ok(Self::Ollama),
            other => Err(DocGateError::config(format!("unknown AI provider: {other}"))),
        }
    }
}

// ---------------------------------------------------------------------------
// Config structs (matching docgate.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// AI provider selection.
    #[serde(default)]
    pub provider: ProviderSection,

    /// Discovery limits.
    #[serde(default)]
    pub crawl: CrawlConfig,

    /// Scoring and result limits.
    #[serde(default)]
    pub filter: FilterConfig,
}

/// `[provider]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderSection {
    #[serde(default)]
    pub name: ProviderName,

    /// Model id; the provider's default when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,

    /// Base URL override (self-hosted Ollama, proxies, gateways).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    /// Per-request timeout for AI calls.
    #[serde(default = "default_ai_timeout")]
    pub timeout_secs: u64,
}

impl Default for ProviderSection {
    fn default() -> Self {
        Self {
            name: ProviderName::default(),
            model: None,
            api_key_env: None,
            endpoint: None,
            timeout_secs: default_ai_timeout(),
        }
    }
}

fn default_ai_timeout() -> u64 {
    120
}

/// `[crawl]` section, also used as the runtime crawl configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlConfig {
    /// Maximum number of pages collected per crawl.
    #[serde(default = "default_max_urls")]
    pub max_urls: usize,

    /// Maximum BFS depth for the DOM crawler (levels, root = level 0).
    #[serde(default = "default_max_depth")]
    pub max_depth: u32,

    /// Concurrent page fetches per level.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,

    /// Pause between crawl levels in ms.
    #[serde(default = "default_request_delay")]
    pub request_delay_ms: u64,

    /// Per-fetch timeout in seconds.
    #[serde(default = "default_crawl_timeout")]
    pub timeout_secs: u64,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            max_urls: default_max_urls(),
            max_depth: default_max_depth(),
            max_concurrent: default_max_concurrent(),
            request_delay_ms: default_request_delay(),
            timeout_secs: default_crawl_timeout(),
        }
    }
}

fn default_max_urls() -> usize {
    200
}
fn default_max_depth() -> u32 {
    2
}
fn default_max_concurrent() -> usize {
    5
}
fn default_request_delay() -> u64 {
    200
}
fn default_crawl_timeout() -> u64 {
    10
}

/// Delay growth between AI retry attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackoffStrategy {
    /// `retry * base`
    #[default]
    Linear,
    /// `base * 2^(retry - 1)`
    Exponential,
}

/// `[filter]` section, also used as the runtime filter configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Cap on returned results.
    #[serde(default = "default_max_results")]
    pub max_results: usize,

    /// Pages per AI call.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Total attempts per batch before degrading to zero scores.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default)]
    pub backoff: BackoffStrategy,

    #[serde(default = "default_backoff_base")]
    pub backoff_base_ms: u64,

    /// Additional case-insensitive regexes for the pre-filter.
    #[serde(default)]
    pub extra_exclude_patterns: Vec<String>,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            max_results: default_max_results(),
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            backoff: BackoffStrategy::default(),
            backoff_base_ms: default_backoff_base(),
            extra_exclude_patterns: Vec::new(),
        }
    }
}

fn default_max_results() -> usize {
    15
}
fn default_batch_size() -> usize {
    20
}
fn default_max_retries() -> u32 {
    3
}
fn default_backoff_base() -> u64 {
    1000
}

// ---------------------------------------------------------------------------
// Runtime settings (resolved from config + environment)
// ---------------------------------------------------------------------------

/// Fully resolved provider settings handed to the adapter factory.
#[derive(Clone)]
pub struct ProviderConfig {
    pub name: ProviderName,
    pub api_key: String,
    pub model: String,
    /// Base URL, without trailing slash.
    pub endpoint: String,
    pub timeout_secs: u64,
}

impl ProviderConfig {
    /// Provider defaults with the given key.
    pub fn new(name: ProviderName, api_key: impl Into<String>) -> Self {
        Self {
            name,
            api_key: api_key.into(),
            model: name.default_model().to_string(),
            endpoint: name.default_endpoint().to_string(),
            timeout_secs: default_ai_timeout(),
        }
    }

    /// Override the base URL (trailing slashes are dropped).
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("name", &self.name)
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("endpoint", &self.endpoint)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

/// Everything one analysis needs from configuration.
#[derive(Debug, Clone)]
pub struct Settings {
    pub provider: ProviderConfig,
    pub crawl: CrawlConfig,
    pub filter: FilterConfig,
}

impl Settings {
    /// Resolve settings from a loaded config, reading the API key from the environment.
    pub fn resolve(config: &AppConfig) -> Result<Self> {
        let section = &config.provider;
        let name = section.name;

        let mut provider = ProviderConfig::new(name, resolve_api_key(section)?);
        provider.timeout_secs = section.timeout_secs;
        if let Some(model) = &section.model {
            provider = provider.with_model(model.clone());
        }
        if let Some(endpoint) = &section.endpoint {
            provider = provider.with_endpoint(endpoint.clone());
        }

        Ok(Self {
            provider,
            crawl: config.crawl.clone(),
            filter: config.filter.clone(),
        })
    }

    pub fn max_urls_to_crawl(&self) -> usize {
        self.crawl.max_urls
    }

    pub fn max_results_to_return(&self) -> usize {
        self.filter.max_results
    }
}

/// Read the provider key from its env var. Ollama tolerates a missing key.
fn resolve_api_key(section: &ProviderSection) -> Result<String> {
    let var_name = section
        .api_key_env
        .clone()
        .unwrap_or_else(|| section.name.default_api_key_env().to_string());

    match std::env::var(&var_name) {
        Ok(val) if !val.is_empty() => Ok(val),
        _ if !section.name.requires_api_key() => Ok(String::new()),
        _ => Err(DocGateError::config(format!(
            "{} API key not found. Set the {var_name} environment variable.",
            section.name.display_name()
        ))),
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.docgate/`).
pub fn config_dir() -> Result<PathBuf> {
    let home =
        dirs::home_dir().ok_or_else(|| DocGateError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.docgate/docgate.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| DocGateError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| DocGateError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| DocGateError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| DocGateError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| DocGateError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("max_urls"));
        assert!(toml_str.contains("name = \"openai\""));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.crawl.max_depth, 2);
        assert_eq!(parsed.crawl.max_concurrent, 5);
        assert_eq!(parsed.filter.batch_size, 20);
        assert_eq!(parsed.filter.max_retries, 3);
        assert_eq!(parsed.filter.backoff, BackoffStrategy::Linear);
    }

    #[test]
    fn partial_config_uses_defaults() {
        let toml_str = r#"
[provider]
name = "ollama"
endpoint = "http://gpu-box:11434/"

[filter]
max_results = 5
backoff = "exponential"
extra_exclude_patterns = ["^https://x\\.com/old/"]
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.provider.name, ProviderName::Ollama);
        assert_eq!(config.crawl.max_urls, 200);
        assert_eq!(config.filter.max_results, 5);
        assert_eq!(config.filter.backoff, BackoffStrategy::Exponential);
        assert_eq!(config.filter.extra_exclude_patterns.len(), 1);

        // Ollama needs no key, and the endpoint loses its trailing slash.
        let settings = Settings::resolve(&config).expect("resolve");
        assert_eq!(settings.provider.endpoint, "http://gpu-box:11434");
        assert_eq!(settings.provider.model, "llama3.2");
        assert_eq!(settings.max_results_to_return(), 5);
        assert_eq!(settings.max_urls_to_crawl(), 200);
    }

    #[test]
    fn unknown_provider_is_rejected() {
        let toml_str = "[provider]\nname = \"bard\"\n";
        assert!(toml::from_str::<AppConfig>(toml_str).is_err());
        assert!("bard".parse::<ProviderName>().is_err());
        assert_eq!("DeepSeek".parse::<ProviderName>().unwrap(), ProviderName::DeepSeek);
    }

    #[test]
    fn api_key_validation() {
        let mut config = AppConfig::default();
        config.provider.name = ProviderName::Anthropic;
        // Use a unique env var name to avoid interfering with other tests
        config.provider.api_key_env = Some("DG_TEST_NONEXISTENT_KEY_12345".into());
        let result = Settings::resolve(&config);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("API key not found"));
    }

    #[test]
    fn provider_config_debug_redacts_key() {
        let config = ProviderConfig::new(ProviderName::OpenAi, "sk-secret");
        let debug = format!("{config:?}");
        assert!(!debug.contains("sk-secret"));
        assert!(debug.contains("<redacted>"));
    }
}
