//! Configuration types for pmassist.
//!
//! `AppConfig` represents the top-level `config.toml`. Every field has a
//! default so an empty or missing file yields a working offline setup.

use secrecy::SecretString;
use serde::{Deserialize, Deserializer, Serialize};

/// Top-level configuration.
///
/// Loaded from `~/.pmassist/config.toml` (or `--config`), then overridden
/// from the environment by the infra loader.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub tools: ToolsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite URL. When unset the database lives in the data directory.
    #[serde(default)]
    pub url: Option<String>,
}

/// OpenAI-compatible endpoint settings (LiteLLM proxy or OpenAI itself).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default)]
    pub base_url: Option<String>,
    /// Never written back out. With no key the offline echo provider is used.
    #[serde(
        default,
        skip_serializing,
        deserialize_with = "deserialize_optional_secret"
    )]
    pub api_key: Option<SecretString>,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default)]
    pub temperature: Option<f64>,
    /// Per-complexity models. When absent every turn uses `model`.
    #[serde(default)]
    pub routing: Option<RoutingConfig>,
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_max_tokens() -> u32 {
    4096
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            api_key: None,
            model: default_model(),
            max_tokens: default_max_tokens(),
            temperature: None,
            routing: None,
        }
    }
}

fn deserialize_optional_secret<'de, D>(deserializer: D) -> Result<Option<SecretString>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.filter(|s| !s.is_empty()).map(SecretString::from))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingConfig {
    pub simple: String,
    pub medium: String,
    pub complex: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
    /// Estimated history size (tokens) above which older messages are summarized.
    #[serde(default = "default_summary_trigger_tokens")]
    pub summary_trigger_tokens: u32,
    #[serde(default = "default_messages_to_keep")]
    pub messages_to_keep: usize,
}

fn default_max_iterations() -> u32 {
    8
}

fn default_summary_trigger_tokens() -> u32 {
    4000
}

fn default_messages_to_keep() -> usize {
    20
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            summary_trigger_tokens: default_summary_trigger_tokens(),
            messages_to_keep: default_messages_to_keep(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    #[serde(default = "default_true")]
    pub http_request: bool,
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,
}

fn default_true() -> bool {
    true
}

fn default_http_timeout_secs() -> u64 {
    30
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            http_request: default_true(),
            http_timeout_secs: default_http_timeout_secs(),
        }
    }
}
