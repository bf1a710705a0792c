//! Configuration for the OpenAI-compatible provider.
//!
//! The service talks to any endpoint that speaks the OpenAI chat completions
//! protocol (OpenAI itself, a LiteLLM proxy, vLLM, ...). Only the base URL,
//! key and model differ between them.

use secrecy::SecretString;

use pmassist_types::llm::ProviderCapabilities;

pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Configuration used to construct an [`super::OpenAiCompatibleProvider`].
pub struct OpenAiCompatConfig {
    /// Name reported in logs and GenAI spans.
    pub provider_name: String,
    pub base_url: String,
    pub api_key: SecretString,
    /// Default model when a request leaves `model` empty.
    pub model: String,
    pub capabilities: ProviderCapabilities,
}

fn default_capabilities() -> ProviderCapabilities {
    ProviderCapabilities {
        streaming: true,
        tool_calling: true,
        max_context_tokens: 128_000,
        max_output_tokens: 16_384,
    }
}

/// Configuration for `base_url`, or the public OpenAI endpoint when absent.
///
/// A custom base URL is reported as provider `litellm`, since that is the
/// proxy the service is normally deployed behind.
pub fn compat_defaults(
    base_url: Option<&str>,
    api_key: SecretString,
    model: &str,
) -> OpenAiCompatConfig {
    let (provider_name, base_url) = match base_url.map(str::trim).filter(|u| !u.is_empty()) {
        Some(url) => ("litellm", url.trim_end_matches('/').to_string()),
        None => ("openai", OPENAI_BASE_URL.to_string()),
    };

    OpenAiCompatConfig {
        provider_name: provider_name.to_string(),
        base_url,
        api_key,
        model: model.to_string(),
        capabilities: default_capabilities(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn test_defaults_to_openai() {
        let config = compat_defaults(None, SecretString::from("sk-test"), "gpt-4o-mini");
        assert_eq!(config.provider_name, "openai");
        assert_eq!(config.base_url, OPENAI_BASE_URL);
        assert_eq!(config.model, "gpt-4o-mini");
        assert_eq!(config.api_key.expose_secret(), "sk-test");
        assert!(config.capabilities.tool_calling);
    }

    #[test]
    fn test_custom_base_url_is_litellm() {
        let config = compat_defaults(
            Some("http://localhost:4000/"),
            SecretString::from("sk-test"),
            "gpt-4o",
        );
        assert_eq!(config.provider_name, "litellm");
        assert_eq!(config.base_url, "http://localhost:4000");
    }

    #[test]
    fn test_blank_base_url_ignored() {
        let config = compat_defaults(Some("  "), SecretString::from("k"), "m");
        assert_eq!(config.base_url, OPENAI_BASE_URL);
    }
}
