//! LLM provider implementations.
//!
//! The service talks to a single OpenAI-compatible endpoint. [`create_provider`]
//! builds it from [`LlmConfig`], or falls back to the offline
//! [`EchoProvider`] when no API key is configured.

pub mod openai_compat;

use pmassist_core::llm::box_provider::BoxLlmProvider;
use pmassist_core::llm::echo::EchoProvider;
use pmassist_types::config::LlmConfig;

use self::openai_compat::OpenAiCompatibleProvider;
use self::openai_compat::config::compat_defaults;

/// Create a [`BoxLlmProvider`] from the `[llm]` configuration section.
pub fn create_provider(config: &LlmConfig) -> BoxLlmProvider {
    match &config.api_key {
        Some(api_key) => {
            let compat = compat_defaults(config.base_url.as_deref(), api_key.clone(), &config.model);
            tracing::info!(
                provider = %compat.provider_name,
                base_url = %compat.base_url,
                model = %compat.model,
                "using OpenAI-compatible provider"
            );
            BoxLlmProvider::new(OpenAiCompatibleProvider::new(compat))
        }
        None => {
            tracing::warn!("no LLM API key configured, answering with the offline echo provider");
            BoxLlmProvider::new(EchoProvider::new())
        }
    }
}
