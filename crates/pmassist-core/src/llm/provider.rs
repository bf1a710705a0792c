//! LlmProvider trait definition.
//!
//! Uses RPITIT for `complete` and `count_tokens`, and `Pin<Box<dyn Stream>>`
//! for `stream` so that `BoxLlmProvider` can erase it.

use std::pin::Pin;

use futures_util::Stream;

use pmassist_types::llm::{
    CompletionRequest, CompletionResponse, LlmError, ProviderCapabilities, StreamEvent, TokenCount,
};

/// Boxed event stream returned by [`LlmProvider::stream`].
pub type LlmStream = Pin<Box<dyn Stream<Item = Result<StreamEvent, LlmError>> + Send + 'static>>;

/// Trait for LLM provider backends.
///
/// Implementations: `OpenAiCompatibleProvider` in pmassist-infra, and the
/// offline [`EchoProvider`](super::echo::EchoProvider) /
/// [`ScriptedProvider`](super::scripted::ScriptedProvider) in this crate.
pub trait LlmProvider: Send + Sync {
    /// Provider name used in spans and logs (e.g., "openai_compatible").
    fn name(&self) -> &str;

    fn capabilities(&self) -> &ProviderCapabilities;

    /// Send a completion request and receive the full response.
    fn complete(
        &self,
        request: &CompletionRequest,
    ) -> impl std::future::Future<Output = Result<CompletionResponse, LlmError>> + Send;

    /// Send a streaming completion request.
    ///
    /// Completed tool calls are reported as `ToolUseComplete` events; the
    /// stream ends with `Done`.
    fn stream(&self, request: CompletionRequest) -> LlmStream;

    /// Estimate the tokens in a request without sending it.
    fn count_tokens(
        &self,
        request: &CompletionRequest,
    ) -> impl std::future::Future<Output = Result<TokenCount, LlmError>> + Send;
}

/// Rough token estimate (about four characters per token) used where a
/// provider has no tokenizer endpoint.
pub fn estimate_tokens(text: &str) -> u32 {
    let chars = text.chars().count();
    u32::try_from(chars.div_ceil(4)).unwrap_or(u32::MAX)
}

/// Estimated tokens of a whole request: system prompt, messages and tool
/// call arguments.
pub fn estimate_request_tokens(request: &CompletionRequest) -> u32 {
    let system = request.system.as_deref().map(estimate_tokens).unwrap_or(0);
    request.messages.iter().fold(system, |acc, m| {
        let calls: u32 = m
            .tool_calls
            .iter()
            .map(|c| estimate_tokens(&c.name) + estimate_tokens(&c.input.to_string()))
            .sum();
        acc.saturating_add(estimate_tokens(&m.content))
            .saturating_add(calls)
    })
}
