//! Offline provider used when no API key is configured.
//!
//! Answers every request by echoing the latest user message, streamed one
//! word at a time. It never requests tool calls.

use futures_util::stream;

use pmassist_types::llm::{
    CompletionRequest, CompletionResponse, LlmError, MessageRole, ProviderCapabilities,
    StopReason, StreamEvent, TokenCount, Usage,
};

use super::provider::{LlmProvider, LlmStream, estimate_request_tokens, estimate_tokens};

pub struct EchoProvider {
    capabilities: ProviderCapabilities,
}

impl EchoProvider {
    pub fn new() -> Self {
        Self {
            capabilities: ProviderCapabilities {
                streaming: true,
                tool_calling: false,
                max_context_tokens: 128_000,
                max_output_tokens: 4_096,
            },
        }
    }

    fn reply(request: &CompletionRequest) -> String {
        let last_user = request
            .messages
            .iter()
            .rev()
            .find(|m| m.role == MessageRole::User)
            .map(|m| m.content.as_str())
            .unwrap_or_default();
        format!("(offline) You said: {last_user}")
    }
}

impl Default for EchoProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl LlmProvider for EchoProvider {
    fn name(&self) -> &str {
        "echo"
    }

    fn capabilities(&self) -> &ProviderCapabilities {
        &self.capabilities
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let content = Self::reply(request);
        Ok(CompletionResponse {
            id: "echo".to_string(),
            usage: Usage {
                input_tokens: estimate_request_tokens(request),
                output_tokens: estimate_tokens(&content),
            },
            content,
            model: request.model.clone(),
            stop_reason: StopReason::EndTurn,
        })
    }

    fn stream(&self, request: CompletionRequest) -> LlmStream {
        let content = Self::reply(&request);
        let usage = Usage {
            input_tokens: estimate_request_tokens(&request),
            output_tokens: estimate_tokens(&content),
        };

        let mut events: Vec<Result<StreamEvent, LlmError>> = vec![Ok(StreamEvent::Connected)];
        events.extend(content.split_inclusive(' ').map(|word| {
            Ok(StreamEvent::TextDelta {
                index: 0,
                text: word.to_string(),
            })
        }));
        events.push(Ok(StreamEvent::MessageDelta {
            stop_reason: StopReason::EndTurn,
        }));
        events.push(Ok(StreamEvent::Usage(usage)));
        events.push(Ok(StreamEvent::Done));

        Box::pin(stream::iter(events))
    }

    async fn count_tokens(&self, request: &CompletionRequest) -> Result<TokenCount, LlmError> {
        Ok(TokenCount {
            input_tokens: estimate_request_tokens(request),
        })
    }
}
