//! LLM call wrapper that instruments every request with a GenAI span.
//!
//! The runner, model selector, summarizer and PRD tools all go through
//! `AgentEngine` so each provider call is traced the same way.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures_util::Stream;
use pin_project_lite::pin_project;
use tracing::{Instrument, info_span};

use pmassist_types::llm::{CompletionRequest, CompletionResponse, LlmError, StreamEvent};

use crate::llm::box_provider::BoxLlmProvider;
use crate::llm::provider::LlmStream;

#[derive(Clone, Debug)]
pub struct AgentEngine {
    provider: BoxLlmProvider,
}

impl AgentEngine {
    pub fn new(provider: BoxLlmProvider) -> Self {
        Self { provider }
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Streaming call; the span stays entered while the stream is polled.
    pub fn stream(&self, request: CompletionRequest) -> LlmStream {
        let span = info_span!(
            "gen_ai.chat",
            gen_ai.system = self.provider.name(),
            gen_ai.operation.name = "chat",
            gen_ai.request.model = %request.model,
            gen_ai.request.max_tokens = request.max_tokens,
            gen_ai.request.temperature = ?request.temperature,
            gen_ai.request.stream = true,
            gen_ai.request.tool_count = request.tools.len(),
        );

        let inner = self.provider.stream(request);
        Box::pin(StreamInSpan { inner, span })
    }

    /// Non-streaming call for utility requests. `operation` names the span
    /// (e.g. "generate_prd", "classify", "summarize").
    pub async fn complete(
        &self,
        request: &CompletionRequest,
        operation: &'static str,
    ) -> Result<CompletionResponse, LlmError> {
        let span = info_span!(
            "gen_ai.complete",
            gen_ai.system = self.provider.name(),
            gen_ai.operation.name = operation,
            gen_ai.request.model = %request.model,
            gen_ai.request.max_tokens = request.max_tokens,
            gen_ai.request.stream = false,
        );

        self.provider.complete(request).instrument(span).await
    }
}

pin_project! {
    /// Keeps a span entered for every poll of the wrapped stream.
    struct StreamInSpan {
        #[pin]
        inner: LlmStream,
        span: tracing::Span,
    }
}

impl Stream for StreamInSpan {
    type Item = Result<StreamEvent, LlmError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.project();
        let _enter = this.span.enter();
        this.inner.poll_next(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::scripted::{ScriptedProvider, ScriptedTurn};
    use futures_util::StreamExt;

    #[tokio::test]
    async fn test_stream_passes_events_through() {
        let engine = AgentEngine::new(BoxLlmProvider::new(ScriptedProvider::new([
            ScriptedTurn::Text(vec!["a".into(), "b".into()]),
        ])));
        let request = CompletionRequest::simple("m", "s", "q".to_string(), 16);
        let texts: Vec<String> = engine
            .stream(request)
            .filter_map(|e| async move {
                match e {
                    Ok(StreamEvent::TextDelta { text, .. }) => Some(text),
                    _ => None,
                }
            })
            .collect()
            .await;
        assert_eq!(texts, vec!["a", "b"]);
        assert_eq!(engine.provider_name(), "scripted");
    }

    #[tokio::test]
    async fn test_complete_delegates() {
        let engine = AgentEngine::new(BoxLlmProvider::new(ScriptedProvider::new([
            ScriptedTurn::text("hello"),
        ])));
        let request = CompletionRequest::simple("m", "s", "q".to_string(), 16);
        let response = engine.complete(&request, "test").await.unwrap();
        assert_eq!(response.content, "hello");
    }
}
