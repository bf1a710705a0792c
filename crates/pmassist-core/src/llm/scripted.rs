//! Deterministic provider that replays canned turns.
//!
//! Each call to `stream` or `complete` consumes the next [`ScriptedTurn`].
//! Requests are recorded so tests can assert on what the agent sent.

use std::collections::VecDeque;
use std::sync::Mutex;

use futures_util::{StreamExt, stream};

use pmassist_types::llm::{
    CompletionRequest, CompletionResponse, LlmError, ProviderCapabilities, StopReason,
    StreamEvent, TokenCount, ToolCall, Usage,
};

use super::provider::{LlmProvider, LlmStream, estimate_request_tokens};

/// One scripted model response.
#[derive(Debug, Clone)]
pub enum ScriptedTurn {
    /// Stream these text chunks, then finish the turn.
    Text(Vec<String>),
    /// Optional leading text followed by tool calls.
    ToolCalls { text: String, calls: Vec<ToolCall> },
    /// Fail the request with a provider error.
    Error(String),
    /// Emit the given text chunk, then never finish.
    Stall(String),
}

impl ScriptedTurn {
    pub fn text(content: &str) -> Self {
        ScriptedTurn::Text(vec![content.to_string()])
    }

    pub fn tool_call(id: &str, name: &str, input: serde_json::Value) -> Self {
        ScriptedTurn::ToolCalls {
            text: String::new(),
            calls: vec![ToolCall {
                id: id.to_string(),
                name: name.to_string(),
                input,
            }],
        }
    }
}

pub struct ScriptedProvider {
    turns: Mutex<VecDeque<ScriptedTurn>>,
    requests: Mutex<Vec<CompletionRequest>>,
    capabilities: ProviderCapabilities,
}

impl ScriptedProvider {
    pub fn new(turns: impl IntoIterator<Item = ScriptedTurn>) -> Self {
        Self {
            turns: Mutex::new(turns.into_iter().collect()),
            requests: Mutex::new(Vec::new()),
            capabilities: ProviderCapabilities {
                streaming: true,
                tool_calling: true,
                max_context_tokens: 128_000,
                max_output_tokens: 4_096,
            },
        }
    }

    /// Requests received so far, oldest first.
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    pub fn remaining(&self) -> usize {
        self.turns.lock().map(|t| t.len()).unwrap_or(0)
    }

    fn next_turn(&self, request: &CompletionRequest) -> Result<ScriptedTurn, LlmError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }
        self.turns
            .lock()
            .ok()
            .and_then(|mut turns| turns.pop_front())
            .ok_or_else(|| LlmError::Provider {
                message: "script exhausted".to_string(),
            })
    }
}

impl LlmProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    fn capabilities(&self) -> &ProviderCapabilities {
        &self.capabilities
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let content = match self.next_turn(request)? {
            ScriptedTurn::Text(chunks) => chunks.concat(),
            ScriptedTurn::ToolCalls { text, .. } | ScriptedTurn::Stall(text) => text,
            ScriptedTurn::Error(message) => return Err(LlmError::Provider { message }),
        };
        Ok(CompletionResponse {
            id: "scripted".to_string(),
            content,
            model: request.model.clone(),
            stop_reason: StopReason::EndTurn,
            usage: Usage::default(),
        })
    }

    fn stream(&self, request: CompletionRequest) -> LlmStream {
        let turn = match self.next_turn(&request) {
            Ok(turn) => turn,
            Err(e) => return Box::pin(stream::once(async move { Err(e) })),
        };

        let text_delta = |text: String| -> Result<StreamEvent, LlmError> {
            Ok(StreamEvent::TextDelta { index: 0, text })
        };
        let finish = |stop_reason: StopReason| -> Vec<Result<StreamEvent, LlmError>> {
            vec![
                Ok(StreamEvent::MessageDelta { stop_reason }),
                Ok(StreamEvent::Done),
            ]
        };

        match turn {
            ScriptedTurn::Text(chunks) => {
                let mut events: Vec<_> = chunks.into_iter().map(text_delta).collect();
                events.extend(finish(StopReason::EndTurn));
                Box::pin(stream::iter(events))
            }
            ScriptedTurn::ToolCalls { text, calls } => {
                let mut events = Vec::new();
                if !text.is_empty() {
                    events.push(text_delta(text));
                }
                events.extend(calls.into_iter().map(|c| {
                    Ok(StreamEvent::ToolUseComplete {
                        id: c.id,
                        name: c.name,
                        input: c.input,
                    })
                }));
                events.extend(finish(StopReason::ToolUse));
                Box::pin(stream::iter(events))
            }
            ScriptedTurn::Error(message) => {
                Box::pin(stream::once(async move { Err(LlmError::Provider { message }) }))
            }
            ScriptedTurn::Stall(text) => Box::pin(
                stream::once(async move { text_delta(text) }).chain(stream::pending()),
            ),
        }
    }

    async fn count_tokens(&self, request: &CompletionRequest) -> Result<TokenCount, LlmError> {
        Ok(TokenCount {
            input_tokens: estimate_request_tokens(request),
        })
    }
}
