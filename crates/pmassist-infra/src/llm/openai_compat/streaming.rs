//! OpenAI SSE stream to [`StreamEvent`] adapter.
//!
//! Tool call arguments arrive as partial JSON fragments spread over several
//! chunks, keyed by tool call index. They are accumulated and emitted as
//! [`StreamEvent::ToolUseComplete`] once a finish reason arrives (or the
//! stream ends without one).

use std::collections::BTreeMap;

use futures_util::StreamExt;

use async_openai::types::chat::ChatCompletionResponseStream;

use pmassist_core::llm::provider::LlmStream;
use pmassist_types::llm::{LlmError, StreamEvent, Usage};

use super::map_finish_reason;

/// Partial tool call assembled from streamed fragments.
#[derive(Debug, Default)]
struct ToolCallAccumulator {
    id: String,
    name: String,
    json_buffer: String,
}

impl ToolCallAccumulator {
    fn into_event(self) -> Result<StreamEvent, LlmError> {
        let input = if self.json_buffer.trim().is_empty() {
            serde_json::Value::Object(Default::default())
        } else {
            serde_json::from_str(&self.json_buffer).map_err(|e| {
                LlmError::Deserialization(format!("tool call JSON for '{}': {e}", self.name))
            })?
        };
        Ok(StreamEvent::ToolUseComplete {
            id: self.id,
            name: self.name,
            input,
        })
    }
}

/// Drain every accumulated tool call in index order.
fn drain_tool_calls(
    accumulators: &mut BTreeMap<u32, ToolCallAccumulator>,
) -> Result<Vec<StreamEvent>, LlmError> {
    std::mem::take(accumulators)
        .into_values()
        .map(ToolCallAccumulator::into_event)
        .collect()
}

/// Map an async-openai [`ChatCompletionResponseStream`] to a stream of [`StreamEvent`]s.
///
/// Emits `Connected` first, then `TextDelta`s as content arrives,
/// `ToolUseComplete` for each assembled call, `MessageDelta` on the finish
/// reason, `Usage` when the server reports it and finally `Done`.
pub fn map_openai_stream(stream: ChatCompletionResponseStream) -> LlmStream {
    Box::pin(async_stream::try_stream! {
        yield StreamEvent::Connected;

        let mut accumulators: BTreeMap<u32, ToolCallAccumulator> = BTreeMap::new();
        let mut stream = stream;

        while let Some(result) = stream.next().await {
            let chunk = result.map_err(|e| LlmError::Stream(e.to_string()))?;

            // The final chunk carries usage with an empty choices array.
            if let Some(usage) = &chunk.usage {
                yield StreamEvent::Usage(Usage {
                    input_tokens: usage.prompt_tokens,
                    output_tokens: usage.completion_tokens,
                });
            }

            for choice in &chunk.choices {
                if let Some(text) = choice.delta.content.as_ref().filter(|t| !t.is_empty()) {
                    yield StreamEvent::TextDelta {
                        index: 0,
                        text: text.clone(),
                    };
                }

                if let Some(tool_calls) = &choice.delta.tool_calls {
                    for tc in tool_calls {
                        let acc = accumulators.entry(tc.index).or_default();
                        if let Some(id) = tc.id.as_ref().filter(|id| !id.is_empty()) {
                            acc.id = id.clone();
                        }
                        if let Some(function) = &tc.function {
                            if let Some(name) = function.name.as_ref().filter(|n| !n.is_empty()) {
                                acc.name = name.clone();
                            }
                            if let Some(args) = &function.arguments {
                                acc.json_buffer.push_str(args);
                            }
                        }
                    }
                }

                if let Some(finish_reason) = &choice.finish_reason {
                    for event in drain_tool_calls(&mut accumulators)? {
                        yield event;
                    }
                    yield StreamEvent::MessageDelta {
                        stop_reason: map_finish_reason(finish_reason),
                    };
                }
            }
        }

        // Some proxies close the stream without a finish reason.
        for event in drain_tool_calls(&mut accumulators)? {
            yield event;
        }

        yield StreamEvent::Done;
    })
}
