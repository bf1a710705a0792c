//! Context summarizer for long threads.
//!
//! When the estimated size of a thread's history crosses the configured
//! trigger, everything except the most recent messages is condensed into a
//! running summary stored in the conversation state.

use tracing::{info, warn};

use pmassist_types::llm::{CompletionRequest, LlmError, Message, MessageRole};
use pmassist_types::thread::ConversationState;

use crate::llm::provider::estimate_tokens;

use super::engine::AgentEngine;

const SUMMARY_SYSTEM_PROMPT: &str = r#"Summarize the following conversation segment concisely. Preserve:
1. Key decisions and conclusions
2. Product requirements, PRD changes and their versions
3. The user's current goals and context
4. Any unresolved questions

Keep the summary under 500 words. Write in third person (e.g., "The user asked about..." "The assistant recommended...")."#;

#[derive(Debug, Clone)]
pub struct ContextSummarizer {
    trigger_tokens: u32,
    messages_to_keep: usize,
}

impl ContextSummarizer {
    pub fn new(trigger_tokens: u32, messages_to_keep: usize) -> Self {
        Self {
            trigger_tokens,
            messages_to_keep,
        }
    }

    /// Estimated tokens of the history, including any previous summary.
    pub fn estimate(state: &ConversationState) -> u32 {
        let summary = state.summary.as_deref().map(estimate_tokens).unwrap_or(0);
        state.messages.iter().fold(summary, |acc, m| {
            let calls: u32 = m
                .tool_calls
                .iter()
                .map(|c| estimate_tokens(&c.input.to_string()))
                .sum();
            acc.saturating_add(estimate_tokens(&m.content))
                .saturating_add(calls)
        })
    }

    /// Split into `(to_summarize, to_keep)`, keeping the last
    /// `keep_recent` messages. The split is moved earlier so the kept
    /// window never begins with a tool result whose call would be lost.
    pub fn select_messages_to_summarize(
        messages: &[Message],
        keep_recent: usize,
    ) -> (&[Message], &[Message]) {
        if messages.len() <= keep_recent {
            return (&[], messages);
        }
        let mut split_point = messages.len() - keep_recent;
        while split_point > 0
            && split_point < messages.len()
            && messages[split_point].role == MessageRole::Tool
        {
            split_point -= 1;
        }
        (&messages[..split_point], &messages[split_point..])
    }

    /// Summarize `messages`, folding in the previous summary if any.
    #[tracing::instrument(
        name = "summarize_context",
        skip(engine, messages, previous),
        fields(model = %model, message_count = messages.len())
    )]
    pub async fn summarize(
        engine: &AgentEngine,
        messages: &[Message],
        previous: Option<&str>,
        model: &str,
    ) -> Result<String, LlmError> {
        if messages.is_empty() {
            return Ok(previous.unwrap_or_default().to_string());
        }

        let conversation_text: String = messages
            .iter()
            .map(|m| match &m.name {
                Some(tool) if m.role == MessageRole::Tool => format!("tool ({tool}): {}", m.content),
                _ => format!("{}: {}", m.role, m.content),
            })
            .collect::<Vec<_>>()
            .join("\n\n");

        let earlier = previous
            .filter(|p| !p.trim().is_empty())
            .map(|p| format!("<earlier_summary>\n{p}\n</earlier_summary>\n\n"))
            .unwrap_or_default();

        let request = CompletionRequest::simple(
            model,
            SUMMARY_SYSTEM_PROMPT,
            format!(
                "{earlier}Please summarize this conversation:\n\n<conversation>\n{conversation_text}\n</conversation>"
            ),
            1024,
        );

        let response = engine.complete(&request, "summarize").await?;
        Ok(response.content.trim().to_string())
    }

    /// Compact `state` in place when it exceeds the trigger. Returns whether
    /// compaction happened. Failures leave the state untouched.
    pub async fn maybe_compact(
        &self,
        engine: &AgentEngine,
        state: &mut ConversationState,
        model: &str,
    ) -> bool {
        let estimated = Self::estimate(state);
        if estimated <= self.trigger_tokens {
            return false;
        }

        let (to_summarize, to_keep) =
            Self::select_messages_to_summarize(&state.messages, self.messages_to_keep);
        if to_summarize.is_empty() {
            return false;
        }

        match Self::summarize(engine, to_summarize, state.summary.as_deref(), model).await {
            Ok(summary) => {
                info!(
                    estimated_tokens = estimated,
                    summarized = to_summarize.len(),
                    kept = to_keep.len(),
                    "Conversation compacted"
                );
                state.messages = to_keep.to_vec();
                state.summary = Some(summary);
                true
            }
            Err(e) => {
                warn!(error = %e, "Summarization failed, keeping full history");
                false
            }
        }
    }
}
