//! Tool-calling agent loop for a single chat turn.
//!
//! Each iteration streams one completion. Text deltas are forwarded to the
//! client as they arrive; completed tool calls are executed in order and
//! their results appended to the history before the next iteration. The
//! loop ends on the first response without tool calls.

use std::sync::Arc;

use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use pmassist_types::config::AppConfig;
use pmassist_types::event::ChatEvent;
use pmassist_types::llm::{CompletionRequest, LlmError, Message, StreamEvent, ToolCall};
use pmassist_types::thread::ConversationState;

use crate::tool::{ToolContext, ToolRegistry, result_to_content};

use super::engine::AgentEngine;
use super::prompt::SystemPromptBuilder;
use super::selector::ModelSelector;
use super::summarizer::ContextSummarizer;

#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("agent stopped after {0} iterations without a final answer")]
    MaxIterations(u32),

    #[error("turn cancelled")]
    Cancelled,
}

#[derive(Debug, Clone)]
pub struct AgentSettings {
    pub max_iterations: u32,
    pub max_tokens: u32,
    pub temperature: Option<f64>,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            max_iterations: 8,
            max_tokens: 4096,
            temperature: None,
        }
    }
}

/// Everything the loop needs that outlives a single turn.
pub struct AgentRunner {
    engine: AgentEngine,
    tools: Arc<ToolRegistry>,
    selector: ModelSelector,
    summarizer: ContextSummarizer,
    settings: AgentSettings,
}

impl AgentRunner {
    pub fn new(
        engine: AgentEngine,
        tools: Arc<ToolRegistry>,
        selector: ModelSelector,
        summarizer: ContextSummarizer,
        settings: AgentSettings,
    ) -> Self {
        Self {
            engine,
            tools,
            selector,
            summarizer,
            settings,
        }
    }

    pub fn from_config(engine: AgentEngine, tools: Arc<ToolRegistry>, config: &AppConfig) -> Self {
        Self::new(
            engine,
            tools,
            ModelSelector::new(config.llm.model.clone(), config.llm.routing.clone()),
            ContextSummarizer::new(
                config.agent.summary_trigger_tokens,
                config.agent.messages_to_keep,
            ),
            AgentSettings {
                max_iterations: config.agent.max_iterations,
                max_tokens: config.llm.max_tokens,
                temperature: config.llm.temperature,
            },
        )
    }

    pub fn engine(&self) -> &AgentEngine {
        &self.engine
    }

    /// Run one turn for `query`, mutating `state` in place.
    ///
    /// `state` is only meaningful to persist when this returns `Ok`.
    #[tracing::instrument(
        name = "agent_turn",
        skip_all,
        fields(thread_id = %ctx.thread_id, user_id = %ctx.user_id)
    )]
    pub async fn run(
        &self,
        state: &mut ConversationState,
        query: &str,
        ctx: &ToolContext,
        events: &mpsc::Sender<ChatEvent>,
        cancel: &CancellationToken,
    ) -> Result<(), AgentError> {
        let model = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(AgentError::Cancelled),
            model = self.selector.select(&self.engine, query) => model,
        };
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(AgentError::Cancelled),
            _ = self.summarizer.maybe_compact(&self.engine, state, self.selector.default_model()) => {}
        }

        state.messages.push(Message::user(query));
        let definitions = self.tools.definitions();

        for iteration in 1..=self.settings.max_iterations {
            let system = {
                let todos = ctx.todos.lock().await;
                SystemPromptBuilder::build(
                    &ctx.user_id,
                    &ctx.thread_id,
                    &todos,
                    state.summary.as_deref(),
                )
            };
            let request = CompletionRequest {
                model: model.clone(),
                messages: state.messages.clone(),
                system: Some(system),
                max_tokens: self.settings.max_tokens,
                temperature: self.settings.temperature,
                stream: true,
                stop_sequences: None,
                tools: definitions.clone(),
            };

            let (text, calls) = self.stream_completion(request, events, cancel).await?;

            if calls.is_empty() {
                state.messages.push(Message::assistant(text));
                state.todos = ctx.todos.lock().await.clone();
                info!(iterations = iteration, model = %model, "Turn complete");
                return Ok(());
            }

            debug!(iteration, tool_calls = calls.len(), "Model requested tools");
            state
                .messages
                .push(Message::assistant_with_tools(text, calls.clone()));

            for call in calls {
                let result = self.run_tool(ctx, &call, events, cancel).await?;
                state
                    .messages
                    .push(Message::tool_result(call.id, call.name, result_to_content(&result)));
            }
        }

        warn!(
            max_iterations = self.settings.max_iterations,
            "Turn hit the iteration limit"
        );
        Err(AgentError::MaxIterations(self.settings.max_iterations))
    }

    /// Stream one completion, forwarding text and collecting tool calls.
    async fn stream_completion(
        &self,
        request: CompletionRequest,
        events: &mpsc::Sender<ChatEvent>,
        cancel: &CancellationToken,
    ) -> Result<(String, Vec<ToolCall>), AgentError> {
        let mut stream = self.engine.stream(request);
        let mut text = String::new();
        let mut calls = Vec::new();

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(AgentError::Cancelled),
                next = stream.next() => next,
            };
            let Some(event) = next else { break };

            match event? {
                StreamEvent::TextDelta { text: delta, .. } => {
                    if delta.is_empty() {
                        continue;
                    }
                    text.push_str(&delta);
                    emit(events, cancel, ChatEvent::Message { content: delta }).await?;
                }
                StreamEvent::ToolUseComplete { id, name, input } => {
                    calls.push(ToolCall { id, name, input });
                }
                StreamEvent::Usage(usage) => {
                    debug!(
                        input_tokens = usage.input_tokens,
                        output_tokens = usage.output_tokens,
                        "Completion usage"
                    );
                }
                StreamEvent::Done => break,
                StreamEvent::Connected | StreamEvent::MessageDelta { .. } => {}
            }
        }

        Ok((text, calls))
    }

    /// Execute one tool call. Tool failures become the tool's result.
    async fn run_tool(
        &self,
        ctx: &ToolContext,
        call: &ToolCall,
        events: &mpsc::Sender<ChatEvent>,
        cancel: &CancellationToken,
    ) -> Result<serde_json::Value, AgentError> {
        emit(
            events,
            cancel,
            ChatEvent::ToolStart {
                tool_name: call.name.clone(),
                args: call.input.clone(),
            },
        )
        .await?;

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(AgentError::Cancelled),
            outcome = self.tools.execute(ctx, &call.name, call.input.clone()) => outcome,
        };
        let result = outcome.unwrap_or_else(|e| {
            warn!(tool = %call.name, error = %e, "Tool call failed");
            e.into_tool_result()
        });

        emit(
            events,
            cancel,
            ChatEvent::ToolEnd {
                tool_name: call.name.clone(),
                result: result.clone(),
            },
        )
        .await?;
        Ok(result)
    }
}

/// Send an event to the client. A closed channel means the client left.
async fn emit(
    events: &mpsc::Sender<ChatEvent>,
    cancel: &CancellationToken,
    event: ChatEvent,
) -> Result<(), AgentError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(AgentError::Cancelled),
        sent = events.send(event) => sent.map_err(|_| {
            debug!("Event receiver dropped, cancelling turn");
            AgentError::Cancelled
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::box_provider::BoxLlmProvider;
    use crate::llm::scripted::{ScriptedProvider, ScriptedTurn};
    use crate::tool::time::CurrentTimeTool;
    use crate::tool::todo::WriteTodosTool;
    use pmassist_types::llm::MessageRole;
    use pmassist_types::todo::TodoStatus;
    use serde_json::json;

    fn runner(turns: Vec<ScriptedTurn>, max_iterations: u32) -> AgentRunner {
        let mut tools = ToolRegistry::new();
        tools.register(CurrentTimeTool).register(WriteTodosTool);
        AgentRunner::new(
            AgentEngine::new(BoxLlmProvider::new(ScriptedProvider::new(turns))),
            Arc::new(tools),
            ModelSelector::new("base".into(), None),
            ContextSummarizer::new(4000, 20),
            AgentSettings {
                max_iterations,
                ..Default::default()
            },
        )
    }

    fn drain(rx: &mut mpsc::Receiver<ChatEvent>) -> Vec<ChatEvent> {
        let mut out = Vec::new();
        while let Ok(event) = rx.try_recv() {
            out.push(event);
        }
        out
    }

    #[tokio::test]
    async fn test_text_turn_streams_and_appends() {
        let runner = runner(
            vec![ScriptedTurn::Text(vec!["Hello ".into(), "there".into()])],
            8,
        );
        let (tx, mut rx) = mpsc::channel(64);
        let ctx = ToolContext::new("t1", "u1", Vec::new());
        let mut state = ConversationState::default();

        runner
            .run(&mut state, "hi", &ctx, &tx, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(
            drain(&mut rx),
            vec![
                ChatEvent::Message {
                    content: "Hello ".into()
                },
                ChatEvent::Message {
                    content: "there".into()
                },
            ]
        );
        assert_eq!(state.messages.len(), 2);
        assert_eq!(state.messages[0].content, "hi");
        assert_eq!(state.messages[1].content, "Hello there");
    }

    #[tokio::test]
    async fn test_tool_round_trip_updates_todos() {
        let runner = runner(
            vec![
                ScriptedTurn::tool_call(
                    "call-1",
                    "write_todos",
                    json!({"todos": [{"content": "Draft PRD", "status": "in_progress"}]}),
                ),
                ScriptedTurn::text("Plan ready."),
            ],
            8,
        );
        let (tx, mut rx) = mpsc::channel(64);
        let ctx = ToolContext::new("t1", "u1", Vec::new());
        let mut state = ConversationState::default();

        runner
            .run(&mut state, "plan it", &ctx, &tx, &CancellationToken::new())
            .await
            .unwrap();

        let events = drain(&mut rx);
        assert!(matches!(&events[0], ChatEvent::ToolStart { tool_name, .. } if tool_name == "write_todos"));
        assert!(matches!(&events[1], ChatEvent::ToolEnd { tool_name, .. } if tool_name == "write_todos"));
        assert_eq!(
            events[2],
            ChatEvent::Message {
                content: "Plan ready.".into()
            }
        );

        let roles: Vec<_> = state.messages.iter().map(|m| m.role.clone()).collect();
        assert_eq!(
            roles,
            vec![
                MessageRole::User,
                MessageRole::Assistant,
                MessageRole::Tool,
                MessageRole::Assistant
            ]
        );
        assert_eq!(state.messages[2].tool_call_id.as_deref(), Some("call-1"));
        assert_eq!(state.todos.len(), 1);
        assert_eq!(state.todos[0].status, TodoStatus::InProgress);
    }

    #[tokio::test]
    async fn test_unknown_tool_becomes_error_result() {
        let runner = runner(
            vec![
                ScriptedTurn::tool_call("c1", "web_search", json!({"q": "x"})),
                ScriptedTurn::text("Sorry."),
            ],
            8,
        );
        let (tx, mut rx) = mpsc::channel(64);
        let ctx = ToolContext::new("t1", "u1", Vec::new());
        let mut state = ConversationState::default();

        runner
            .run(&mut state, "search", &ctx, &tx, &CancellationToken::new())
            .await
            .unwrap();

        let events = drain(&mut rx);
        match &events[1] {
            ChatEvent::ToolEnd { result, .. } => {
                let text = result.as_str().unwrap();
                assert!(text.starts_with("Tool error: Please check your input and try again."));
                assert!(text.contains("web_search"));
            }
            other => panic!("unexpected event {other:?}"),
        }
        assert!(state.messages[2].content.starts_with("Tool error:"));
    }

    #[tokio::test]
    async fn test_iteration_limit_is_an_error() {
        let runner = runner(
            vec![
                ScriptedTurn::tool_call("c1", "current_time", json!({})),
                ScriptedTurn::tool_call("c2", "current_time", json!({})),
            ],
            2,
        );
        let (tx, _rx) = mpsc::channel(64);
        let ctx = ToolContext::new("t1", "u1", Vec::new());
        let mut state = ConversationState::default();

        let err = runner
            .run(&mut state, "time?", &ctx, &tx, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::MaxIterations(2)));
    }

    #[tokio::test]
    async fn test_provider_error_propagates() {
        let runner = runner(vec![ScriptedTurn::Error("boom".into())], 8);
        let (tx, _rx) = mpsc::channel(64);
        let ctx = ToolContext::new("t1", "u1", Vec::new());
        let mut state = ConversationState::default();

        let err = runner
            .run(&mut state, "hi", &ctx, &tx, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::Llm(_)));
    }

    #[tokio::test]
    async fn test_cancellation_stops_a_stalled_stream() {
        let runner = runner(vec![ScriptedTurn::Stall("thinking".into())], 8);
        let (tx, _rx) = mpsc::channel(64);
        let ctx = ToolContext::new("t1", "u1", Vec::new());
        let mut state = ConversationState::default();
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let err = runner
            .run(&mut state, "hi", &ctx, &tx, &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::Cancelled));
    }

    #[tokio::test]
    async fn test_cancelled_before_start_skips_routing_and_compaction() {
        let runner = AgentRunner::new(
            AgentEngine::new(BoxLlmProvider::new(ScriptedProvider::new([
                ScriptedTurn::text("complex"),
                ScriptedTurn::text("summary"),
            ]))),
            Arc::new(ToolRegistry::new()),
            ModelSelector::new("base".into(), None),
            ContextSummarizer::new(1, 1),
            AgentSettings::default(),
        );
        let (tx, _rx) = mpsc::channel(64);
        let ctx = ToolContext::new("t1", "u1", Vec::new());
        let mut state = ConversationState {
            messages: vec![Message::user("old question"), Message::assistant("old answer")],
            ..Default::default()
        };
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = runner
            .run(&mut state, "hi", &ctx, &tx, &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::Cancelled));
        assert_eq!(state.messages.len(), 2);
        assert!(state.summary.is_none());
    }

    #[tokio::test]
    async fn test_dropped_receiver_cancels() {
        let runner = runner(vec![ScriptedTurn::text("hello")], 8);
        let (tx, rx) = mpsc::channel(64);
        drop(rx);
        let ctx = ToolContext::new("t1", "u1", Vec::new());
        let mut state = ConversationState::default();

        let err = runner
            .run(&mut state, "hi", &ctx, &tx, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::Cancelled));
    }
}
