//! `write_todos` planning tool.

use schemars::JsonSchema;
use serde::Deserialize;
use tracing::debug;

use pmassist_types::llm::ToolDefinition;
use pmassist_types::todo::{Todo, status_counts};

use super::{Tool, ToolContext, ToolError, input_schema, parse_input};

const WRITE_TODOS_DESCRIPTION: &str = "Create and manage a structured task list based on the \
user stories of the PRD. Each todo is one user story (\"As a [user], I want to [action] so that \
[benefit]\") with detailed sub_todos describing WHAT to build, HOW to build it, WHERE (files or \
modules) and the ACCEPTANCE criteria. Status is one of pending, in_progress, completed. Mark a \
todo in_progress before starting it and completed as soon as it is done. The list you send \
replaces the previous one.";

#[derive(Debug, Deserialize, JsonSchema)]
struct WriteTodosInput {
    /// Complete, updated todo list.
    todos: Vec<Todo>,
}

/// Replaces the turn's todo list.
pub struct WriteTodosTool;

impl Tool for WriteTodosTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "write_todos".to_string(),
            description: WRITE_TODOS_DESCRIPTION.to_string(),
            parameters: input_schema::<WriteTodosInput>(),
        }
    }

    async fn call(
        &self,
        ctx: &ToolContext,
        input: serde_json::Value,
    ) -> Result<serde_json::Value, ToolError> {
        let WriteTodosInput { todos } = parse_input(input)?;
        let (pending, in_progress, completed) = status_counts(&todos);
        debug!(
            thread_id = %ctx.thread_id,
            total = todos.len(),
            pending,
            in_progress,
            completed,
            "Todo list replaced"
        );

        let rendered = serde_json::to_string(&todos)
            .map_err(|e| ToolError::Execution(e.to_string()))?;
        *ctx.todos.lock().await = todos;

        Ok(serde_json::Value::String(format!(
            "Updated todo list to {rendered}"
        )))
    }
}
