//! Tools the agent can call.
//!
//! `Tool` is the RPITIT port; `BoxTool` erases it so the registry can hold
//! heterogeneous tools (same blanket pattern as `BoxLlmProvider`).

pub mod memory;
pub mod prd;
pub mod time;
pub mod todo;

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use pmassist_types::error::RepositoryError;
use pmassist_types::llm::{LlmError, ToolDefinition};
use pmassist_types::todo::Todo;

/// Errors raised by tool execution. Never abort a turn; see
/// [`ToolError::into_tool_result`].
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("unknown tool: {0}")]
    UnknownTool(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error("{0}")]
    Execution(String),
}

impl ToolError {
    /// Text fed back to the model in place of a tool result.
    pub fn into_tool_result(self) -> serde_json::Value {
        serde_json::Value::String(format!(
            "Tool error: Please check your input and try again. ({self})"
        ))
    }
}

/// Per-turn context handed to every tool call.
#[derive(Debug, Clone)]
pub struct ToolContext {
    pub thread_id: String,
    pub user_id: String,
    /// The turn's todo list; `write_todos` replaces it.
    pub todos: Arc<Mutex<Vec<Todo>>>,
}

impl ToolContext {
    pub fn new(thread_id: &str, user_id: &str, todos: Vec<Todo>) -> Self {
        Self {
            thread_id: thread_id.to_string(),
            user_id: user_id.to_string(),
            todos: Arc::new(Mutex::new(todos)),
        }
    }
}

/// A callable tool.
pub trait Tool: Send + Sync {
    /// Name, description and JSON Schema of the input.
    fn definition(&self) -> ToolDefinition;

    fn call(
        &self,
        ctx: &ToolContext,
        input: serde_json::Value,
    ) -> impl Future<Output = Result<serde_json::Value, ToolError>> + Send;
}

/// Object-safe version of [`Tool`] with boxed futures.
pub trait ToolDyn: Send + Sync {
    fn definition(&self) -> ToolDefinition;

    fn call_boxed<'a>(
        &'a self,
        ctx: &'a ToolContext,
        input: serde_json::Value,
    ) -> Pin<Box<dyn Future<Output = Result<serde_json::Value, ToolError>> + Send + 'a>>;
}

impl<T: Tool> ToolDyn for T {
    fn definition(&self) -> ToolDefinition {
        Tool::definition(self)
    }

    fn call_boxed<'a>(
        &'a self,
        ctx: &'a ToolContext,
        input: serde_json::Value,
    ) -> Pin<Box<dyn Future<Output = Result<serde_json::Value, ToolError>> + Send + 'a>> {
        Box::pin(self.call(ctx, input))
    }
}

/// Type-erased tool.
pub struct BoxTool {
    inner: Box<dyn ToolDyn>,
}

impl BoxTool {
    pub fn new<T: Tool + 'static>(tool: T) -> Self {
        Self {
            inner: Box::new(tool),
        }
    }

    pub fn definition(&self) -> ToolDefinition {
        self.inner.definition()
    }

    pub async fn call(
        &self,
        ctx: &ToolContext,
        input: serde_json::Value,
    ) -> Result<serde_json::Value, ToolError> {
        self.inner.call_boxed(ctx, input).await
    }
}

/// Name-indexed set of tools available to the agent.
#[derive(Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, BoxTool>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool; a later tool with the same name replaces the earlier one.
    pub fn register<T: Tool + 'static>(&mut self, tool: T) -> &mut Self {
        let tool = BoxTool::new(tool);
        let name = tool.definition().name;
        if self.tools.insert(name.clone(), tool).is_some() {
            warn!(tool = %name, "Tool registered twice, replacing");
        }
        self
    }

    /// Definitions of every registered tool, sorted by name.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(BoxTool::definition).collect()
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Dispatch a call by name.
    pub async fn execute(
        &self,
        ctx: &ToolContext,
        name: &str,
        input: serde_json::Value,
    ) -> Result<serde_json::Value, ToolError> {
        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))?;
        debug!(tool = %name, thread_id = %ctx.thread_id, "Executing tool");
        tool.call(ctx, input).await
    }
}

/// Deserialize a tool's JSON input into its typed form.
pub fn parse_input<T: DeserializeOwned>(input: serde_json::Value) -> Result<T, ToolError> {
    // Models sometimes send `null` for tools without parameters.
    let input = if input.is_null() {
        serde_json::Value::Object(Default::default())
    } else {
        input
    };
    serde_json::from_value(input).map_err(|e| ToolError::InvalidInput(e.to_string()))
}

/// JSON Schema for a tool input type.
pub fn input_schema<T: JsonSchema>() -> serde_json::Value {
    serde_json::to_value(schemars::schema_for!(T)).unwrap_or_else(|_| {
        serde_json::json!({"type": "object", "properties": {}})
    })
}

/// Render a tool result as message content for the model.
pub fn result_to_content(result: &serde_json::Value) -> String {
    match result {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
