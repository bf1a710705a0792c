//! `manage_memory` and `search_memory` tools.
//!
//! Memories are namespaced by the user of the running turn; a tool can
//! never read or change another user's entries.

use std::sync::Arc;

use schemars::JsonSchema;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use pmassist_types::error::RepositoryError;
use pmassist_types::llm::ToolDefinition;
use pmassist_types::memory::{MemoryAction, UserMemory};

use crate::repository::memory::MemoryRepository;

use super::{Tool, ToolContext, ToolError, input_schema, parse_input};

const DEFAULT_SEARCH_LIMIT: i64 = 10;
const MAX_SEARCH_LIMIT: i64 = 50;

#[derive(Debug, Deserialize, JsonSchema)]
struct ManageMemoryInput {
    /// One of `create`, `update`, `delete`.
    #[schemars(with = "String")]
    action: MemoryAction,
    /// Memory text. Required for create and update.
    #[serde(default)]
    content: Option<String>,
    /// Memory id. Required for update and delete.
    #[serde(default)]
    id: Option<Uuid>,
}

/// Create, update or delete a memory of the current user.
pub struct ManageMemoryTool<M: MemoryRepository> {
    repo: Arc<M>,
}

impl<M: MemoryRepository> ManageMemoryTool<M> {
    pub fn new(repo: Arc<M>) -> Self {
        Self { repo }
    }
}

fn require<T>(value: Option<T>, field: &str, action: MemoryAction) -> Result<T, ToolError> {
    value.ok_or_else(|| ToolError::InvalidInput(format!("'{field}' is required for {action}")))
}

fn not_found(id: &Uuid) -> impl FnOnce(RepositoryError) -> ToolError + '_ {
    move |e| match e {
        RepositoryError::NotFound => ToolError::NotFound(format!("memory {id}")),
        other => ToolError::Repository(other),
    }
}

impl<M: MemoryRepository> Tool for ManageMemoryTool<M> {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "manage_memory".to_string(),
            description: "Create, update or delete a long-term memory about the current user \
                (preferences, recurring context, decisions). Use action=create with content, \
                action=update with id and content, action=delete with id."
                .to_string(),
            parameters: input_schema::<ManageMemoryInput>(),
        }
    }

    async fn call(
        &self,
        ctx: &ToolContext,
        input: serde_json::Value,
    ) -> Result<serde_json::Value, ToolError> {
        let input: ManageMemoryInput = parse_input(input)?;
        match input.action {
            MemoryAction::Create => {
                let content = non_empty(require(input.content, "content", input.action)?)?;
                let memory = UserMemory::new(&ctx.user_id, content.trim());
                self.repo.create(&memory).await?;
                info!(user_id = %ctx.user_id, memory_id = %memory.id, "Memory created");
                Ok(serde_json::json!({"action": "create", "id": memory.id, "content": memory.content}))
            }
            MemoryAction::Update => {
                let id = require(input.id, "id", input.action)?;
                let content = non_empty(require(input.content, "content", input.action)?)?;
                let memory = self
                    .repo
                    .update(&ctx.user_id, &id, content.trim())
                    .await
                    .map_err(not_found(&id))?;
                info!(user_id = %ctx.user_id, memory_id = %id, "Memory updated");
                Ok(serde_json::json!({"action": "update", "id": memory.id, "content": memory.content}))
            }
            MemoryAction::Delete => {
                let id = require(input.id, "id", input.action)?;
                self.repo
                    .delete(&ctx.user_id, &id)
                    .await
                    .map_err(not_found(&id))?;
                info!(user_id = %ctx.user_id, memory_id = %id, "Memory deleted");
                Ok(serde_json::json!({"action": "delete", "id": id}))
            }
        }
    }
}

fn non_empty(content: String) -> Result<String, ToolError> {
    if content.trim().is_empty() {
        return Err(ToolError::InvalidInput("content must not be empty".into()));
    }
    Ok(content)
}

#[derive(Debug, Deserialize, JsonSchema)]
struct SearchMemoryInput {
    /// Text to look for; empty returns the most recent memories.
    query: String,
    /// Maximum number of results (default 10).
    #[serde(default)]
    limit: Option<i64>,
}

/// Search the current user's memories.
pub struct SearchMemoryTool<M: MemoryRepository> {
    repo: Arc<M>,
}

impl<M: MemoryRepository> SearchMemoryTool<M> {
    pub fn new(repo: Arc<M>) -> Self {
        Self { repo }
    }
}

impl<M: MemoryRepository> Tool for SearchMemoryTool<M> {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "search_memory".to_string(),
            description: "Search long-term memories about the current user by text.".to_string(),
            parameters: input_schema::<SearchMemoryInput>(),
        }
    }

    async fn call(
        &self,
        ctx: &ToolContext,
        input: serde_json::Value,
    ) -> Result<serde_json::Value, ToolError> {
        let input: SearchMemoryInput = parse_input(input)?;
        let limit = input
            .limit
            .unwrap_or(DEFAULT_SEARCH_LIMIT)
            .clamp(1, MAX_SEARCH_LIMIT);
        let memories = self
            .repo
            .search(&ctx.user_id, input.query.trim(), limit)
            .await?;
        let results: Vec<_> = memories
            .into_iter()
            .map(|m| {
                serde_json::json!({
                    "id": m.id,
                    "content": m.content,
                    "updated_at": m.updated_at.to_rfc3339(),
                })
            })
            .collect();
        Ok(serde_json::json!({"count": results.len(), "memories": results}))
    }
}
