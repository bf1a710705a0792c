//! Thread, checkpoint, and conversation-state types.
//!
//! A thread is a conversation identified by a caller-chosen id. Its state
//! is persisted as a chain of checkpoints; the owner of a thread is the
//! user of its first checkpoint.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;
use crate::llm::{Message, MessageRole};
use crate::prd::PrdRecord;
use crate::todo::Todo;

/// Maximum length of a thread or user id.
pub const MAX_ID_LEN: usize = 128;

/// Checks a thread or user id: 1..=128 chars of `[A-Za-z0-9_.:-]`.
pub fn validate_id(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.is_empty() {
        return Err(ValidationError::Empty { field });
    }
    if value.chars().count() > MAX_ID_LEN {
        return Err(ValidationError::TooLong {
            field,
            max: MAX_ID_LEN,
        });
    }
    if let Some(ch) = value
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | ':' | '-')))
    {
        return Err(ValidationError::InvalidChar { field, ch });
    }
    Ok(())
}

/// Snapshot of a thread's conversation, stored as checkpoint JSON.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversationState {
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(default)]
    pub todos: Vec<Todo>,
    /// Running summary of messages compacted out of `messages`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

/// A persisted checkpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    pub thread_id: String,
    pub user_id: String,
    pub namespace: String,
    /// UUID v7; ordering within a thread is by this id only.
    pub checkpoint_id: Uuid,
    pub parent_id: Option<Uuid>,
    pub state: ConversationState,
    pub created_at: DateTime<Utc>,
}

impl Checkpoint {
    /// Builds the next checkpoint of a thread in the default namespace.
    pub fn next(
        thread_id: &str,
        user_id: &str,
        parent_id: Option<Uuid>,
        state: ConversationState,
    ) -> Self {
        Self {
            thread_id: thread_id.to_string(),
            user_id: user_id.to_string(),
            namespace: String::new(),
            checkpoint_id: Uuid::now_v7(),
            parent_id,
            state,
            created_at: Utc::now(),
        }
    }
}

/// One row of a user's thread listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreadSummary {
    pub thread_id: String,
    pub last_checkpoint_id: Uuid,
    pub checkpoint_count: i64,
    pub updated_at: DateTime<Utc>,
}

/// A message as exposed by the history endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryMessage {
    pub role: MessageRole,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<String>,
}

impl From<&Message> for HistoryMessage {
    fn from(msg: &Message) -> Self {
        Self {
            role: msg.role.clone(),
            content: msg.content.clone(),
            name: msg.name.clone(),
            tool_calls: msg.tool_calls.iter().map(|c| c.name.clone()).collect(),
        }
    }
}

/// Full history of one thread.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreadHistory {
    pub thread_id: String,
    pub messages: Vec<HistoryMessage>,
    pub has_prd: bool,
    pub prd: Option<PrdRecord>,
}
