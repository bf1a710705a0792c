//! User memory types.
//!
//! Memories are short facts the assistant keeps about a user across
//! threads, created and searched through the memory tools.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use std::fmt;
use std::str::FromStr;

/// A memory entry, namespaced by `user_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserMemory {
    pub id: Uuid,
    pub user_id: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserMemory {
    pub fn new(user_id: &str, content: &str) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            user_id: user_id.to_string(),
            content: content.to_string(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Action accepted by the `manage_memory` tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoryAction {
    Create,
    Update,
    Delete,
}

impl fmt::Display for MemoryAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemoryAction::Create => write!(f, "create"),
            MemoryAction::Update => write!(f, "update"),
            MemoryAction::Delete => write!(f, "delete"),
        }
    }
}

impl FromStr for MemoryAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "create" => Ok(MemoryAction::Create),
            "update" => Ok(MemoryAction::Update),
            "delete" => Ok(MemoryAction::Delete),
            other => Err(format!("invalid memory action: '{other}'")),
        }
    }
}
