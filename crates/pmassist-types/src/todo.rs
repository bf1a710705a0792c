//! Planning todo list written by the `write_todos` tool.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use std::fmt;
use std::str::FromStr;

/// Progress of a todo or sub-todo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum TodoStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
}

impl fmt::Display for TodoStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TodoStatus::Pending => write!(f, "pending"),
            TodoStatus::InProgress => write!(f, "in_progress"),
            TodoStatus::Completed => write!(f, "completed"),
        }
    }
}

impl FromStr for TodoStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(TodoStatus::Pending),
            "in_progress" => Ok(TodoStatus::InProgress),
            "completed" => Ok(TodoStatus::Completed),
            other => Err(format!("invalid todo status: '{other}'")),
        }
    }
}

/// A detailed implementation step under a todo.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SubTodo {
    pub content: String,
    pub status: TodoStatus,
}

/// A main todo item, usually one per user story.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Todo {
    pub content: String,
    pub status: TodoStatus,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sub_todos: Vec<SubTodo>,
}

/// Counts per status, used in the tool's confirmation message.
pub fn status_counts(todos: &[Todo]) -> (usize, usize, usize) {
    todos.iter().fold((0, 0, 0), |(p, i, c), todo| match todo.status {
        TodoStatus::Pending => (p + 1, i, c),
        TodoStatus::InProgress => (p, i + 1, c),
        TodoStatus::Completed => (p, i, c + 1),
    })
}
