//! Events streamed to the client during a chat turn.
//!
//! Each `ChatEvent` becomes one SSE frame `data: <json>\n\n`. A turn ends
//! with exactly one `Done` or `Error`.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatEvent {
    /// A fragment of assistant text.
    Message { content: String },

    /// A tool is about to run with these arguments.
    ToolStart {
        tool_name: String,
        args: serde_json::Value,
    },

    /// A tool finished; `result` is its output (or error text).
    ToolEnd {
        tool_name: String,
        result: serde_json::Value,
    },

    /// The turn completed and its checkpoint was saved.
    Done,

    /// The turn failed; nothing was persisted for it.
    Error { message: String },
}

impl ChatEvent {
    /// Whether this event ends the stream.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ChatEvent::Done | ChatEvent::Error { .. })
    }
}
