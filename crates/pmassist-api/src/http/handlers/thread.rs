//! Thread history and listing handlers.
//!
//! Endpoints:
//! - GET /api/chat/{thread_id}/history       - Messages and PRD of a thread
//! - GET /api/chat/user/{user_id}/threads    - Threads owned by a user

use axum::Json;
use axum::extract::{Path, State};
use serde::{Deserialize, Serialize};

use pmassist_types::thread::{ThreadHistory, ThreadSummary};

use crate::http::error::AppError;
use crate::http::extractors::AppQuery;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    /// When given, must be the thread owner.
    pub user_id: Option<String>,
}

/// GET /api/chat/{thread_id}/history
pub async fn history(
    State(state): State<AppState>,
    Path(thread_id): Path<String>,
    AppQuery(query): AppQuery<HistoryQuery>,
) -> Result<Json<ThreadHistory>, AppError> {
    let history = state
        .chat_service
        .history(&thread_id, query.user_id.as_deref())
        .await?;
    Ok(Json(history))
}

#[derive(Debug, Deserialize)]
pub struct ThreadListQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    20
}

#[derive(Debug, Serialize)]
pub struct ThreadList {
    pub user_id: String,
    pub threads: Vec<ThreadSummary>,
}

/// GET /api/chat/user/{user_id}/threads
pub async fn list_threads(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    AppQuery(query): AppQuery<ThreadListQuery>,
) -> Result<Json<ThreadList>, AppError> {
    let threads = state
        .chat_service
        .list_threads(&user_id, query.limit, query.offset)
        .await?;
    Ok(Json(ThreadList { user_id, threads }))
}
