//! SSE streaming chat endpoint.
//!
//! POST /api/chat/{thread_id}
//!
//! Validation and the ownership check run before the response starts, so
//! they still produce a normal `{"detail"}` error. The turn itself runs in
//! its own task and feeds the response through a bounded channel. Every
//! frame is `data: <ChatEvent json>`; the stream ends after `done` or
//! `error`.

use std::convert::Infallible;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::HeaderName;
use axum::http::header::CACHE_CONTROL;
use axum::response::IntoResponse;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures_util::Stream;
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{Instrument, debug, info_span};

use pmassist_types::error::ValidationError;
use pmassist_types::event::ChatEvent;

use crate::http::error::AppError;
use crate::http::extractors::AppJson;
use crate::state::AppState;

/// Capacity of the per-turn event channel.
const EVENT_BUFFER: usize = 64;

const X_ACCEL_BUFFERING: HeaderName = HeaderName::from_static("x-accel-buffering");

/// Request body for a chat turn.
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub query: String,
    pub user_id: String,
}

fn to_sse(event: &ChatEvent) -> Event {
    let data = serde_json::to_string(event).unwrap_or_else(|e| {
        serde_json::json!({ "type": "error", "message": e.to_string() }).to_string()
    });
    Event::default().data(data)
}

/// Turn the receiver into an SSE stream. Dropping the stream (client gone)
/// drops the guard, which cancels the turn.
fn event_stream(
    rx: mpsc::Receiver<ChatEvent>,
    guard: DropGuard,
) -> impl Stream<Item = Result<Event, Infallible>> {
    futures_util::stream::unfold((rx, guard), |(mut rx, guard)| async move {
        let event = rx.recv().await?;
        Some((Ok(to_sse(&event)), (rx, guard)))
    })
}

/// POST /api/chat/{thread_id}: run one turn and stream its events.
pub async fn chat(
    State(state): State<AppState>,
    Path(thread_id): Path<String>,
    AppJson(body): AppJson<ChatRequest>,
) -> Result<impl IntoResponse, AppError> {
    if body.query.trim().is_empty() {
        return Err(ValidationError::Empty { field: "query" }.into());
    }
    // Validates both ids too.
    state
        .chat_service
        .authorize(&thread_id, &body.user_id)
        .await?;

    let (tx, rx) = mpsc::channel(EVENT_BUFFER);
    let cancel = CancellationToken::new();
    let guard = cancel.clone().drop_guard();

    let chat_service = state.chat_service.clone();
    let span = info_span!("chat_turn", thread_id = %thread_id, user_id = %body.user_id);
    tokio::spawn(
        async move {
            let outcome = chat_service
                .run_turn(&thread_id, &body.user_id, &body.query, tx, cancel)
                .await;
            if let Err(e) = outcome {
                debug!(error = %e, "Turn ended without a checkpoint");
            }
        }
        .instrument(span),
    );

    let sse = Sse::new(event_stream(rx, guard))
        .keep_alive(KeepAlive::new().interval(Duration::from_secs(15)));
    Ok((
        [(CACHE_CONTROL, "no-cache"), (X_ACCEL_BUFFERING, "no")],
        sse,
    ))
}
