//! Axum router configuration with middleware.
//!
//! All routes are under `/api/`.
//! Middleware: CORS, request tracing.

use axum::Router;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::http::handlers;
use crate::state::AppState;

/// Build the complete API router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api", get(handlers::health::root))
        .route("/api/", get(handlers::health::root))
        .route("/api/chat/{thread_id}", post(handlers::chat::chat))
        .route(
            "/api/chat/{thread_id}/history",
            get(handlers::thread::history),
        )
        .route(
            "/api/chat/user/{user_id}/threads",
            get(handlers::thread::list_threads),
        )
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
