//! Liveness endpoint.

use axum::Json;
use serde_json::{Value, json};

/// GET /api/
pub async fn root() -> Json<Value> {
    Json(json!({ "message": "PM Assistant API" }))
}
