//! HTTP API layer for pmassist.
//!
//! Axum routes under `/api/`: liveness, SSE chat turns, thread history and
//! per-user thread listing. Errors use the `{"detail": ...}` body.

pub mod error;
pub mod extractors;
pub mod handlers;
pub mod router;
