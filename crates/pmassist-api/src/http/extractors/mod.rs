//! Extractors that reject with [`AppError`](super::error::AppError), so
//! malformed input is answered with a `400 {"detail"}` body.

use axum::extract::{FromRequest, FromRequestParts};

use super::error::AppError;

/// `Json<T>` whose rejection is a `400` with `detail`.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct AppJson<T>(pub T);

/// `Query<T>` whose rejection is a `400` with `detail`.
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(AppError))]
pub struct AppQuery<T>(pub T);
