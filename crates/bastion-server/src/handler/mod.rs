//! Request-scoped error model and shared `axum::`[`Handler`]s.
//!
//! Route trees mounted under the API prefix return [`Error`] from handlers
//! and middleware; every error renders as a JSON [`ErrorResponse`] body with
//! the matching status code.
//!
//! [`Handler`]: axum::handler::Handler

mod error;
mod response;

use axum::response::{IntoResponse, Response};

pub use crate::handler::error::{Error, ErrorKind, Result};
pub use crate::handler::response::ErrorResponse;

/// Fallback for paths no mounted route matches.
#[inline]
pub async fn not_found() -> Response {
    ErrorKind::NotFound.into_response()
}
