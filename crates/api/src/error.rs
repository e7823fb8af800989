//! HTTP error mapping.
//!
//! Handlers return [`AppError`]; the [`IntoResponse`] impl turns every
//! variant into a `{"error", "code"}` JSON body with the right status.
//! Domain errors from the workspace crates convert in with `?` through the
//! `#[from]` impls, and each crate's taxonomy is classified by its own
//! helper so the mapping stays in one function per crate.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use hostbot_core::error::CoreError;
use hostbot_store::StoreError;
use hostbot_supervisor::SupervisorError;
use serde_json::json;

/// Everything a handler can fail with.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Supervisor(#[from] SupervisorError),

    /// Malformed input caught before it reaches a domain layer.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// A failure with no better classification.
    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Convenience alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

/// Status, stable machine code, and human message for one error.
type Verdict = (StatusCode, &'static str, String);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Core(err) => classify_core_error(err),
            AppError::Store(err) => classify_store_error(err),
            AppError::Supervisor(err) => classify_supervisor_error(err),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            AppError::InternalError(msg) => internal(msg),
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}

fn classify_core_error(err: &CoreError) -> Verdict {
    match err {
        CoreError::NotFound { entity, id } => (
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            format!("{entity} '{id}' not found"),
        ),
        CoreError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
        CoreError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
        CoreError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg.clone()),
        CoreError::Forbidden(msg) => (StatusCode::FORBIDDEN, "FORBIDDEN", msg.clone()),
        CoreError::Internal(msg) => internal(msg),
    }
}

/// Ownership conflicts map to 409; IO and encoding failures are logged
/// and sanitized down to a plain 500.
fn classify_store_error(err: &StoreError) -> Verdict {
    match err {
        StoreError::OwnedByOther { target, owner } => (
            StatusCode::CONFLICT,
            "CONFLICT",
            format!("{target} is already owned by user {owner}"),
        ),
        other => internal(other),
    }
}

fn classify_supervisor_error(err: &SupervisorError) -> Verdict {
    match err {
        SupervisorError::AlreadyRunning(target) => (
            StatusCode::CONFLICT,
            "CONFLICT",
            format!("{target} is already running"),
        ),
        SupervisorError::Store(inner) => classify_store_error(inner),
        other => internal(other),
    }
}

/// Log the real error, answer with a sanitized 500.
fn internal<E: std::fmt::Display>(err: &E) -> Verdict {
    tracing::error!(error = %err, "Internal server error");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "INTERNAL_ERROR",
        "An internal error occurred".to_string(),
    )
}
