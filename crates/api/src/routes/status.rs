//! Public per-target status probe.
//!
//! Hosted scripts advertise `{public_base_url}/status?script=<target>` as
//! their keep-alive URL; external uptime monitors poll it and get a plain
//! text verdict. The probe is read-only and requires no authentication.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{routing::get, Router};
use serde::Deserialize;

use hostbot_core::target::TargetId;

use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// Query params for `GET /status`.
#[derive(Debug, Deserialize)]
pub struct StatusQuery {
    /// Target identifier, e.g. `job.py` or `tool|main.py`.
    pub script: Option<String>,
}

/// GET /status?script=<target> -- 200 when the target has a live process,
/// 404 when it does not.
async fn script_status(
    State(state): State<AppState>,
    Query(query): Query<StatusQuery>,
) -> AppResult<Response> {
    let raw = query
        .script
        .ok_or_else(|| AppError::BadRequest("missing 'script' query parameter".to_string()))?;
    let target = TargetId::parse(raw);

    let response = if state.supervisor.is_running(&target).await {
        (StatusCode::OK, format!("{target} is running.")).into_response()
    } else {
        (StatusCode::NOT_FOUND, format!("{target} is stopped.")).into_response()
    };
    Ok(response)
}

/// Mount the status probe (intended for root-level, NOT under `/api/v1`).
pub fn router() -> Router<AppState> {
    Router::new().route("/status", get(script_status))
}
