use axum::extract::State;
use axum::{routing::get, Json, Router};
use serde::Serialize;

use crate::state::AppState;

/// Health check response payload.
#[derive(Serialize)]
pub struct HealthResponse {
    /// Overall service status.
    pub status: &'static str,
    /// Crate version from Cargo.toml.
    pub version: &'static str,
    /// Number of currently supervised processes.
    pub processes_running: usize,
}

/// GET / -- liveness banner for uptime probes.
async fn liveness() -> &'static str {
    "Script host is alive."
}

/// GET /health -- returns service health and the live process count.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let processes_running = state.supervisor.running_targets().await.len();

    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        processes_running,
    })
}

/// Mount health check routes (intended for root-level, NOT under `/api/v1`).
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(liveness))
        .route("/health", get(health_check))
}
