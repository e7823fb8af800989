pub mod chat;
pub mod health;
pub mod status;
pub mod targets;

use axum::Router;

use crate::state::AppState;

/// Everything mounted under `/api/v1`.
///
/// Layout:
///
/// ```text
/// /chat/events     chat webhook intake (POST)
///
/// /targets         hosted targets with ownership and run state (GET)
/// ```
///
/// The liveness banner (`/`), `/health`, and the public `/status` probe are
/// mounted at root level, outside this tree.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        // Chat webhook (the facade boundary of the intake engine).
        .nest("/chat", chat::router())
        // Ops view of the hosted-target table.
        .merge(targets::router())
}
