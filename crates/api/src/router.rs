//! Application router assembly.
//!
//! The whole HTTP surface is assembled in one place: root-level probes,
//! the versioned API tree, and the middleware stack. The binary and the
//! integration tests both call [`build_app_router`], so what the tests
//! exercise is exactly what production serves.

use std::time::Duration;

use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderName, Method, StatusCode};
use axum::Router;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

use crate::config::AppConfig;
use crate::routes;
use crate::state::AppState;

const REQUEST_ID_HEADER: &str = "x-request-id";

/// Assemble the application [`Router`]: routes plus middleware.
///
/// Layer order matters; `.layer` wraps everything added before it, so the
/// last call ends up outermost. Outermost to innermost at request time:
/// CORS, request-id stamping, tracing, request-id propagation, timeout,
/// panic recovery.
pub fn build_app_router(state: AppState, config: &AppConfig) -> Router {
    let request_id = HeaderName::from_static(REQUEST_ID_HEADER);

    Router::new()
        // The liveness banner and the public status probe sit at the root,
        // matching the URLs hosted scripts advertise to uptime monitors.
        .merge(routes::health::router())
        .merge(routes::status::router())
        .nest("/api/v1", routes::api_routes())
        .layer(CatchPanicLayer::new())
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(config.request_timeout_secs),
        ))
        .layer(PropagateRequestIdLayer::new(request_id.clone()))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(SetRequestIdLayer::new(request_id, MakeRequestUuid))
        .layer(build_cors_layer(config))
        .with_state(state)
}

/// CORS layer for the configured dashboard origins.
///
/// The surface only ever serves GET and POST, and callers are identified
/// inside the event body rather than by auth headers, so the policy stays
/// narrow. An unparseable origin aborts startup.
pub fn build_cors_layer(config: &AppConfig) -> CorsLayer {
    let origins: Vec<_> = config
        .cors_origins
        .iter()
        .map(|origin| {
            origin
                .parse()
                .unwrap_or_else(|e| panic!("Invalid CORS origin '{origin}': {e}"))
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([CONTENT_TYPE])
        .max_age(Duration::from_secs(3600))
}
