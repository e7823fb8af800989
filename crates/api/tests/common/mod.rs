use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use tempfile::TempDir;
use tower::ServiceExt;

use hostbot_api::config::AppConfig;
use hostbot_api::router::build_app_router;
use hostbot_api::state::AppState;
use hostbot_flows::{ChatEngine, SessionManager};
use hostbot_store::{AllowedUsersStore, OwnershipStore};
use hostbot_supervisor::ScriptSupervisor;

/// Administrator id used across the HTTP tests.
pub const ADMIN: i64 = 1;

/// A fully wired application over a throwaway directory.
///
/// The `TempDir` is held so the scripts and state files live until the
/// test ends.
pub struct TestApp {
    pub app: Router,
    pub scripts_dir: PathBuf,
    pub allowed: Arc<AllowedUsersStore>,
    _dir: TempDir,
}

/// Build a test `AppConfig` rooted in the given directory.
///
/// Hosted "scripts" run under `/bin/sh` with a short grace window, so no
/// test needs a Python interpreter or waits longer than a few hundred
/// milliseconds.
pub fn test_config(root: &Path) -> AppConfig {
    AppConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        scripts_dir: root.join("scripts"),
        state_dir: root.to_path_buf(),
        admin_user_id: Some(ADMIN),
        public_base_url: "http://localhost:8080".to_string(),
        python_bin: PathBuf::from("/bin/sh"),
        pip_bin: PathBuf::from("/bin/true"),
        git_bin: PathBuf::from("git"),
        grace_wait_ms: 300,
        stop_timeout_secs: 2,
        log_tail_bytes: 2000,
        install_tail_bytes: 900,
        max_entry_choices: 12,
        session_ttl_secs: 60,
        inherit_host_env: true,
    }
}

/// Build the full application router with all middleware layers over a
/// fresh temporary directory.
///
/// Uses [`build_app_router`] so integration tests exercise the same
/// middleware stack (CORS, request ID, timeout, tracing, panic recovery)
/// that production uses.
pub fn build_test_app() -> TestApp {
    let dir = TempDir::new().expect("Failed to create tempdir");
    let config = test_config(dir.path());
    std::fs::create_dir_all(&config.scripts_dir).expect("Failed to create scripts dir");

    let ownership = Arc::new(OwnershipStore::new(config.ownership_path()));
    let allowed = Arc::new(AllowedUsersStore::new(config.allowed_users_path()));
    let supervisor = ScriptSupervisor::new(config.supervisor_config(), Arc::clone(&ownership));
    let sessions = SessionManager::new(config.session_ttl());

    let engine = ChatEngine::new(
        config.engine_config(),
        Arc::clone(&supervisor),
        Arc::clone(&ownership),
        Arc::clone(&allowed),
        sessions,
    );

    let state = AppState {
        config: Arc::new(config.clone()),
        engine,
        supervisor,
        ownership,
    };

    let app = build_app_router(state, &config);

    TestApp {
        app,
        scripts_dir: config.scripts_dir,
        allowed,
        _dir: dir,
    }
}

/// Send a GET request and return the raw response.
pub async fn get(app: &Router, uri: &str) -> Response<Body> {
    let request = Request::builder()
        .uri(uri)
        .body(Body::empty())
        .expect("Failed to build request");
    app.clone()
        .oneshot(request)
        .await
        .expect("Request did not complete")
}

/// Send a POST request with a JSON body and return the raw response.
pub async fn post_json(app: &Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("Failed to build request");
    app.clone()
        .oneshot(request)
        .await
        .expect("Request did not complete")
}

/// Collect a response body and parse it as JSON.
pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("Failed to collect body")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("Body is not valid JSON")
}

/// Collect a response body as a UTF-8 string.
pub async fn body_string(response: Response<Body>) -> String {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("Failed to collect body")
        .to_bytes();
    String::from_utf8(bytes.to_vec()).expect("Body is not valid UTF-8")
}
