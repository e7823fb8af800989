//! Integration tests for the HTTP surface: health and status probes, the
//! chat webhook, the ops routes, and general middleware behaviour.

mod common;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use common::{body_json, body_string, build_test_app, get, post_json, ADMIN};
use serde_json::json;
use tower::ServiceExt;

/// Post one chat event and return the reply texts, newline-joined.
async fn chat(app: &axum::Router, event: serde_json::Value) -> String {
    let response = post_json(app, "/api/v1/chat/events", event).await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    json["messages"]
        .as_array()
        .expect("messages array")
        .iter()
        .map(|m| m["text"].as_str().unwrap_or_default().to_string())
        .collect::<Vec<_>>()
        .join("\n")
}

// ---------------------------------------------------------------------------
// Test: GET /health returns 200 with expected JSON fields
// ---------------------------------------------------------------------------

#[tokio::test]
async fn health_check_returns_ok_with_json() {
    let t = build_test_app();
    let response = get(&t.app, "/health").await;

    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert!(json["version"].is_string());
    assert_eq!(json["processes_running"], 0);
}

// ---------------------------------------------------------------------------
// Test: GET / serves the liveness banner
// ---------------------------------------------------------------------------

#[tokio::test]
async fn liveness_banner_at_root() {
    let t = build_test_app();
    let response = get(&t.app, "/").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_string(response).await.contains("alive"));
}

// ---------------------------------------------------------------------------
// Test: GET /status requires the script parameter
// ---------------------------------------------------------------------------

#[tokio::test]
async fn status_without_script_parameter_is_rejected() {
    let t = build_test_app();
    let response = get(&t.app, "/status").await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let json = body_json(response).await;
    assert_eq!(json["code"], "BAD_REQUEST");
}

// ---------------------------------------------------------------------------
// Test: GET /status for an unhosted script answers 404 "stopped"
// ---------------------------------------------------------------------------

#[tokio::test]
async fn status_of_an_unhosted_script_is_stopped() {
    let t = build_test_app();
    let response = get(&t.app, "/status?script=ghost.py").await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_string(response).await, "ghost.py is stopped.");
}

// ---------------------------------------------------------------------------
// Test: full webhook round trip -- upload, run, probe, stop
// ---------------------------------------------------------------------------

#[tokio::test]
async fn webhook_round_trip_hosts_runs_and_stops_a_script() {
    let t = build_test_app();

    let text = chat(&t.app, json!({ "user_id": ADMIN, "text": "/upload" })).await;
    assert!(text.contains("Send the Python script as a document."), "{text}");

    let text = chat(
        &t.app,
        json!({
            "user_id": ADMIN,
            "document": {
                "file_name": "app.py",
                "content_base64": STANDARD.encode("sleep 5\n"),
            },
        }),
    )
    .await;
    assert!(text.contains("Saved app.py"), "{text}");
    assert!(t.scripts_dir.join("app.py").exists());

    let text = chat(&t.app, json!({ "user_id": ADMIN, "callback": "run" })).await;
    assert!(text.contains("Started app.py"), "{text}");

    let response = get(&t.app, "/status?script=app.py").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_string(response).await, "app.py is running.");

    let text = chat(&t.app, json!({ "user_id": ADMIN, "callback": "stop:app.py" })).await;
    assert!(text.contains("Stopped app.py."), "{text}");

    let response = get(&t.app, "/status?script=app.py").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// ---------------------------------------------------------------------------
// Test: strangers are turned away, granted users are served
// ---------------------------------------------------------------------------

#[tokio::test]
async fn granted_user_is_served_and_stranger_is_not() {
    let t = build_test_app();
    let stranger: i64 = 7;

    let text = chat(&t.app, json!({ "user_id": stranger, "text": "/start" })).await;
    assert!(text.contains("not authorized"), "{text}");

    t.allowed.grant(stranger).await.expect("grant");

    let text = chat(&t.app, json!({ "user_id": stranger, "text": "/start" })).await;
    assert!(text.contains("Welcome to the script host"), "{text}");
}

// ---------------------------------------------------------------------------
// Test: GET /api/v1/targets reflects ownership and run state
// ---------------------------------------------------------------------------

#[tokio::test]
async fn targets_listing_reflects_ownership_and_run_state() {
    let t = build_test_app();

    chat(&t.app, json!({ "user_id": ADMIN, "text": "/upload" })).await;
    chat(
        &t.app,
        json!({
            "user_id": ADMIN,
            "document": {
                "file_name": "app.py",
                "content_base64": STANDARD.encode("sleep 5\n"),
            },
        }),
    )
    .await;
    chat(&t.app, json!({ "user_id": ADMIN, "callback": "run" })).await;

    let response = get(&t.app, "/api/v1/targets").await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    let rows = json.as_array().expect("targets array");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["target"], "app.py");
    assert_eq!(rows[0]["kind"], "file");
    assert_eq!(rows[0]["owner"], ADMIN);
    assert_eq!(rows[0]["running"], true);
    assert!(rows[0]["pid"].is_u64());

    chat(&t.app, json!({ "user_id": ADMIN, "callback": "stop:app.py" })).await;

    let json = body_json(get(&t.app, "/api/v1/targets").await).await;
    assert_eq!(json[0]["running"], false);
    assert!(json[0]["pid"].is_null());
}

// ---------------------------------------------------------------------------
// Test: x-request-id header is present in response
// ---------------------------------------------------------------------------

#[tokio::test]
async fn response_contains_x_request_id_header() {
    let t = build_test_app();
    let response = get(&t.app, "/health").await;

    assert_eq!(response.status(), StatusCode::OK);

    let request_id = response.headers().get("x-request-id");
    assert!(
        request_id.is_some(),
        "Response must contain an x-request-id header"
    );

    // The value should be a valid UUID (36 chars with hyphens).
    let id_str = request_id.unwrap().to_str().unwrap();
    assert_eq!(id_str.len(), 36, "x-request-id should be a UUID string");
}

// ---------------------------------------------------------------------------
// Test: Unknown route returns 404
// ---------------------------------------------------------------------------

#[tokio::test]
async fn unknown_route_returns_404() {
    let t = build_test_app();
    let response = get(&t.app, "/this-route-does-not-exist").await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// ---------------------------------------------------------------------------
// Test: malformed webhook payloads are rejected before the engine runs
// ---------------------------------------------------------------------------

#[tokio::test]
async fn malformed_chat_events_are_rejected() {
    let t = build_test_app();
    let response = post_json(
        &t.app,
        "/api/v1/chat/events",
        json!({ "user_id": "not-a-number" }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

// ---------------------------------------------------------------------------
// Test: CORS preflight OPTIONS request returns correct headers
// ---------------------------------------------------------------------------

#[tokio::test]
async fn cors_preflight_returns_correct_headers() {
    let t = build_test_app();

    // CORS preflight requires custom headers, so we build the request manually.
    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/api/v1/chat/events")
        .header("Origin", "http://localhost:5173")
        .header("Access-Control-Request-Method", "POST")
        .header("Access-Control-Request-Headers", "content-type")
        .body(Body::empty())
        .unwrap();

    let response = t.app.clone().oneshot(request).await.unwrap();

    // CORS preflight should return 200.
    assert_eq!(response.status(), StatusCode::OK);

    let headers = response.headers();

    // Access-Control-Allow-Origin must match the request origin.
    let allow_origin = headers
        .get("access-control-allow-origin")
        .expect("Missing Access-Control-Allow-Origin header")
        .to_str()
        .unwrap();
    assert_eq!(allow_origin, "http://localhost:5173");

    // Access-Control-Allow-Methods must include POST.
    let allow_methods = headers
        .get("access-control-allow-methods")
        .expect("Missing Access-Control-Allow-Methods header")
        .to_str()
        .unwrap();
    assert!(
        allow_methods.contains("POST"),
        "Allow-Methods should contain POST, got: {allow_methods}"
    );
}
