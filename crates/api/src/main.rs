use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use hostbot_api::config::AppConfig;
use hostbot_api::router::build_app_router;
use hostbot_api::state::AppState;
use hostbot_flows::{ChatEngine, SessionManager};
use hostbot_store::{AllowedUsersStore, OwnershipStore};
use hostbot_supervisor::ScriptSupervisor;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Logging ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "hostbot_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = AppConfig::from_env();
    tracing::info!(
        host = %config.host,
        port = %config.port,
        scripts_dir = %config.scripts_dir.display(),
        "Configuration loaded"
    );

    std::fs::create_dir_all(&config.scripts_dir).expect("Could not create scripts directory");
    std::fs::create_dir_all(&config.state_dir).expect("Could not create state directory");

    // --- Durable state ---
    let ownership = Arc::new(OwnershipStore::new(config.ownership_path()));
    let allowed = Arc::new(AllowedUsersStore::new(config.allowed_users_path()));
    tracing::info!(state_dir = %config.state_dir.display(), "State tables opened");

    // --- Supervisor ---
    let supervisor = ScriptSupervisor::new(config.supervisor_config(), Arc::clone(&ownership));

    // Mirror lifecycle transitions into the server log.
    let mut events = supervisor.subscribe();
    let event_log_handle = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            tracing::info!(?event, "Supervisor event");
        }
    });

    // --- Intake sessions ---
    let sessions = SessionManager::new(config.session_ttl());
    let janitor_cancel = tokio_util::sync::CancellationToken::new();
    let janitor_handle = sessions.spawn_janitor(Duration::from_secs(60), janitor_cancel.clone());

    // --- Chat engine ---
    let engine = ChatEngine::new(
        config.engine_config(),
        Arc::clone(&supervisor),
        Arc::clone(&ownership),
        allowed,
        Arc::clone(&sessions),
    );
    tracing::info!(admin = ?config.admin_user_id, "Chat engine ready");

    // --- Shared state + router ---
    let state = AppState {
        config: Arc::new(config.clone()),
        engine,
        supervisor: Arc::clone(&supervisor),
        ownership,
    };
    let app = build_app_router(state, &config);

    // --- Serve ---
    let addr = SocketAddr::new(
        config.host.parse().expect("HOST is not a valid bind address"),
        config.port,
    );
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Could not bind listen address");
    tracing::info!(%addr, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server failed");

    // --- Cleanup ---
    tracing::info!("Listener closed, cleaning up");

    janitor_cancel.cancel();
    let _ = tokio::time::timeout(Duration::from_secs(5), janitor_handle).await;
    tracing::info!("Session janitor stopped");

    // Hosted children do not outlive the control plane.
    supervisor.shutdown().await;
    tracing::info!("Supervisor shut down");

    event_log_handle.abort();
    tracing::info!("Shutdown complete");
}

/// Resolves when the process receives SIGINT or, on Unix, SIGTERM, so the
/// server drains cleanly whether stopped from a terminal or by a process
/// manager.
async fn shutdown_signal() {
    let interrupt = async {
        tokio::signal::ctrl_c()
            .await
            .expect("SIGINT handler installation failed");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("SIGTERM handler installation failed")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = interrupt => tracing::info!("SIGINT received, draining"),
        () = terminate => tracing::info!("SIGTERM received, draining"),
    }
}
