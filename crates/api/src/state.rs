use std::sync::Arc;

use hostbot_flows::ChatEngine;
use hostbot_store::OwnershipStore;
use hostbot_supervisor::ScriptSupervisor;

use crate::config::AppConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc`).
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Arc<AppConfig>,
    /// Chat intake engine serving the webhook route.
    pub engine: Arc<ChatEngine>,
    /// Live process table backing the status and ops routes.
    pub supervisor: Arc<ScriptSupervisor>,
    /// Durable ownership table.
    pub ownership: Arc<OwnershipStore>,
}
