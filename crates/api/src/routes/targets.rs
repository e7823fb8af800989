//! Ops view of the hosted-target table.

use axum::extract::State;
use axum::{routing::get, Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;

use hostbot_core::target::{TargetId, TargetKind};
use hostbot_core::types::UserId;

use crate::error::AppResult;
use crate::state::AppState;

/// One hosted target with its ownership record and live run state.
#[derive(Debug, Serialize)]
pub struct TargetSummary {
    pub target: TargetId,
    pub kind: TargetKind,
    pub owner: UserId,
    pub claimed_at: DateTime<Utc>,
    pub running: bool,
    /// Present only while the target has a live process.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
}

/// GET /targets -- every hosted target, ordered by identifier.
async fn list_targets(State(state): State<AppState>) -> AppResult<Json<Vec<TargetSummary>>> {
    let rows = state.ownership.list().await?;

    let mut summaries = Vec::with_capacity(rows.len());
    for (target, record) in rows {
        let info = state.supervisor.running_info(&target).await;
        summaries.push(TargetSummary {
            running: info.is_some(),
            pid: info.map(|i| i.pid),
            target,
            kind: record.kind,
            owner: record.owner,
            claimed_at: record.claimed_at,
        });
    }

    Ok(Json(summaries))
}

/// Routes mounted at the `/api/v1` root.
pub fn router() -> Router<AppState> {
    Router::new().route("/targets", get(list_targets))
}
