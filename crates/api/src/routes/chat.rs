//! Chat webhook intake.
//!
//! The chat transport posts every user interaction here as one
//! [`ChatEvent`]; the reply carries the messages (text plus optional
//! button menu) the transport should render back to the user. Rendering
//! and delivery stay on the transport's side of the fence.

use axum::extract::State;
use axum::{routing::post, Json, Router};
use serde::Serialize;

use hostbot_flows::{ChatEvent, Reply};

use crate::state::AppState;

/// Response payload for `POST /chat/events`.
#[derive(Serialize)]
pub struct EventReplies {
    /// Messages to render, in order.
    pub messages: Vec<Reply>,
}

/// POST /chat/events -- run one chat interaction through the intake engine.
async fn receive_event(
    State(state): State<AppState>,
    Json(event): Json<ChatEvent>,
) -> Json<EventReplies> {
    let messages = state.engine.handle(event).await;
    Json(EventReplies { messages })
}

/// Routes mounted at `/chat`.
pub fn router() -> Router<AppState> {
    Router::new().route("/events", post(receive_event))
}
