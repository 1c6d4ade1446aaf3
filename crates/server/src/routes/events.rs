//! Development event publisher.

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use storedesk_shared::Event;

use crate::middleware::bearer::Bearer;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct PublishReceipt {
    /// Open streams the event was handed to.
    pub receivers: usize,
}

/// Record an event and push it to every open notification stream
pub async fn publish(
    auth: Bearer,
    State(state): State<AppState>,
    Json(event): Json<Event>,
) -> (StatusCode, Json<PublishReceipt>) {
    tracing::info!("{} published a {} event", auth.username, event.kind().as_str());

    let receivers = state.publish(event);
    (StatusCode::ACCEPTED, Json(PublishReceipt { receivers }))
}
