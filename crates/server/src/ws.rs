//! WebSocket handler for the notification stream.

use axum::{
    extract::{
        ws::{Message, WebSocket},
        Query, State, WebSocketUpgrade,
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use storedesk_shared::{Event, ProblemDetails};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::error::Problem;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct StreamQuery {
    token: Option<String>,
}

/// WebSocket upgrade handler
pub async fn ws_handler(
    State(state): State<AppState>,
    Query(query): Query<StreamQuery>,
    ws: WebSocketUpgrade,
) -> Result<Response, Problem> {
    let token = query.token.unwrap_or_default();
    let username = state.verify_access(&token).await.ok_or_else(|| {
        tracing::info!("Notification stream rejected: access credential expired or unknown");
        Problem(ProblemDetails::unauthorized("Access credential expired or unknown"))
    })?;

    // Subscribe before the upgrade so nothing published after the handshake is missed
    let events = state.subscribe();
    tracing::info!("Notification stream authenticated for user: {}", username);

    Ok(ws.on_upgrade(move |socket| handle_socket(socket, username, events)))
}

/// Forward published events until either side goes away
async fn handle_socket(socket: WebSocket, username: String, mut events: broadcast::Receiver<Event>) {
    let (mut sender, mut receiver) = socket.split();
    let conn_id = Uuid::new_v4();
    tracing::debug!("Stream {} open for {}", conn_id, username);

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) => {
                    let json = match event.to_frame() {
                        Ok(json) => json,
                        Err(e) => {
                            tracing::error!("Failed to encode event: {}", e);
                            continue;
                        }
                    };
                    if sender.send(Message::Text(json.into())).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!("Stream {} lagged, {} events skipped", conn_id, skipped);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            msg = receiver.next() => match msg {
                // The stream is one-way; anything the client sends is ignored
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }

    tracing::info!("Notification stream closed for user: {}", username);
}
