//! WebSocket handler for real-time presence events.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures::{sink::SinkExt, stream::StreamExt};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::state::AppState;

/// WebSocket upgrade handler.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

/// Handle individual WebSocket connection.
async fn handle_socket(socket: WebSocket, state: AppState) {
    let client_id = Uuid::new_v4();
    let (mut sender, mut receiver) = socket.split();
    let mut rx = state.subscribe();

    let receiver_count = state.tx.receiver_count();
    info!(%client_id, receiver_count, "WebSocket client connected");

    // Forward broadcast events to this client
    let mut send_task = tokio::spawn(async move {
        loop {
            let event = match rx.recv().await {
                Ok(event) => event,
                Err(RecvError::Lagged(skipped)) => {
                    warn!(%client_id, skipped, "WebSocket client lagging, events skipped");
                    continue;
                }
                Err(RecvError::Closed) => break,
            };
            let json = match serde_json::to_string(&event) {
                Ok(json) => json,
                Err(e) => {
                    warn!(%client_id, error = %e, "Failed to serialize event");
                    continue;
                }
            };
            debug!(%client_id, message = %json, "Sending event to WebSocket client");
            if sender.send(Message::Text(json.into())).await.is_err() {
                debug!(%client_id, "WebSocket send failed, client disconnected");
                break;
            }
        }
    });

    // Viewers only listen; incoming frames are read to notice the close
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => {
                    debug!(%client_id, "Ignoring message from WebSocket client: {}", text);
                }
                Message::Close(_) => {
                    debug!(%client_id, "WebSocket client sent close frame");
                    break;
                }
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    info!(%client_id, "WebSocket client disconnected");
}
