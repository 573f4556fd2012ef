//! WebSocket progress stream.

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::Response;
use futures::{SinkExt, StreamExt};
use tracing::{debug, error, info};

use tator_core::types::UserId;

use crate::extractors::Identity;
use crate::state::AppState;

/// GET /ws/progress: WebSocket upgrade
pub async fn progress_ws(
    State(state): State<AppState>,
    Identity(user_id): Identity,
    ws: WebSocketUpgrade,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(state, user_id, socket))
}

/// Drives one established connection until either side goes away.
async fn handle_socket(state: AppState, user_id: UserId, socket: WebSocket) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let (mut consumer, mut outbound_rx) = state.realtime.open(user_id);
    let conn_id = consumer.id();

    info!(conn_id = %conn_id, user_id = %user_id, "Progress stream opened");

    // Replay blocks on outbound room, so the writer must already be running.
    let outbound_task = tokio::spawn(async move {
        while let Some(msg) = outbound_rx.recv().await {
            if ws_tx.send(Message::Text(msg.into())).await.is_err() {
                break;
            }
        }
        let _ = ws_tx.close().await;
    });

    if let Err(e) = consumer.join().await {
        error!(conn_id = %conn_id, error = %e, "Failed to join progress groups");
        consumer.close().await;
        outbound_task.abort();
        return;
    }

    let mut shutdown = state.realtime.shutdown_receiver();
    loop {
        tokio::select! {
            _ = shutdown.recv() => break,
            inbound = ws_rx.next() => match inbound {
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    debug!(conn_id = %conn_id, error = %e, "WebSocket read error");
                    break;
                }
            },
        }
    }

    consumer.close().await;
    outbound_task.abort();
    info!(conn_id = %conn_id, user_id = %user_id, "Progress stream closed");
}
