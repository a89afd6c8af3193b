use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use metrics::gauge;
use tokio::sync::broadcast::error::RecvError;

use crate::AppState;

pub async fn handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

async fn handle_socket(mut socket: WebSocket, state: AppState) {
    // Subscribe before the ack so nothing sent after it is missed.
    let mut rx = state.hub.subscribe();
    gauge!("ws_clients").set(state.hub.subscriber_count() as f64);
    tracing::info!(clients = state.hub.subscriber_count(), "Live client connected");

    if let Some(ack) = state.hub.connected_ack() {
        if socket.send(Message::Text(ack)).await.is_err() {
            drop(rx);
            gauge!("ws_clients").set(state.hub.subscriber_count() as f64);
            return;
        }
    }

    loop {
        tokio::select! {
            // Forward broadcast events to client
            msg = rx.recv() => {
                match msg {
                    Ok(json) => {
                        if socket.send(Message::Text(json.to_string())).await.is_err() {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(n)) => {
                        tracing::warn!(skipped = n, "Live client lagged, events dropped");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            // Handle incoming messages from client (ping/pong, close)
            client_msg = socket.recv() => {
                match client_msg {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(Message::Ping(data))) => {
                        if socket.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(_)) => {} // ignore text/binary from client
                    Some(Err(_)) => break,
                }
            }
        }
    }

    drop(rx);
    gauge!("ws_clients").set(state.hub.subscriber_count() as f64);
    tracing::info!("Live client disconnected");
}
