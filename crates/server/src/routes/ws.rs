//! `GET /ws`: the live signal stream.
//!
//! The first frame is `{"type":"snapshot","signals":[...]}` with the 20 most
//! recent signals, newest first. Every signal ingested afterwards follows as
//! `{"type":"signal","signal":{...}}`. Anything the client sends is ignored
//! apart from close frames.

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use tracing::{debug, warn};

use crate::state::AppState;

pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let subscription = state.relay.subscribe().await;
    let subscriber_id = subscription.id;
    let mut feed_rx = subscription.rx;
    debug!("Stream subscriber {} connected", subscriber_id);

    let (mut sender, mut receiver) = socket.split();

    let mut send_task = tokio::spawn(async move {
        while let Some(message) = feed_rx.recv().await {
            match serde_json::to_string(message.as_ref()) {
                Ok(json) => {
                    if sender.send(Message::Text(json.into())).await.is_err() {
                        break;
                    }
                }
                Err(e) => warn!("Failed to serialize feed message: {}", e),
            }
        }
    });

    let mut recv_task = tokio::spawn(async move {
        while let Some(msg) = receiver.next().await {
            match msg {
                Ok(Message::Close(_)) => break,
                Err(e) => {
                    debug!("Stream socket error: {}", e);
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

    state.relay.unsubscribe(subscriber_id).await;
    debug!("Stream subscriber {} disconnected", subscriber_id);
}
