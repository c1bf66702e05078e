//! WebSocket endpoint for the signaling channel
//!
//! Each connection gets a server-generated identifier and an outbound
//! message queue. The socket task shuttles frames both ways: inbound text
//! frames are decoded and dispatched to the relay, queued relay messages
//! are serialized out. Per-connection delivery order follows queue order.

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::signaling::ClientMessage;
use crate::state::AppState;

/// WebSocket upgrade handler for `/ws`
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle one signaling connection until either side closes
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();

    let (tx, mut rx) = mpsc::unbounded_channel();
    let id = state.relay.connect(tx).await;
    info!(%id, "signaling client connected");

    // Heartbeat interval (30 seconds)
    let mut heartbeat = tokio::time::interval(tokio::time::Duration::from_secs(30));

    loop {
        tokio::select! {
            // Inbound frame from the client
            frame = receiver.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<ClientMessage>(&text) {
                            Ok(message) => state.relay.handle(id, message).await,
                            Err(e) => warn!(%id, "Ignoring malformed signaling frame: {}", e),
                        }
                    }
                    Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => {
                        debug!(%id, "heartbeat frame");
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        break;
                    }
                    Some(Err(e)) => {
                        warn!(%id, "WebSocket receive error: {}", e);
                        break;
                    }
                    _ => {}
                }
            }

            // Outbound message queued by the relay
            outbound = rx.recv() => {
                match outbound {
                    Some(message) => {
                        match serde_json::to_string(&message) {
                            Ok(json) => {
                                if sender.send(Message::Text(json)).await.is_err() {
                                    warn!(%id, "Failed to send to client, disconnecting");
                                    break;
                                }
                            }
                            Err(e) => warn!(%id, "Failed to serialize message: {}", e),
                        }
                    }
                    None => break,
                }
            }

            // Heartbeat
            _ = heartbeat.tick() => {
                if sender.send(Message::Ping(vec![])).await.is_err() {
                    warn!(%id, "Failed to send ping, disconnecting");
                    break;
                }
            }
        }
    }

    state.relay.disconnect(id).await;
    info!(%id, "signaling client disconnected");
}
