//! Real-time record feed over WebSocket.
//!
//! Endpoint: `/ws`. Every record event is pushed as a text frame
//! `{"event": "traffic:new", "data": {...}}`.

use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use smartcity_core::events::RecordEvent;
use tokio::sync::broadcast::{self, error::RecvError};

use crate::server::AppState;

pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    // Subscribe before the upgrade completes so no event is missed in between
    let events = state.broadcaster.subscribe();
    ws.on_upgrade(move |socket| handle_socket(socket, events))
}

async fn handle_socket(socket: WebSocket, mut events: broadcast::Receiver<RecordEvent>) {
    let (mut sender, mut receiver) = socket.split();
    tracing::debug!("WebSocket client connected");

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) => {
                    let text = event.to_message().to_string();
                    if sender.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped = skipped, "WebSocket client lagging, events dropped");
                }
                Err(RecvError::Closed) => break,
            },
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                // Clients only listen; anything else they send is ignored
                Some(Ok(_)) => {}
            },
        }
    }

    let _ = sender.close().await;
    tracing::debug!("WebSocket client disconnected");
}
