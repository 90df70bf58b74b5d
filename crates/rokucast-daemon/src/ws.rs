//! WebSocket handler for real-time updates

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use rokucast_core::DiscoveredDevice;
use rokucast_discovery::DiscoveryEvent;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use crate::state::{AppState, DiscoveryStatus};

/// WebSocket message types
#[derive(Serialize)]
#[serde(tag = "type", content = "data")]
enum WsMessage {
    /// Sent once on connect
    #[serde(rename = "snapshot")]
    Snapshot {
        status: DiscoveryStatus,
        devices: Vec<DiscoveredDevice>,
    },
    #[serde(rename = "discovery")]
    Discovery(DiscoveryEvent),
    #[serde(rename = "pong")]
    Pong,
}

impl WsMessage {
    fn to_message(&self) -> Option<Message> {
        match serde_json::to_string(self) {
            Ok(json) => Some(Message::Text(json.into())),
            Err(e) => {
                warn!(error = %e, "Failed to serialize WebSocket message");
                None
            }
        }
    }
}

/// WebSocket upgrade handler
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();
    let mut discovery_events = state.subscribe();

    info!("WebSocket client connected");

    let snapshot = WsMessage::Snapshot {
        status: state.discovery.status().await,
        devices: state.discovery.devices().await,
    };
    if let Some(msg) = snapshot.to_message() {
        if sender.send(msg).await.is_err() {
            return;
        }
    }

    loop {
        tokio::select! {
            // Forward discovery events to client
            event = discovery_events.recv() => {
                match event {
                    Ok(event) => {
                        if let Some(msg) = WsMessage::Discovery(event).to_message() {
                            if sender.send(msg).await.is_err() {
                                break;
                            }
                        }
                    }
                    Err(RecvError::Lagged(n)) => {
                        debug!(skipped = n, "Discovery event channel lagged");
                    }
                    Err(RecvError::Closed) => {
                        debug!("Discovery event channel closed");
                        break;
                    }
                }
            }

            // Handle incoming messages from client
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Text(text))) => {
                        if text.as_str() == "ping" {
                            if let Some(pong) = WsMessage::Pong.to_message() {
                                if sender.send(pong).await.is_err() {
                                    break;
                                }
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        break;
                    }
                    Some(Err(e)) => {
                        warn!(error = %e, "WebSocket error");
                        break;
                    }
                    _ => {}
                }
            }
        }
    }

    info!("WebSocket client disconnected");
}

#[cfg(test)]
mod tests {
    use super::*;
    use rokucast_core::SubnetPrefix;
    use uuid::Uuid;

    #[test]
    fn test_event_envelope() {
        let session = Uuid::nil();
        let msg = WsMessage::Discovery(DiscoveryEvent::PrefixCompleted {
            session,
            prefix: SubnetPrefix::new(192, 168, 1),
            found: 2,
        });
        let json: serde_json::Value = serde_json::from_str(&serde_json::to_string(&msg).unwrap()).unwrap();
        assert_eq!(json["type"], "discovery");
        assert_eq!(json["data"]["type"], "prefix_completed");
        assert_eq!(json["data"]["found"], 2);
    }

    #[test]
    fn test_pong() {
        let json = serde_json::to_string(&WsMessage::Pong).unwrap();
        assert_eq!(json, r#"{"type":"pong"}"#);
    }
}
