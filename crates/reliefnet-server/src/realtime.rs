//! Realtime event fan-out over WebSocket.
//!
//! Delivery is best-effort and unpersisted: clients that connect late see
//! nothing retroactively, and a slow client's full channel drops messages
//! for that client only.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use parking_lot::RwLock;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::time::interval;
use uuid::Uuid;

use crate::state::AppState;

const CLIENT_BUFFER: usize = 64;
const HEARTBEAT_PERIOD: Duration = Duration::from_secs(30);

/// A domain event pushed to connected clients.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainEvent {
    /// Event kind: `disaster_updated`, `resources_updated`, `report_created`.
    pub event: &'static str,
    pub collection: String,
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
}

impl DomainEvent {
    pub fn new(event: &'static str, collection: &str, id: &str) -> Self {
        Self {
            event,
            collection: collection.to_string(),
            id: id.to_string(),
            body: None,
        }
    }

    #[must_use]
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }
}

#[derive(Clone)]
struct ClientHandle {
    id: String,
    sender: mpsc::Sender<DomainEvent>,
}

/// Registry of connected WebSocket clients.
#[derive(Default)]
pub struct EventBroadcaster {
    clients: RwLock<Vec<ClientHandle>>,
}

impl EventBroadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    fn register(&self) -> (String, mpsc::Receiver<DomainEvent>) {
        let (sender, receiver) = mpsc::channel(CLIENT_BUFFER);
        let id = Uuid::new_v4().to_string();
        self.clients.write().push(ClientHandle {
            id: id.clone(),
            sender,
        });
        tracing::debug!(client_id = %id, "websocket client registered");
        (id, receiver)
    }

    fn unregister(&self, client_id: &str) {
        self.clients.write().retain(|c| c.id != client_id);
        tracing::debug!(client_id = %client_id, "websocket client unregistered");
    }

    /// Broadcast an event to every connected client. Closed or full client
    /// channels are skipped; their connections are pruned on disconnect.
    pub fn broadcast(&self, event: &DomainEvent) {
        let clients = self.clients.read();
        for client in clients.iter() {
            if let Err(e) = client.sender.try_send(event.clone()) {
                tracing::debug!(
                    client_id = %client.id,
                    error = %e,
                    "failed to deliver event to websocket client"
                );
            }
        }
    }

    pub fn connection_count(&self) -> usize {
        self.clients.read().len()
    }
}

/// `GET /ws` upgrade handler.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| client_loop(socket, state.events.clone()))
}

async fn client_loop(socket: WebSocket, broadcaster: Arc<EventBroadcaster>) {
    let (client_id, mut events) = broadcaster.register();
    let (mut sink, mut stream) = socket.split();
    let mut heartbeat = interval(HEARTBEAT_PERIOD);
    // The first tick of an interval fires immediately
    heartbeat.tick().await;

    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else { break };
                let Ok(text) = serde_json::to_string(&event) else { continue };
                if sink.send(Message::Text(text.into())).await.is_err() {
                    break;
                }
            }
            _ = heartbeat.tick() => {
                if sink.send(Message::Ping(Vec::new().into())).await.is_err() {
                    break;
                }
            }
            incoming = stream.next() => {
                match incoming {
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    // Inbound payloads are ignored; the feed is one-way
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    broadcaster.unregister(&client_id);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_broadcast_reaches_all_registered_clients() {
        let broadcaster = EventBroadcaster::new();
        let (_id_a, mut rx_a) = broadcaster.register();
        let (_id_b, mut rx_b) = broadcaster.register();

        broadcaster.broadcast(&DomainEvent::new("report_created", "reports", "r-1"));

        assert_eq!(rx_a.recv().await.unwrap().id, "r-1");
        assert_eq!(rx_b.recv().await.unwrap().id, "r-1");
    }

    #[tokio::test]
    async fn test_unregister_stops_delivery() {
        let broadcaster = EventBroadcaster::new();
        let (id, mut rx) = broadcaster.register();
        broadcaster.unregister(&id);

        broadcaster.broadcast(&DomainEvent::new("disaster_updated", "disasters", "d-1"));
        assert_eq!(broadcaster.connection_count(), 0);
        // The channel is closed once the handle is dropped from the registry
        assert!(rx.recv().await.is_none());
    }

    #[test]
    fn test_full_client_channel_does_not_block() {
        let broadcaster = EventBroadcaster::new();
        let (_id, _rx) = broadcaster.register();

        for i in 0..(CLIENT_BUFFER + 10) {
            let event = DomainEvent::new("report_created", "reports", &format!("r-{i}"));
            broadcaster.broadcast(&event);
        }
        // Still registered; overflow was dropped, not fatal
        assert_eq!(broadcaster.connection_count(), 1);
    }

    #[test]
    fn test_event_serialization_shape() {
        let event = DomainEvent::new("disaster_updated", "disasters", "d-1")
            .with_body(serde_json::json!({"title": "Flood"}));
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["event"], "disaster_updated");
        assert_eq!(value["collection"], "disasters");
        assert_eq!(value["body"]["title"], "Flood");
    }
}
