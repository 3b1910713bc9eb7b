//! Live event stream. Unlike a polling client, a subscriber here sees every
//! `EventKind` the engine raises as it raises it — the `on_event` hook
//! supplied to `ConsensusEngine::new` is just `broadcaster.publish`.

use axum::{
    extract::ws::{Message, WebSocket, WebSocketUpgrade},
    extract::State,
    response::IntoResponse,
    routing::get,
    Router,
};
use quorumgate_consensus::EventKind;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, warn};

const CHANNEL_CAPACITY: usize = 256;

#[derive(Clone)]
pub struct EventBroadcaster {
    sender: broadcast::Sender<Value>,
}

impl EventBroadcaster {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    pub fn publish(&self, kind: EventKind, mut data: Value) {
        if let Value::Object(ref mut map) = data {
            map.insert("event".to_string(), serde_json::json!(kind));
        }
        // No receivers connected yet is the common case between rounds, not an error.
        let _ = self.sender.send(data);
    }

    pub fn hook(self: &Arc<Self>) -> quorumgate_consensus::EventHook {
        let broadcaster = Arc::clone(self);
        Arc::new(move |kind, data| broadcaster.publish(kind, data))
    }

    fn subscribe(&self) -> broadcast::Receiver<Value> {
        self.sender.subscribe()
    }
}

impl Default for EventBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

pub fn router(broadcaster: Arc<EventBroadcaster>) -> Router {
    Router::new().route("/ws", get(upgrade)).with_state(broadcaster)
}

async fn upgrade(ws: WebSocketUpgrade, State(broadcaster): State<Arc<EventBroadcaster>>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, broadcaster))
}

async fn handle_socket(mut socket: WebSocket, broadcaster: Arc<EventBroadcaster>) {
    let mut events = broadcaster.subscribe();
    loop {
        tokio::select! {
            event = events.recv() => {
                match event {
                    Ok(value) => {
                        let text = value.to_string();
                        if socket.send(Message::Text(text)).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "websocket subscriber fell behind the event stream");
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(Message::Text(text))) if text == "ping" => {
                        if socket.send(Message::Text(serde_json::json!({"event": "pong"}).to_string())).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        debug!(%e, "websocket read error");
                        break;
                    }
                }
            }
        }
    }
}
