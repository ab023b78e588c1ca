use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, stream::SplitSink};
use finadvise_transcript::FeedSnapshot;
use tokio::sync::mpsc;
use tracing::{debug, warn};

pub type Outbox = mpsc::UnboundedSender<Message>;

/// Spawns the task that owns the write half of a socket and drains `rx`
/// into it. It stops on the first send failure or once every `Outbox`
/// clone is dropped.
pub fn spawn_writer(
    mut sink: SplitSink<WebSocket, Message>,
    mut rx: mpsc::UnboundedReceiver<Message>,
    connection_id: String,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            if let Err(e) = sink.send(message).await {
                warn!(%connection_id, %e, "Failed to send WS message");
                break;
            }
        }
        let _ = sink.close().await;
        debug!(%connection_id, "WS writer stopped");
    })
}

pub fn send_json(outbox: &Outbox, value: &serde_json::Value) {
    let text = serde_json::to_string(value).unwrap_or_default();
    // The receiver only goes away when the socket is already gone.
    let _ = outbox.send(Message::text(text));
}

pub fn connected(consultation_id: &str, connection_id: &str) -> serde_json::Value {
    serde_json::json!({
        "type": "connected",
        "data": {
            "consultation_id": consultation_id,
            "connection_id": connection_id,
        }
    })
}

pub fn transcript_update(snapshot: &FeedSnapshot) -> serde_json::Value {
    serde_json::json!({
        "type": "transcript:update",
        "data": snapshot,
    })
}

pub fn call_ended(message_count: usize) -> serde_json::Value {
    serde_json::json!({
        "type": "call-ended",
        "data": { "message_count": message_count },
    })
}

pub fn error(message: &str) -> serde_json::Value {
    serde_json::json!({
        "type": "error",
        "data": { "message": message },
    })
}

pub fn pong() -> serde_json::Value {
    serde_json::json!({ "type": "pong" })
}
