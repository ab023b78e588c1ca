use axum::{
    extract::{
        Path, Query, State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::Response,
};
use bson::oid::ObjectId;
use finadvise_db::models::ConsultationStatus;
use finadvise_transcript::SessionHandle;
use futures::StreamExt;
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::outbound::{self, Outbox};
use crate::{error::ApiError, live, routes::parse_id, state::AppState};

#[derive(Debug, Deserialize)]
pub struct WsParams {
    pub token: String,
}

/// What the read loop should do after a client message.
#[derive(Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    Stop,
}

pub async fn ws_upgrade(
    State(state): State<AppState>,
    Path(consultation_id): Path<String>,
    Query(params): Query<WsParams>,
    ws: WebSocketUpgrade,
) -> Result<Response, ApiError> {
    // Verify the token and ownership before accepting the WebSocket
    let claims = state.auth.verify_token(&params.token)?;
    let id = parse_id(&consultation_id, "consultation_id")?;
    state.consultations.find_for_owner(&claims.sub, id).await?;

    let owner_id = claims.sub;
    Ok(ws.on_upgrade(move |socket| handle_socket(socket, state, owner_id, id)))
}

async fn handle_socket(socket: WebSocket, state: AppState, owner_id: String, id: ObjectId) {
    let connection_id = Uuid::new_v4().to_string();
    let key = live::session_key(id);
    info!(%owner_id, consultation_id = %key, %connection_id, "Live transcript connected");

    let viewer = state.transcripts.join(&key);
    if let Err(e) = state
        .consultations
        .set_status(&owner_id, id, ConsultationStatus::InProgress)
        .await
    {
        warn!(consultation_id = %key, %e, "Failed to mark consultation in progress");
    }

    let (sink, mut receiver) = socket.split();
    let (tx, rx) = mpsc::unbounded_channel();
    let writer = outbound::spawn_writer(sink, rx, connection_id.clone());

    outbound::send_json(&tx, &outbound::connected(&key, &connection_id));

    // Feed callbacks run on the session task, so they only enqueue. The
    // first call carries the current snapshot.
    let feed_tx = tx.clone();
    let subscription = match viewer
        .handle()
        .subscribe(move |snapshot| {
            outbound::send_json(&feed_tx, &outbound::transcript_update(snapshot));
        })
        .await
    {
        Ok(subscription) => Some(subscription),
        Err(e) => {
            warn!(consultation_id = %key, %e, "Session closed before viewer attached");
            outbound::send_json(&tx, &outbound::error("Call has ended"));
            None
        }
    };

    if subscription.is_some() {
        while let Some(msg) = receiver.next().await {
            let flow = match msg {
                Ok(Message::Text(text)) => {
                    handle_client_message(
                        &state,
                        viewer.handle(),
                        &owner_id,
                        id,
                        &tx,
                        text.as_str(),
                    )
                    .await
                }
                Ok(Message::Ping(data)) => {
                    let _ = tx.send(Message::Pong(data));
                    Flow::Continue
                }
                Ok(Message::Close(_)) => Flow::Stop,
                Err(e) => {
                    warn!(%connection_id, %e, "WebSocket error");
                    Flow::Stop
                }
                _ => Flow::Continue,
            };
            if flow == Flow::Stop {
                break;
            }
        }
    }

    if let Some(subscription) = subscription {
        subscription.unsubscribe();
    }
    drop(tx);
    let _ = writer.await;

    match live::leave_call(&state, &owner_id, id, viewer).await {
        Ok(Some(consultation)) => info!(
            consultation_id = %key,
            message_count = consultation.transcript.len(),
            "Last viewer left, transcript saved"
        ),
        Ok(None) => {}
        Err(e) => warn!(consultation_id = %key, ?e, "Failed to save transcript on last leave"),
    }

    info!(consultation_id = %key, %connection_id, "Live transcript disconnected");
}

async fn handle_client_message(
    state: &AppState,
    session: &SessionHandle,
    owner_id: &str,
    id: ObjectId,
    tx: &Outbox,
    text: &str,
) -> Flow {
    let parsed: serde_json::Value = match serde_json::from_str(text) {
        Ok(v) => v,
        Err(_) => {
            debug!(consultation_id = %id, "Ignoring non-JSON frame");
            return Flow::Continue;
        }
    };

    match parsed.get("type").and_then(|t| t.as_str()) {
        Some("ping") => {
            outbound::send_json(tx, &outbound::pong());
            Flow::Continue
        }
        Some("call-end") => {
            match live::finish_call(state, owner_id, id).await {
                Ok(consultation) => outbound::send_json(
                    tx,
                    &outbound::call_ended(consultation.transcript.len()),
                ),
                Err(e) => {
                    warn!(consultation_id = %id, ?e, "Failed to finish call");
                    outbound::send_json(tx, &outbound::error("Failed to save transcript"));
                }
            }
            Flow::Stop
        }
        _ => match session.push(&parsed).await {
            Ok(true) => Flow::Continue,
            Ok(false) => {
                debug!(consultation_id = %id, "Frame ignored by normalizer");
                Flow::Continue
            }
            Err(e) => {
                // Ended from elsewhere (another viewer or the REST endpoint).
                debug!(consultation_id = %id, %e, "Event for a finished session");
                outbound::send_json(tx, &outbound::error("Call has ended"));
                Flow::Stop
            }
        },
    }
}
