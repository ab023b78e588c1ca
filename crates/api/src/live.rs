use bson::{DateTime, oid::ObjectId};
use finadvise_db::models::{Consultation, ConsultationStatus, TranscriptEntry};
use finadvise_transcript::{FinalizedMessage, Viewer};
use tracing::info;

use crate::{error::ApiError, state::AppState};

/// Key under which a consultation's live transcript session is registered.
pub fn session_key(consultation_id: ObjectId) -> String {
    consultation_id.to_hex()
}

/// Ends the live session of a consultation, if one is running, and persists
/// its finalized log. Without a running session the stored transcript is
/// left as is and the consultation is only marked completed.
pub async fn finish_call(
    state: &AppState,
    owner_id: &str,
    consultation_id: ObjectId,
) -> Result<Consultation, ApiError> {
    let ended = state
        .transcripts
        .end_session(&session_key(consultation_id))
        .await;
    persist(state, owner_id, consultation_id, ended).await
}

/// Detaches a viewer from the live session. When it was the last one the
/// session ends and its log is persisted like an explicit call end. An
/// empty log leaves the stored transcript untouched.
pub async fn leave_call(
    state: &AppState,
    owner_id: &str,
    consultation_id: ObjectId,
    viewer: Viewer,
) -> Result<Option<Consultation>, ApiError> {
    let Some(messages) = viewer.leave().await else {
        return Ok(None);
    };
    let ended = (!messages.is_empty()).then_some(messages);
    persist(state, owner_id, consultation_id, ended).await.map(Some)
}

async fn persist(
    state: &AppState,
    owner_id: &str,
    consultation_id: ObjectId,
    ended: Option<Vec<FinalizedMessage>>,
) -> Result<Consultation, ApiError> {
    let consultation = match ended {
        Some(messages) => {
            let entries: Vec<TranscriptEntry> = messages.iter().map(to_entry).collect();
            state
                .consultations
                .save_transcript(owner_id, consultation_id, &entries)
                .await?
        }
        None => {
            state
                .consultations
                .set_status(owner_id, consultation_id, ConsultationStatus::Completed)
                .await?
        }
    };

    info!(
        consultation_id = %consultation_id,
        message_count = consultation.transcript.len(),
        "Call finished"
    );
    Ok(consultation)
}

fn to_entry(message: &FinalizedMessage) -> TranscriptEntry {
    TranscriptEntry {
        speaker: message.speaker.as_str().to_string(),
        text: message.text.clone(),
        created_at: DateTime::from_chrono(message.created_at),
    }
}
