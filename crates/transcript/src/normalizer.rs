use serde_json::{Map, Value};
use tracing::trace;

use crate::{Finality, Speaker, TranscriptEvent};

/// Message `type` values that carry a transcript update. An object without a
/// `type` is read as the canonical `{ speaker, text, finality }` shape.
const TRANSCRIPT_TYPES: &[&str] = &["transcript", "transcript-event"];

const TEXT_FIELDS: &[&str] = &["text", "transcript", "message", "content"];
const SPEAKER_FIELDS: &[&str] = &["speaker", "role"];
const FINALITY_FIELDS: &[&str] = &["finality", "transcriptType"];
const FINAL_FLAG_FIELDS: &[&str] = &["isFinal", "final"];

/// Maps a raw transport message onto a [`TranscriptEvent`].
///
/// Returns `None` for anything that is not a usable transcript update: other
/// message types, a missing or blank text, or a missing or unknown finality.
/// Unknown speaker roles are attributed to the agent.
pub fn normalize(raw: &Value) -> Option<TranscriptEvent> {
    let obj = raw.as_object()?;

    if let Some(kind) = obj.get("type") {
        let kind = kind.as_str().unwrap_or_default();
        if !TRANSCRIPT_TYPES.contains(&kind) {
            trace!(kind, "Ignoring non-transcript transport message");
            return None;
        }
    }

    let text = first_field(obj, TEXT_FIELDS)?.as_str()?;
    if text.trim().is_empty() {
        trace!("Ignoring transcript message without text");
        return None;
    }

    let finality = finality_of(obj)?;

    let speaker = first_field(obj, SPEAKER_FIELDS)
        .and_then(Value::as_str)
        .map(Speaker::from_role)
        .unwrap_or(Speaker::Agent);

    Some(TranscriptEvent {
        speaker,
        text: text.to_string(),
        finality,
    })
}

fn first_field<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|key| obj.get(*key))
}

fn finality_of(obj: &Map<String, Value>) -> Option<Finality> {
    if let Some(value) = first_field(obj, FINALITY_FIELDS) {
        return value.as_str().and_then(Finality::parse);
    }
    first_field(obj, FINAL_FLAG_FIELDS)
        .and_then(Value::as_bool)
        .map(|is_final| {
            if is_final {
                Finality::Final
            } else {
                Finality::Partial
            }
        })
}
