pub mod config;
pub mod engine;
pub mod feed;
pub mod normalizer;
pub mod reconciler;
pub mod session;

pub use config::{EndPolicy, PolicyParseError, TakeoverPolicy, TranscriptConfig};
pub use engine::{TranscriptEngine, Viewer};
pub use feed::{FeedSnapshot, Subscription, TranscriptFeed};
pub use normalizer::normalize;
pub use reconciler::{Outcome, Reconciler};
pub use session::{SessionError, SessionHandle, TranscriptSession};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Speaker {
    User,
    Agent,
}

impl Speaker {
    /// Maps a transport role tag. Anything that is not the end user is
    /// attributed to the advisor.
    pub fn from_role(role: &str) -> Self {
        if role.trim().eq_ignore_ascii_case("user") {
            Speaker::User
        } else {
            Speaker::Agent
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Speaker::User => "user",
            Speaker::Agent => "agent",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Finality {
    Partial,
    Final,
}

impl Finality {
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        if value.eq_ignore_ascii_case("partial") {
            Some(Finality::Partial)
        } else if value.eq_ignore_ascii_case("final") {
            Some(Finality::Final)
        } else {
            None
        }
    }
}

/// One recognition update from the voice transport, after normalization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptEvent {
    pub speaker: Speaker,
    pub text: String,
    pub finality: Finality,
}

impl TranscriptEvent {
    pub fn partial(speaker: Speaker, text: impl Into<String>) -> Self {
        Self {
            speaker,
            text: text.into(),
            finality: Finality::Partial,
        }
    }

    pub fn complete(speaker: Speaker, text: impl Into<String>) -> Self {
        Self {
            speaker,
            text: text.into(),
            finality: Finality::Final,
        }
    }
}

/// An utterance appended to the session log. Never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FinalizedMessage {
    pub speaker: Speaker,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

/// The single in-flight utterance of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingStream {
    pub speaker: Speaker,
    pub text: String,
    #[serde(skip)]
    pub last_updated_at: Instant,
}
