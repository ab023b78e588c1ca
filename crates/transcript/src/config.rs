use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_QUIET_PERIOD_MS: u64 = 2000;

/// What happens when a different speaker starts streaming while another
/// utterance is still pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TakeoverPolicy {
    /// Finalize the pending utterance with its last partial text, then start
    /// streaming the new speaker.
    #[default]
    FinalizeAndSwitch,
    /// Ignore the newcomer's partials until the pending utterance settles.
    Reject,
}

/// What happens to a still-pending utterance when the call ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EndPolicy {
    #[default]
    Finalize,
    Discard,
}

#[derive(Debug, Error)]
#[error("Unknown {kind}: {value}")]
pub struct PolicyParseError {
    kind: &'static str,
    value: String,
}

impl FromStr for TakeoverPolicy {
    type Err = PolicyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "finalize-and-switch" | "finalize_and_switch" => Ok(TakeoverPolicy::FinalizeAndSwitch),
            "reject" => Ok(TakeoverPolicy::Reject),
            _ => Err(PolicyParseError {
                kind: "takeover policy",
                value: s.to_string(),
            }),
        }
    }
}

impl FromStr for EndPolicy {
    type Err = PolicyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "finalize" => Ok(EndPolicy::Finalize),
            "discard" => Ok(EndPolicy::Discard),
            _ => Err(PolicyParseError {
                kind: "end policy",
                value: s.to_string(),
            }),
        }
    }
}

/// Configuration for one transcript session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TranscriptConfig {
    /// Partial-event inactivity after which the pending utterance is finalized.
    pub quiet_period: Duration,
    pub takeover_policy: TakeoverPolicy,
    pub end_policy: EndPolicy,
}

impl TranscriptConfig {
    pub fn with_quiet_period_ms(mut self, ms: u64) -> Self {
        self.quiet_period = Duration::from_millis(ms);
        self
    }

    pub fn with_takeover_policy(mut self, policy: TakeoverPolicy) -> Self {
        self.takeover_policy = policy;
        self
    }

    pub fn with_end_policy(mut self, policy: EndPolicy) -> Self {
        self.end_policy = policy;
        self
    }
}

impl Default for TranscriptConfig {
    fn default() -> Self {
        Self {
            quiet_period: Duration::from_millis(DEFAULT_QUIET_PERIOD_MS),
            takeover_policy: TakeoverPolicy::default(),
            end_policy: EndPolicy::default(),
        }
    }
}
