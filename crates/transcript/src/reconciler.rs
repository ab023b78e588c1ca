use chrono::Utc;
use tokio::time::Instant;
use tracing::debug;

use crate::config::{EndPolicy, TakeoverPolicy, TranscriptConfig};
use crate::feed::FeedSnapshot;
use crate::{Finality, FinalizedMessage, PendingStream, Speaker, TranscriptEvent};

/// Whether a step changed the observable state of the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Unchanged,
    Changed,
}

impl Outcome {
    pub fn is_changed(self) -> bool {
        self == Outcome::Changed
    }
}

/// Merges streaming transcript events into an append-only message log.
///
/// Holds at most one pending utterance. A pending utterance becomes a
/// [`FinalizedMessage`] on an explicit final event, on takeover by another
/// speaker, or once [`Reconciler::expire`] observes that its quiet period
/// has elapsed. The reconciler never reads the clock itself; callers pass
/// `now` so the timer policy stays with the driver.
#[derive(Debug)]
pub struct Reconciler {
    config: TranscriptConfig,
    log: Vec<FinalizedMessage>,
    pending: Option<PendingStream>,
}

impl Reconciler {
    pub fn new(config: TranscriptConfig) -> Self {
        Self {
            config,
            log: Vec::new(),
            pending: None,
        }
    }

    pub fn config(&self) -> &TranscriptConfig {
        &self.config
    }

    pub fn messages(&self) -> &[FinalizedMessage] {
        &self.log
    }

    pub fn pending(&self) -> Option<&PendingStream> {
        self.pending.as_ref()
    }

    pub fn is_idle(&self) -> bool {
        self.pending.is_none()
    }

    /// When the pending utterance auto-finalizes if no partial refreshes it.
    pub fn deadline(&self) -> Option<Instant> {
        self.pending
            .as_ref()
            .map(|p| p.last_updated_at + self.config.quiet_period)
    }

    pub fn apply(&mut self, event: TranscriptEvent, now: Instant) -> Outcome {
        match event.finality {
            Finality::Partial => self.apply_partial(event.speaker, event.text, now),
            Finality::Final => self.apply_final(event.speaker, event.text),
        }
    }

    /// Finalizes the pending utterance if its quiet period has elapsed by `now`.
    ///
    /// Safe to call at any time: with nothing pending, or a deadline pushed
    /// back by a newer partial, this is a no-op.
    pub fn expire(&mut self, now: Instant) -> Outcome {
        match self.deadline() {
            Some(deadline) if now >= deadline => {
                if let Some(pending) = self.pending.take() {
                    debug!(speaker = pending.speaker.as_str(), "Quiet period elapsed, finalizing");
                    self.append(pending.speaker, pending.text);
                }
                Outcome::Changed
            }
            _ => Outcome::Unchanged,
        }
    }

    /// Settles the pending utterance for the end of the call.
    pub fn close_pending(&mut self) -> Outcome {
        let Some(pending) = self.pending.take() else {
            return Outcome::Unchanged;
        };
        match self.config.end_policy {
            EndPolicy::Finalize => self.append(pending.speaker, pending.text),
            EndPolicy::Discard => {
                debug!(speaker = pending.speaker.as_str(), "Discarding pending utterance at call end");
            }
        }
        Outcome::Changed
    }

    pub fn snapshot(&self) -> FeedSnapshot {
        FeedSnapshot {
            finalized_messages: self.log.clone(),
            pending: self.pending.clone(),
        }
    }

    pub fn into_messages(self) -> Vec<FinalizedMessage> {
        self.log
    }

    fn apply_partial(&mut self, speaker: Speaker, text: String, now: Instant) -> Outcome {
        match self.pending.as_mut() {
            None => {
                self.pending = Some(PendingStream {
                    speaker,
                    text,
                    last_updated_at: now,
                });
                Outcome::Changed
            }
            Some(pending) if pending.speaker == speaker => {
                pending.last_updated_at = now;
                if pending.text == text {
                    return Outcome::Unchanged;
                }
                pending.text = text;
                Outcome::Changed
            }
            Some(pending) => match self.config.takeover_policy {
                TakeoverPolicy::Reject => {
                    debug!(
                        pending = pending.speaker.as_str(),
                        incoming = speaker.as_str(),
                        "Rejecting overlapping partial"
                    );
                    Outcome::Unchanged
                }
                TakeoverPolicy::FinalizeAndSwitch => {
                    let previous = std::mem::replace(
                        pending,
                        PendingStream {
                            speaker,
                            text,
                            last_updated_at: now,
                        },
                    );
                    debug!(
                        from = previous.speaker.as_str(),
                        to = speaker.as_str(),
                        "Speaker takeover"
                    );
                    self.append(previous.speaker, previous.text);
                    Outcome::Changed
                }
            },
        }
    }

    fn apply_final(&mut self, speaker: Speaker, text: String) -> Outcome {
        match self.pending.take() {
            // The final text is authoritative over the last partial
            Some(pending) if pending.speaker == speaker => {
                self.append(speaker, text);
            }
            Some(pending) => match self.config.takeover_policy {
                TakeoverPolicy::FinalizeAndSwitch => {
                    self.append(pending.speaker, pending.text);
                    self.append(speaker, text);
                }
                TakeoverPolicy::Reject => {
                    self.pending = Some(pending);
                    self.append(speaker, text);
                }
            },
            None => {
                if self.is_duplicate_of_last(speaker, &text) {
                    debug!(speaker = speaker.as_str(), "Duplicate final ignored");
                    return Outcome::Unchanged;
                }
                self.append(speaker, text);
            }
        }
        Outcome::Changed
    }

    /// A final matching the last logged message is treated as a redelivery
    /// of it. Transports carry no utterance ids, so a speaker genuinely
    /// repeating themselves ("Yes." twice in a row, nothing in between) is
    /// logged once. The same text after any other message is kept.
    fn is_duplicate_of_last(&self, speaker: Speaker, text: &str) -> bool {
        self.log
            .last()
            .is_some_and(|last| last.speaker == speaker && last.text == text)
    }

    fn append(&mut self, speaker: Speaker, text: String) {
        self.log.push(FinalizedMessage {
            speaker,
            text,
            created_at: Utc::now(),
        });
    }
}
