use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tracing::{debug, info, warn};

use crate::FinalizedMessage;
use crate::config::TranscriptConfig;
use crate::session::{SessionHandle, TranscriptSession};

struct LiveSession {
    handle: SessionHandle,
    generation: u64,
    viewers: usize,
}

/// Registry of live transcript sessions, keyed by the consultation they
/// belong to.
///
/// Created once at startup and shared via `Arc`. Each session owns its own
/// log and pending stream; the engine only holds handles and counts the
/// viewers attached to each. A session lives until it is ended explicitly
/// or its last viewer leaves.
pub struct TranscriptEngine {
    config: TranscriptConfig,
    sessions: DashMap<String, LiveSession>,
    next_generation: AtomicU64,
}

impl TranscriptEngine {
    pub fn new(config: TranscriptConfig) -> Arc<Self> {
        info!(
            quiet_period_ms = config.quiet_period.as_millis() as u64,
            takeover_policy = ?config.takeover_policy,
            end_policy = ?config.end_policy,
            "Transcript engine created"
        );
        Arc::new(Self {
            config,
            sessions: DashMap::new(),
            next_generation: AtomicU64::new(0),
        })
    }

    /// Attaches a viewer to the live session for `key`, starting one if none
    /// is running.
    pub fn join(self: &Arc<Self>, key: &str) -> Viewer {
        let (handle, generation) = match self.sessions.entry(key.to_string()) {
            Entry::Occupied(mut entry) if !entry.get().handle.is_closed() => {
                let live = entry.get_mut();
                live.viewers += 1;
                (live.handle.clone(), live.generation)
            }
            Entry::Occupied(mut entry) => {
                warn!(%key, "Replacing closed transcript session");
                let live = self.spawn_session();
                let joined = (live.handle.clone(), live.generation);
                entry.insert(live);
                joined
            }
            Entry::Vacant(entry) => {
                debug!(%key, "Starting transcript session");
                let live = self.spawn_session();
                let joined = (live.handle.clone(), live.generation);
                entry.insert(live);
                joined
            }
        };

        Viewer {
            engine: Arc::clone(self),
            key: key.to_string(),
            generation,
            handle,
            left: false,
        }
    }

    pub fn session(&self, key: &str) -> Option<SessionHandle> {
        self.sessions
            .get(key)
            .map(|live| live.handle.clone())
            .filter(|handle| !handle.is_closed())
    }

    /// Ends and forgets the session for `key` whoever is still watching,
    /// returning its finalized log.
    pub async fn end_session(&self, key: &str) -> Option<Vec<FinalizedMessage>> {
        let (_, live) = self.sessions.remove(key)?;
        finish(key, live.handle).await
    }

    pub fn active_session_count(&self) -> usize {
        self.sessions.len()
    }

    fn spawn_session(&self) -> LiveSession {
        LiveSession {
            handle: TranscriptSession::spawn(self.config),
            generation: self.next_generation.fetch_add(1, Ordering::Relaxed),
            viewers: 1,
        }
    }

    /// Detaches one viewer of `generation`. Returns the handle when that was
    /// the last one; the entry is gone from the map by then.
    fn release(&self, key: &str, generation: u64) -> Option<SessionHandle> {
        match self.sessions.entry(key.to_string()) {
            Entry::Occupied(mut entry) if entry.get().generation == generation => {
                let live = entry.get_mut();
                live.viewers = live.viewers.saturating_sub(1);
                if live.viewers == 0 {
                    Some(entry.remove().handle)
                } else {
                    None
                }
            }
            // Already ended, possibly replaced by a newer call
            _ => None,
        }
    }
}

async fn finish(key: &str, handle: SessionHandle) -> Option<Vec<FinalizedMessage>> {
    match handle.end().await {
        Ok(messages) => {
            info!(%key, message_count = messages.len(), "Transcript session ended");
            Some(messages)
        }
        Err(e) => {
            warn!(%key, %e, "Transcript session was already closed");
            None
        }
    }
}

/// One viewer's attachment to a live session.
///
/// Call [`Viewer::leave`] when the viewer goes away; the last one to leave
/// ends the session and receives its log. Dropping a viewer without leaving
/// still releases it, but the log of a session it was last on is discarded
/// once the session task exits.
pub struct Viewer {
    engine: Arc<TranscriptEngine>,
    key: String,
    generation: u64,
    handle: SessionHandle,
    left: bool,
}

impl Viewer {
    pub fn handle(&self) -> &SessionHandle {
        &self.handle
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Detaches this viewer. Returns the finalized log if it was the last
    /// viewer of a session nobody had ended yet.
    pub async fn leave(mut self) -> Option<Vec<FinalizedMessage>> {
        self.left = true;
        let handle = self.engine.release(&self.key, self.generation)?;
        debug!(key = %self.key, "Last viewer left, ending transcript session");
        finish(&self.key, handle).await
    }
}

impl Drop for Viewer {
    fn drop(&mut self) {
        if self.left {
            return;
        }
        if self.engine.release(&self.key, self.generation).is_some() {
            // The session task exits once this last handle is gone.
            warn!(key = %self.key, "Last viewer dropped without leaving; log discarded");
        }
    }
}
