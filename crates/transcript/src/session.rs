use serde_json::Value;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Instant, sleep_until};
use tracing::{debug, info};

use crate::config::TranscriptConfig;
use crate::feed::{FeedSnapshot, Subscription, TranscriptFeed};
use crate::normalizer::normalize;
use crate::reconciler::{Outcome, Reconciler};
use crate::{FinalizedMessage, TranscriptEvent};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Transcript session has ended")]
    Closed,
}

type Callback = Box<dyn Fn(&FeedSnapshot) + Send + Sync>;

enum Command {
    Event(TranscriptEvent),
    Subscribe(Callback, oneshot::Sender<Subscription>),
    Snapshot(oneshot::Sender<FeedSnapshot>),
    End(oneshot::Sender<Vec<FinalizedMessage>>),
}

/// Cloneable handle to a running [`TranscriptSession`].
#[derive(Clone)]
pub struct SessionHandle {
    tx: mpsc::Sender<Command>,
}

impl SessionHandle {
    /// Normalizes a raw transport message and queues it.
    ///
    /// Returns `Ok(false)` when the message is not a usable transcript update.
    pub async fn push(&self, raw: &Value) -> Result<bool, SessionError> {
        match normalize(raw) {
            Some(event) => {
                self.push_event(event).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub async fn push_event(&self, event: TranscriptEvent) -> Result<(), SessionError> {
        self.tx
            .send(Command::Event(event))
            .await
            .map_err(|_| SessionError::Closed)
    }

    /// Registers `callback` and hands it the current snapshot in the same
    /// step of the session task, so no update can reach it ahead of that
    /// first snapshot.
    pub async fn subscribe<F>(&self, callback: F) -> Result<Subscription, SessionError>
    where
        F: Fn(&FeedSnapshot) + Send + Sync + 'static,
    {
        let (tx, rx) = oneshot::channel();
        self.tx
            .send(Command::Subscribe(Box::new(callback), tx))
            .await
            .map_err(|_| SessionError::Closed)?;
        rx.await.map_err(|_| SessionError::Closed)
    }

    pub async fn snapshot(&self) -> Result<FeedSnapshot, SessionError> {
        let (tx, rx) = oneshot::channel();
        self.tx
            .send(Command::Snapshot(tx))
            .await
            .map_err(|_| SessionError::Closed)?;
        rx.await.map_err(|_| SessionError::Closed)
    }

    /// Ends the call: settles the pending utterance per the end policy,
    /// stops the session task and returns the finalized log.
    pub async fn end(&self) -> Result<Vec<FinalizedMessage>, SessionError> {
        let (tx, rx) = oneshot::channel();
        self.tx
            .send(Command::End(tx))
            .await
            .map_err(|_| SessionError::Closed)?;
        rx.await.map_err(|_| SessionError::Closed)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// One consultation call's transcript, driven by a dedicated task.
///
/// Events and quiet-period expiries are processed strictly one at a time;
/// each step mutates the reconciler and notifies the feed without yielding
/// in between. The only timer is the reconciler's current deadline, which is
/// re-read on every loop turn, so a refreshed stream can never be finalized
/// by a stale timer.
pub struct TranscriptSession {
    reconciler: Reconciler,
    feed: TranscriptFeed,
    rx: mpsc::Receiver<Command>,
}

impl TranscriptSession {
    pub fn spawn(config: TranscriptConfig) -> SessionHandle {
        let (tx, rx) = mpsc::channel(64);
        let feed = TranscriptFeed::new();

        let session = Self {
            reconciler: Reconciler::new(config),
            feed,
            rx,
        };
        tokio::spawn(session.run());

        SessionHandle { tx }
    }

    async fn run(self) {
        let Self {
            mut reconciler,
            feed,
            mut rx,
        } = self;
        debug!(
            quiet_period_ms = reconciler.config().quiet_period.as_millis() as u64,
            "Transcript session started"
        );

        let reply = loop {
            let deadline = reconciler.deadline();

            tokio::select! {
                command = rx.recv() => match command {
                    Some(Command::Event(event)) => {
                        let outcome = reconciler.apply(event, Instant::now());
                        notify(&feed, &reconciler, outcome);
                    }
                    Some(Command::Subscribe(callback, reply)) => {
                        let subscription = feed.subscribe_with(&reconciler.snapshot(), callback);
                        // A dropped reply drops the subscription with it.
                        let _ = reply.send(subscription);
                    }
                    Some(Command::Snapshot(reply)) => {
                        let _ = reply.send(reconciler.snapshot());
                    }
                    Some(Command::End(reply)) => break Some(reply),
                    // Every handle dropped
                    None => break None,
                },
                _ = wait_for(deadline) => {
                    let outcome = reconciler.expire(Instant::now());
                    notify(&feed, &reconciler, outcome);
                }
            }
        };
        // Later pushes fail instead of queueing into a dead session.
        drop(rx);

        let outcome = reconciler.close_pending();
        notify(&feed, &reconciler, outcome);

        let messages = reconciler.into_messages();
        info!(message_count = messages.len(), "Transcript session ended");

        if let Some(reply) = reply {
            let _ = reply.send(messages);
        }
    }
}

fn notify(feed: &TranscriptFeed, reconciler: &Reconciler, outcome: Outcome) {
    if outcome.is_changed() {
        feed.publish(&reconciler.snapshot());
    }
}

async fn wait_for(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
