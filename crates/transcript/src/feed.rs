use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use serde::Serialize;

use crate::{FinalizedMessage, PendingStream};

/// Read model handed to subscribers after every change.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FeedSnapshot {
    pub finalized_messages: Vec<FinalizedMessage>,
    pub pending: Option<PendingStream>,
}

type Subscriber = Arc<dyn Fn(&FeedSnapshot) + Send + Sync>;

#[derive(Default)]
struct Subscribers {
    next_id: u64,
    entries: Vec<(u64, Subscriber)>,
}

/// Synchronous fan-out of [`FeedSnapshot`]s to any number of subscribers.
///
/// Subscribers run on the publishing task and must return promptly.
#[derive(Clone, Default)]
pub struct TranscriptFeed {
    subscribers: Arc<Mutex<Subscribers>>,
}

impl TranscriptFeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `callback`. It stays registered until the returned
    /// [`Subscription`] is dropped or unsubscribed.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&FeedSnapshot) + Send + Sync + 'static,
    {
        let mut subscribers = self.subscribers.lock();
        let id = subscribers.next_id;
        subscribers.next_id += 1;
        subscribers.entries.push((id, Arc::new(callback)));

        Subscription {
            id,
            subscribers: Arc::downgrade(&self.subscribers),
        }
    }

    /// Hands `current` to `callback`, then registers it. Only safe from the
    /// publishing task, so that no publish can fall between the two.
    pub fn subscribe_with<F>(&self, current: &FeedSnapshot, callback: F) -> Subscription
    where
        F: Fn(&FeedSnapshot) + Send + Sync + 'static,
    {
        callback(current);
        self.subscribe(callback)
    }

    /// Notifies every subscriber registered when the call starts.
    ///
    /// The lock is released before any callback runs, so a callback may
    /// subscribe or unsubscribe without deadlocking or disturbing this round.
    pub fn publish(&self, snapshot: &FeedSnapshot) {
        let current: Vec<Subscriber> = self
            .subscribers
            .lock()
            .entries
            .iter()
            .map(|(_, subscriber)| Arc::clone(subscriber))
            .collect();

        for subscriber in current {
            subscriber(snapshot);
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().entries.len()
    }
}

/// Handle returned by [`TranscriptFeed::subscribe`]. Dropping it unsubscribes.
pub struct Subscription {
    id: u64,
    subscribers: Weak<Mutex<Subscribers>>,
}

impl Subscription {
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(subscribers) = self.subscribers.upgrade() {
            subscribers.lock().entries.retain(|(id, _)| *id != self.id);
        }
    }
}
