//! Push events for a subscribed thread.
//!
//! Adapters deliver [`ThreadEvent`]s into a `flume` channel owned by the subscriber, so
//! the state-owning task receives them in the same queue as everything else instead of
//! being called back from the transport's threads.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use parley_sync::{Message, PresenceStatus};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RealtimeEvent {
    MessageReceived(Message),
    TypingObserved {
        user_id: String,
    },
    UserJoined {
        user_id: String,
    },
    UserLeft {
        user_id: String,
    },
    PresenceChanged {
        user_id: String,
        status: PresenceStatus,
        last_seen_at: Option<DateTime<Utc>>,
    },
}

impl RealtimeEvent {
    pub fn tag(&self) -> &'static str {
        match self {
            Self::MessageReceived(_) => "MessageReceived",
            Self::TypingObserved { .. } => "TypingObserved",
            Self::UserJoined { .. } => "UserJoined",
            Self::UserLeft { .. } => "UserLeft",
            Self::PresenceChanged { .. } => "PresenceChanged",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadEvent {
    pub thread_id: String,
    pub event: RealtimeEvent,
}

/// Live for as long as it is held; dropping it unsubscribes.
pub struct Subscription {
    thread_id: String,
    on_drop: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new(thread_id: impl Into<String>, on_drop: impl FnOnce() + Send + 'static) -> Self {
        Self {
            thread_id: thread_id.into(),
            on_drop: Some(Box::new(on_drop)),
        }
    }

    pub fn thread_id(&self) -> &str {
        &self.thread_id
    }

    pub fn unsubscribe(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(f) = self.on_drop.take() {
            f();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("thread_id", &self.thread_id)
            .finish()
    }
}

pub trait RealtimeAdapter: Send + Sync + 'static {
    fn subscribe(&self, thread_id: &str, sink: flume::Sender<ThreadEvent>) -> Subscription;
}

#[derive(Default)]
struct HubState {
    subscribers: HashMap<u64, (String, flume::Sender<ThreadEvent>)>,
}

/// Process-local realtime hub. Whoever holds a clone can publish into any thread.
#[derive(Clone, Default)]
pub struct InMemoryRealtime {
    state: Arc<Mutex<HubState>>,
    next_id: Arc<AtomicU64>,
}

impl InMemoryRealtime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver `event` to every live subscriber of `thread_id`. Returns how many
    /// received it.
    pub fn publish(&self, thread_id: &str, event: RealtimeEvent) -> usize {
        let mut state = self.state.lock();
        let mut delivered = 0usize;
        state.subscribers.retain(|_, (subscribed, tx)| {
            if subscribed != thread_id {
                return true;
            }
            match tx.send(ThreadEvent {
                thread_id: thread_id.to_string(),
                event: event.clone(),
            }) {
                Ok(()) => {
                    delivered += 1;
                    true
                }
                Err(_) => false,
            }
        });
        delivered
    }

    pub fn subscriber_count(&self, thread_id: &str) -> usize {
        self.state
            .lock()
            .subscribers
            .values()
            .filter(|(t, _)| t == thread_id)
            .count()
    }
}

impl RealtimeAdapter for InMemoryRealtime {
    fn subscribe(&self, thread_id: &str, sink: flume::Sender<ThreadEvent>) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.state
            .lock()
            .subscribers
            .insert(id, (thread_id.to_string(), sink));
        let state = self.state.clone();
        Subscription::new(thread_id, move || {
            state.lock().subscribers.remove(&id);
        })
    }
}
