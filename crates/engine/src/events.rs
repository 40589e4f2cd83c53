//! Publish/subscribe channel between the sandbox core and whatever draws it.
//!
//! Handlers run synchronously on the publishing thread, in registration order,
//! so a listener always sees `SandboxStateChanged` before the
//! `EntitySelectionChanged` of the same update. A [`Subscription`] removes its
//! handler when dropped.

use botscope_protocol::{Entity, PlaybackStatus, Snapshot};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

#[derive(Debug, Clone, PartialEq)]
pub enum Signal {
    Playback(PlaybackStatus),
    /// Fired after the selection has been resolved against a new snapshot, or changed by hand.
    EntitySelectionChanged(Entity),
    /// Fired when a new snapshot is installed, before the selection signal.
    SandboxStateChanged(Arc<Snapshot>),
    DocumentChanged,
    DocumentSaved,
    ProgressStarted { message: String },
    ProgressUpdate { message: String },
    ProgressEnded,
}

impl Signal {
    pub fn name(&self) -> &'static str {
        match self {
            Signal::Playback(_) => "playback",
            Signal::EntitySelectionChanged(_) => "entitySelectionChanged",
            Signal::SandboxStateChanged(_) => "sandboxStateChanged",
            Signal::DocumentChanged => "documentChanged",
            Signal::DocumentSaved => "documentSaved",
            Signal::ProgressStarted { .. } => "progressStarted",
            Signal::ProgressUpdate { .. } => "progressUpdate",
            Signal::ProgressEnded => "progressEnded",
        }
    }
}

type Handler = Arc<dyn Fn(&Signal) + Send + Sync>;

#[derive(Default)]
struct Subscribers {
    next_id: u64,
    handlers: Vec<(u64, Handler)>,
}

#[derive(Clone, Default)]
pub struct EventBus {
    subscribers: Arc<Mutex<Subscribers>>,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&Signal) + Send + Sync + 'static,
    {
        let mut subs = lock(&self.subscribers);
        let id = subs.next_id;
        subs.next_id += 1;
        subs.handlers.push((id, Arc::new(handler)));
        Subscription {
            subscribers: Arc::downgrade(&self.subscribers),
            id,
        }
    }

    pub fn publish(&self, signal: Signal) {
        // Handlers may subscribe or publish themselves; never call them under the lock.
        let handlers: Vec<Handler> = lock(&self.subscribers)
            .handlers
            .iter()
            .map(|(_, h)| Arc::clone(h))
            .collect();
        for handler in handlers {
            handler(&signal);
        }
    }

    pub fn subscriber_count(&self) -> usize {
        lock(&self.subscribers).handlers.len()
    }
}

/// Keeps a handler registered for as long as it is alive.
#[must_use = "dropping a Subscription unsubscribes its handler"]
pub struct Subscription {
    subscribers: Weak<Mutex<Subscribers>>,
    id: u64,
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(subscribers) = self.subscribers.upgrade() {
            lock(&subscribers).handlers.retain(|(id, _)| *id != self.id);
        }
    }
}

fn lock(m: &Mutex<Subscribers>) -> MutexGuard<'_, Subscribers> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Logs bus traffic. State and selection chatter is muted while playback runs.
pub fn trace_signals(bus: &EventBus) -> Subscription {
    let running = AtomicBool::new(false);
    bus.subscribe(move |signal| match signal {
        Signal::Playback(status) => {
            running.store(status.running, Ordering::Relaxed);
            tracing::info!(running = status.running, "playback");
        }
        Signal::EntitySelectionChanged(entity) => {
            if !running.load(Ordering::Relaxed) {
                tracing::debug!(id = %entity.id, name = entity.display_name(), "entitySelectionChanged");
            }
        }
        Signal::SandboxStateChanged(snapshot) => {
            if !running.load(Ordering::Relaxed) {
                tracing::debug!(entities = snapshot.entities.len(), "sandboxStateChanged");
            }
        }
        other => tracing::debug!(signal = other.name()),
    })
}
