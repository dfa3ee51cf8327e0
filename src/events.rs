//! In-process event bus for session notifications.
//!
//! The fetch layer discovers token invalidity and the session store must
//! resynchronize its in-memory state when that happens; the bus decouples
//! the two without a direct dependency cycle. Handlers run synchronously in
//! registration order, and a panicking handler never prevents the rest from
//! running.
//!
//! State is process-lifetime only; subscribers must re-register after a
//! restart.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::warn;

/// Topics that can be published on the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    /// A new token pair has been persisted. No payload; subscribers re-read
    /// the persisted session keys.
    TokenRefreshed,
}

/// Identifies a registered handler so it can be removed later.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandlerId(u64);

type Handler = Arc<dyn Fn() + Send + Sync>;

#[derive(Default)]
struct Registry {
    next_id: u64,
    handlers: HashMap<Topic, Vec<(HandlerId, Handler)>>,
}

/// Minimal publish/subscribe mechanism. Cheap to share behind an `Arc`.
#[derive(Default)]
pub struct EventBus {
    registry: Mutex<Registry>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for a topic. Handlers for the same topic are
    /// invoked in registration order.
    pub fn subscribe<F>(&self, topic: Topic, handler: F) -> HandlerId
    where
        F: Fn() + Send + Sync + 'static,
    {
        let mut registry = self.lock();
        let id = HandlerId(registry.next_id);
        registry.next_id += 1;
        registry
            .handlers
            .entry(topic)
            .or_default()
            .push((id, Arc::new(handler)));
        id
    }

    /// Remove a previously registered handler. No-op if the id is unknown.
    pub fn unsubscribe(&self, topic: Topic, id: HandlerId) {
        let mut registry = self.lock();
        if let Some(list) = registry.handlers.get_mut(&topic) {
            list.retain(|(handler_id, _)| *handler_id != id);
        }
    }

    /// Synchronously invoke all handlers currently registered for the topic.
    /// Each call is isolated: a panic in one handler is logged and the
    /// remaining handlers still run.
    pub fn publish(&self, topic: Topic) {
        // Snapshot outside the lock so handlers may subscribe/unsubscribe.
        let handlers: Vec<Handler> = {
            let registry = self.lock();
            registry
                .handlers
                .get(&topic)
                .map(|list| list.iter().map(|(_, h)| Arc::clone(h)).collect())
                .unwrap_or_default()
        };

        for handler in handlers {
            if catch_unwind(AssertUnwindSafe(|| handler())).is_err() {
                warn!(?topic, "event handler panicked");
            }
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Registry> {
        // Handlers run outside the lock, so a poisoned mutex only means a
        // panic between lock and unlock in this module; the registry is
        // still coherent.
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
