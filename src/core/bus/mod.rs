//! In-process typed publish/subscribe registry.
//!
//! The bus decouples the transport-side producers (chunk reassembler, speaker
//! liveness detector) from UI and state-store consumers. Delivery is
//! synchronous and in registration order, on the emitting thread.
//!
//! # Isolation contract
//!
//! A panicking handler is caught, logged, and skipped; delivery continues to
//! the remaining handlers. Producers and consumers share one bus, so a broken
//! renderer must never break message delivery to other subscribers.
//!
//! Handlers are invoked without the registry lock held, so a handler may
//! subscribe, unsubscribe, or emit from inside its own callback.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tracing::warn;

use crate::core::types::{ChatMessage, LivenessUpdate};

/// An event delivered over the session bus.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// A fully reassembled chat message.
    Chat(ChatMessage),
    /// A speaking-state transition.
    Liveness(LivenessUpdate),
}

impl SessionEvent {
    /// The registry key this event is delivered under.
    pub fn kind(&self) -> EventKind {
        match self {
            SessionEvent::Chat(_) => EventKind::Chat,
            SessionEvent::Liveness(_) => EventKind::Liveness,
        }
    }
}

/// Discriminant used to key handler registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Chat message events.
    Chat,
    /// Liveness transition events.
    Liveness,
}

/// Handler callback invoked for every emitted event of the subscribed kind.
pub type EventHandler = Arc<dyn Fn(&SessionEvent) + Send + Sync>;

/// Opaque token identifying one subscription; used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

#[derive(Default)]
struct Registry {
    handlers: HashMap<EventKind, Vec<(SubscriptionId, EventHandler)>>,
    next_id: u64,
}

/// Synchronous typed event bus for one client session.
#[derive(Default)]
pub struct EventBus {
    registry: Mutex<Registry>,
}

impl EventBus {
    /// Create an empty bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for events of `kind`.
    ///
    /// Handlers fire in registration order. The returned id removes exactly
    /// this registration, even if the same closure is registered twice.
    pub fn subscribe(&self, kind: EventKind, handler: EventHandler) -> SubscriptionId {
        let mut registry = self.registry.lock();
        registry.next_id += 1;
        let id = SubscriptionId(registry.next_id);
        registry.handlers.entry(kind).or_default().push((id, handler));
        id
    }

    /// Remove a previously registered handler.
    ///
    /// Returns `false` if the subscription was already removed.
    pub fn unsubscribe(&self, kind: EventKind, id: SubscriptionId) -> bool {
        let mut registry = self.registry.lock();
        match registry.handlers.get_mut(&kind) {
            Some(entries) => {
                let before = entries.len();
                entries.retain(|(entry_id, _)| *entry_id != id);
                entries.len() != before
            }
            None => false,
        }
    }

    /// Deliver `event` to every handler currently registered for its kind.
    pub fn emit(&self, event: SessionEvent) {
        // Snapshot the handler list so callbacks run without the registry
        // lock; subscriptions made mid-delivery take effect on the next emit.
        let handlers: Vec<(SubscriptionId, EventHandler)> = {
            let registry = self.registry.lock();
            registry
                .handlers
                .get(&event.kind())
                .map(|entries| entries.to_vec())
                .unwrap_or_default()
        };

        for (id, handler) in handlers {
            let result = panic::catch_unwind(AssertUnwindSafe(|| handler(&event)));
            if result.is_err() {
                warn!(
                    subscription = id.0,
                    kind = ?event.kind(),
                    "event handler panicked; continuing delivery"
                );
            }
        }
    }

    /// Number of live subscriptions for `kind`.
    pub fn subscriber_count(&self, kind: EventKind) -> usize {
        self.registry
            .lock()
            .handlers
            .get(&kind)
            .map(Vec::len)
            .unwrap_or(0)
    }
}
