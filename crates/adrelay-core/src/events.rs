//! Publish/subscribe primitive shared by backends, adapters and the
//! pixel reporting engine
//!
//! Two subscription flavors:
//! - `on` / `on_any`: persistent, fire on every matching emission
//! - `once`: removed from the registry before their single invocation
//!
//! Emission is synchronous: handlers run in registration order within the
//! emitting turn. `wait_for` bridges a once-subscription into an awaitable
//! [`oneshot`] signal, which is how adapters suspend until a backend
//! confirmation arrives.

use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;

use crate::types::{LifecycleEvent, LifecycleEventKind};

/// An event type routable by the bus
pub trait BusEvent: Clone + Send + 'static {
    /// Payload-free tag used for subscription filtering
    type Kind: Copy + PartialEq + Send;

    /// The tag of this event
    fn kind(&self) -> Self::Kind;
}

impl BusEvent for LifecycleEvent {
    type Kind = LifecycleEventKind;

    fn kind(&self) -> LifecycleEventKind {
        LifecycleEvent::kind(self)
    }
}

type Handler<E> = Box<dyn FnMut(&E) + Send>;

struct Subscription<E: BusEvent> {
    filter: Option<E::Kind>,
    once: bool,
    handler: Arc<Mutex<Handler<E>>>,
}

impl<E: BusEvent> Subscription<E> {
    fn matches(&self, kind: E::Kind) -> bool {
        self.filter.map(|f| f == kind).unwrap_or(true)
    }
}

/// Minimal publish/subscribe bus
///
/// Each subscriber's closure lives behind its own lock so that a handler may
/// emit further events on the same bus without deadlocking the registry.
pub struct EventBus<E: BusEvent> {
    subscriptions: Mutex<Vec<Subscription<E>>>,
}

/// Bus carrying the shared lifecycle vocabulary
pub type LifecycleBus = EventBus<LifecycleEvent>;

impl<E: BusEvent> EventBus<E> {
    pub fn new() -> Self {
        Self {
            subscriptions: Mutex::new(Vec::new()),
        }
    }

    /// Subscribe persistently to one event kind
    pub fn on(&self, kind: E::Kind, handler: impl FnMut(&E) + Send + 'static) {
        self.push(Some(kind), false, Box::new(handler));
    }

    /// Subscribe persistently to every event
    pub fn on_any(&self, handler: impl FnMut(&E) + Send + 'static) {
        self.push(None, false, Box::new(handler));
    }

    /// Subscribe to one event kind for a single invocation
    pub fn once(&self, kind: E::Kind, handler: impl FnMut(&E) + Send + 'static) {
        self.push(Some(kind), true, Box::new(handler));
    }

    /// Await-until-signal: resolves with the next emission of `kind`
    pub fn wait_for(&self, kind: E::Kind) -> oneshot::Receiver<E> {
        let (tx, rx) = oneshot::channel();
        let mut tx = Some(tx);
        self.once(kind, move |event| {
            if let Some(tx) = tx.take() {
                let _ = tx.send(event.clone());
            }
        });
        rx
    }

    /// Emit an event to all matching subscribers, in registration order
    ///
    /// Once-subscriptions are unregistered before their handler runs, so a
    /// re-entrant emission of the same kind cannot fire them twice.
    pub fn emit(&self, event: E) {
        let kind = event.kind();
        let matched: Vec<Arc<Mutex<Handler<E>>>> = {
            let mut subs = self.subscriptions.lock().expect("event bus poisoned");
            let matched = subs
                .iter()
                .filter(|s| s.matches(kind))
                .map(|s| Arc::clone(&s.handler))
                .collect();
            subs.retain(|s| !(s.once && s.matches(kind)));
            matched
        };

        for handler in matched {
            let mut handler = handler.lock().expect("event handler poisoned");
            (handler)(&event);
        }
    }

    /// Number of live subscriptions
    pub fn subscriber_count(&self) -> usize {
        self.subscriptions.lock().expect("event bus poisoned").len()
    }

    fn push(&self, filter: Option<E::Kind>, once: bool, handler: Handler<E>) {
        self.subscriptions
            .lock()
            .expect("event bus poisoned")
            .push(Subscription {
                filter,
                once,
                handler: Arc::new(Mutex::new(handler)),
            });
    }
}

impl<E: BusEvent> Default for EventBus<E> {
    fn default() -> Self {
        Self::new()
    }
}
