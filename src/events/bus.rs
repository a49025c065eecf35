//! # Event bus shared by the orchestrator, monitor and shutdown coordinator.
//!
//! [`Bus`] delivers every published [`Event`] two ways:
//!
//! ```text
//! publish(ev)
//!   ├─► observer 1 ─► observer 2 ─► ... ─► observer N     (synchronous, registration order)
//!   └─► broadcast::Sender ─► receivers from subscribe()    (async, ring buffer)
//! ```
//!
//! ## Rules
//! - **Ordered observers**: [`Observe`] implementations run inside `publish`, in
//!   the order they were added, before `publish` returns. Tests rely on this.
//! - **Panic isolation**: an observer panic is caught and logged; later observers still run.
//! - **Non-blocking broadcast**: slow receivers get `RecvError::Lagged(n)` and skip `n` items.
//! - **No persistence**: broadcast events are lost if there are no receivers at send time.
//! - **Re-entrancy**: observers may publish; the observer list is snapshotted before delivery.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, PoisonError, RwLock};

use tokio::sync::broadcast;

use super::event::Event;

/// Synchronous event observer.
///
/// Called inside [`Bus::publish`] on the publishing task. Implementations must
/// be quick and must not block; hand work off to a task or channel if needed.
pub trait Observe: Send + Sync + 'static {
    /// Handles one event.
    fn on_event(&self, event: &Event);

    /// Human-readable name (for logs).
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// Publish/subscribe channel for runtime events.
///
/// Cheap to clone; every clone shares the same observers and broadcast channel.
#[derive(Clone)]
pub struct Bus {
    tx: broadcast::Sender<Event>,
    observers: Arc<RwLock<Vec<Arc<dyn Observe>>>>,
}

impl std::fmt::Debug for Bus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bus")
            .field("receivers", &self.tx.receiver_count())
            .field("observers", &self.snapshot().len())
            .finish()
    }
}

impl Bus {
    /// Creates a new bus with the given broadcast capacity (clamped to 1).
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel::<Event>(capacity.max(1));
        Self {
            tx,
            observers: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Appends a synchronous observer; it sees every event published afterwards.
    pub fn observe(&self, observer: Arc<dyn Observe>) {
        self.observers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(observer);
    }

    /// Publishes an event to all observers (in order) and broadcast receivers.
    pub fn publish(&self, ev: Event) {
        for observer in self.snapshot() {
            if let Err(panic) = catch_unwind(AssertUnwindSafe(|| observer.on_event(&ev))) {
                tracing::error!(
                    observer = observer.name(),
                    kind = ev.kind.as_str(),
                    panic = ?panic,
                    "event observer panicked"
                );
            }
        }
        let _ = self.tx.send(ev);
    }

    /// Creates a new receiver that will observe subsequent events.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }

    fn snapshot(&self) -> Vec<Arc<dyn Observe>> {
        self.observers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::events::EventKind;

    struct Tagged {
        tag: &'static str,
        log: Arc<Mutex<Vec<(&'static str, u64)>>>,
    }

    impl Observe for Tagged {
        fn on_event(&self, event: &Event) {
            self.log.lock().unwrap().push((self.tag, event.seq));
        }
    }

    struct Exploding;

    impl Observe for Exploding {
        fn on_event(&self, _event: &Event) {
            panic!("boom");
        }
    }

    #[test]
    fn observers_run_in_registration_order() {
        let bus = Bus::new(8);
        let log = Arc::new(Mutex::new(Vec::new()));
        bus.observe(Arc::new(Tagged { tag: "first", log: log.clone() }));
        bus.observe(Arc::new(Exploding));
        bus.observe(Arc::new(Tagged { tag: "second", log: log.clone() }));

        let ev = Event::new(EventKind::Alert);
        let seq = ev.seq;
        bus.publish(ev);

        assert_eq!(*log.lock().unwrap(), vec![("first", seq), ("second", seq)]);
    }

    #[tokio::test]
    async fn broadcast_receivers_get_events_after_subscribe() {
        let bus = Bus::new(4);
        bus.publish(Event::new(EventKind::SessionStarted));
        let mut rx = bus.subscribe();
        bus.publish(Event::new(EventKind::SessionTerminated));
        let ev = rx.recv().await.unwrap();
        assert_eq!(ev.kind, EventKind::SessionTerminated);
    }
}
