use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::subscribable::{Listener, ListenerSet, Subscription};

/// Downstream listeners plus a lazily held upstream connection.
///
/// The upstream connection is opened when the first listener arrives and
/// dropped when the last one leaves, so an unobserved subject keeps nothing
/// registered on its source.
#[derive(Default)]
pub(crate) struct SubjectCore {
    listeners: ListenerSet,
    connection: Mutex<Option<Subscription>>,
}

impl SubjectCore {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn subscribe(
        self: &Arc<Self>,
        listener: Listener,
        connect: impl FnOnce() -> Subscription,
    ) -> Subscription {
        let (id, first) = self.listeners.add(listener);
        if first {
            let connection = connect();
            let stale = self.connection.lock().replace(connection);
            drop(stale);
        }
        let weak: Weak<SubjectCore> = Arc::downgrade(self);
        Subscription::new(move || {
            if let Some(core) = weak.upgrade() {
                core.release(id);
            }
        })
    }

    fn release(&self, id: u64) {
        if self.listeners.remove(id) {
            let connection = self.connection.lock().take();
            drop(connection);
        }
    }

    pub(crate) fn notify(&self) {
        self.listeners.notify();
    }

    pub(crate) fn is_connected(&self) -> bool {
        self.connection.lock().is_some()
    }

    pub(crate) fn subscriber_count(&self) -> usize {
        self.listeners.len()
    }
}

/// A listener that forwards to `core.notify()` while the core is alive.
pub(crate) fn forward_to(core: &Arc<SubjectCore>) -> Listener {
    let weak = Arc::downgrade(core);
    Arc::new(move || {
        if let Some(core) = weak.upgrade() {
            core.notify();
        }
    })
}
