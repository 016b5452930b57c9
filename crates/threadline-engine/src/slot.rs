use std::fmt;
use std::sync::Arc;

use threadline_core::ThreadRuntimeCore;
use threadline_reactive::{Listener, NestedSubscriptionSubject, Store, Subscribable, Subscription};
use tracing::debug;

type CoreStore = Store<Arc<dyn ThreadRuntimeCore>>;

/// Holder of the thread's current engine.
///
/// Subscribers hear about both engine swaps and state changes of whichever
/// engine is current; a replaced engine is never heard from again.
#[derive(Clone)]
pub struct ThreadCoreSlot {
    store: CoreStore,
    subject: NestedSubscriptionSubject<CoreStore, dyn ThreadRuntimeCore>,
}

impl ThreadCoreSlot {
    pub fn new(core: Arc<dyn ThreadRuntimeCore>) -> Self {
        let store = Store::new(core);
        Self {
            subject: NestedSubscriptionSubject::new(store.clone()),
            store,
        }
    }

    pub fn current(&self) -> Arc<dyn ThreadRuntimeCore> {
        self.store.get_state()
    }

    /// Replace the current engine. Swapping in the same engine is a no-op
    /// for subscribers.
    pub fn swap(&self, core: Arc<dyn ThreadRuntimeCore>) {
        debug!("swapping thread core");
        self.store.set(core);
    }
}

impl Subscribable for ThreadCoreSlot {
    type Snapshot = Arc<dyn ThreadRuntimeCore>;

    fn get_state(&self) -> Arc<dyn ThreadRuntimeCore> {
        self.subject.get_state()
    }

    fn subscribe(&self, listener: Listener) -> Subscription {
        self.subject.subscribe(listener)
    }
}

impl fmt::Debug for ThreadCoreSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadCoreSlot")
            .field("connected", &self.subject.is_connected())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{LocalThreadConfig, LocalThreadCore};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use threadline_core::{AppendMessage, ContentPart, MessageRole};

    fn say(core: &LocalThreadCore, text: &str) {
        core.append(AppendMessage {
            parent_id: core.get_state().last_message_id().cloned(),
            role: MessageRole::User,
            content: vec![ContentPart::text(text)],
            attachments: Vec::new(),
        })
        .unwrap();
    }

    #[test]
    fn follows_current_core_only() {
        let first = LocalThreadCore::new(LocalThreadConfig::default());
        let second = LocalThreadCore::new(LocalThreadConfig::default());
        let slot = ThreadCoreSlot::new(Arc::new(first.clone()));

        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        let _sub = slot.subscribe(Arc::new(move || {
            c.fetch_add(1, Ordering::SeqCst);
        }));

        say(&first, "a");
        assert_eq!(count.load(Ordering::SeqCst), 1);

        slot.swap(Arc::new(second.clone()));
        assert_eq!(count.load(Ordering::SeqCst), 2);

        say(&first, "ignored");
        assert_eq!(count.load(Ordering::SeqCst), 2);

        say(&second, "b");
        assert_eq!(count.load(Ordering::SeqCst), 3);
        assert_eq!(slot.current().get_state().thread_id, second.get_state().thread_id);
    }

    #[test]
    fn resubscribing_same_core_is_silent() {
        let core: Arc<dyn ThreadRuntimeCore> =
            Arc::new(LocalThreadCore::new(LocalThreadConfig::default()));
        let slot = ThreadCoreSlot::new(Arc::clone(&core));
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        let _sub = slot.subscribe(Arc::new(move || {
            c.fetch_add(1, Ordering::SeqCst);
        }));
        slot.swap(core);
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }
}
