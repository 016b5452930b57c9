use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

/// Change callback. Takes no arguments: consumers re-read via `get_state()`.
pub type Listener = Arc<dyn Fn() + Send + Sync>;

/// Wrap a closure as a [`Listener`].
pub fn listener(f: impl Fn() + Send + Sync + 'static) -> Listener {
    Arc::new(f)
}

/// An observable value.
///
/// `get_state` is synchronous and side-effect free. Every call to `subscribe`
/// creates an independent registration, even for the same listener; each
/// returned [`Subscription`] releases exactly one of them.
pub trait Subscribable: Send + Sync {
    type Snapshot: Clone;

    fn get_state(&self) -> Self::Snapshot;

    fn subscribe(&self, listener: Listener) -> Subscription;
}

impl<S: Subscribable + ?Sized> Subscribable for Arc<S> {
    type Snapshot = S::Snapshot;

    fn get_state(&self) -> Self::Snapshot {
        (**self).get_state()
    }

    fn subscribe(&self, listener: Listener) -> Subscription {
        (**self).subscribe(listener)
    }
}

/// RAII guard for one listener registration. Dropping it unsubscribes.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new(release: impl FnOnce() + Send + 'static) -> Self {
        Self {
            release: Some(Box::new(release)),
        }
    }

    /// A subscription with nothing to release.
    pub fn empty() -> Self {
        Self { release: None }
    }

    /// Merge several registrations into one guard.
    pub fn all(subscriptions: Vec<Subscription>) -> Self {
        Self::new(move || drop(subscriptions))
    }

    pub fn unsubscribe(mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }

    /// Keep the registration alive for as long as its source lives.
    pub fn detach(mut self) {
        self.release = None;
    }

    pub fn is_active(&self) -> bool {
        self.release.is_some()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}

/// Registered listeners of one source, keyed by registration id.
#[derive(Default)]
pub(crate) struct ListenerSet {
    slots: Mutex<ListenerSlots>,
}

#[derive(Default)]
struct ListenerSlots {
    next_id: u64,
    entries: Vec<(u64, Listener)>,
}

impl ListenerSet {
    /// Returns the registration id and whether it is the first live one.
    pub(crate) fn add(&self, listener: Listener) -> (u64, bool) {
        let mut slots = self.slots.lock();
        let id = slots.next_id;
        slots.next_id += 1;
        slots.entries.push((id, listener));
        (id, slots.entries.len() == 1)
    }

    /// Returns true when this removal emptied the set.
    pub(crate) fn remove(&self, id: u64) -> bool {
        let mut slots = self.slots.lock();
        let before = slots.entries.len();
        slots.entries.retain(|(entry_id, _)| *entry_id != id);
        before != slots.entries.len() && slots.entries.is_empty()
    }

    pub(crate) fn len(&self) -> usize {
        self.slots.lock().entries.len()
    }

    /// Invoke every listener registered at the time of the call.
    pub(crate) fn notify(&self) {
        let listeners: Vec<Listener> = self
            .slots
            .lock()
            .entries
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in listeners {
            listener();
        }
    }

    pub(crate) fn subscribe(self: &Arc<Self>, listener: Listener) -> Subscription {
        let (id, _) = self.add(listener);
        let weak: Weak<ListenerSet> = Arc::downgrade(self);
        Subscription::new(move || {
            if let Some(set) = weak.upgrade() {
                set.remove(id);
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counter() -> (Arc<AtomicUsize>, Listener) {
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        (count, listener(move || {
            c.fetch_add(1, Ordering::SeqCst);
        }))
    }

    #[test]
    fn same_listener_registers_independently() {
        let set = Arc::new(ListenerSet::default());
        let (count, l) = counter();
        let first = set.subscribe(Arc::clone(&l));
        let second = set.subscribe(l);

        set.notify();
        assert_eq!(count.load(Ordering::SeqCst), 2);

        first.unsubscribe();
        set.notify();
        assert_eq!(count.load(Ordering::SeqCst), 3);

        drop(second);
        set.notify();
        assert_eq!(count.load(Ordering::SeqCst), 3);
        assert_eq!(set.len(), 0);
    }

    #[test]
    fn listener_may_unsubscribe_during_notify() {
        let set = Arc::new(ListenerSet::default());
        let slot: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));
        let slot_clone = Arc::clone(&slot);
        let sub = set.subscribe(listener(move || {
            slot_clone.lock().take();
        }));
        *slot.lock() = Some(sub);

        set.notify();
        assert_eq!(set.len(), 0);
    }

    #[test]
    fn detach_keeps_registration() {
        let set = Arc::new(ListenerSet::default());
        let (count, l) = counter();
        set.subscribe(l).detach();
        set.notify();
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn release_after_source_dropped_is_inert() {
        let set = Arc::new(ListenerSet::default());
        let (_, l) = counter();
        let sub = set.subscribe(l);
        drop(set);
        sub.unsubscribe();
    }

    #[test]
    fn all_releases_every_member() {
        let set = Arc::new(ListenerSet::default());
        let (_, l) = counter();
        let merged = Subscription::all(vec![set.subscribe(Arc::clone(&l)), set.subscribe(l)]);
        assert_eq!(set.len(), 2);
        drop(merged);
        assert_eq!(set.len(), 0);
    }
}
