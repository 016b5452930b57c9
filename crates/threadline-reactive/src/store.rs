use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::subscribable::{Listener, ListenerSet, Subscribable, Subscription};

/// A plain observable value.
///
/// Cloning a `Store` creates a new handle to the **same** value. Every
/// `set`/`update` notifies, whether or not the value changed: snapshots are
/// compared by identity downstream, not here.
pub struct Store<T> {
    inner: Arc<StoreInner<T>>,
}

struct StoreInner<T> {
    value: Mutex<T>,
    listeners: Arc<ListenerSet>,
}

impl<T> Clone for Store<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Clone + Send + 'static> Store<T> {
    pub fn new(value: T) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                value: Mutex::new(value),
                listeners: Arc::new(ListenerSet::default()),
            }),
        }
    }

    /// Replace the value, then notify.
    pub fn set(&self, value: T) {
        *self.inner.value.lock() = value;
        self.inner.listeners.notify();
    }

    /// Replace the value only if `accept` approves the current one, then
    /// notify. The check and the write happen under one lock, so concurrent
    /// writers cannot interleave between them. Returns whether it replaced.
    pub fn set_if(&self, value: T, accept: impl FnOnce(&T) -> bool) -> bool {
        {
            let mut current = self.inner.value.lock();
            if !accept(&current) {
                return false;
            }
            *current = value;
        }
        self.inner.listeners.notify();
        true
    }

    /// Mutate the value in place, then notify.
    pub fn update(&self, f: impl FnOnce(&mut T)) {
        f(&mut self.inner.value.lock());
        self.inner.listeners.notify();
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.listeners.len()
    }
}

impl<T: Clone + Send + 'static> Subscribable for Store<T> {
    type Snapshot = T;

    fn get_state(&self) -> T {
        self.inner.value.lock().clone()
    }

    fn subscribe(&self, listener: Listener) -> Subscription {
        self.inner.listeners.subscribe(listener)
    }
}

impl<T: fmt::Debug> fmt::Debug for Store<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("value", &*self.inner.value.lock())
            .field("subscribers", &self.inner.listeners.len())
            .finish()
    }
}
