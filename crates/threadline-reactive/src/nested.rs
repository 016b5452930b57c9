//! A store whose value is itself a store.
//!
//! The outer source decides *which* inner store is current; the inner store
//! carries the state. A single subscription here fires when the outer source
//! swaps to a different inner store (by `Arc` identity) and whenever the
//! current inner store changes. On a swap the old inner registration is
//! dropped before the new one is made, so a discarded store can never reach
//! downstream listeners.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::subject::{forward_to, SubjectCore};
use crate::subscribable::{Listener, Subscribable, Subscription};

pub struct NestedSubscriptionSubject<S, I: ?Sized> {
    inner: Arc<NestedInner<S, I>>,
}

struct NestedInner<S, I: ?Sized> {
    outer: S,
    subject: Arc<SubjectCore>,
    _inner: PhantomData<fn() -> Arc<I>>,
}

/// The inner store currently followed and our registration on it.
struct InnerLink<I: ?Sized> {
    current: Arc<I>,
    subscription: Option<Subscription>,
}

impl<S, I: ?Sized> Clone for NestedSubscriptionSubject<S, I> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S, I> NestedSubscriptionSubject<S, I>
where
    S: Subscribable<Snapshot = Arc<I>> + 'static,
    I: Subscribable + ?Sized + 'static,
{
    pub fn new(outer: S) -> Self {
        Self {
            inner: Arc::new(NestedInner {
                outer,
                subject: SubjectCore::new(),
                _inner: PhantomData,
            }),
        }
    }

    /// Subscribe to outer swaps only, bypassing the inner store.
    pub fn outer_subscribe(&self, listener: Listener) -> Subscription {
        self.inner.outer.subscribe(listener)
    }

    pub fn is_connected(&self) -> bool {
        self.inner.subject.is_connected()
    }

    fn connect(&self) -> Subscription {
        let notify = forward_to(&self.inner.subject);
        let current = self.inner.outer.get_state();
        let link = Arc::new(Mutex::new(InnerLink {
            subscription: Some(current.subscribe(Arc::clone(&notify))),
            current,
        }));

        let weak_inner = Arc::downgrade(&self.inner);
        let weak_link = Arc::downgrade(&link);
        let outer_subscription = self.inner.outer.subscribe(Arc::new(move || {
            let (Some(inner), Some(link)) = (weak_inner.upgrade(), weak_link.upgrade()) else {
                return;
            };
            let next = inner.outer.get_state();
            let previous = {
                let mut link = link.lock();
                if Arc::ptr_eq(&link.current, &next) {
                    return;
                }
                link.current = Arc::clone(&next);
                link.subscription.take()
            };
            drop(previous);

            let subscription = next.subscribe(Arc::clone(&notify));
            {
                let mut link = link.lock();
                // A newer swap may have landed while we subscribed.
                if Arc::ptr_eq(&link.current, &next) {
                    link.subscription = Some(subscription);
                }
            }
            tracing::trace!("nested subject followed a new inner store");
            notify();
        }));

        Subscription::new(move || {
            drop(outer_subscription);
            let subscription = link.lock().subscription.take();
            drop(subscription);
        })
    }
}

impl<S, I> Subscribable for NestedSubscriptionSubject<S, I>
where
    S: Subscribable<Snapshot = Arc<I>> + 'static,
    I: Subscribable + ?Sized + 'static,
{
    type Snapshot = Arc<I>;

    fn get_state(&self) -> Arc<I> {
        self.inner.outer.get_state()
    }

    fn subscribe(&self, listener: Listener) -> Subscription {
        self.inner.subject.subscribe(listener, || self.connect())
    }
}

impl<S, I: ?Sized> fmt::Debug for NestedSubscriptionSubject<S, I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NestedSubscriptionSubject")
            .field("subscribers", &self.inner.subject.subscriber_count())
            .field("connected", &self.inner.subject.is_connected())
            .finish()
    }
}
