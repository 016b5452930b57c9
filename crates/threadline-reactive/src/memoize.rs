//! Derived values that stay referentially stable.
//!
//! # Invariants
//!
//! 1. `compute` runs at most once per distinct source snapshot (`Arc`
//!    identity).
//! 2. When a recomputed value is shallow-equal to the cached one, the cached
//!    value is returned and the new one discarded.
//! 3. Downstream listeners are notified only when the value they last
//!    observed differs from the current one, so a re-entrant read during
//!    propagation never swallows a notification.
//! 4. A derived `None` is an ordinary snapshot.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::shallow::ShallowEq;
use crate::subject::SubjectCore;
use crate::subscribable::{Listener, Subscribable, Subscription};

type ComputeFn<T, D> = Box<dyn Fn(&Arc<T>) -> D + Send + Sync>;

/// Memoized projection of a source whose snapshots are `Arc`s.
///
/// Cloning creates a new handle to the same cache.
pub struct ShallowMemoizeSubject<S, T: ?Sized, D> {
    inner: Arc<MemoInner<S, T, D>>,
}

struct MemoInner<S, T: ?Sized, D> {
    source: S,
    compute: ComputeFn<T, D>,
    cache: Mutex<Option<Cached<T, D>>>,
    /// Last value handed to downstream listeners.
    published: Mutex<Option<D>>,
    computes: AtomicU64,
    subject: Arc<SubjectCore>,
}

struct Cached<T: ?Sized, D> {
    source: Arc<T>,
    value: D,
}

impl<S, T: ?Sized, D> Clone for ShallowMemoizeSubject<S, T, D> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S, T, D> ShallowMemoizeSubject<S, T, D>
where
    S: Subscribable<Snapshot = Arc<T>> + 'static,
    T: ?Sized + Send + Sync + 'static,
    D: ShallowEq + Clone + Send + 'static,
{
    pub fn new(source: S, compute: impl Fn(&Arc<T>) -> D + Send + Sync + 'static) -> Self {
        Self {
            inner: Arc::new(MemoInner {
                source,
                compute: Box::new(compute),
                cache: Mutex::new(None),
                published: Mutex::new(None),
                computes: AtomicU64::new(0),
                subject: SubjectCore::new(),
            }),
        }
    }

    /// How many times `compute` has run.
    pub fn compute_count(&self) -> u64 {
        self.inner.computes.load(Ordering::Relaxed)
    }

    /// Whether the subject currently holds a subscription on its source.
    pub fn is_connected(&self) -> bool {
        self.inner.subject.is_connected()
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.subject.subscriber_count()
    }
}

impl<S, T, D> MemoInner<S, T, D>
where
    S: Subscribable<Snapshot = Arc<T>>,
    T: ?Sized,
    D: ShallowEq + Clone,
{
    fn get_state(&self) -> D {
        let source = self.source.get_state();
        if let Some(cached) = self.cache.lock().as_ref() {
            if Arc::ptr_eq(&cached.source, &source) {
                return cached.value.clone();
            }
        }

        // Compute without holding the cache lock; `compute` may read other
        // subjects, including ones derived from the same source.
        let next = (self.compute)(&source);
        self.computes.fetch_add(1, Ordering::Relaxed);

        let mut cache = self.cache.lock();
        let value = match cache.as_ref() {
            Some(cached) if cached.value.shallow_eq(&next) => cached.value.clone(),
            _ => next,
        };
        *cache = Some(Cached {
            source,
            value: value.clone(),
        });
        value
    }

    fn on_source_change(&self) {
        let current = self.get_state();
        let unchanged = {
            let mut published = self.published.lock();
            let unchanged = published
                .as_ref()
                .is_some_and(|last| last.shallow_eq(&current));
            if !unchanged {
                *published = Some(current);
            }
            unchanged
        };
        if !unchanged {
            self.subject.notify();
        }
    }
}

impl<S, T, D> Subscribable for ShallowMemoizeSubject<S, T, D>
where
    S: Subscribable<Snapshot = Arc<T>> + 'static,
    T: ?Sized + Send + Sync + 'static,
    D: ShallowEq + Clone + Send + 'static,
{
    type Snapshot = D;

    fn get_state(&self) -> D {
        self.inner.get_state()
    }

    fn subscribe(&self, listener: Listener) -> Subscription {
        let inner = &self.inner;
        inner.subject.subscribe(listener, || {
            *inner.published.lock() = Some(inner.get_state());
            let weak = Arc::downgrade(inner);
            inner.source.subscribe(Arc::new(move || {
                if let Some(inner) = weak.upgrade() {
                    inner.on_source_change();
                }
            }))
        })
    }
}

impl<S, T: ?Sized, D> fmt::Debug for ShallowMemoizeSubject<S, T, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShallowMemoizeSubject")
            .field("computes", &self.inner.computes.load(Ordering::Relaxed))
            .field("subscribers", &self.inner.subject.subscriber_count())
            .finish()
    }
}
