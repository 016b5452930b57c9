use std::sync::Arc;

use parking_lot::Mutex;

use crate::subject::SubjectCore;
use crate::subscribable::{Listener, Subscribable, Subscription};

type SelectFn<A, B, D> = Box<dyn Fn(&A, &B) -> D + Send + Sync>;

/// One value selected from two sources.
///
/// The selector runs on every read. Listeners fire when either source
/// notifies *and* the selected value differs from the one they last saw.
pub struct CombinedSubject<SA: Subscribable, SB: Subscribable, D> {
    inner: Arc<CombinedInner<SA, SB, D>>,
}

struct CombinedInner<SA: Subscribable, SB: Subscribable, D> {
    a: SA,
    b: SB,
    select: SelectFn<SA::Snapshot, SB::Snapshot, D>,
    published: Mutex<Option<D>>,
    subject: Arc<SubjectCore>,
}

impl<SA: Subscribable, SB: Subscribable, D> Clone for CombinedSubject<SA, SB, D> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<SA, SB, D> CombinedSubject<SA, SB, D>
where
    SA: Subscribable + 'static,
    SB: Subscribable + 'static,
    D: PartialEq + Clone + Send + 'static,
{
    pub fn new(
        a: SA,
        b: SB,
        select: impl Fn(&SA::Snapshot, &SB::Snapshot) -> D + Send + Sync + 'static,
    ) -> Self {
        Self {
            inner: Arc::new(CombinedInner {
                a,
                b,
                select: Box::new(select),
                published: Mutex::new(None),
                subject: SubjectCore::new(),
            }),
        }
    }
}

impl<SA, SB, D> CombinedInner<SA, SB, D>
where
    SA: Subscribable,
    SB: Subscribable,
    D: PartialEq + Clone,
{
    fn get_state(&self) -> D {
        (self.select)(&self.a.get_state(), &self.b.get_state())
    }

    fn on_source_change(&self) {
        let current = self.get_state();
        let changed = {
            let mut published = self.published.lock();
            let changed = published.as_ref() != Some(&current);
            if changed {
                *published = Some(current);
            }
            changed
        };
        if changed {
            self.subject.notify();
        }
    }
}

impl<SA, SB, D> Subscribable for CombinedSubject<SA, SB, D>
where
    SA: Subscribable + 'static,
    SB: Subscribable + 'static,
    D: PartialEq + Clone + Send + 'static,
{
    type Snapshot = D;

    fn get_state(&self) -> D {
        self.inner.get_state()
    }

    fn subscribe(&self, listener: Listener) -> Subscription {
        let inner = &self.inner;
        inner.subject.subscribe(listener, || {
            *inner.published.lock() = Some(inner.get_state());
            let on_change = |weak: std::sync::Weak<CombinedInner<SA, SB, D>>| -> Listener {
                Arc::new(move || {
                    if let Some(inner) = weak.upgrade() {
                        inner.on_source_change();
                    }
                })
            };
            Subscription::all(vec![
                inner.a.subscribe(on_change(Arc::downgrade(inner))),
                inner.b.subscribe(on_change(Arc::downgrade(inner))),
            ])
        })
    }
}
