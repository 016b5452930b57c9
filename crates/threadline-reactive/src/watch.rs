use std::pin::Pin;
use std::task::{Context, Poll};

use futures::Stream;
use pin_project_lite::pin_project;
use tokio::sync::watch as tokio_watch;
use tokio_stream::wrappers::WatchStream;

use crate::subscribable::{Subscribable, Subscription};

/// Async view of a [`Subscribable`], backed by a tokio `watch` channel.
///
/// Each source notification publishes a fresh `get_state()` read. Bursts of
/// notifications between polls coalesce into the latest snapshot.
pub struct StateWatcher<T> {
    rx: tokio_watch::Receiver<T>,
    subscription: Subscription,
}

/// Mirror `source` into a watch channel for as long as the watcher lives.
pub fn watch<S>(source: &S) -> StateWatcher<S::Snapshot>
where
    S: Subscribable + Clone + 'static,
    S::Snapshot: Send + Sync + 'static,
{
    let (tx, rx) = tokio_watch::channel(source.get_state());
    let reader = source.clone();
    let subscription = source.subscribe(std::sync::Arc::new(move || {
        tx.send_replace(reader.get_state());
    }));
    StateWatcher { rx, subscription }
}

impl<T: Clone + Send + Sync + 'static> StateWatcher<T> {
    /// The most recently published snapshot.
    pub fn current(&self) -> T {
        self.rx.borrow().clone()
    }

    /// Wait for the next notification and return the snapshot it carried.
    /// Returns `None` once the source is gone.
    pub async fn changed(&mut self) -> Option<T> {
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().clone())
    }

    /// Convert into a stream that yields the current snapshot first, then one
    /// item per observed change.
    pub fn into_stream(self) -> StateStream<T> {
        StateStream {
            stream: WatchStream::new(self.rx),
            subscription: self.subscription,
        }
    }
}

pin_project! {
    /// Stream form of a [`StateWatcher`]. Keeps the source subscription alive.
    pub struct StateStream<T> {
        #[pin]
        stream: WatchStream<T>,
        subscription: Subscription,
    }
}

impl<T: Clone + Send + Sync + 'static> Stream for StateStream<T> {
    type Item = T;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<T>> {
        self.project().stream.poll_next(cx)
    }
}
