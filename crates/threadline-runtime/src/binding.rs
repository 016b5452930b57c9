use std::sync::Arc;

use threadline_core::{ComposerRuntimeCore, ThreadRuntimeCore, ThreadSnapshot};
use threadline_reactive::{Listener, Subscribable, Subscription};

/// The runtime's view of its engine: the current core, plus notifications
/// for both core swaps and core state changes.
pub type ThreadRuntimeCoreBinding = Arc<dyn Subscribable<Snapshot = Arc<dyn ThreadRuntimeCore>>>;

/// Snapshots of whichever core is currently bound.
#[derive(Clone)]
pub(crate) struct CoreSnapshots(pub(crate) ThreadRuntimeCoreBinding);

impl Subscribable for CoreSnapshots {
    type Snapshot = Arc<ThreadSnapshot>;

    fn get_state(&self) -> Arc<ThreadSnapshot> {
        self.0.get_state().get_state()
    }

    fn subscribe(&self, listener: Listener) -> Subscription {
        self.0.subscribe(listener)
    }
}

/// Composer of whichever core is currently bound.
#[derive(Clone)]
pub(crate) struct CoreComposers(pub(crate) ThreadRuntimeCoreBinding);

impl Subscribable for CoreComposers {
    type Snapshot = Arc<dyn ComposerRuntimeCore>;

    fn get_state(&self) -> Arc<dyn ComposerRuntimeCore> {
        self.0.get_state().composer()
    }

    fn subscribe(&self, listener: Listener) -> Subscription {
        self.0.subscribe(listener)
    }
}
