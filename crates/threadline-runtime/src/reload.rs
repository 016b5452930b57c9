use std::sync::Arc;

use threadline_core::RuntimeError;
use threadline_reactive::{CombinedSubject, Listener, Subscribable, Subscription};

use crate::message::{MessageRuntime, MessageState};
use crate::thread::{ThreadRuntime, ThreadState};

/// "Regenerate" affordance for one message position.
///
/// Enabled while the thread is idle and the position holds an assistant
/// message. Completion status is not consulted, so an errored or cancelled
/// reply can be reloaded.
#[derive(Clone)]
pub struct ReloadAction {
    message: MessageRuntime,
    enabled: CombinedSubject<ThreadRuntime, MessageRuntime, bool>,
}

impl ReloadAction {
    pub fn new(thread: ThreadRuntime, message: MessageRuntime) -> Self {
        Self {
            enabled: CombinedSubject::new(thread, message.clone(), is_enabled),
            message,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.get_state()
    }

    pub fn trigger(&self) -> Result<(), RuntimeError> {
        self.message.reload()
    }
}

fn is_enabled(thread: &Arc<ThreadState>, message: &Option<Arc<MessageState>>) -> bool {
    !thread.is_running && message.as_ref().is_some_and(|m| m.message.is_assistant())
}

impl Subscribable for ReloadAction {
    type Snapshot = bool;

    fn get_state(&self) -> bool {
        self.enabled.get_state()
    }

    /// Fires when enablement flips.
    fn subscribe(&self, listener: Listener) -> Subscription {
        self.enabled.subscribe(listener)
    }
}
