use std::sync::Arc;

use threadline_core::{Attachment, AttachmentId, ComposerRuntimeCore, ComposerState, RuntimeError};
use threadline_reactive::{Listener, NestedSubscriptionSubject, Subscribable, Subscription};
use tracing::warn;

use crate::binding::{CoreComposers, ThreadRuntimeCoreBinding};

/// Facade over the current core's composer. Follows core swaps.
#[derive(Clone)]
pub struct ThreadComposerRuntime {
    binding: ThreadRuntimeCoreBinding,
    composer: NestedSubscriptionSubject<CoreComposers, dyn ComposerRuntimeCore>,
}

impl ThreadComposerRuntime {
    pub(crate) fn new(binding: ThreadRuntimeCoreBinding) -> Self {
        Self {
            composer: NestedSubscriptionSubject::new(CoreComposers(Arc::clone(&binding))),
            binding,
        }
    }

    fn core(&self) -> Arc<dyn ComposerRuntimeCore> {
        self.composer.get_state()
    }

    pub fn set_text(&self, text: &str) {
        self.core().set_text(text);
    }

    pub fn add_attachment(&self, attachment: Attachment) -> Result<(), RuntimeError> {
        self.core().add_attachment(attachment)
    }

    pub fn remove_attachment(&self, id: &AttachmentId) -> Result<(), RuntimeError> {
        self.core().remove_attachment(id)
    }

    /// Append the draft as a user message and clear it. No-op when empty.
    pub fn send(&self) -> Result<(), RuntimeError> {
        if self.binding.get_state().get_state().is_disabled {
            warn!("composer send rejected: thread is disabled");
            return Err(RuntimeError::Disabled);
        }
        self.core().send()
    }

    pub fn cancel(&self) {
        self.core().cancel();
    }

    pub fn reset(&self) {
        self.core().reset();
    }
}

impl Subscribable for ThreadComposerRuntime {
    type Snapshot = Arc<ComposerState>;

    fn get_state(&self) -> Arc<ComposerState> {
        self.core().get_state()
    }

    fn subscribe(&self, listener: Listener) -> Subscription {
        self.composer.subscribe(listener)
    }
}
