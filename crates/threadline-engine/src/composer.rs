use std::sync::Arc;

use threadline_core::{Attachment, AttachmentId, ComposerRuntimeCore, ComposerState, RuntimeError};
use threadline_reactive::{Listener, Store, Subscribable, Subscription};
use tracing::debug;

type SendFn = Box<dyn Fn(String, Vec<Attachment>) -> Result<(), RuntimeError> + Send + Sync>;
type CancelFn = Box<dyn Fn() + Send + Sync>;

/// Draft state for the next user message of a local thread.
///
/// `send` hands text and attachments to the owning thread and clears the
/// draft only if the thread accepted them.
pub struct LocalComposerCore {
    state: Store<Arc<ComposerState>>,
    attachments_enabled: bool,
    on_send: SendFn,
    on_cancel: CancelFn,
}

impl LocalComposerCore {
    pub fn new(
        attachments_enabled: bool,
        on_send: impl Fn(String, Vec<Attachment>) -> Result<(), RuntimeError> + Send + Sync + 'static,
        on_cancel: impl Fn() + Send + Sync + 'static,
    ) -> Self {
        Self {
            state: Store::new(Arc::new(draft(String::new(), Vec::new(), false))),
            attachments_enabled,
            on_send: Box::new(on_send),
            on_cancel: Box::new(on_cancel),
        }
    }

    /// Reflect whether the thread has a run that `cancel` would stop.
    /// Publishes only on change.
    pub fn set_can_cancel(&self, can_cancel: bool) {
        let current = self.state.get_state();
        if current.can_cancel != can_cancel {
            self.publish(current.text.clone(), current.attachments.clone(), can_cancel);
        }
    }

    fn publish(&self, text: String, attachments: Vec<Attachment>, can_cancel: bool) {
        self.state.set(Arc::new(draft(text, attachments, can_cancel)));
    }
}

fn draft(text: String, attachments: Vec<Attachment>, can_cancel: bool) -> ComposerState {
    let is_empty = text.trim().is_empty() && attachments.is_empty();
    ComposerState {
        text,
        attachments,
        is_editing: true,
        can_cancel,
        is_empty,
    }
}

impl Subscribable for LocalComposerCore {
    type Snapshot = Arc<ComposerState>;

    fn get_state(&self) -> Arc<ComposerState> {
        self.state.get_state()
    }

    fn subscribe(&self, listener: Listener) -> Subscription {
        self.state.subscribe(listener)
    }
}

impl ComposerRuntimeCore for LocalComposerCore {
    fn set_text(&self, text: &str) {
        let current = self.state.get_state();
        if current.text != text {
            self.publish(text.to_string(), current.attachments.clone(), current.can_cancel);
        }
    }

    fn add_attachment(&self, attachment: Attachment) -> Result<(), RuntimeError> {
        if !self.attachments_enabled {
            return Err(RuntimeError::Unsupported("attachments"));
        }
        let current = self.state.get_state();
        let mut attachments = current.attachments.clone();
        attachments.push(attachment);
        self.publish(current.text.clone(), attachments, current.can_cancel);
        Ok(())
    }

    fn remove_attachment(&self, id: &AttachmentId) -> Result<(), RuntimeError> {
        let current = self.state.get_state();
        let mut attachments = current.attachments.clone();
        let before = attachments.len();
        attachments.retain(|a| &a.id != id);
        if attachments.len() == before {
            return Err(RuntimeError::AttachmentNotFound(id.clone()));
        }
        self.publish(current.text.clone(), attachments, current.can_cancel);
        Ok(())
    }

    fn send(&self) -> Result<(), RuntimeError> {
        let current = self.state.get_state();
        if current.is_empty {
            debug!("composer empty, nothing to send");
            return Ok(());
        }
        (self.on_send)(current.text.clone(), current.attachments.clone())?;
        self.reset();
        Ok(())
    }

    fn cancel(&self) {
        (self.on_cancel)();
    }

    fn reset(&self) {
        let current = self.state.get_state();
        if !current.is_empty || !current.text.is_empty() {
            self.publish(String::new(), Vec::new(), current.can_cancel);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use threadline_core::AttachmentKind;

    fn recording() -> (LocalComposerCore, Arc<Mutex<Vec<(String, usize)>>>) {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&sent);
        let composer = LocalComposerCore::new(
            true,
            move |text, attachments| {
                log.lock().push((text, attachments.len()));
                Ok(())
            },
            || {},
        );
        (composer, sent)
    }

    #[test]
    fn starts_empty() {
        let (composer, _) = recording();
        let state = composer.get_state();
        assert!(state.is_empty);
        assert!(state.text.is_empty());
    }

    #[test]
    fn whitespace_only_is_empty_and_send_is_noop() {
        let (composer, sent) = recording();
        composer.set_text("   ");
        assert!(composer.get_state().is_empty);
        composer.send().unwrap();
        assert!(sent.lock().is_empty());
    }

    #[test]
    fn send_hands_off_and_clears() {
        let (composer, sent) = recording();
        composer.set_text("hello");
        composer
            .add_attachment(Attachment::new(AttachmentKind::File, "notes.txt"))
            .unwrap();
        composer.send().unwrap();

        assert_eq!(*sent.lock(), vec![("hello".to_string(), 1)]);
        let state = composer.get_state();
        assert!(state.is_empty);
        assert!(state.attachments.is_empty());
    }

    #[test]
    fn rejected_send_keeps_draft() {
        let composer = LocalComposerCore::new(true, |_, _| Err(RuntimeError::Disabled), || {});
        composer.set_text("draft");
        assert_eq!(composer.send(), Err(RuntimeError::Disabled));
        assert_eq!(composer.get_state().text, "draft");
    }

    #[test]
    fn attachments_can_be_disabled() {
        let composer = LocalComposerCore::new(false, |_, _| Ok(()), || {});
        let err = composer
            .add_attachment(Attachment::new(AttachmentKind::Image, "cat.png"))
            .unwrap_err();
        assert_eq!(err, RuntimeError::Unsupported("attachments"));
    }

    #[test]
    fn remove_unknown_attachment_fails() {
        let (composer, _) = recording();
        let attachment = Attachment::new(AttachmentKind::Document, "brief.pdf");
        let id = attachment.id.clone();
        composer.add_attachment(attachment).unwrap();
        composer.remove_attachment(&id).unwrap();
        assert!(matches!(
            composer.remove_attachment(&id),
            Err(RuntimeError::AttachmentNotFound(_))
        ));
    }

    #[test]
    fn unchanged_text_does_not_notify() {
        let (composer, _) = recording();
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        let _sub = composer.subscribe(Arc::new(move || {
            c.fetch_add(1, Ordering::SeqCst);
        }));
        composer.set_text("a");
        composer.set_text("a");
        composer.set_can_cancel(false);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn cancel_forwards_to_thread() {
        let cancelled = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&cancelled);
        let composer = LocalComposerCore::new(true, |_, _| Ok(()), move || {
            c.fetch_add(1, Ordering::SeqCst);
        });
        composer.cancel();
        assert_eq!(cancelled.load(Ordering::SeqCst), 1);
    }
}
