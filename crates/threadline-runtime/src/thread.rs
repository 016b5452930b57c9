use std::fmt;
use std::sync::Arc;

use threadline_core::{
    AddToolResultOptions, ExportedMessageRepository, MessageId, MessageRole, ModelConfig,
    RuntimeCapabilities, RuntimeError, SpeechHandle, SubmitFeedbackOptions, ThreadId,
    ThreadMessage, ThreadRuntimeCore, ThreadSnapshot,
};
use threadline_reactive::{
    watch, Listener, ShallowEq, ShallowMemoizeSubject, StateWatcher, Subscribable, Subscription,
};
use tracing::{debug, instrument, warn};

use crate::append::CreateAppendMessage;
use crate::binding::{CoreSnapshots, ThreadRuntimeCoreBinding};
use crate::composer::ThreadComposerRuntime;
use crate::message::MessageRuntime;

/// Thread-level state derived from the current core snapshot.
#[derive(Clone, Debug, PartialEq)]
pub struct ThreadState {
    pub thread_id: ThreadId,
    pub is_disabled: bool,
    /// True iff the last active-path message is a running assistant message.
    pub is_running: bool,
    pub capabilities: Arc<RuntimeCapabilities>,
}

impl ShallowEq for ThreadState {
    fn shallow_eq(&self, other: &Self) -> bool {
        self.thread_id.shallow_eq(&other.thread_id)
            && self.is_disabled == other.is_disabled
            && self.is_running == other.is_running
            && Arc::ptr_eq(&self.capabilities, &other.capabilities)
    }
}

impl ThreadState {
    fn derive(snapshot: &Arc<ThreadSnapshot>) -> Arc<Self> {
        Arc::new(Self {
            thread_id: snapshot.thread_id.clone(),
            is_disabled: snapshot.is_disabled,
            is_running: snapshot.is_running(),
            capabilities: Arc::clone(&snapshot.capabilities),
        })
    }
}

pub(crate) type StateSubject<D> = ShallowMemoizeSubject<CoreSnapshots, ThreadSnapshot, D>;

/// Public facade over a bound thread engine.
///
/// Reads are derived and memoized; every mutation is forwarded to the core
/// that is current at call time. The facade never edits messages or the
/// active path itself.
#[derive(Clone)]
pub struct ThreadRuntime {
    binding: ThreadRuntimeCoreBinding,
    state: StateSubject<Arc<ThreadState>>,
    composer: ThreadComposerRuntime,
}

impl ThreadRuntime {
    pub fn new(binding: ThreadRuntimeCoreBinding) -> Self {
        Self {
            state: ShallowMemoizeSubject::new(
                CoreSnapshots(Arc::clone(&binding)),
                ThreadState::derive,
            ),
            composer: ThreadComposerRuntime::new(Arc::clone(&binding)),
            binding,
        }
    }

    fn core(&self) -> Arc<dyn ThreadRuntimeCore> {
        self.binding.get_state()
    }

    pub(crate) fn binding(&self) -> &ThreadRuntimeCoreBinding {
        &self.binding
    }

    /// The active path of the current core, root first.
    pub fn messages(&self) -> Arc<[Arc<ThreadMessage>]> {
        Arc::clone(&self.core().get_state().messages)
    }

    /// How many times the thread state has been recomputed.
    pub fn compute_count(&self) -> u64 {
        self.state.compute_count()
    }

    /// Async view of the thread state. Yields only when the derived
    /// [`ThreadState`] changes, not on every message edit.
    pub fn watch(&self) -> StateWatcher<Arc<ThreadState>> {
        watch(&self.state)
    }

    /// Fails with `Disabled` when the current core is disabled.
    fn ensure_editable(&self, core: &dyn ThreadRuntimeCore, operation: &'static str) -> Result<(), RuntimeError> {
        if core.get_state().is_disabled {
            warn!(operation, "rejected: thread is disabled");
            return Err(RuntimeError::Disabled);
        }
        Ok(())
    }

    /// Append a message. Plain text becomes a user message after the last
    /// active-path message.
    #[instrument(skip(self, message))]
    pub fn append(&self, message: impl Into<CreateAppendMessage>) -> Result<(), RuntimeError> {
        let core = self.core();
        self.ensure_editable(&*core, "append")?;
        let snapshot = core.get_state();
        let message = message.into().normalize(snapshot.last_message_id());
        debug!(parent_id = ?message.parent_id, role = %message.role, "appending");
        core.append(message)
    }

    pub fn get_branches(&self, message_id: &MessageId) -> Result<Arc<[MessageId]>, RuntimeError> {
        self.core().get_branches(message_id)
    }

    pub fn switch_to_branch(&self, branch_id: &MessageId) -> Result<(), RuntimeError> {
        let core = self.core();
        self.ensure_editable(&*core, "switch_to_branch")?;
        core.switch_to_branch(branch_id)
    }

    pub fn start_run(&self, parent_id: Option<&MessageId>) -> Result<(), RuntimeError> {
        let core = self.core();
        self.ensure_editable(&*core, "start_run")?;
        core.start_run(parent_id)
    }

    pub fn cancel_run(&self) {
        self.core().cancel_run();
    }

    pub fn add_tool_result(&self, options: AddToolResultOptions) -> Result<(), RuntimeError> {
        let core = self.core();
        self.ensure_editable(&*core, "add_tool_result")?;
        core.add_tool_result(options)
    }

    pub fn speak(&self, message_id: &MessageId) -> Result<SpeechHandle, RuntimeError> {
        self.core().speak(message_id)
    }

    pub fn submit_feedback(&self, options: SubmitFeedbackOptions) -> Result<(), RuntimeError> {
        self.core().submit_feedback(options)
    }

    pub fn export(&self) -> ExportedMessageRepository {
        self.core().export()
    }

    pub fn import(&self, data: ExportedMessageRepository) -> Result<(), RuntimeError> {
        let core = self.core();
        self.ensure_editable(&*core, "import")?;
        core.import(data)
    }

    pub fn get_model_config(&self) -> ModelConfig {
        self.core().get_model_config()
    }

    /// Sub-runtime for the message at `index` on the active path.
    ///
    /// The index is fixed; the message behind it follows the active path.
    pub fn get_message_by_index(&self, index: isize) -> Result<MessageRuntime, RuntimeError> {
        let index = usize::try_from(index).map_err(|_| RuntimeError::IndexOutOfRange { index })?;
        Ok(MessageRuntime::new(self.clone(), index))
    }

    /// Sub-runtime for the message `id`, by its current active-path index.
    pub fn get_message_by_id(&self, id: &MessageId) -> Result<MessageRuntime, RuntimeError> {
        let index = self
            .core()
            .get_state()
            .messages
            .iter()
            .position(|m| &m.id == id)
            .ok_or_else(|| RuntimeError::MessageNotFound(id.clone()))?;
        Ok(MessageRuntime::new(self.clone(), index))
    }

    pub fn composer(&self) -> &ThreadComposerRuntime {
        &self.composer
    }

    /// Regenerate an assistant message: start a new run from its parent,
    /// which adds a sibling branch.
    #[instrument(skip(self, message), fields(message_id = %message.id))]
    pub fn reload_at(&self, message: &ThreadMessage) -> Result<(), RuntimeError> {
        if message.role != MessageRole::Assistant {
            warn!(role = %message.role, "reload rejected");
            return Err(RuntimeError::NotAssistantMessage { role: message.role });
        }
        self.start_run(message.parent_id.as_ref())
    }

    pub(crate) fn state_subject<D>(
        &self,
        compute: impl Fn(&Arc<ThreadSnapshot>) -> D + Send + Sync + 'static,
    ) -> StateSubject<D>
    where
        D: ShallowEq + Clone + Send + 'static,
    {
        ShallowMemoizeSubject::new(CoreSnapshots(Arc::clone(&self.binding)), compute)
    }
}

impl Subscribable for ThreadRuntime {
    type Snapshot = Arc<ThreadState>;

    fn get_state(&self) -> Arc<ThreadState> {
        self.state.get_state()
    }

    /// Fires on core swaps and on every core state change, including
    /// message-only edits that leave [`ThreadState`] untouched.
    fn subscribe(&self, listener: Listener) -> Subscription {
        self.binding.subscribe(listener)
    }
}

impl fmt::Debug for ThreadRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadRuntime")
            .field("state", &self.get_state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(caps: &Arc<RuntimeCapabilities>, is_running: bool) -> ThreadState {
        ThreadState {
            thread_id: ThreadId::from_raw("thread_1"),
            is_disabled: false,
            is_running,
            capabilities: Arc::clone(caps),
        }
    }

    #[test]
    fn capabilities_compare_by_pointer() {
        let caps = Arc::new(RuntimeCapabilities::default());
        let same_value = Arc::new(RuntimeCapabilities::default());
        assert!(state(&caps, false).shallow_eq(&state(&caps, false)));
        assert!(!state(&caps, false).shallow_eq(&state(&same_value, false)));
        assert!(!state(&caps, false).shallow_eq(&state(&caps, true)));
    }
}
