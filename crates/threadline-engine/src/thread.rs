use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use threadline_core::{
    AddToolResultOptions, AppendMessage, AssistantStreamChunk, CompleteReason,
    ComposerRuntimeCore, ContentPart, ExportedMessageRepository, FeedbackAdapter, MessageId,
    MessageRole, MessageStatus, ModelConfig, RuntimeCapabilities, RuntimeError, SpeechHandle,
    SpeechSynthesisAdapter, SubmitFeedbackOptions, ThreadId, ThreadMessage, ThreadRuntimeCore,
    ThreadSnapshot,
};
use threadline_reactive::{Listener, Store, Subscribable, Subscription};
use threadline_store::MessageRepository;
use tracing::{debug, instrument, warn};

use crate::composer::LocalComposerCore;
use crate::config::LocalThreadConfig;
use crate::run;

/// Optional collaborators of a local thread.
#[derive(Clone, Default)]
pub struct LocalThreadAdapters {
    pub speech: Option<Arc<dyn SpeechSynthesisAdapter>>,
    pub feedback: Option<Arc<dyn FeedbackAdapter>>,
}

/// In-process thread engine over a [`MessageRepository`].
///
/// Runs are driven from outside: [`start_run`](ThreadRuntimeCore::start_run)
/// (or appending a user message) opens a running assistant message, then
/// [`apply_chunk`](Self::apply_chunk) and [`finish_run`](Self::finish_run)
/// advance it. Every successful mutation publishes one new snapshot.
#[derive(Clone)]
pub struct LocalThreadCore {
    inner: Arc<LocalThreadInner>,
}

struct LocalThreadInner {
    thread_id: ThreadId,
    capabilities: Arc<RuntimeCapabilities>,
    model_config: ModelConfig,
    adapters: LocalThreadAdapters,
    state: Mutex<EngineState>,
    snapshot: Store<Arc<ThreadSnapshot>>,
    /// Version of the snapshot currently in `snapshot`.
    published: AtomicU64,
    composer: Arc<LocalComposerCore>,
}

struct EngineState {
    repository: MessageRepository,
    active_run: Option<MessageId>,
    is_disabled: bool,
    version: u64,
}

impl LocalThreadCore {
    pub fn new(config: LocalThreadConfig) -> Self {
        Self::with_adapters(config, LocalThreadAdapters::default())
    }

    pub fn with_adapters(config: LocalThreadConfig, adapters: LocalThreadAdapters) -> Self {
        let thread_id = config.thread_id.clone().unwrap_or_default();
        let capabilities = Arc::new(
            config.resolve_capabilities(adapters.speech.is_some(), adapters.feedback.is_some()),
        );
        let repository = MessageRepository::new();
        let initial = Arc::new(ThreadSnapshot {
            thread_id: thread_id.clone(),
            is_disabled: config.is_disabled,
            capabilities: Arc::clone(&capabilities),
            messages: repository.messages(),
        });

        let inner = Arc::new_cyclic(|weak: &Weak<LocalThreadInner>| {
            let send_to = weak.clone();
            let cancel_on = weak.clone();
            let composer = LocalComposerCore::new(
                capabilities.attachments,
                move |text, attachments| {
                    let inner = send_to.upgrade().ok_or(RuntimeError::Disabled)?;
                    inner.send_from_composer(text, attachments)
                },
                move || {
                    if let Some(inner) = cancel_on.upgrade() {
                        inner.cancel_run();
                    }
                },
            );
            LocalThreadInner {
                thread_id,
                capabilities,
                model_config: config.model_config,
                adapters,
                state: Mutex::new(EngineState {
                    repository,
                    active_run: None,
                    is_disabled: config.is_disabled,
                    version: 0,
                }),
                snapshot: Store::new(initial),
                published: AtomicU64::new(0),
                composer: Arc::new(composer),
            }
        });
        Self { inner }
    }

    pub fn thread_id(&self) -> &ThreadId {
        &self.inner.thread_id
    }

    /// Id of the running assistant message, if any.
    pub fn active_run(&self) -> Option<MessageId> {
        self.inner.state.lock().active_run.clone()
    }

    pub fn set_disabled(&self, is_disabled: bool) {
        let _ = self.inner.mutate(|state| {
            state.is_disabled = is_disabled;
            Ok(())
        });
    }

    /// Fold one stream chunk into the running message. An `error` chunk
    /// ends the run.
    pub fn apply_chunk(&self, chunk: AssistantStreamChunk) -> Result<(), RuntimeError> {
        self.inner.mutate(|state| {
            let run_id = state.active_run.clone().ok_or(RuntimeError::NoActiveRun)?;
            let mut message = ThreadMessage::clone(state.repository.get_message(&run_id)?);
            let terminal = chunk.is_terminal();
            run::apply_chunk(&mut message, chunk)?;
            state.repository.add_or_update_message(message)?;
            if terminal {
                warn!(run_id = %run_id, "run ended with error");
                state.active_run = None;
            }
            Ok(())
        })
    }

    /// Mark the running message complete.
    #[instrument(skip(self), fields(thread_id = %self.inner.thread_id))]
    pub fn finish_run(&self) -> Result<(), RuntimeError> {
        self.inner.end_run(CompleteReason::Stop)
    }
}

impl LocalThreadInner {
    /// Apply `f` under the state lock, then publish one snapshot if it
    /// succeeded. A failing `f` must leave the state untouched.
    ///
    /// Listeners run after the state lock is released. Snapshots carry the
    /// version they were built at and an older one never replaces a newer
    /// one, so concurrent mutations cannot publish out of order.
    fn mutate<R>(
        &self,
        f: impl FnOnce(&mut EngineState) -> Result<R, RuntimeError>,
    ) -> Result<R, RuntimeError> {
        let (result, snapshot, version) = {
            let mut state = self.state.lock();
            let result = f(&mut state)?;
            state.version += 1;
            let snapshot = ThreadSnapshot {
                thread_id: self.thread_id.clone(),
                is_disabled: state.is_disabled,
                capabilities: Arc::clone(&self.capabilities),
                messages: state.repository.messages(),
            };
            (result, snapshot, state.version)
        };

        let cancellable = self.capabilities.cancel;
        self.composer.set_can_cancel(snapshot.is_running() && cancellable);
        let published = &self.published;
        let fresh = self.snapshot.set_if(Arc::new(snapshot), |_| {
            published.fetch_max(version, Ordering::AcqRel) < version
        });
        if !fresh {
            // The newer snapshot already out includes this change.
            debug!(version, "dropped stale snapshot");
        }
        self.composer
            .set_can_cancel(self.snapshot.get_state().is_running() && cancellable);
        Ok(result)
    }

    fn append(&self, message: AppendMessage) -> Result<(), RuntimeError> {
        self.mutate(|state| {
            if let Some(parent_id) = &message.parent_id {
                if !state.repository.contains(parent_id) {
                    return Err(RuntimeError::MessageNotFound(parent_id.clone()));
                }
            }
            let role = message.role;
            let new = ThreadMessage::new(message.parent_id, role, message.content)
                .with_attachments(message.attachments);
            let id = new.id.clone();
            state.repository.add_or_update_message(new)?;
            state.repository.reset_head(Some(&id))?;
            debug!(message_id = %id, %role, "appended message");
            if role == MessageRole::User {
                start_run_locked(state, Some(&id))?;
            }
            Ok(())
        })
    }

    fn send_from_composer(
        &self,
        text: String,
        attachments: Vec<threadline_core::Attachment>,
    ) -> Result<(), RuntimeError> {
        let parent_id = {
            let state = self.state.lock();
            if state.is_disabled {
                return Err(RuntimeError::Disabled);
            }
            state.repository.head().cloned()
        };
        self.append(AppendMessage {
            parent_id,
            role: MessageRole::User,
            content: vec![ContentPart::text(text)],
            attachments,
        })
    }

    fn end_run(&self, reason: CompleteReason) -> Result<(), RuntimeError> {
        self.mutate(|state| {
            let run_id = state.active_run.take().ok_or(RuntimeError::NoActiveRun)?;
            complete_locked(state, &run_id, reason)
        })
    }

    fn cancel_run(&self) {
        if self.end_run(CompleteReason::Cancelled).is_ok() {
            debug!(thread_id = %self.thread_id, "run cancelled");
        }
    }
}

/// Open a running assistant message under `parent_id`, cancelling any run
/// already in progress.
fn start_run_locked(state: &mut EngineState, parent_id: Option<&MessageId>) -> Result<(), RuntimeError> {
    if let Some(parent_id) = parent_id {
        if !state.repository.contains(parent_id) {
            return Err(RuntimeError::MessageNotFound(parent_id.clone()));
        }
    }
    if let Some(previous) = state.active_run.take() {
        debug!(run_id = %previous, "superseding active run");
        complete_locked(state, &previous, CompleteReason::Cancelled)?;
    }
    state.repository.reset_head(parent_id)?;
    let message = ThreadMessage::assistant_running(parent_id.cloned());
    let run_id = message.id.clone();
    state.repository.add_or_update_message(message)?;
    debug!(run_id = %run_id, "run started");
    state.active_run = Some(run_id);
    Ok(())
}

fn complete_locked(
    state: &mut EngineState,
    run_id: &MessageId,
    reason: CompleteReason,
) -> Result<(), RuntimeError> {
    let message = ThreadMessage::clone(state.repository.get_message(run_id)?)
        .with_status(MessageStatus::Complete { reason });
    state.repository.add_or_update_message(message)?;
    debug!(run_id = %run_id, ?reason, "run finished");
    Ok(())
}

impl Subscribable for LocalThreadCore {
    type Snapshot = Arc<ThreadSnapshot>;

    fn get_state(&self) -> Arc<ThreadSnapshot> {
        self.inner.snapshot.get_state()
    }

    fn subscribe(&self, listener: Listener) -> Subscription {
        self.inner.snapshot.subscribe(listener)
    }
}

impl ThreadRuntimeCore for LocalThreadCore {
    #[instrument(skip(self, message), fields(thread_id = %self.inner.thread_id, role = %message.role))]
    fn append(&self, message: AppendMessage) -> Result<(), RuntimeError> {
        self.inner.append(message)
    }

    fn get_branches(&self, message_id: &MessageId) -> Result<Arc<[MessageId]>, RuntimeError> {
        Ok(self.inner.state.lock().repository.get_branches(message_id)?)
    }

    #[instrument(skip(self), fields(thread_id = %self.inner.thread_id))]
    fn switch_to_branch(&self, branch_id: &MessageId) -> Result<(), RuntimeError> {
        self.inner
            .mutate(|state| Ok(state.repository.switch_to_branch(branch_id)?))
    }

    #[instrument(skip(self), fields(thread_id = %self.inner.thread_id))]
    fn start_run(&self, parent_id: Option<&MessageId>) -> Result<(), RuntimeError> {
        self.inner.mutate(|state| start_run_locked(state, parent_id))
    }

    fn cancel_run(&self) {
        self.inner.cancel_run();
    }

    #[instrument(skip(self, options), fields(message_id = %options.message_id, tool_call_id = %options.tool_call_id))]
    fn add_tool_result(&self, options: AddToolResultOptions) -> Result<(), RuntimeError> {
        self.inner.mutate(|state| {
            let mut message = ThreadMessage::clone(state.repository.get_message(&options.message_id)?);
            let call = message.tool_call_mut(&options.tool_call_id).ok_or_else(|| {
                RuntimeError::ToolCallNotFound {
                    message_id: options.message_id.clone(),
                    tool_call_id: options.tool_call_id.clone(),
                }
            })?;
            call.result = Some(options.result);
            call.is_error = options.is_error;
            state.repository.add_or_update_message(message)?;
            Ok(())
        })
    }

    fn speak(&self, message_id: &MessageId) -> Result<SpeechHandle, RuntimeError> {
        let adapter = self
            .inner
            .adapters
            .speech
            .as_ref()
            .ok_or(RuntimeError::Unsupported("speech"))?;
        let text = self
            .inner
            .state
            .lock()
            .repository
            .get_message(message_id)?
            .text_content();
        Ok(adapter.speak(&text))
    }

    fn submit_feedback(&self, options: SubmitFeedbackOptions) -> Result<(), RuntimeError> {
        let adapter = self
            .inner
            .adapters
            .feedback
            .as_ref()
            .ok_or(RuntimeError::Unsupported("feedback"))?;
        let message = Arc::clone(
            self.inner
                .state
                .lock()
                .repository
                .get_message(&options.message_id)?,
        );
        adapter.submit(&message, options.feedback);
        Ok(())
    }

    fn export(&self) -> ExportedMessageRepository {
        self.inner.state.lock().repository.export()
    }

    #[instrument(skip(self, data), fields(thread_id = %self.inner.thread_id, messages = data.messages.len()))]
    fn import(&self, mut data: ExportedMessageRepository) -> Result<(), RuntimeError> {
        // Nothing drives a run recorded in an export.
        for message in data.messages.iter_mut().filter(|m| m.is_running()) {
            debug!(message_id = %message.id, "imported run marked cancelled");
            message.status = Some(MessageStatus::Complete {
                reason: CompleteReason::Cancelled,
            });
        }
        let repository = MessageRepository::import(data)?;
        self.inner.mutate(|state| {
            if let Some(run_id) = state.active_run.take() {
                debug!(run_id = %run_id, "import replaced active run");
            }
            state.repository = repository;
            Ok(())
        })
    }

    fn get_model_config(&self) -> ModelConfig {
        self.inner.model_config.clone()
    }

    fn composer(&self) -> Arc<dyn ComposerRuntimeCore> {
        Arc::clone(&self.inner.composer) as Arc<dyn ComposerRuntimeCore>
    }
}

impl fmt::Debug for LocalThreadCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("LocalThreadCore")
            .field("thread_id", &self.inner.thread_id)
            .field("messages", &state.repository.len())
            .field("active_run", &state.active_run)
            .finish()
    }
}
