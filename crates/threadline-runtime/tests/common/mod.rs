#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use threadline_core::{
    AddToolResultOptions, AppendMessage, ComposerRuntimeCore, ExportedMessageRepository,
    MessageId, ModelConfig, RuntimeError, SpeechHandle, SubmitFeedbackOptions,
    ThreadRuntimeCore, ThreadSnapshot,
};
use threadline_engine::{LocalThreadConfig, LocalThreadCore, ThreadCoreSlot};
use threadline_reactive::{Listener, Subscribable, Subscription};
use threadline_runtime::ThreadRuntime;

pub struct Harness {
    pub runtime: ThreadRuntime,
    pub core: LocalThreadCore,
    pub slot: ThreadCoreSlot,
}

pub fn harness() -> Harness {
    harness_with(LocalThreadConfig::default())
}

pub fn harness_with(config: LocalThreadConfig) -> Harness {
    let core = LocalThreadCore::new(config);
    let slot = ThreadCoreSlot::new(Arc::new(core.clone()));
    let runtime = ThreadRuntime::new(Arc::new(slot.clone()));
    Harness {
        runtime,
        core,
        slot,
    }
}

/// A user turn answered with `reply`, run finished.
pub fn exchange(h: &Harness, prompt: &str, reply: &str) {
    h.runtime.append(prompt).unwrap();
    h.core
        .apply_chunk(threadline_core::AssistantStreamChunk::text(reply))
        .unwrap();
    h.core.finish_run().unwrap();
}

pub fn ids(runtime: &ThreadRuntime) -> Vec<MessageId> {
    runtime.messages().iter().map(|m| m.id.clone()).collect()
}

/// Counts listener invocations for as long as the subscription lives.
pub fn counter<S: Subscribable>(source: &S) -> (Arc<AtomicUsize>, Subscription) {
    let count = Arc::new(AtomicUsize::new(0));
    let c = Arc::clone(&count);
    let sub = source.subscribe(Arc::new(move || {
        c.fetch_add(1, Ordering::SeqCst);
    }));
    (count, sub)
}

pub fn load(count: &AtomicUsize) -> usize {
    count.load(Ordering::SeqCst)
}

/// Wraps a local core, counting engine calls and live subscriptions.
pub struct CountingCore {
    pub inner: LocalThreadCore,
    pub calls: AtomicUsize,
    pub live_subscriptions: Arc<AtomicUsize>,
    /// Makes `get_branches` fail, as an inconsistent engine would.
    pub fail_branches: AtomicBool,
}

impl CountingCore {
    pub fn new(inner: LocalThreadCore) -> Arc<Self> {
        Arc::new(Self {
            inner,
            calls: AtomicUsize::new(0),
            live_subscriptions: Arc::new(AtomicUsize::new(0)),
            fail_branches: AtomicBool::new(false),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn live(&self) -> usize {
        self.live_subscriptions.load(Ordering::SeqCst)
    }

    fn hit(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

impl Subscribable for CountingCore {
    type Snapshot = Arc<ThreadSnapshot>;

    fn get_state(&self) -> Arc<ThreadSnapshot> {
        self.inner.get_state()
    }

    fn subscribe(&self, listener: Listener) -> Subscription {
        self.live_subscriptions.fetch_add(1, Ordering::SeqCst);
        let inner = self.inner.subscribe(listener);
        let live = Arc::clone(&self.live_subscriptions);
        Subscription::new(move || {
            drop(inner);
            live.fetch_sub(1, Ordering::SeqCst);
        })
    }
}

impl ThreadRuntimeCore for CountingCore {
    fn append(&self, message: AppendMessage) -> Result<(), RuntimeError> {
        self.hit();
        self.inner.append(message)
    }

    fn get_branches(&self, message_id: &MessageId) -> Result<Arc<[MessageId]>, RuntimeError> {
        if self.fail_branches.load(Ordering::SeqCst) {
            return Err(RuntimeError::MessageNotFound(message_id.clone()));
        }
        self.inner.get_branches(message_id)
    }

    fn switch_to_branch(&self, branch_id: &MessageId) -> Result<(), RuntimeError> {
        self.hit();
        self.inner.switch_to_branch(branch_id)
    }

    fn start_run(&self, parent_id: Option<&MessageId>) -> Result<(), RuntimeError> {
        self.hit();
        self.inner.start_run(parent_id)
    }

    fn cancel_run(&self) {
        self.hit();
        self.inner.cancel_run();
    }

    fn add_tool_result(&self, options: AddToolResultOptions) -> Result<(), RuntimeError> {
        self.hit();
        self.inner.add_tool_result(options)
    }

    fn speak(&self, message_id: &MessageId) -> Result<SpeechHandle, RuntimeError> {
        self.hit();
        self.inner.speak(message_id)
    }

    fn submit_feedback(&self, options: SubmitFeedbackOptions) -> Result<(), RuntimeError> {
        self.hit();
        self.inner.submit_feedback(options)
    }

    fn export(&self) -> ExportedMessageRepository {
        self.inner.export()
    }

    fn import(&self, data: ExportedMessageRepository) -> Result<(), RuntimeError> {
        self.hit();
        self.inner.import(data)
    }

    fn get_model_config(&self) -> ModelConfig {
        self.inner.get_model_config()
    }

    fn composer(&self) -> Arc<dyn ComposerRuntimeCore> {
        self.inner.composer()
    }
}
