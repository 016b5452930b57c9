use std::sync::Arc;

use serde::{Deserialize, Serialize};
use threadline_reactive::Subscribable;

use crate::capabilities::{ModelConfig, RuntimeCapabilities};
use crate::errors::RuntimeError;
use crate::export::ExportedMessageRepository;
use crate::ids::{AttachmentId, MessageId, ThreadId, ToolCallId};
use crate::messages::{Attachment, ContentPart, MessageRole, ThreadMessage};
use crate::speech::SpeechHandle;

/// Normalized request to add a message to the tree.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AppendMessage {
    pub parent_id: Option<MessageId>,
    pub role: MessageRole,
    pub content: Vec<ContentPart>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

/// Engine state at one instant.
///
/// Engines publish a new `Arc<ThreadSnapshot>` on every mutation and reuse
/// the `Arc`s of fields that did not change.
#[derive(Clone, Debug)]
pub struct ThreadSnapshot {
    pub thread_id: ThreadId,
    pub is_disabled: bool,
    pub capabilities: Arc<RuntimeCapabilities>,
    /// The active path, root first.
    pub messages: Arc<[Arc<ThreadMessage>]>,
}

impl ThreadSnapshot {
    pub fn last_message(&self) -> Option<&Arc<ThreadMessage>> {
        self.messages.last()
    }

    pub fn last_message_id(&self) -> Option<&MessageId> {
        self.last_message().map(|m| &m.id)
    }

    /// True iff the last active-path message is a running assistant message.
    pub fn is_running(&self) -> bool {
        self.last_message().is_some_and(|m| m.is_running())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AddToolResultOptions {
    pub message_id: MessageId,
    pub tool_call_id: ToolCallId,
    pub result: serde_json::Value,
    #[serde(default)]
    pub is_error: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackType {
    Positive,
    Negative,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitFeedbackOptions {
    pub message_id: MessageId,
    #[serde(rename = "type")]
    pub feedback: FeedbackType,
}

/// Receives message ratings.
pub trait FeedbackAdapter: Send + Sync {
    fn submit(&self, message: &ThreadMessage, feedback: FeedbackType);
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ComposerState {
    pub text: String,
    pub attachments: Vec<Attachment>,
    pub is_editing: bool,
    pub can_cancel: bool,
    pub is_empty: bool,
}

/// Text-input state owned by the engine.
pub trait ComposerRuntimeCore: Subscribable<Snapshot = Arc<ComposerState>> {
    fn set_text(&self, text: &str);
    fn add_attachment(&self, attachment: Attachment) -> Result<(), RuntimeError>;
    fn remove_attachment(&self, id: &AttachmentId) -> Result<(), RuntimeError>;
    /// Append the composed message to the thread and clear. No-op when empty.
    fn send(&self) -> Result<(), RuntimeError>;
    fn cancel(&self);
    fn reset(&self);
}

/// The conversational engine behind a thread runtime.
///
/// All mutations return as soon as the engine has accepted them; their
/// effect is observed through later snapshots.
pub trait ThreadRuntimeCore: Subscribable<Snapshot = Arc<ThreadSnapshot>> {
    fn append(&self, message: AppendMessage) -> Result<(), RuntimeError>;
    /// Sibling ids of `message_id` in tree order, itself included. The
    /// returned `Arc` is stable until the sibling set changes.
    fn get_branches(&self, message_id: &MessageId) -> Result<Arc<[MessageId]>, RuntimeError>;
    fn switch_to_branch(&self, branch_id: &MessageId) -> Result<(), RuntimeError>;
    fn start_run(&self, parent_id: Option<&MessageId>) -> Result<(), RuntimeError>;
    fn cancel_run(&self);
    fn add_tool_result(&self, options: AddToolResultOptions) -> Result<(), RuntimeError>;
    fn speak(&self, message_id: &MessageId) -> Result<SpeechHandle, RuntimeError>;
    fn submit_feedback(&self, options: SubmitFeedbackOptions) -> Result<(), RuntimeError>;
    fn export(&self) -> ExportedMessageRepository;
    fn import(&self, data: ExportedMessageRepository) -> Result<(), RuntimeError>;
    fn get_model_config(&self) -> ModelConfig;
    fn composer(&self) -> Arc<dyn ComposerRuntimeCore>;
}
