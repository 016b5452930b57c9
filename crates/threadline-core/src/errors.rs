use crate::ids::{AttachmentId, MessageId, ToolCallId};
use crate::messages::MessageRole;

/// Errors returned by thread runtimes and their engines.
///
/// Precondition violations mean the caller skipped a check it could have
/// made against derived state; they are returned immediately and never
/// downgraded to a no-op. Run failures are not errors here: they travel in
/// the message status.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum RuntimeError {
    // Precondition violations
    #[error("message index must be >= 0, got {index}")]
    IndexOutOfRange { index: isize },
    #[error("reloading is only supported on assistant messages, got {role}")]
    NotAssistantMessage { role: MessageRole },
    #[error("thread is disabled")]
    Disabled,
    #[error("message not found: {0}")]
    MessageNotFound(MessageId),
    #[error("no message at index {index}")]
    MessageUnavailable { index: usize },
    #[error("no such branch: {0}")]
    NoSuchBranch(String),
    #[error("tool call {tool_call_id} not found on message {message_id}")]
    ToolCallNotFound {
        message_id: MessageId,
        tool_call_id: ToolCallId,
    },
    #[error("no run in progress")]
    NoActiveRun,
    #[error("attachment not found: {0}")]
    AttachmentNotFound(AttachmentId),

    // Capability gaps
    #[error("{0} is not supported by this runtime")]
    Unsupported(&'static str),

    // Collaborator failures
    #[error("repository error: {0}")]
    Repository(String),
    #[error("adapter error: {0}")]
    Adapter(String),
}

impl RuntimeError {
    /// True when the error points at a caller bug rather than the runtime.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            Self::IndexOutOfRange { .. }
                | Self::NotAssistantMessage { .. }
                | Self::Disabled
                | Self::MessageNotFound(_)
                | Self::MessageUnavailable { .. }
                | Self::NoSuchBranch(_)
                | Self::ToolCallNotFound { .. }
                | Self::NoActiveRun
                | Self::AttachmentNotFound(_)
        )
    }

    /// Short classification string for logging.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::IndexOutOfRange { .. } => "index_out_of_range",
            Self::NotAssistantMessage { .. } => "not_assistant_message",
            Self::Disabled => "disabled",
            Self::MessageNotFound(_) => "message_not_found",
            Self::MessageUnavailable { .. } => "message_unavailable",
            Self::NoSuchBranch(_) => "no_such_branch",
            Self::ToolCallNotFound { .. } => "tool_call_not_found",
            Self::NoActiveRun => "no_active_run",
            Self::AttachmentNotFound(_) => "attachment_not_found",
            Self::Unsupported(_) => "unsupported",
            Self::Repository(_) => "repository",
            Self::Adapter(_) => "adapter",
        }
    }
}
