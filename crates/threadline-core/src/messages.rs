use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{AttachmentId, MessageId, ToolCallId};

#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    User,
    Assistant,
    System,
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::System => "system",
        })
    }
}

/// Run status of an assistant message. Engine failures surface here, never
/// as errors from the runtime.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum MessageStatus {
    Running,
    Complete { reason: CompleteReason },
    Error { error: String },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompleteReason {
    Stop,
    Cancelled,
}

// --- Content types ---

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ContentPart {
    Text { text: String },
    Reasoning { text: String },
    ToolCall(ToolCallPart),
    Image { image: String },
    Data { data: serde_json::Value },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolCallPart {
    pub tool_call_id: ToolCallId,
    pub tool_name: String,
    /// Raw argument JSON as streamed; may be incomplete while running.
    #[serde(default)]
    pub args_text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact: Option<serde_json::Value>,
    #[serde(default)]
    pub is_error: bool,
}

impl ToolCallPart {
    /// Parsed arguments, if the streamed text is complete JSON.
    pub fn args(&self) -> Option<serde_json::Value> {
        serde_json::from_str(&self.args_text).ok()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttachmentKind {
    Image,
    Document,
    File,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    pub id: AttachmentId,
    pub kind: AttachmentKind,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(default)]
    pub content: Vec<ContentPart>,
}

impl Attachment {
    pub fn new(kind: AttachmentKind, name: impl Into<String>) -> Self {
        Self {
            id: AttachmentId::new(),
            kind,
            name: name.into(),
            content_type: None,
            content: Vec::new(),
        }
    }
}

/// One node of the conversation tree.
///
/// Immutable once shared: engines publish a new value (same id) to record
/// run progress, and edits create new messages with new ids.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ThreadMessage {
    pub id: MessageId,
    /// `None` for a root message.
    pub parent_id: Option<MessageId>,
    pub role: MessageRole,
    pub content: Vec<ContentPart>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
    /// Only assistant messages carry a status.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<MessageStatus>,
    pub created_at: DateTime<Utc>,
}

// --- Convenience constructors ---

impl ThreadMessage {
    pub fn new(parent_id: Option<MessageId>, role: MessageRole, content: Vec<ContentPart>) -> Self {
        let status = (role == MessageRole::Assistant).then_some(MessageStatus::Complete {
            reason: CompleteReason::Stop,
        });
        Self {
            id: MessageId::new(),
            parent_id,
            role,
            content,
            attachments: Vec::new(),
            status,
            created_at: Utc::now(),
        }
    }

    pub fn user_text(parent_id: Option<MessageId>, text: impl Into<String>) -> Self {
        Self::new(parent_id, MessageRole::User, vec![ContentPart::text(text)])
    }

    pub fn assistant_text(parent_id: Option<MessageId>, text: impl Into<String>) -> Self {
        Self::new(parent_id, MessageRole::Assistant, vec![ContentPart::text(text)])
    }

    pub fn system_text(parent_id: Option<MessageId>, text: impl Into<String>) -> Self {
        Self::new(parent_id, MessageRole::System, vec![ContentPart::text(text)])
    }

    /// An empty assistant message whose run has just started.
    pub fn assistant_running(parent_id: Option<MessageId>) -> Self {
        Self {
            status: Some(MessageStatus::Running),
            ..Self::new(parent_id, MessageRole::Assistant, Vec::new())
        }
    }

    pub fn with_id(mut self, id: MessageId) -> Self {
        self.id = id;
        self
    }

    pub fn with_status(mut self, status: MessageStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_attachments(mut self, attachments: Vec<Attachment>) -> Self {
        self.attachments = attachments;
        self
    }

    pub fn is_assistant(&self) -> bool {
        self.role == MessageRole::Assistant
    }

    /// True for an assistant message whose run is in progress.
    pub fn is_running(&self) -> bool {
        self.is_assistant() && matches!(self.status, Some(MessageStatus::Running))
    }

    pub fn text_content(&self) -> String {
        self.content
            .iter()
            .filter_map(|c| match c {
                ContentPart::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("")
    }

    pub fn tool_calls(&self) -> Vec<&ToolCallPart> {
        self.content
            .iter()
            .filter_map(|c| match c {
                ContentPart::ToolCall(tc) => Some(tc),
                _ => None,
            })
            .collect()
    }

    pub fn tool_call_mut(&mut self, tool_call_id: &ToolCallId) -> Option<&mut ToolCallPart> {
        self.content.iter_mut().find_map(|c| match c {
            ContentPart::ToolCall(tc) if &tc.tool_call_id == tool_call_id => Some(tc),
            _ => None,
        })
    }
}

impl ContentPart {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }
}
