use threadline_core::{AppendMessage, Attachment, ContentPart, MessageId, MessageRole};

/// What a caller may pass to [`ThreadRuntime::append`](crate::ThreadRuntime::append).
#[derive(Clone, Debug, PartialEq)]
pub enum CreateAppendMessage {
    /// A user message with a single text part, appended after the last
    /// active-path message.
    Text(String),
    /// A partially specified message. Unset fields take the same defaults
    /// as [`Text`](Self::Text).
    Message {
        parent_id: Option<MessageId>,
        role: Option<MessageRole>,
        content: Vec<ContentPart>,
        attachments: Option<Vec<Attachment>>,
    },
}

impl CreateAppendMessage {
    /// Fill defaults against the current last active-path message.
    pub fn normalize(self, last_message_id: Option<&MessageId>) -> AppendMessage {
        match self {
            Self::Text(text) => AppendMessage {
                parent_id: last_message_id.cloned(),
                role: MessageRole::User,
                content: vec![ContentPart::text(text)],
                attachments: Vec::new(),
            },
            Self::Message {
                parent_id,
                role,
                content,
                attachments,
            } => AppendMessage {
                parent_id: parent_id.or_else(|| last_message_id.cloned()),
                role: role.unwrap_or(MessageRole::User),
                content,
                attachments: attachments.unwrap_or_default(),
            },
        }
    }
}

impl From<&str> for CreateAppendMessage {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<String> for CreateAppendMessage {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<AppendMessage> for CreateAppendMessage {
    fn from(message: AppendMessage) -> Self {
        Self::Message {
            parent_id: message.parent_id,
            role: Some(message.role),
            content: message.content,
            attachments: Some(message.attachments),
        }
    }
}
