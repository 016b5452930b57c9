use threadline_core::{MessageId, RuntimeError};

#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum RepositoryError {
    #[error("message not found: {0}")]
    NotFound(MessageId),

    #[error("parent {parent_id} of message {message_id} not found")]
    ParentNotFound {
        message_id: MessageId,
        parent_id: MessageId,
    },

    #[error("message {message_id} cannot move from parent {existing:?} to {requested:?}")]
    ParentMismatch {
        message_id: MessageId,
        existing: Option<MessageId>,
        requested: Option<MessageId>,
    },
}

impl From<RepositoryError> for RuntimeError {
    fn from(e: RepositoryError) -> Self {
        match e {
            RepositoryError::NotFound(id) => RuntimeError::MessageNotFound(id),
            other => RuntimeError::Repository(other.to_string()),
        }
    }
}
