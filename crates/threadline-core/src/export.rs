use serde::{Deserialize, Serialize};

use crate::ids::MessageId;
use crate::messages::ThreadMessage;

/// Serializable snapshot of a whole message tree, every branch included.
///
/// Messages are listed so that a parent always precedes its children.
/// `head_id` names the leaf of the active path (`None` for an empty thread).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ExportedMessageRepository {
    pub head_id: Option<MessageId>,
    pub messages: Vec<ThreadMessage>,
}

impl ExportedMessageRepository {
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}
