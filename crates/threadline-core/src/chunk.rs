use serde::{Deserialize, Serialize};

use crate::ids::ToolCallId;

/// Incremental update for the assistant message of an active run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum AssistantStreamChunk {
    TextDelta { text_delta: String },
    ReasoningDelta { text_delta: String },
    ToolCallBegin { tool_call_id: ToolCallId, tool_name: String },
    ToolCallDelta { tool_call_id: ToolCallId, args_text_delta: String },
    ToolResult { tool_call_id: ToolCallId, result: serde_json::Value },
    ToolArtifact { tool_call_id: ToolCallId, artifact: serde_json::Value },
    Data { data: serde_json::Value },
    /// Ends the run with an error status.
    Error { error: String },
}

impl AssistantStreamChunk {
    pub fn text(delta: impl Into<String>) -> Self {
        Self::TextDelta {
            text_delta: delta.into(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Error { .. })
    }
}
