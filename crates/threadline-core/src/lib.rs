pub mod capabilities;
pub mod chunk;
pub mod contract;
pub mod errors;
pub mod export;
pub mod ids;
pub mod messages;
pub mod speech;

pub use capabilities::{ModelConfig, RuntimeCapabilities};
pub use chunk::AssistantStreamChunk;
pub use contract::{
    AddToolResultOptions, AppendMessage, ComposerRuntimeCore, ComposerState, FeedbackAdapter,
    FeedbackType, SubmitFeedbackOptions, ThreadRuntimeCore, ThreadSnapshot,
};
pub use errors::RuntimeError;
pub use export::ExportedMessageRepository;
pub use ids::{AttachmentId, MessageId, ThreadId, ToolCallId};
pub use messages::{
    Attachment, AttachmentKind, CompleteReason, ContentPart, MessageRole, MessageStatus,
    ThreadMessage, ToolCallPart,
};
pub use speech::{SpeechEndReason, SpeechHandle, SpeechState, SpeechSynthesisAdapter};
