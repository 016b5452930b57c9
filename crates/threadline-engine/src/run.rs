//! Assistant run progress: folding stream chunks into the running message,
//! and driving a chunk stream to completion.

use futures::{Stream, StreamExt};
use threadline_core::{
    AssistantStreamChunk, ContentPart, MessageId, MessageStatus, RuntimeError, ThreadMessage,
    ToolCallId, ToolCallPart,
};
use tracing::{debug, instrument};

use crate::thread::LocalThreadCore;

/// Fold one chunk into `message`. Consecutive text (or reasoning) deltas
/// extend the trailing part instead of opening a new one.
pub(crate) fn apply_chunk(
    message: &mut ThreadMessage,
    chunk: AssistantStreamChunk,
) -> Result<(), RuntimeError> {
    match chunk {
        AssistantStreamChunk::TextDelta { text_delta } => match message.content.last_mut() {
            Some(ContentPart::Text { text }) => text.push_str(&text_delta),
            _ => message.content.push(ContentPart::Text { text: text_delta }),
        },
        AssistantStreamChunk::ReasoningDelta { text_delta } => match message.content.last_mut() {
            Some(ContentPart::Reasoning { text }) => text.push_str(&text_delta),
            _ => message.content.push(ContentPart::Reasoning { text: text_delta }),
        },
        AssistantStreamChunk::ToolCallBegin {
            tool_call_id,
            tool_name,
        } => message.content.push(ContentPart::ToolCall(ToolCallPart {
            tool_call_id,
            tool_name,
            args_text: String::new(),
            result: None,
            artifact: None,
            is_error: false,
        })),
        AssistantStreamChunk::ToolCallDelta {
            tool_call_id,
            args_text_delta,
        } => tool_call(message, &tool_call_id)?
            .args_text
            .push_str(&args_text_delta),
        AssistantStreamChunk::ToolResult {
            tool_call_id,
            result,
        } => tool_call(message, &tool_call_id)?.result = Some(result),
        AssistantStreamChunk::ToolArtifact {
            tool_call_id,
            artifact,
        } => tool_call(message, &tool_call_id)?.artifact = Some(artifact),
        AssistantStreamChunk::Data { data } => message.content.push(ContentPart::Data { data }),
        AssistantStreamChunk::Error { error } => {
            message.status = Some(MessageStatus::Error { error });
        }
    }
    Ok(())
}

fn tool_call<'a>(
    message: &'a mut ThreadMessage,
    tool_call_id: &ToolCallId,
) -> Result<&'a mut ToolCallPart, RuntimeError> {
    let message_id = message.id.clone();
    message
        .tool_call_mut(tool_call_id)
        .ok_or_else(|| RuntimeError::ToolCallNotFound {
            message_id,
            tool_call_id: tool_call_id.clone(),
        })
}

/// How a driven run ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RunOutcome {
    Completed,
    Errored,
    /// The run stopped being the active run (cancelled, superseded or
    /// imported over) before the stream ended.
    Interrupted,
}

/// Feed `chunks` into the run `run_id` until the stream ends, an error chunk
/// arrives, or the run is no longer active. Completes the run on a clean end.
#[instrument(skip(core, chunks), fields(run_id = %run_id))]
pub async fn drive_run<S>(
    core: &LocalThreadCore,
    run_id: &MessageId,
    chunks: S,
) -> Result<RunOutcome, RuntimeError>
where
    S: Stream<Item = AssistantStreamChunk>,
{
    futures::pin_mut!(chunks);
    while let Some(chunk) = chunks.next().await {
        if core.active_run().as_ref() != Some(run_id) {
            debug!("run no longer active, dropping stream");
            return Ok(RunOutcome::Interrupted);
        }
        let terminal = chunk.is_terminal();
        core.apply_chunk(chunk)?;
        if terminal {
            return Ok(RunOutcome::Errored);
        }
    }
    if core.active_run().as_ref() != Some(run_id) {
        return Ok(RunOutcome::Interrupted);
    }
    core.finish_run()?;
    Ok(RunOutcome::Completed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn running() -> ThreadMessage {
        ThreadMessage::assistant_running(None)
    }

    #[test]
    fn text_deltas_coalesce() {
        let mut msg = running();
        apply_chunk(&mut msg, AssistantStreamChunk::text("Hel")).unwrap();
        apply_chunk(&mut msg, AssistantStreamChunk::text("lo")).unwrap();
        assert_eq!(msg.content, vec![ContentPart::text("Hello")]);
    }

    #[test]
    fn reasoning_then_text_opens_new_part() {
        let mut msg = running();
        apply_chunk(
            &mut msg,
            AssistantStreamChunk::ReasoningDelta {
                text_delta: "thinking".into(),
            },
        )
        .unwrap();
        apply_chunk(&mut msg, AssistantStreamChunk::text("answer")).unwrap();
        assert_eq!(msg.content.len(), 2);
        assert_eq!(msg.text_content(), "answer");
    }

    #[test]
    fn tool_call_lifecycle() {
        let mut msg = running();
        let id = ToolCallId::from_raw("t1");
        let chunks = vec![
            AssistantStreamChunk::ToolCallBegin {
                tool_call_id: id.clone(),
                tool_name: "search".into(),
            },
            AssistantStreamChunk::ToolCallDelta {
                tool_call_id: id.clone(),
                args_text_delta: r#"{"q":"#.into(),
            },
            AssistantStreamChunk::ToolCallDelta {
                tool_call_id: id.clone(),
                args_text_delta: r#""rust"}"#.into(),
            },
            AssistantStreamChunk::ToolResult {
                tool_call_id: id.clone(),
                result: json!(["hit"]),
            },
            AssistantStreamChunk::ToolArtifact {
                tool_call_id: id.clone(),
                artifact: json!({"raw": true}),
            },
        ];
        for chunk in chunks {
            apply_chunk(&mut msg, chunk).unwrap();
        }
        let call = msg.tool_calls()[0];
        assert_eq!(call.args().unwrap()["q"], "rust");
        assert_eq!(call.result, Some(json!(["hit"])));
        assert_eq!(call.artifact, Some(json!({"raw": true})));
    }

    #[test]
    fn delta_for_unknown_tool_call_fails() {
        let mut msg = running();
        let err = apply_chunk(
            &mut msg,
            AssistantStreamChunk::ToolCallDelta {
                tool_call_id: ToolCallId::from_raw("nope"),
                args_text_delta: "{}".into(),
            },
        )
        .unwrap_err();
        assert_eq!(err.error_kind(), "tool_call_not_found");
    }

    #[test]
    fn error_chunk_sets_status() {
        let mut msg = running();
        apply_chunk(
            &mut msg,
            AssistantStreamChunk::Error {
                error: "rate limited".into(),
            },
        )
        .unwrap();
        assert_eq!(
            msg.status,
            Some(MessageStatus::Error {
                error: "rate limited".into()
            })
        );
    }

    fn started() -> (LocalThreadCore, MessageId) {
        use threadline_core::{AppendMessage, MessageRole, ThreadRuntimeCore};
        let core = LocalThreadCore::new(crate::LocalThreadConfig::default());
        core.append(AppendMessage {
            parent_id: None,
            role: MessageRole::User,
            content: vec![ContentPart::text("hi")],
            attachments: Vec::new(),
        })
        .unwrap();
        let run_id = core.active_run().unwrap();
        (core, run_id)
    }

    #[tokio::test]
    async fn drive_run_completes_clean_stream() {
        use threadline_reactive::Subscribable;
        let (core, run_id) = started();
        let chunks = futures::stream::iter(vec![
            AssistantStreamChunk::text("Hello, "),
            AssistantStreamChunk::text("world"),
        ]);
        let outcome = drive_run(&core, &run_id, chunks).await.unwrap();
        assert_eq!(outcome, RunOutcome::Completed);

        let state = core.get_state();
        assert_eq!(state.messages[1].text_content(), "Hello, world");
        assert!(!state.is_running());
    }

    #[tokio::test]
    async fn drive_run_stops_on_error_chunk() {
        let (core, run_id) = started();
        let chunks = futures::stream::iter(vec![
            AssistantStreamChunk::Error { error: "overloaded".into() },
            AssistantStreamChunk::text("never applied"),
        ]);
        assert_eq!(
            drive_run(&core, &run_id, chunks).await.unwrap(),
            RunOutcome::Errored
        );
        assert_eq!(core.active_run(), None);
    }

    #[tokio::test]
    async fn drive_run_yields_to_cancellation() {
        use threadline_core::ThreadRuntimeCore;
        let (core, run_id) = started();
        core.cancel_run();
        let chunks = futures::stream::iter(vec![AssistantStreamChunk::text("late")]);
        assert_eq!(
            drive_run(&core, &run_id, chunks).await.unwrap(),
            RunOutcome::Interrupted
        );
    }

    #[test]
    fn data_chunk_appends_part() {
        let mut msg = running();
        apply_chunk(&mut msg, AssistantStreamChunk::Data { data: json!(1) }).unwrap();
        assert_eq!(msg.content, vec![ContentPart::Data { data: json!(1) }]);
    }
}
