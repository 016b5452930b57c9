use std::fmt;
use std::sync::Arc;

use threadline_core::{
    AddToolResultOptions, FeedbackType, MessageId, RuntimeError, SpeechHandle,
    SubmitFeedbackOptions, ThreadMessage, ThreadSnapshot, ToolCallId,
};
use threadline_reactive::{Listener, ShallowEq, Subscribable, Subscription};
use tracing::warn;

use crate::binding::ThreadRuntimeCoreBinding;
use crate::reload::ReloadAction;
use crate::thread::{StateSubject, ThreadRuntime};

/// Derived state of one active-path position.
#[derive(Clone, Debug, PartialEq)]
pub struct MessageState {
    pub message: Arc<ThreadMessage>,
    pub index: usize,
    pub is_last: bool,
    /// Id of the previous active-path message; `None` at index 0.
    pub parent_id: Option<MessageId>,
    /// This message and its siblings, in creation order.
    pub branches: Arc<[MessageId]>,
    /// 1-based position of this message in `branches`.
    pub branch_number: usize,
    pub branch_count: usize,
}

impl ShallowEq for MessageState {
    fn shallow_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.message, &other.message)
            && Arc::ptr_eq(&self.branches, &other.branches)
            && self.index == other.index
            && self.is_last == other.is_last
            && self.parent_id.shallow_eq(&other.parent_id)
            && self.branch_number == other.branch_number
            && self.branch_count == other.branch_count
    }
}

impl MessageState {
    fn derive(
        binding: &ThreadRuntimeCoreBinding,
        snapshot: &ThreadSnapshot,
        index: usize,
    ) -> Option<Arc<Self>> {
        let message = snapshot.messages.get(index)?;
        let branches = match binding.get_state().get_branches(&message.id) {
            Ok(branches) => branches,
            Err(e) => {
                warn!(message_id = %message.id, error = %e, "branch lookup failed");
                return None;
            }
        };
        let Some(position) = branches.iter().position(|id| id == &message.id) else {
            warn!(message_id = %message.id, "message missing from its own branches");
            return None;
        };
        let parent_id = index
            .checked_sub(1)
            .and_then(|prev| snapshot.messages.get(prev))
            .map(|m| m.id.clone());

        Some(Arc::new(Self {
            message: Arc::clone(message),
            index,
            is_last: index + 1 == snapshot.messages.len(),
            parent_id,
            branch_count: branches.len(),
            branch_number: position + 1,
            branches,
        }))
    }
}

/// Which sibling to move to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BranchSelector {
    Previous,
    Next,
    Id(MessageId),
}

/// Sub-runtime bound to one active-path index.
///
/// State is `None` while the path is shorter than the index. Operations act
/// on whichever message sits at the index when they are called.
#[derive(Clone)]
pub struct MessageRuntime {
    thread: ThreadRuntime,
    index: usize,
    state: StateSubject<Option<Arc<MessageState>>>,
}

impl MessageRuntime {
    pub(crate) fn new(thread: ThreadRuntime, index: usize) -> Self {
        let binding = Arc::clone(thread.binding());
        let state = thread.state_subject(move |snapshot: &Arc<ThreadSnapshot>| {
            MessageState::derive(&binding, snapshot, index)
        });
        Self {
            thread,
            index,
            state,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn thread(&self) -> &ThreadRuntime {
        &self.thread
    }

    /// How many times the message state has been recomputed.
    pub fn compute_count(&self) -> u64 {
        self.state.compute_count()
    }

    fn current(&self) -> Result<Arc<MessageState>, RuntimeError> {
        self.state
            .get_state()
            .ok_or(RuntimeError::MessageUnavailable { index: self.index })
    }

    pub fn reload(&self) -> Result<(), RuntimeError> {
        self.thread.reload_at(&self.current()?.message)
    }

    pub fn switch_to_branch(&self, selector: BranchSelector) -> Result<(), RuntimeError> {
        let state = self.current()?;
        let target = match selector {
            BranchSelector::Previous => state
                .branch_number
                .checked_sub(2)
                .and_then(|i| state.branches.get(i))
                .ok_or_else(|| RuntimeError::NoSuchBranch("previous".into()))?
                .clone(),
            BranchSelector::Next => state
                .branches
                .get(state.branch_number)
                .ok_or_else(|| RuntimeError::NoSuchBranch("next".into()))?
                .clone(),
            BranchSelector::Id(id) => {
                if !state.branches.contains(&id) {
                    return Err(RuntimeError::NoSuchBranch(id.to_string()));
                }
                id
            }
        };
        self.thread.switch_to_branch(&target)
    }

    pub fn speak(&self) -> Result<SpeechHandle, RuntimeError> {
        self.thread.speak(&self.current()?.message.id)
    }

    pub fn submit_feedback(&self, feedback: FeedbackType) -> Result<(), RuntimeError> {
        let message_id = self.current()?.message.id.clone();
        self.thread.submit_feedback(SubmitFeedbackOptions {
            message_id,
            feedback,
        })
    }

    pub fn add_tool_result(
        &self,
        tool_call_id: ToolCallId,
        result: serde_json::Value,
    ) -> Result<(), RuntimeError> {
        let message_id = self.current()?.message.id.clone();
        self.thread.add_tool_result(AddToolResultOptions {
            message_id,
            tool_call_id,
            result,
            is_error: false,
        })
    }

    /// Reload affordance for this position.
    pub fn reload_action(&self) -> ReloadAction {
        ReloadAction::new(self.thread.clone(), self.clone())
    }
}

impl Subscribable for MessageRuntime {
    type Snapshot = Option<Arc<MessageState>>;

    fn get_state(&self) -> Option<Arc<MessageState>> {
        self.state.get_state()
    }

    fn subscribe(&self, listener: Listener) -> Subscription {
        self.state.subscribe(listener)
    }
}

impl fmt::Debug for MessageRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageRuntime")
            .field("index", &self.index)
            .field("state", &self.get_state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(message: &Arc<ThreadMessage>, branches: &Arc<[MessageId]>) -> MessageState {
        MessageState {
            message: Arc::clone(message),
            index: 0,
            is_last: true,
            parent_id: None,
            branches: Arc::clone(branches),
            branch_number: 1,
            branch_count: branches.len(),
        }
    }

    #[test]
    fn shallow_eq_uses_pointer_identity() {
        let message = Arc::new(ThreadMessage::user_text(None, "hi"));
        let branches: Arc<[MessageId]> = Arc::from(vec![message.id.clone()]);
        let copy = Arc::new(ThreadMessage::clone(&message));

        assert!(state(&message, &branches).shallow_eq(&state(&message, &branches)));
        assert!(!state(&message, &branches).shallow_eq(&state(&copy, &branches)));

        let same_ids: Arc<[MessageId]> = Arc::from(vec![message.id.clone()]);
        assert!(!state(&message, &branches).shallow_eq(&state(&message, &same_ids)));
    }
}
