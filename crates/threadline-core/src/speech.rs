use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use threadline_reactive::{Listener, Store, Subscribable, Subscription};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SpeechState {
    Running,
    Ended { reason: SpeechEndReason },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpeechEndReason {
    Finished,
    Cancelled,
    Error(String),
}

/// Controller for one utterance. Observable; `cancel` is cooperative.
#[derive(Clone)]
pub struct SpeechHandle {
    status: Store<SpeechState>,
    cancel: Arc<dyn Fn() + Send + Sync>,
}

impl SpeechHandle {
    pub fn new(status: Store<SpeechState>, cancel: impl Fn() + Send + Sync + 'static) -> Self {
        Self {
            status,
            cancel: Arc::new(cancel),
        }
    }

    pub fn status(&self) -> SpeechState {
        self.status.get_state()
    }

    pub fn is_running(&self) -> bool {
        self.status() == SpeechState::Running
    }

    pub fn cancel(&self) {
        (self.cancel)();
    }
}

impl Subscribable for SpeechHandle {
    type Snapshot = SpeechState;

    fn get_state(&self) -> SpeechState {
        self.status.get_state()
    }

    fn subscribe(&self, listener: Listener) -> Subscription {
        self.status.subscribe(listener)
    }
}

impl fmt::Debug for SpeechHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpeechHandle")
            .field("status", &self.status())
            .finish()
    }
}

/// Text-to-speech backend.
pub trait SpeechSynthesisAdapter: Send + Sync {
    fn speak(&self, text: &str) -> SpeechHandle;
}
