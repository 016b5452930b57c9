//! Reactive facade over a conversational thread engine.
//!
//! [`ThreadRuntime`] binds to a [`ThreadRuntimeCoreBinding`] (the current
//! engine, swappable) and exposes derived, referentially stable state:
//! thread-level flags, per-position [`MessageRuntime`]s with branch
//! bookkeeping, the composer, and the reload affordance. All edits are
//! delegated to the engine.

mod append;
mod binding;
mod composer;
mod message;
mod reload;
mod thread;

pub use append::CreateAppendMessage;
pub use binding::ThreadRuntimeCoreBinding;
pub use composer::ThreadComposerRuntime;
pub use message::{BranchSelector, MessageRuntime, MessageState};
pub use reload::ReloadAction;
pub use thread::{ThreadRuntime, ThreadState};
