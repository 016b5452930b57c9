//! In-process thread engine: a [`ThreadRuntimeCore`](threadline_core::ThreadRuntimeCore)
//! backed by a branching message repository, its composer, and the
//! swappable slot a runtime binds to.

pub mod composer;
pub mod config;
pub mod error;
pub mod run;
pub mod slot;
pub mod thread;

pub use composer::LocalComposerCore;
pub use config::LocalThreadConfig;
pub use error::ConfigError;
pub use run::{drive_run, RunOutcome};
pub use slot::ThreadCoreSlot;
pub use thread::{LocalThreadAdapters, LocalThreadCore};
