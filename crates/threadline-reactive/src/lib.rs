//! Subscription primitives for derived conversation state.
//!
//! Everything here composes one contract, [`Subscribable`]: read the current
//! snapshot, subscribe a change callback, drop the returned [`Subscription`]
//! to unsubscribe. Variants wrap each other rather than inherit:
//!
//! - [`Store`]: a plain value holder.
//! - [`ShallowMemoizeSubject`]: a derived value recomputed once per source
//!   snapshot and kept referentially stable while its shape is unchanged.
//! - [`NestedSubscriptionSubject`]: a store whose value is itself a store,
//!   flattened into a single subscription.
//! - [`CombinedSubject`]: one value selected from two sources.
//! - [`StateWatcher`]: a tokio `watch` bridge for async consumers.
//!
//! Snapshots are identity-comparable: sources hand out `Arc`s and a new
//! `Arc` means "possibly changed". Listeners always run with no internal lock
//! held, so a callback may read state, subscribe or unsubscribe re-entrantly.

mod combined;
mod memoize;
mod nested;
mod shallow;
mod store;
mod subject;
mod subscribable;
mod watch;

pub use combined::CombinedSubject;
pub use memoize::ShallowMemoizeSubject;
pub use nested::NestedSubscriptionSubject;
pub use shallow::ShallowEq;
pub use store::Store;
pub use subscribable::{listener, Listener, Subscribable, Subscription};
pub use watch::{watch, StateStream, StateWatcher};
