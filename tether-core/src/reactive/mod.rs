//! Reactive Primitives
//!
//! This module implements the reactivity graph: observable objects and
//! lists, the deps attached to them, and the watchers that subscribe to
//! those deps.
//!
//! # Concepts
//!
//! ## Objects and Arrays
//!
//! [`Object`] and [`Array`] are shared containers. Once observed, every
//! property read inside a watcher's evaluation is recorded, and every
//! write or in-place list mutation notifies the watchers that read it.
//!
//! ## Deps
//!
//! A [`Dep`] is the subscriber list of one reactive source: one per
//! property, one per computed property, and one per observed container.
//!
//! ## Watchers
//!
//! A [`Watcher`] evaluates a getter, remembers exactly which deps it read,
//! and runs a callback when any of them changes. Bindings, explicit watches
//! and computed properties are all watchers.
//!
//! ## Computed Properties
//!
//! A [`Computed`] is a lazy watcher with a dep of its own, re-evaluated
//! only when read after one of its inputs changed.
//!
//! # Implementation Notes
//!
//! Everything here is single-threaded (`Rc` / `RefCell`). Notification is
//! synchronous and depth-first, in subscription order. No `RefCell` borrow
//! is held while a getter or callback runs, so callbacks may freely read
//! and write reactive state.

mod array;
mod computed;
mod context;
mod dep;
mod object;
mod observer;
mod subscriber;
mod watcher;

pub use array::Array;
pub use computed::Computed;
pub use context::ReactiveContext;
pub use dep::Dep;
pub use object::Object;
pub use observer::{is_observed, observe, ArrayMethod, Mutation, Observer};
pub use subscriber::{DepId, WatcherId};
pub use watcher::{Callback, Watcher};

