//! Dep Implementation
//!
//! A Dep is the subscription list attached to one reactive property, one
//! computed property, or one observed container.
//!
//! # How Deps Work
//!
//! 1. When a property is read while a watcher is evaluating, the property's
//!    dep records itself in the evaluation frame (`depend`).
//!
//! 2. When the watcher finishes evaluating, it subscribes to every dep it
//!    read for the first time and unsubscribes from deps it no longer reads.
//!
//! 3. When the property changes, the dep notifies every subscriber in
//!    subscription order, synchronously.
//!
//! Subscribers are held weakly: a watcher that was dropped without being
//! torn down is pruned the next time the dep notifies.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;

use super::context::ReactiveContext;
use super::observer::Mutation;
use super::subscriber::{DepId, WatcherId};
use super::watcher::{Watcher, WatcherInner};

/// The subscriber list of one reactive source.
#[derive(Clone)]
pub struct Dep {
    inner: Rc<DepInner>,
}

struct DepInner {
    id: DepId,
    /// Ordered and duplicate-free by construction.
    subscribers: RefCell<IndexMap<WatcherId, Weak<WatcherInner>>>,
}

impl Dep {
    pub fn new() -> Self {
        Self {
            inner: Rc::new(DepInner {
                id: DepId::new(),
                subscribers: RefCell::new(IndexMap::new()),
            }),
        }
    }

    pub fn id(&self) -> DepId {
        self.inner.id
    }

    /// Record this dep against the watcher currently evaluating, if any.
    pub fn depend(&self) {
        ReactiveContext::track_dependency(self);
    }

    pub(crate) fn add_subscriber(&self, watcher: &Watcher) {
        self.inner
            .subscribers
            .borrow_mut()
            .entry(watcher.id())
            .or_insert_with(|| watcher.downgrade());
    }

    pub(crate) fn remove_subscriber(&self, id: WatcherId) {
        self.inner.subscribers.borrow_mut().shift_remove(&id);
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.borrow().len()
    }

    pub fn has_subscriber(&self, id: WatcherId) -> bool {
        self.inner.subscribers.borrow().contains_key(&id)
    }

    fn live_subscribers(&self) -> Vec<Watcher> {
        let mut dead = Vec::new();
        let live = self
            .inner
            .subscribers
            .borrow()
            .iter()
            .filter_map(|(id, weak)| match Watcher::upgrade(weak) {
                Some(watcher) => Some(watcher),
                None => {
                    dead.push(*id);
                    None
                }
            })
            .collect();

        if !dead.is_empty() {
            let mut subscribers = self.inner.subscribers.borrow_mut();
            for id in dead {
                subscribers.shift_remove(&id);
            }
        }
        live
    }

    /// Give subscribers a chance to snapshot their value before a change.
    pub fn before_notify(&self) {
        for watcher in self.live_subscribers() {
            watcher.before_update();
        }
    }

    /// Notify every subscriber that the source changed.
    ///
    /// The subscriber list is copied first, so subscribers may subscribe,
    /// unsubscribe or mutate other reactive state from their callbacks.
    pub fn notify(&self, mutation: Option<&Mutation>) {
        for watcher in self.live_subscribers() {
            watcher.update(mutation);
        }
    }
}

impl Default for Dep {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Dep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dep")
            .field("id", &self.inner.id)
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;
    use std::cell::Cell;

    fn counting_watcher(dep: &Dep, hits: Rc<Cell<i32>>) -> Watcher {
        let dep = dep.clone();
        Watcher::new(
            "test",
            move || {
                dep.depend();
                Value::Undefined
            },
            move |_, _, _| hits.set(hits.get() + 1),
        )
    }

    #[test]
    fn depend_subscribes_the_evaluating_watcher() {
        let dep = Dep::new();
        let hits = Rc::new(Cell::new(0));
        let watcher = counting_watcher(&dep, hits.clone());

        assert_eq!(dep.subscriber_count(), 1);
        assert!(dep.has_subscriber(watcher.id()));
    }

    #[test]
    fn dep_never_holds_a_watcher_twice() {
        let dep = Dep::new();
        let reader = dep.clone();
        let watcher = Watcher::new(
            "twice",
            move || {
                reader.depend();
                reader.depend();
                Value::Undefined
            },
            |_, _, _| {},
        );

        dep.add_subscriber(&watcher);
        assert_eq!(dep.subscriber_count(), 1);
    }

    #[test]
    fn notify_runs_subscribers() {
        let dep = Dep::new();
        let hits = Rc::new(Cell::new(0));
        let _watcher = counting_watcher(&dep, hits.clone());

        dep.notify(None);
        // Undefined -> Undefined is not a change; the watcher re-evaluated
        // but did not fire.
        assert_eq!(hits.get(), 0);
    }

    #[test]
    fn dropped_watchers_are_pruned() {
        let dep = Dep::new();
        let hits = Rc::new(Cell::new(0));
        let watcher = counting_watcher(&dep, hits);
        drop(watcher);

        dep.notify(None);
        assert_eq!(dep.subscriber_count(), 0);
    }

    #[test]
    fn remove_subscriber_unsubscribes() {
        let dep = Dep::new();
        let hits = Rc::new(Cell::new(0));
        let watcher = counting_watcher(&dep, hits);

        dep.remove_subscriber(watcher.id());
        assert_eq!(dep.subscriber_count(), 0);
    }
}
