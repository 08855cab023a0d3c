//! Computed Properties
//!
//! A Computed is a cached derived value that re-evaluates only when one of
//! the properties it read changes.
//!
//! # How Computed Properties Work
//!
//! 1. A computed owns a lazy [`Watcher`] and a [`Dep`] of its own.
//!
//! 2. The first read runs the getter under tracking and caches the result.
//!
//! 3. When a dependency changes, the watcher only marks itself dirty and
//!    the computed's own dep notifies whoever read the computed.
//!
//! 4. Those readers re-evaluate, read the computed again, and that read
//!    recomputes because the watcher is dirty.
//!
//! A computed that is never read never runs its getter.

use std::fmt;

use crate::value::Value;

use super::dep::Dep;
use super::watcher::Watcher;

/// A lazily evaluated, cached derived value.
#[derive(Clone)]
pub struct Computed {
    name: String,
    dep: Dep,
    watcher: Watcher,
}

impl Computed {
    pub fn new(name: impl Into<String>, getter: impl Fn() -> Value + 'static) -> Self {
        let name = name.into();
        let dep = Dep::new();
        let notify = dep.clone();
        let watcher = Watcher::lazy(name.clone(), getter, move |_, _, _| notify.notify(None));
        Self { name, dep, watcher }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Read the value, recomputing if dirty, and register this computed
    /// with the evaluating watcher.
    pub fn get(&self) -> Value {
        let value = self.watcher.evaluate();
        self.dep.depend();
        value
    }

    /// Read the value without registering a dependency.
    ///
    /// Still recomputes if dirty, so the result is never stale.
    pub fn peek(&self) -> Value {
        super::context::ReactiveContext::untracked(|| self.watcher.evaluate())
    }

    pub fn is_dirty(&self) -> bool {
        self.watcher.is_dirty()
    }

    pub fn dep(&self) -> &Dep {
        &self.dep
    }

    /// Number of times the getter has run.
    pub fn run_count(&self) -> usize {
        self.watcher.run_count()
    }

    /// Stop tracking. Later reads return the last cached value.
    pub fn teardown(&self) {
        self.watcher.teardown();
    }
}

impl fmt::Debug for Computed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Computed")
            .field("name", &self.name)
            .field("dirty", &self.is_dirty())
            .field("run_count", &self.run_count())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
