//! Watcher Implementation
//!
//! A Watcher pairs a getter with a callback and keeps track of the deps the
//! getter read the last time it ran.
//!
//! # How Watchers Work
//!
//! 1. When created, the watcher runs its getter inside a collector frame,
//!    which records every dep the getter reads.
//!
//! 2. After the getter returns, the watcher diffs the recorded deps against
//!    the previous set: new deps get a subscription, deps that were not read
//!    this time lose theirs. The post-evaluation set is exactly what was
//!    read.
//!
//! 3. When a subscribed dep notifies, the watcher re-runs its getter and
//!    invokes the callback with the new and old values if they differ.
//!    Containers always count as changed (they may have been mutated in
//!    place), as does anything watched in deep mode.
//!
//! # Deep Mode
//!
//! A deep watcher also walks the value it produced and depends on every
//! nested container and property, so a change anywhere inside fires it.
//! Before such a change lands, deps call `before_notify`, letting the
//! watcher keep a deep copy of the old value for its callback.
//!
//! # Lazy Mode
//!
//! Lazy watchers back computed properties: a notification only marks them
//! dirty and runs the callback; the getter re-runs on the next `evaluate`.

use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::fmt;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;

use crate::value::Value;

use super::context::ReactiveContext;
use super::dep::Dep;
use super::observer::{depend_container, Mutation};
use super::subscriber::{DepId, WatcherId};

/// Callback invoked with `(new, old, mutation)` when the watched value changes.
pub type Callback = Rc<dyn Fn(&Value, &Value, Option<&Mutation>)>;

type Getter = Box<dyn Fn() -> Value>;
type Setter = Rc<dyn Fn(Value)>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Shallow,
    Deep,
    Lazy,
}

/// A getter evaluated under dependency tracking, with a change callback.
///
/// Cloning a watcher yields another handle to the same watcher.
#[derive(Clone)]
pub struct Watcher {
    inner: Rc<WatcherInner>,
}

pub(crate) struct WatcherInner {
    id: WatcherId,

    /// Expression source, kept for diagnostics.
    expression: String,

    getter: Getter,

    setter: RefCell<Option<Setter>>,

    callback: Callback,

    mode: Mode,

    /// Last value produced by the getter.
    value: RefCell<Value>,

    /// Deep copy of the value taken just before a change (deep mode only).
    snapshot: RefCell<Option<Value>>,

    /// Deps read during the last evaluation.
    deps: RefCell<IndexMap<DepId, Dep>>,

    /// Lazy watchers only: the cached value is stale.
    dirty: Cell<bool>,

    /// Cleared by `teardown`.
    active: Cell<bool>,

    /// Number of times the getter has run.
    run_count: Cell<usize>,
}

impl Watcher {
    /// Create a watcher and evaluate it immediately.
    pub fn new<G, C>(expression: impl Into<String>, getter: G, callback: C) -> Self
    where
        G: Fn() -> Value + 'static,
        C: Fn(&Value, &Value, Option<&Mutation>) + 'static,
    {
        Self::build(expression.into(), Box::new(getter), Rc::new(callback), Mode::Shallow)
    }

    /// Create a deep watcher and evaluate it immediately.
    pub fn deep<G, C>(expression: impl Into<String>, getter: G, callback: C) -> Self
    where
        G: Fn() -> Value + 'static,
        C: Fn(&Value, &Value, Option<&Mutation>) + 'static,
    {
        Self::build(expression.into(), Box::new(getter), Rc::new(callback), Mode::Deep)
    }

    /// Create a lazy watcher. The getter does not run until [`evaluate`].
    ///
    /// The callback runs (with `undefined` values) each time the watcher
    /// becomes dirty.
    ///
    /// [`evaluate`]: Watcher::evaluate
    pub fn lazy<G, C>(expression: impl Into<String>, getter: G, callback: C) -> Self
    where
        G: Fn() -> Value + 'static,
        C: Fn(&Value, &Value, Option<&Mutation>) + 'static,
    {
        Self::build(expression.into(), Box::new(getter), Rc::new(callback), Mode::Lazy)
    }

    fn build(expression: String, getter: Getter, callback: Callback, mode: Mode) -> Self {
        let watcher = Self {
            inner: Rc::new(WatcherInner {
                id: WatcherId::new(),
                expression,
                getter,
                setter: RefCell::new(None),
                callback,
                mode,
                value: RefCell::new(Value::Undefined),
                snapshot: RefCell::new(None),
                deps: RefCell::new(IndexMap::new()),
                dirty: Cell::new(mode == Mode::Lazy),
                active: Cell::new(true),
                run_count: Cell::new(0),
            }),
        };

        if mode != Mode::Lazy {
            let value = watcher.get();
            *watcher.inner.value.borrow_mut() = value;
        }
        watcher
    }

    pub(crate) fn downgrade(&self) -> Weak<WatcherInner> {
        Rc::downgrade(&self.inner)
    }

    pub(crate) fn upgrade(weak: &Weak<WatcherInner>) -> Option<Self> {
        weak.upgrade().map(|inner| Self { inner })
    }

    pub fn id(&self) -> WatcherId {
        self.inner.id
    }

    pub fn expression(&self) -> &str {
        &self.inner.expression
    }

    pub fn is_deep(&self) -> bool {
        self.inner.mode == Mode::Deep
    }

    /// The value produced by the last evaluation.
    pub fn value(&self) -> Value {
        self.inner.value.borrow().clone()
    }

    /// Attach a setter used to write back through the watched expression.
    pub fn set_setter(&self, setter: impl Fn(Value) + 'static) {
        *self.inner.setter.borrow_mut() = Some(Rc::new(setter));
    }

    pub fn has_setter(&self) -> bool {
        self.inner.setter.borrow().is_some()
    }

    /// Write `value` through the setter. Without a setter this does nothing.
    pub fn set(&self, value: Value) {
        let setter = self.inner.setter.borrow().clone();
        if let Some(setter) = setter {
            setter(value);
        }
    }

    /// Run the getter under tracking and adopt the deps it read.
    fn get(&self) -> Value {
        let inner = &self.inner;
        let (value, deps) = {
            let _ctx = ReactiveContext::enter(inner.id);
            let value = (inner.getter)();
            if inner.mode == Mode::Deep {
                traverse(&value);
            }
            (value, ReactiveContext::take_dependencies())
        };
        inner.run_count.set(inner.run_count.get() + 1);
        self.adopt_dependencies(deps);
        value
    }

    /// Subscribe to newly read deps and unsubscribe from dropped ones.
    fn adopt_dependencies(&self, new_deps: IndexMap<DepId, Dep>) {
        if !self.inner.active.get() {
            return;
        }
        let old_deps = self.inner.deps.replace(IndexMap::new());
        for (id, dep) in &old_deps {
            if !new_deps.contains_key(id) {
                dep.remove_subscriber(self.inner.id);
            }
        }
        for (id, dep) in &new_deps {
            if !old_deps.contains_key(id) {
                dep.add_subscriber(self);
            }
        }
        *self.inner.deps.borrow_mut() = new_deps;
    }

    /// Lazy watchers: recompute if dirty, then return the cached value.
    /// Other watchers just return the cached value.
    pub fn evaluate(&self) -> Value {
        if self.inner.mode == Mode::Lazy && self.inner.dirty.get() && self.inner.active.get() {
            let value = self.get();
            *self.inner.value.borrow_mut() = value;
            self.inner.dirty.set(false);
        }
        self.value()
    }

    pub fn is_dirty(&self) -> bool {
        self.inner.dirty.get()
    }

    pub(crate) fn before_update(&self) {
        if self.inner.mode == Mode::Deep && self.inner.active.get() {
            let copy = self.inner.value.borrow().deep_copy();
            *self.inner.snapshot.borrow_mut() = Some(copy);
        }
    }

    /// Called by a dep this watcher subscribes to.
    pub(crate) fn update(&self, mutation: Option<&Mutation>) {
        let inner = &self.inner;
        if !inner.active.get() {
            return;
        }

        if inner.mode == Mode::Lazy {
            inner.dirty.set(true);
            let callback = inner.callback.clone();
            ReactiveContext::untracked(|| callback(&Value::Undefined, &Value::Undefined, mutation));
            return;
        }

        let new_value = self.get();
        let old_value = inner.value.replace(new_value.clone());
        let old_value = inner.snapshot.take().unwrap_or(old_value);

        let changed =
            new_value != old_value || new_value.is_container() || inner.mode == Mode::Deep;
        if changed && inner.active.get() {
            let callback = inner.callback.clone();
            ReactiveContext::untracked(|| callback(&new_value, &old_value, mutation));
        }
    }

    /// Stop reacting and unsubscribe from every dep. Idempotent.
    pub fn teardown(&self) {
        if !self.inner.active.replace(false) {
            return;
        }
        let deps = self.inner.deps.take();
        for dep in deps.values() {
            dep.remove_subscriber(self.inner.id);
        }
        self.inner.setter.borrow_mut().take();
    }

    pub fn is_active(&self) -> bool {
        self.inner.active.get()
    }

    /// Number of times the getter has run.
    pub fn run_count(&self) -> usize {
        self.inner.run_count.get()
    }

    /// Number of deps read during the last evaluation.
    pub fn dependency_count(&self) -> usize {
        self.inner.deps.borrow().len()
    }

    /// Whether the last evaluation read `dep`.
    pub fn depends_on(&self, dep: &Dep) -> bool {
        self.inner.deps.borrow().contains_key(&dep.id())
    }
}

/// Depend on every container and property reachable from `value`.
///
/// The visited set lives for one top-level walk only, so re-entrant deep
/// evaluations (a computed read mid-walk) each get their own.
fn traverse(value: &Value) {
    fn walk(value: &Value, seen: &mut HashSet<u64>) {
        match value {
            Value::Object(obj) => {
                if !seen.insert(obj.id()) {
                    return;
                }
                depend_container(value);
                for key in obj.keys() {
                    let child = obj.get(&key);
                    walk(&child, seen);
                }
            }
            Value::Array(arr) => {
                if !seen.insert(arr.id()) {
                    return;
                }
                depend_container(value);
                for child in arr.to_vec_untracked() {
                    walk(&child, seen);
                }
            }
            _ => {}
        }
    }
    walk(value, &mut HashSet::new());
}

impl fmt::Debug for Watcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Watcher")
            .field("expression", &self.inner.expression)
            .field("run_count", &self.run_count())
            .field("dependency_count", &self.dependency_count())
            .field("active", &self.is_active())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::{observe, Array, Object};
    use serde_json::json;

    fn observed(json: serde_json::Value) -> Object {
        let value = Value::from(json);
        observe(&value);
        value.as_object().cloned().unwrap()
    }

    fn counter() -> (Rc<Cell<i32>>, impl Fn(&Value, &Value, Option<&Mutation>)) {
        let count = Rc::new(Cell::new(0));
        let count_clone = count.clone();
        (count, move |_: &Value, _: &Value, _: Option<&Mutation>| {
            count_clone.set(count_clone.get() + 1)
        })
    }

    #[test]
    fn watcher_evaluates_on_creation() {
        let data = observed(json!({ "a": 1 }));
        let reader = data.clone();
        let watcher = Watcher::new("a", move || reader.get("a"), |_, _, _| {});

        assert_eq!(watcher.run_count(), 1);
        assert_eq!(watcher.value(), Value::from(1));
        assert_eq!(watcher.dependency_count(), 1);
    }

    #[test]
    fn callback_receives_new_and_old() {
        let data = observed(json!({ "a": 1 }));
        let reader = data.clone();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let seen_clone = seen.clone();
        let _watcher = Watcher::new(
            "a",
            move || reader.get("a"),
            move |new, old, _| seen_clone.borrow_mut().push((new.clone(), old.clone())),
        );

        data.set("a", Value::from(2));
        assert_eq!(*seen.borrow(), vec![(Value::from(2), Value::from(1))]);
    }

    #[test]
    fn stale_dependencies_are_dropped() {
        let data = observed(json!({ "flag": true, "a": 1, "b": 2 }));
        let reader = data.clone();
        let (count, callback) = counter();
        let _watcher = Watcher::new(
            "flag ? a : b",
            move || {
                if reader.get("flag").is_truthy() {
                    reader.get("a")
                } else {
                    reader.get("b")
                }
            },
            callback,
        );

        data.set("flag", Value::from(false));
        assert_eq!(count.get(), 1);

        // `a` was read by the first evaluation but not the current one.
        data.set("a", Value::from(100));
        assert_eq!(count.get(), 1);

        data.set("b", Value::from(3));
        assert_eq!(count.get(), 2);
    }

    #[test]
    fn unchanged_result_does_not_fire() {
        let data = observed(json!({ "a": 1 }));
        let reader = data.clone();
        let (count, callback) = counter();
        let watcher = Watcher::new(
            "a > 0",
            move || Value::from(reader.get("a").to_number() > 0.0),
            callback,
        );

        data.set("a", Value::from(5));
        assert_eq!(watcher.run_count(), 2);
        assert_eq!(count.get(), 0);
    }

    #[test]
    fn teardown_unsubscribes() {
        let data = observed(json!({ "a": 1 }));
        let reader = data.clone();
        let (count, callback) = counter();
        let watcher = Watcher::new("a", move || reader.get("a"), callback);

        watcher.teardown();
        watcher.teardown();
        assert!(!watcher.is_active());
        assert_eq!(data.dep("a").unwrap().subscriber_count(), 0);

        data.set("a", Value::from(2));
        assert_eq!(count.get(), 0);
    }

    #[test]
    fn shallow_watch_ignores_nested_changes() {
        let data = observed(json!({ "items": [{ "text": "a" }] }));
        let reader = data.clone();
        let (count, callback) = counter();
        let _watcher = Watcher::new("items", move || reader.get("items"), callback);

        let items = data.get_untracked("items");
        let first = items.as_array().unwrap().get_untracked(0);
        first.as_object().unwrap().set("text", Value::from("b"));
        assert_eq!(count.get(), 0);
    }

    #[test]
    fn deep_watch_sees_nested_changes_with_old_snapshot() {
        let data = observed(json!({ "items": [{ "text": "a" }] }));
        let reader = data.clone();
        let old_seen = Rc::new(RefCell::new(Value::Undefined));
        let old_clone = old_seen.clone();
        let _watcher = Watcher::deep(
            "items",
            move || reader.get("items"),
            move |_, old, _| *old_clone.borrow_mut() = old.clone(),
        );

        let items = data.get_untracked("items");
        let first = items.as_array().unwrap().get_untracked(0);
        first.as_object().unwrap().set("text", Value::from("b"));

        assert_eq!(old_seen.borrow().to_json(), json!([{ "text": "a" }]));
    }

    #[test]
    fn deep_traversal_handles_cycles() {
        let arr = Array::new();
        arr.push([Value::from(arr.clone())]);
        observe(&Value::from(arr.clone()));
        let reader = arr.clone();
        let watcher = Watcher::deep("cycle", move || Value::from(reader.clone()), |_, _, _| {});
        assert_eq!(watcher.dependency_count(), 1);
    }

    #[test]
    fn lazy_watcher_defers_evaluation() {
        let data = observed(json!({ "a": 1 }));
        let reader = data.clone();
        let (dirty_count, callback) = counter();
        let watcher = Watcher::lazy("a * 2", move || Value::from(reader.get("a").to_number() * 2.0), callback);

        assert_eq!(watcher.run_count(), 0);
        assert_eq!(watcher.evaluate(), Value::from(2));
        assert_eq!(watcher.run_count(), 1);

        data.set("a", Value::from(5));
        assert!(watcher.is_dirty());
        assert_eq!(dirty_count.get(), 1);
        assert_eq!(watcher.evaluate(), Value::from(10));
    }

    #[test]
    fn setter_writes_back() {
        let data = observed(json!({ "a": 1 }));
        let reader = data.clone();
        let writer = data.clone();
        let watcher = Watcher::new("a", move || reader.get("a"), |_, _, _| {});
        watcher.set_setter(move |value| writer.set("a", value));

        watcher.set(Value::from(9));
        assert_eq!(data.get_untracked("a"), Value::from(9));
        assert_eq!(watcher.value(), Value::from(9));
    }
}
