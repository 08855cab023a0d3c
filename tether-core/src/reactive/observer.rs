//! Observers
//!
//! Observing a container turns it reactive. Each object or array carries a
//! hidden back-reference slot; attaching an [`Observer`] fills it, so a
//! container is observed at most once no matter how many times it is
//! reached. Observation is recursive: every container reachable from an
//! observed one is observed too.
//!
//! The observer owns the container-level [`Dep`]. Property deps announce
//! "this key changed"; the container dep announces "the shape of this
//! container changed" (a key was added, an array was mutated in place).

use crate::value::Value;

use super::dep::Dep;

/// The in-place mutating operations of an observable list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArrayMethod {
    Push,
    Pop,
    Shift,
    Unshift,
    Splice,
    Sort,
    Reverse,
}

impl ArrayMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArrayMethod::Push => "push",
            ArrayMethod::Pop => "pop",
            ArrayMethod::Shift => "shift",
            ArrayMethod::Unshift => "unshift",
            ArrayMethod::Splice => "splice",
            ArrayMethod::Sort => "sort",
            ArrayMethod::Reverse => "reverse",
        }
    }
}

/// Structured description of an in-place array mutation, delivered to
/// subscribers of the array's container dep.
///
/// `args` follow the operation's own argument shape:
///
/// - `push` / `unshift`: the inserted items
/// - `pop` / `shift` / `sort` / `reverse`: empty
/// - `splice`: `[start, deleted_count, ...inserted]`, with `start` and
///   `deleted_count` already clamped to the array bounds
#[derive(Debug, Clone)]
pub struct Mutation {
    pub array_id: u64,
    pub method: ArrayMethod,
    pub args: Vec<Value>,
}

/// The reactive back-reference carried by an observed container.
#[derive(Debug, Default)]
pub struct Observer {
    dep: Dep,
}

impl Observer {
    pub(crate) fn new() -> Self {
        Self { dep: Dep::new() }
    }

    /// The container-level dep.
    pub fn dep(&self) -> &Dep {
        &self.dep
    }
}

/// Observe `value` (and everything reachable from it) if it is a container.
///
/// Idempotent: containers that already carry an observer are left alone,
/// which also terminates the walk on cyclic data.
pub fn observe(value: &Value) {
    match value {
        Value::Object(obj) => {
            if obj.attach_observer() {
                for (_, child) in obj.entries_untracked() {
                    observe(&child);
                }
            }
        }
        Value::Array(arr) => {
            if arr.attach_observer() {
                for child in arr.to_vec_untracked() {
                    observe(&child);
                }
            }
        }
        _ => {}
    }
}

/// Whether `value` is a container that has been observed.
pub fn is_observed(value: &Value) -> bool {
    match value {
        Value::Object(obj) => obj.observer().is_some(),
        Value::Array(arr) => arr.observer().is_some(),
        _ => false,
    }
}

/// Register the container dep of `value` with the current evaluation.
pub(crate) fn depend_container(value: &Value) {
    match value {
        Value::Object(obj) => {
            if let Some(observer) = obj.observer() {
                observer.dep().depend();
            }
        }
        Value::Array(arr) => {
            if let Some(observer) = arr.observer() {
                observer.dep().depend();
            }
        }
        _ => {}
    }
}
