//! Reactive Objects
//!
//! An [`Object`] is an ordered string-keyed map whose properties each carry
//! a [`Dep`]. Reads register the property's dep with the evaluating watcher;
//! writes notify it. A property may instead be backed by a [`Computed`],
//! in which case reads evaluate the computed and writes are refused.
//!
//! Objects start out plain. Tracking and notification only happen once the
//! object has been observed (see [`observe`](super::observe)).

use std::cell::{OnceCell, RefCell};
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use tracing::warn;

use crate::value::Value;

use super::computed::Computed;
use super::dep::Dep;
use super::observer::{depend_container, observe, Observer};
use super::subscriber::next_container_id;

/// A shared handle to a reactive object.
#[derive(Clone)]
pub struct Object {
    inner: Rc<ObjectInner>,
}

struct ObjectInner {
    id: u64,
    props: RefCell<IndexMap<String, Slot>>,
    observer: OnceCell<Observer>,
}

struct Slot {
    value: Value,
    dep: Dep,
    computed: Option<Computed>,
}

impl Slot {
    fn new(value: Value) -> Self {
        Self {
            value,
            dep: Dep::new(),
            computed: None,
        }
    }
}

impl Object {
    /// Create an empty, unobserved object.
    pub fn new() -> Self {
        Self {
            inner: Rc::new(ObjectInner {
                id: next_container_id(),
                props: RefCell::new(IndexMap::new()),
                observer: OnceCell::new(),
            }),
        }
    }

    /// Create an unobserved object from key/value pairs.
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
    {
        let obj = Self::new();
        {
            let mut props = obj.inner.props.borrow_mut();
            for (key, value) in pairs {
                props.insert(key.into(), Slot::new(value.into()));
            }
        }
        obj
    }

    pub fn id(&self) -> u64 {
        self.inner.id
    }

    pub fn ptr_eq(&self, other: &Object) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn observer(&self) -> Option<&Observer> {
        self.inner.observer.get()
    }

    /// Attach an observer. Returns `false` if one was already attached.
    pub(crate) fn attach_observer(&self) -> bool {
        self.inner.observer.set(Observer::new()).is_ok()
    }

    pub fn len(&self) -> usize {
        self.inner.props.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.inner.props.borrow().contains_key(key)
    }

    pub fn keys(&self) -> Vec<String> {
        self.inner.props.borrow().keys().cloned().collect()
    }

    /// Read a property, registering the dependency.
    ///
    /// Reading a missing key depends on the container dep, so the reader is
    /// re-run if the key is added later.
    pub fn get(&self, key: &str) -> Value {
        let found = {
            let props = self.inner.props.borrow();
            props
                .get(key)
                .map(|slot| (slot.value.clone(), slot.dep.clone(), slot.computed.clone()))
        };

        let observed = self.observer();
        match found {
            Some((_, _, Some(computed))) => computed.get(),
            Some((value, dep, None)) => {
                if observed.is_some() {
                    dep.depend();
                    depend_container(&value);
                }
                value
            }
            None => {
                if let Some(observer) = observed {
                    observer.dep().depend();
                }
                Value::Undefined
            }
        }
    }

    /// Read a property without registering a dependency.
    pub fn get_untracked(&self, key: &str) -> Value {
        let computed = {
            let props = self.inner.props.borrow();
            match props.get(key) {
                Some(Slot {
                    computed: Some(computed),
                    ..
                }) => computed.clone(),
                Some(slot) => return slot.value.clone(),
                None => return Value::Undefined,
            }
        };
        computed.peek()
    }

    /// All stored entries, without tracking. Computed properties are
    /// reported with their current value.
    pub fn entries_untracked(&self) -> Vec<(String, Value)> {
        let keys = self.keys();
        keys.into_iter()
            .map(|key| {
                let value = self.get_untracked(&key);
                (key, value)
            })
            .collect()
    }

    /// Write a property.
    ///
    /// Writing an identical value is a no-op. On an observed object the
    /// property's dep is notified after the new value has been stored and
    /// observed; adding a new key notifies the container dep instead.
    pub fn set(&self, key: &str, value: Value) {
        let existing = {
            let props = self.inner.props.borrow();
            props
                .get(key)
                .map(|slot| (slot.value.clone(), slot.dep.clone(), slot.computed.is_some()))
        };

        match existing {
            Some((_, _, true)) => {
                warn!(key, "cannot assign to computed property");
            }
            Some((current, dep, false)) => {
                if current == value {
                    return;
                }
                let observed = self.observer().is_some();
                if observed {
                    dep.before_notify();
                }
                if let Some(slot) = self.inner.props.borrow_mut().get_mut(key) {
                    slot.value = value.clone();
                }
                if observed {
                    observe(&value);
                    dep.notify(None);
                }
            }
            None => {
                self.inner
                    .props
                    .borrow_mut()
                    .insert(key.to_string(), Slot::new(value.clone()));
                if let Some(observer) = self.observer() {
                    observe(&value);
                    observer.dep().before_notify();
                    observer.dep().notify(None);
                }
            }
        }
    }

    /// Remove a property, notifying readers of it and of the container.
    pub fn remove(&self, key: &str) -> Option<Value> {
        let removed = self.inner.props.borrow_mut().shift_remove(key)?;
        if let Some(observer) = self.observer() {
            removed.dep.notify(None);
            observer.dep().notify(None);
        }
        Some(removed.value)
    }

    /// Back `key` with a computed property.
    pub fn define_computed(&self, key: &str, computed: Computed) {
        let mut props = self.inner.props.borrow_mut();
        let slot = props
            .entry(key.to_string())
            .or_insert_with(|| Slot::new(Value::Undefined));
        slot.computed = Some(computed);
    }

    /// The computed property backing `key`, if any.
    pub fn computed(&self, key: &str) -> Option<Computed> {
        self.inner
            .props
            .borrow()
            .get(key)
            .and_then(|slot| slot.computed.clone())
    }

    /// The dep guarding `key`, if the key exists.
    pub fn dep(&self, key: &str) -> Option<Dep> {
        self.inner.props.borrow().get(key).map(|slot| slot.dep.clone())
    }
}

impl Default for Object {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Object({})", Value::Object(self.clone()).to_json())
    }
}
