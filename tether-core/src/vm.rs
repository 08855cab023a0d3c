//! View Model
//!
//! [`ViewModel`] is the public face of the runtime: it owns the reactive
//! data, compiles the template under its root element, and exposes
//! path-based reads and writes, watches and lifecycle control.
//!
//! # Lifecycle
//!
//! 1. [`ViewModel::new`] validates the root and the initial data, observes
//!    the data, snapshots it for [`reset`](ViewModel::reset), installs
//!    methods and computed properties, registers declarative watches and
//!    compiles the template (unless mounting is deferred).
//! 2. [`mount`](ViewModel::mount) compiles a deferred instance.
//! 3. [`destroy`](ViewModel::destroy) tears down every directive, watch and
//!    computed property. It is idempotent.
//!
//! Methods, computed getters, watch callbacks and structural hooks receive
//! the `ViewModel` as their first argument. They hold it weakly, so they
//! never keep an instance alive.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;
use tracing::{debug, error, warn};

use crate::compiler::{compile_root, CustomDirective, Hook, Host};
use crate::config::Config;
use crate::directive::Directive;
use crate::dom::{Dom, NodeId, NodeKind};
use crate::error::{Error, Result};
use crate::expr::{self, member};
use crate::reactive::{observe, Computed, Mutation, Object, ReactiveContext, Watcher};
use crate::scope::Scope;
use crate::value::{Function, Value};

/// A method callable from templates as `name(args)`.
pub type Method = Rc<dyn Fn(&ViewModel, &[Value]) -> Value>;

/// A computed property getter.
pub type ComputedGetter = Rc<dyn Fn(&ViewModel) -> Value>;

/// A watch callback, called with `(vm, new, old)`.
pub type WatchCallback = Rc<dyn Fn(&ViewModel, &Value, &Value)>;

/// A structural insert/remove hook, called with the block's element.
pub type LifecycleHook = Rc<dyn Fn(&ViewModel, NodeId)>;

struct DeclaredWatch {
    expression: String,
    callback: WatchCallback,
    deep: bool,
}

/// Construction options.
#[derive(Default)]
pub struct Options {
    data: Option<Value>,
    computed: IndexMap<String, ComputedGetter>,
    methods: IndexMap<String, Method>,
    watches: Vec<DeclaredWatch>,
    directives: IndexMap<String, CustomDirective>,
    on_insert: Option<LifecycleHook>,
    on_remove: Option<LifecycleHook>,
    lazy: bool,
    config: Config,
}

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    /// The initial scope. Must be an object.
    pub fn data(mut self, data: impl Into<Value>) -> Self {
        self.data = Some(data.into());
        self
    }

    pub fn computed(
        mut self,
        name: impl Into<String>,
        getter: impl Fn(&ViewModel) -> Value + 'static,
    ) -> Self {
        self.computed.insert(name.into(), Rc::new(getter));
        self
    }

    pub fn method(
        mut self,
        name: impl Into<String>,
        method: impl Fn(&ViewModel, &[Value]) -> Value + 'static,
    ) -> Self {
        self.methods.insert(name.into(), Rc::new(method));
        self
    }

    /// Register a watch, installed during construction.
    pub fn watch(
        mut self,
        expression: impl Into<String>,
        deep: bool,
        callback: impl Fn(&ViewModel, &Value, &Value) + 'static,
    ) -> Self {
        self.watches.push(DeclaredWatch {
            expression: expression.into(),
            callback: Rc::new(callback),
            deep,
        });
        self
    }

    /// Register a custom directive, used in templates as `<prefix><name>`.
    pub fn directive(
        mut self,
        name: impl Into<String>,
        update: impl Fn(&dyn Dom, NodeId, &Value, &Value) + 'static,
    ) -> Self {
        self.directives.insert(name.into(), Rc::new(update));
        self
    }

    pub fn on_insert(mut self, hook: impl Fn(&ViewModel, NodeId) + 'static) -> Self {
        self.on_insert = Some(Rc::new(hook));
        self
    }

    pub fn on_remove(mut self, hook: impl Fn(&ViewModel, NodeId) + 'static) -> Self {
        self.on_remove = Some(Rc::new(hook));
        self
    }

    /// Defer compilation until [`ViewModel::mount`].
    pub fn lazy(mut self, lazy: bool) -> Self {
        self.lazy = lazy;
        self
    }

    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }
}

impl fmt::Debug for Options {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Options")
            .field("data", &self.data)
            .field("computed", &self.computed.keys().collect::<Vec<_>>())
            .field("methods", &self.methods.keys().collect::<Vec<_>>())
            .field("watches", &self.watches.len())
            .field("directives", &self.directives.keys().collect::<Vec<_>>())
            .field("lazy", &self.lazy)
            .field("config", &self.config)
            .finish()
    }
}

/// Handle to a watch registered with [`ViewModel::watch`].
#[derive(Debug, Clone)]
pub struct WatchHandle {
    watcher: Watcher,
}

impl WatchHandle {
    /// Stop watching. Calling it again does nothing.
    pub fn unwatch(&self) {
        self.watcher.teardown();
    }

    pub fn is_active(&self) -> bool {
        self.watcher.is_active()
    }
}

/// A live, bound instance.
#[derive(Clone)]
pub struct ViewModel {
    inner: Rc<Inner>,
}

struct Inner {
    dom: Rc<dyn Dom>,
    root: NodeId,
    data: Object,
    scope: Scope,
    host: Rc<Host>,
    snapshot: Object,
    directives: RefCell<Vec<Directive>>,
    watchers: RefCell<Vec<Watcher>>,
    computed: RefCell<Vec<Computed>>,
    mounted: Cell<bool>,
    destroyed: Cell<bool>,
}

impl ViewModel {
    /// Bind `root` to `options`.
    ///
    /// Fails (and logs) when `root` is not an element or the data is not an
    /// object.
    pub fn new(dom: Rc<dyn Dom>, root: NodeId, options: Options) -> Result<Self> {
        Self::build(dom, root, options).map_err(|e| {
            error!(error = %e, "construction abandoned");
            e
        })
    }

    fn build(dom: Rc<dyn Dom>, root: NodeId, options: Options) -> Result<Self> {
        if dom.kind(root) != NodeKind::Element {
            return Err(Error::InvalidRoot);
        }
        let data = match options.data {
            None => Object::new(),
            Some(Value::Object(object)) => object,
            Some(other) => return Err(Error::InvalidScope(other.type_name())),
        };
        observe(&Value::Object(data.clone()));
        let snapshot = match Value::Object(data.clone()).deep_copy() {
            Value::Object(snapshot) => snapshot,
            _ => Object::new(),
        };

        let Options {
            computed,
            methods,
            watches,
            directives,
            on_insert,
            on_remove,
            lazy,
            config,
            ..
        } = options;
        let lazy = lazy || config.lazy;

        let inner = Rc::new_cyclic(|weak: &Weak<Inner>| {
            let host = Host::new(dom.clone(), config)
                .with_custom(directives)
                .with_hooks(
                    on_insert.map(|hook| bind_hook(weak.clone(), hook)),
                    on_remove.map(|hook| bind_hook(weak.clone(), hook)),
                );
            Inner {
                dom: dom.clone(),
                root,
                scope: Scope::root(data.clone()),
                data,
                host: Rc::new(host),
                snapshot,
                directives: RefCell::new(Vec::new()),
                watchers: RefCell::new(Vec::new()),
                computed: RefCell::new(Vec::new()),
                mounted: Cell::new(false),
                destroyed: Cell::new(false),
            }
        });
        let vm = Self { inner };

        for (name, method) in methods {
            let weak = Rc::downgrade(&vm.inner);
            let function = Function::new(&name, move |args: &[Value]| match weak.upgrade() {
                Some(inner) => method(&ViewModel { inner }, args),
                None => Value::Undefined,
            });
            vm.inner.data.set(&name, Value::Function(function));
        }

        for (name, getter) in computed {
            let weak = Rc::downgrade(&vm.inner);
            let property = Computed::new(name.clone(), move || match weak.upgrade() {
                Some(inner) => getter(&ViewModel { inner }),
                None => Value::Undefined,
            });
            vm.inner.data.define_computed(&name, property.clone());
            vm.inner.computed.borrow_mut().push(property);
        }

        for declared in watches {
            let callback = declared.callback;
            vm.watch(&declared.expression, declared.deep, move |vm, new, old| {
                callback(vm, new, old)
            });
        }

        if !lazy {
            vm.mount();
        }
        Ok(vm)
    }

    fn from_weak(weak: &Weak<Inner>) -> Option<Self> {
        weak.upgrade().map(|inner| Self { inner })
    }

    pub fn dom(&self) -> &Rc<dyn Dom> {
        &self.inner.dom
    }

    pub fn root(&self) -> NodeId {
        self.inner.root
    }

    pub fn scope(&self) -> &Scope {
        &self.inner.scope
    }

    pub fn config(&self) -> &Config {
        self.inner.host.config()
    }

    pub fn is_mounted(&self) -> bool {
        self.inner.mounted.get()
    }

    pub fn is_destroyed(&self) -> bool {
        self.inner.destroyed.get()
    }

    /// The root data object.
    pub fn get_root(&self) -> Value {
        Value::Object(self.inner.data.clone())
    }

    /// Read a dotted path (`user.name`, `items.0.title`). Inside a computed
    /// getter or a watcher the read is tracked.
    pub fn get(&self, path: &str) -> Value {
        path.split('.')
            .filter(|segment| !segment.is_empty())
            .fold(self.get_root(), |value, segment| member(&value, segment))
    }

    /// A deep copy of the value at `path`.
    pub fn get_copy(&self, path: &str) -> Value {
        ReactiveContext::untracked(|| self.get(path)).deep_copy()
    }

    /// Write a dotted path, creating missing intermediate objects.
    pub fn set(&self, path: &str, value: impl Into<Value>) {
        let value = value.into();
        let segments: Vec<&str> = path.split('.').filter(|s| !s.is_empty()).collect();
        let Some((last, parents)) = segments.split_last() else {
            warn!(path, "empty path ignored");
            return;
        };

        ReactiveContext::untracked(|| {
            let mut base = self.get_root();
            for segment in parents {
                let next = member(&base, segment);
                let resolved = match &base {
                    Value::Object(object) if next.is_nullish() => {
                        object.set(segment, Value::Object(Object::new()));
                        object.get_untracked(segment)
                    }
                    _ => next,
                };
                base = resolved;
            }
            match &base {
                Value::Object(object) => object.set(last, value),
                Value::Array(array) => match last.parse::<usize>() {
                    Ok(index) => array.set_index(index, value),
                    Err(_) => warn!(path, "cannot assign a named property on an array"),
                },
                other => warn!(path, found = other.type_name(), "cannot assign through a non-object"),
            }
        });
    }

    /// Write every top-level entry of `values`.
    pub fn set_many(&self, values: impl Into<Value>) {
        match values.into() {
            Value::Object(object) => {
                for (key, value) in object.entries_untracked() {
                    self.set(&key, value);
                }
            }
            other => warn!(found = other.type_name(), "set_many expects an object"),
        }
    }

    /// Restore `paths` to their construction-time values.
    pub fn reset(&self, paths: &[&str]) {
        for path in paths {
            let original = path
                .split('.')
                .filter(|segment| !segment.is_empty())
                .fold(Value::Object(self.inner.snapshot.clone()), |value, segment| {
                    ReactiveContext::untracked(|| member(&value, segment))
                });
            self.set(path, original.deep_copy());
        }
    }

    /// Restore every top-level key to its construction-time value.
    pub fn reset_all(&self) {
        for (key, original) in self.inner.snapshot.entries_untracked() {
            self.inner.data.set(&key, original.deep_copy());
        }
        debug!("data reset");
    }

    /// Watch `expression`. The callback receives `(vm, new, old)` whenever
    /// the value changes; with `deep`, also when anything nested inside it
    /// changes.
    pub fn watch(
        &self,
        expression: &str,
        deep: bool,
        callback: impl Fn(&ViewModel, &Value, &Value) + 'static,
    ) -> WatchHandle {
        let getter = expr::compile_or_noop(expression);
        let scope = self.inner.scope.clone();
        let read = move || getter.get(&scope);

        let weak = Rc::downgrade(&self.inner);
        let notify = move |new: &Value, old: &Value, _: Option<&Mutation>| {
            if let Some(vm) = ViewModel::from_weak(&weak) {
                callback(&vm, new, old);
            }
        };

        let watcher = if deep {
            Watcher::deep(expression, read, notify)
        } else {
            Watcher::new(expression, read, notify)
        };
        let mut watchers = self.inner.watchers.borrow_mut();
        watchers.retain(Watcher::is_active);
        watchers.push(watcher.clone());
        WatchHandle { watcher }
    }

    /// Compile the template. Does nothing once mounted or destroyed.
    pub fn mount(&self) {
        if self.inner.mounted.get() || self.inner.destroyed.get() {
            return;
        }
        self.inner.mounted.set(true);
        let directives = compile_root(&self.inner.host, self.inner.root, &self.inner.scope);
        self.inner.directives.borrow_mut().extend(directives);
    }

    /// Tear everything down. Safe to call more than once.
    pub fn destroy(&self) {
        if self.inner.destroyed.replace(true) {
            return;
        }
        let directives = std::mem::take(&mut *self.inner.directives.borrow_mut());
        for directive in directives.iter().rev() {
            directive.teardown();
        }
        let watchers = std::mem::take(&mut *self.inner.watchers.borrow_mut());
        for watcher in &watchers {
            watcher.teardown();
        }
        let computed = std::mem::take(&mut *self.inner.computed.borrow_mut());
        for property in &computed {
            property.teardown();
        }
        debug!(root = %self.inner.root, "destroyed");
    }

    /// The element registered under `name` by an element-reference
    /// directive.
    pub fn element(&self, name: &str) -> Option<NodeId> {
        self.inner.host.element(name)
    }
}

impl fmt::Debug for ViewModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ViewModel")
            .field("root", &self.inner.root)
            .field("mounted", &self.inner.mounted.get())
            .field("destroyed", &self.inner.destroyed.get())
            .finish()
    }
}

fn bind_hook(weak: Weak<Inner>, hook: LifecycleHook) -> Hook {
    Rc::new(move |node| {
        if let Some(vm) = ViewModel::from_weak(&weak) {
            hook(&vm, node);
        }
    })
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::MemoryDom;
    use serde_json::json;
    use std::cell::Cell;

    fn instance(markup: &str, options: Options) -> (Rc<MemoryDom>, ViewModel) {
        let dom = Rc::new(MemoryDom::default());
        let root = dom.root_with(markup);
        let vm = ViewModel::new(dom.clone(), root, options).unwrap();
        (dom, vm)
    }

    #[test]
    fn rejects_non_object_data() {
        let dom = Rc::new(MemoryDom::default());
        let root = dom.root_with("");
        let err = ViewModel::new(dom, root, Options::new().data(json!([1, 2]))).unwrap_err();
        assert!(matches!(err, Error::InvalidScope("array")));
    }

    #[test]
    fn rejects_non_element_root() {
        let dom = Rc::new(MemoryDom::default());
        let text = dom.create_text("x");
        let err = ViewModel::new(dom, text, Options::new()).unwrap_err();
        assert!(matches!(err, Error::InvalidRoot));
    }

    #[test]
    fn set_creates_intermediate_objects() {
        let (_, vm) = instance("", Options::new().data(json!({})));
        vm.set("a.b", 3);
        assert_eq!(vm.get("a.b"), Value::from(3));
        assert_eq!(vm.get_root().to_json(), json!({ "a": { "b": 3 } }));
    }

    #[test]
    fn methods_and_computed_see_the_instance() {
        let (dom, vm) = instance(
            r#"<p>{{ total }}</p><button v-on:click="add(2)">+</button>"#,
            Options::new()
                .data(json!({ "n": 1 }))
                .computed("total", |vm| Value::Number(vm.get("n").to_number() * 10.0))
                .method("add", |vm, args| {
                    let n = vm.get("n").to_number() + args[0].to_number();
                    vm.set("n", n);
                    Value::Undefined
                }),
        );
        assert_eq!(dom.text(vm.root()), "10+");
        let button = dom.elements_by_tag(vm.root(), "button")[0];
        dom.click(button);
        assert_eq!(vm.get("n"), Value::from(3));
        assert_eq!(dom.text(vm.root()), "30+");
    }

    #[test]
    fn lazy_instances_compile_on_mount() {
        let (dom, vm) = instance(
            "{{ msg }}",
            Options::new().data(json!({ "msg": "hi" })).lazy(true),
        );
        assert_eq!(dom.text(vm.root()), "{{ msg }}");
        vm.mount();
        vm.mount();
        assert_eq!(dom.text(vm.root()), "hi");
    }

    #[test]
    fn reset_restores_paths() {
        let (_, vm) = instance("", Options::new().data(json!({ "a": { "b": 1 }, "c": 2 })));
        vm.set("a.b", 5);
        vm.set("c", 7);
        vm.reset(&["a.b"]);
        assert_eq!(vm.get("a.b"), Value::from(1));
        assert_eq!(vm.get("c"), Value::from(7));
        vm.reset_all();
        assert_eq!(vm.get("c"), Value::from(2));
    }

    #[test]
    fn unwatch_stops_callbacks() {
        let (_, vm) = instance("", Options::new().data(json!({ "x": 1 })));
        let calls = Rc::new(Cell::new(0));
        let counter = calls.clone();
        let handle = vm.watch("x", false, move |_, _, _| counter.set(counter.get() + 1));
        vm.set("x", 2);
        handle.unwatch();
        vm.set("x", 3);
        assert_eq!(calls.get(), 1);
        assert!(!handle.is_active());
    }

    #[test]
    fn unwatched_handles_are_released() {
        let (_, vm) = instance("", Options::new().data(json!({ "x": 1 })));
        for _ in 0..10 {
            vm.watch("x", false, |_, _, _| {}).unwatch();
        }
        assert!(vm.inner.watchers.borrow().len() <= 1);

        let kept = vm.watch("x", false, |_, _, _| {});
        assert!(kept.is_active());
        assert_eq!(vm.inner.watchers.borrow().len(), 1);
    }

    #[test]
    fn destroy_is_idempotent() {
        let (dom, vm) = instance(
            r#"<input v-model="q">"#,
            Options::new().data(json!({ "q": "a" })),
        );
        assert_eq!(dom.listener_count(), 4);
        vm.destroy();
        vm.destroy();
        assert!(vm.is_destroyed());
        assert_eq!(dom.listener_count(), 0);
    }
}
