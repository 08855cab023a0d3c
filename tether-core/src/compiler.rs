//! Template Compiler
//!
//! Walks a DOM subtree, finds every directive attribute and every
//! interpolated text node, and installs the matching [`Directive`]s against
//! a [`Scope`].
//!
//! # How Compilation Works
//!
//! 1. **Collect**: the subtree is walked in document order. Elements with
//!    directive attributes and text nodes matching the mustache pattern are
//!    queued. An element carrying a structural directive (`for`, `if`,
//!    `else`) is queued as structural and its children are *not* visited:
//!    they belong to the structural directive, which compiles copies of
//!    them later, possibly against a child scope.
//! 2. **Drain**: queued nodes are compiled in order. A structural element
//!    that has lost its parent by then was claimed as a template (an `else`
//!    branch taken by the preceding `if`) and is skipped.
//! 3. **Finish**: after-compile callbacks registered during the drain run
//!    once the compiled nodes are attached.
//!
//! An element carrying `for` together with other directives installs only
//! `for`. The remaining attributes stay on the template and are compiled
//! on every generated copy against that copy's scope.
//!
//! # Blocks
//!
//! Structural directives render through [`render`], which clones a
//! template into a detached fragment and compiles it into a [`Block`]. A
//! block is inserted and removed as a unit; removing it tears down its
//! directives depth-first before detaching its nodes.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use tracing::{debug, trace, warn};

use crate::config::Config;
use crate::directive::{self, Descriptor, Directive, MUSTACHE};
use crate::dom::{Dom, NodeId, NodeKind};
use crate::scope::Scope;
use crate::value::Value;

/// A user directive: called with `(dom, node, new, old)` on every change.
pub type CustomDirective = Rc<dyn Fn(&dyn Dom, NodeId, &Value, &Value)>;

/// A structural lifecycle hook, called with a block's element.
pub type Hook = Rc<dyn Fn(NodeId)>;

/// State shared by every directive compiled for one instance.
pub(crate) struct Host {
    dom: Rc<dyn Dom>,
    config: Config,
    elements: RefCell<IndexMap<String, NodeId>>,
    custom: IndexMap<String, CustomDirective>,
    on_insert: Option<Hook>,
    on_remove: Option<Hook>,
}

impl Host {
    pub(crate) fn new(dom: Rc<dyn Dom>, config: Config) -> Self {
        Self {
            dom,
            config,
            elements: RefCell::new(IndexMap::new()),
            custom: IndexMap::new(),
            on_insert: None,
            on_remove: None,
        }
    }

    pub(crate) fn with_custom(mut self, custom: IndexMap<String, CustomDirective>) -> Self {
        self.custom = custom;
        self
    }

    pub(crate) fn with_hooks(mut self, on_insert: Option<Hook>, on_remove: Option<Hook>) -> Self {
        self.on_insert = on_insert;
        self.on_remove = on_remove;
        self
    }

    pub(crate) fn dom(&self) -> Rc<dyn Dom> {
        self.dom.clone()
    }

    pub(crate) fn config(&self) -> &Config {
        &self.config
    }

    pub(crate) fn has_custom(&self, name: &str) -> bool {
        self.custom.contains_key(name)
    }

    pub(crate) fn custom(&self, name: &str) -> Option<CustomDirective> {
        self.custom.get(name).cloned()
    }

    pub(crate) fn register_element(&self, name: &str, node: NodeId) {
        self.elements.borrow_mut().insert(name.to_string(), node);
    }

    /// Drop `name` from the registry if it still refers to `node`.
    pub(crate) fn unregister_element(&self, name: &str, node: NodeId) {
        let mut elements = self.elements.borrow_mut();
        if elements.get(name) == Some(&node) {
            elements.shift_remove(name);
        }
    }

    pub(crate) fn element(&self, name: &str) -> Option<NodeId> {
        self.elements.borrow().get(name).copied()
    }

    fn inserted(&self, node: NodeId) {
        if let Some(hook) = &self.on_insert {
            hook(node);
        }
    }

    fn removed(&self, node: NodeId) {
        if let Some(hook) = &self.on_remove {
            hook(node);
        }
    }
}

enum Task {
    Element(NodeId),
    Structural(NodeId),
    /// A text node and the element its markup would render into.
    Text(NodeId, NodeId),
}

/// One compilation pass.
pub(crate) struct Session<'h> {
    host: &'h Rc<Host>,
    after_compile: Vec<Box<dyn FnOnce()>>,
}

impl<'h> Session<'h> {
    pub(crate) fn new(host: &'h Rc<Host>) -> Self {
        Self {
            host,
            after_compile: Vec::new(),
        }
    }

    pub(crate) fn host(&self) -> &'h Rc<Host> {
        self.host
    }

    /// Run `callback` once the nodes compiled in this pass are attached.
    pub(crate) fn defer(&mut self, callback: impl FnOnce() + 'static) {
        self.after_compile.push(Box::new(callback));
    }

    fn prefix(&self) -> &str {
        &self.host.config().prefix
    }

    fn descriptors(&self, node: NodeId) -> Vec<Descriptor> {
        self.host
            .dom
            .attributes(node)
            .iter()
            .filter_map(|(name, value)| Descriptor::parse(self.prefix(), name, value))
            .collect()
    }

    fn collect(&self, node: NodeId, owner: NodeId, tasks: &mut Vec<Task>) {
        let dom = &self.host.dom;
        for child in dom.children(node) {
            match dom.kind(child) {
                NodeKind::Element => {
                    let descriptors = self.descriptors(child);
                    if descriptors.iter().any(Descriptor::is_structural) {
                        tasks.push(Task::Structural(child));
                        continue;
                    }
                    if !descriptors.is_empty() {
                        tasks.push(Task::Element(child));
                    }
                    let owns_content = descriptors
                        .iter()
                        .any(|d| d.name == "text" || d.name == "html");
                    if !owns_content {
                        self.collect(child, child, tasks);
                    }
                }
                NodeKind::Text => {
                    if MUSTACHE.is_match(&dom.text(child)) {
                        tasks.push(Task::Text(child, owner));
                    }
                }
                NodeKind::Fragment => self.collect(child, owner, tasks),
                NodeKind::Comment => {}
            }
        }
    }

    fn drain(&mut self, tasks: Vec<Task>, scope: &Scope, out: &mut Vec<Directive>) {
        let dom = self.host.dom();
        for task in tasks {
            match task {
                Task::Element(node) => {
                    if dom.parent(node).is_some() {
                        self.compile_element(node, scope, out);
                    }
                }
                Task::Structural(node) => {
                    if dom.parent(node).is_some() {
                        self.compile_structural(node, scope, out);
                    } else {
                        trace!(node = %node, "claimed template skipped");
                    }
                }
                Task::Text(node, owner) => {
                    if dom.parent(node).is_none() {
                        continue;
                    }
                    match directive::install_interpolation(self, node, owner, scope) {
                        Ok(Some(directive)) => out.push(directive),
                        Ok(None) => {}
                        Err(error) => warn!(%error, node = %node, "interpolation skipped"),
                    }
                }
            }
        }
    }

    /// Install every directive attribute on `node`, stripping each one.
    fn compile_element(&mut self, node: NodeId, scope: &Scope, out: &mut Vec<Directive>) {
        let dom = self.host.dom();
        for descriptor in self.descriptors(node) {
            dom.remove_attribute(node, &descriptor.attr);
            match directive::install(self, node, scope, descriptor) {
                Ok(directive) => out.push(directive),
                Err(error) => warn!(%error, node = %node, "directive skipped"),
            }
        }
    }

    fn compile_structural(&mut self, node: NodeId, scope: &Scope, out: &mut Vec<Directive>) {
        let dom = self.host.dom();
        let descriptors = self.descriptors(node);
        let chosen = ["for", "if", "else"]
            .iter()
            .find_map(|name| descriptors.iter().find(|d| d.name == *name).cloned());
        let Some(descriptor) = chosen else {
            return;
        };
        dom.remove_attribute(node, &descriptor.attr);

        match directive::install_structural(self, node, scope, descriptor) {
            Ok(directive) => out.push(directive),
            Err(error) => {
                warn!(%error, node = %node, "structural directive skipped");
                self.compile_subtree(node, scope, out);
            }
        }
    }

    /// Compile `node` and everything below it as ordinary content.
    fn compile_subtree(&mut self, node: NodeId, scope: &Scope, out: &mut Vec<Directive>) {
        let mut tasks = Vec::new();
        if self.descriptors(node).iter().any(Descriptor::is_structural) {
            tasks.push(Task::Structural(node));
        } else {
            tasks.push(Task::Element(node));
            self.collect(node, node, &mut tasks);
        }
        self.drain(tasks, scope, out);
    }

    fn finish(&mut self) -> Vec<Box<dyn FnOnce()>> {
        std::mem::take(&mut self.after_compile)
    }
}

/// Compile an instance's root element in place.
///
/// The root's children are detached into a fragment while they compile and
/// re-attached afterwards, unless a directive on the root replaced its
/// content (`text` / `html`).
pub(crate) fn compile_root(host: &Rc<Host>, root: NodeId, scope: &Scope) -> Vec<Directive> {
    let dom = host.dom();
    let fragment = dom.to_fragment(root);

    let mut session = Session::new(host);
    let mut out = Vec::new();
    session.compile_element(root, scope, &mut out);

    let mut tasks = Vec::new();
    session.collect(fragment, root, &mut tasks);
    session.drain(tasks, scope, &mut out);

    let replaced = out.iter().any(|directive| {
        directive.node() == root && matches!(directive.descriptor().name.as_str(), "text" | "html")
    });
    if !replaced {
        dom.append_child(root, fragment);
    }

    for callback in session.finish() {
        callback();
    }
    debug!(root = %root, directives = out.len(), "compiled");
    out
}

/// Clone `template` and compile the copy against `scope`. The block is
/// detached until [`Block::insert`].
pub(crate) fn render(host: &Rc<Host>, template: NodeId, scope: &Scope) -> Block {
    let dom = host.dom();
    let fragment = dom.create_fragment();
    dom.append_child(fragment, dom.clone_node(template));

    let mut session = Session::new(host);
    let mut directives = Vec::new();
    let mut tasks = Vec::new();
    session.collect(fragment, fragment, &mut tasks);
    session.drain(tasks, scope, &mut directives);

    Block {
        host: host.clone(),
        nodes: dom.children(fragment),
        directives,
        pending: session.finish(),
    }
}

/// A compiled copy of a template, owned by a structural directive.
pub(crate) struct Block {
    host: Rc<Host>,
    nodes: Vec<NodeId>,
    directives: Vec<Directive>,
    pending: Vec<Box<dyn FnOnce()>>,
}

impl Block {
    pub(crate) fn first_node(&self) -> Option<NodeId> {
        self.nodes.first().copied()
    }

    /// Insert the block's nodes before `reference` (or at the end).
    pub(crate) fn insert(&mut self, parent: NodeId, reference: Option<NodeId>) {
        let dom = self.host.dom();
        for node in &self.nodes {
            dom.insert_before(parent, *node, reference);
        }
        for callback in self.pending.drain(..) {
            callback();
        }
        for node in &self.nodes {
            if dom.kind(*node) == NodeKind::Element {
                self.host.inserted(*node);
            }
        }
    }

    /// Tear down the block's directives, innermost first, then detach it.
    pub(crate) fn remove(self) {
        let dom = self.host.dom();
        for node in &self.nodes {
            if dom.kind(*node) == NodeKind::Element {
                self.host.removed(*node);
            }
        }
        for directive in self.directives.iter().rev() {
            directive.teardown();
        }
        for node in &self.nodes {
            dom.remove(*node);
        }
    }
}

impl fmt::Debug for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Block")
            .field("nodes", &self.nodes)
            .field("directives", &self.directives.len())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::MemoryDom;
    use crate::reactive::{observe, Object};

    fn setup(markup: &str, data: serde_json::Value) -> (Rc<MemoryDom>, Rc<Host>, NodeId, Object) {
        let dom = Rc::new(MemoryDom::default());
        let root = dom.root_with(markup);
        let value = Value::from(data);
        observe(&value);
        let object = value.as_object().cloned().unwrap();
        let host = Rc::new(Host::new(dom.clone(), Config::default()));
        (dom, host, root, object)
    }

    #[test]
    fn text_and_attributes_compile() {
        let (dom, host, root, data) = setup(
            r#"<p v-bind:title="tip">Hi {{ name }}</p>"#,
            serde_json::json!({ "name": "Ada", "tip": "t" }),
        );
        let directives = compile_root(&host, root, &Scope::root(data.clone()));
        assert_eq!(directives.len(), 2);
        assert_eq!(dom.inner_html(root), r#"<p title="t">Hi Ada</p>"#);

        data.set("name", Value::str("Grace"));
        assert_eq!(dom.inner_html(root), r#"<p title="t">Hi Grace</p>"#);
    }

    #[test]
    fn unknown_directive_is_stripped() {
        let (dom, host, root, data) = setup(
            r#"<p v-bogus="x" v-text="msg"></p>"#,
            serde_json::json!({ "msg": "ok" }),
        );
        let directives = compile_root(&host, root, &Scope::root(data));
        assert_eq!(directives.len(), 1);
        assert_eq!(dom.inner_html(root), "<p>ok</p>");
    }

    #[test]
    fn broken_expression_leaves_siblings_working() {
        let (dom, host, root, data) = setup(
            r#"<p v-text="let x = 1"></p><span>{{ msg }}</span>"#,
            serde_json::json!({ "msg": "fine" }),
        );
        compile_root(&host, root, &Scope::root(data));
        assert_eq!(dom.inner_html(root), "<p></p><span>fine</span>");
    }

    #[test]
    fn blocks_insert_and_remove_as_a_unit() {
        let (dom, host, root, data) =
            setup(r#"<li>{{ n }}</li>"#, serde_json::json!({ "n": 1 }));
        let template = dom.children(root)[0];
        dom.remove(template);

        let scope = Scope::root(data.clone());
        let mut block = render(&host, template, &scope);
        block.insert(root, None);
        assert_eq!(dom.inner_html(root), "<li>1</li>");

        data.set("n", Value::from(2));
        assert_eq!(dom.inner_html(root), "<li>2</li>");

        block.remove();
        assert_eq!(dom.inner_html(root), "");
        assert_eq!(data.dep("n").unwrap().subscriber_count(), 0);
    }
}
