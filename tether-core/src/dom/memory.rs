//! In-Memory Document
//!
//! [`MemoryDom`] keeps every node in an arena and implements [`Dom`] on top
//! of it. On top of the trait it offers what a headless host or a test
//! needs: markup mounting, event dispatch with capture and bubble phases,
//! simulated user input, a manual timer clock and HTML serialisation.

use std::cell::{Cell, RefCell};
use std::fmt::Write as _;

use indexmap::IndexMap;
use smallvec::SmallVec;
use tracing::trace;

use super::html::{parse_markup, ParsedNode};
use super::{Dom, Event, Listener, ListenerId, NodeId, NodeKind, TimerId};

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

struct NodeData {
    kind: NodeKind,
    tag: String,
    text: String,
    attrs: IndexMap<String, String>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    value: Option<String>,
    checked: Option<bool>,
    selected: Option<bool>,
}

impl NodeData {
    fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            tag: String::new(),
            text: String::new(),
            attrs: IndexMap::new(),
            parent: None,
            children: Vec::new(),
            value: None,
            checked: None,
            selected: None,
        }
    }
}

struct ListenerEntry {
    node: NodeId,
    event_type: String,
    capture: bool,
    listener: Listener,
}

struct Timer {
    id: TimerId,
    due: u64,
    callback: Box<dyn FnOnce()>,
}

/// An arena-backed document.
///
/// Nodes are never reclaimed. A removed node keeps its slot for the life of
/// the document, so repeated list rebuilds grow the arena. This suits tests
/// and one-shot headless renders; long-lived documents should implement
/// [`Dom`] over a real tree.
#[derive(Default)]
pub struct MemoryDom {
    nodes: RefCell<Vec<NodeData>>,
    listeners: RefCell<IndexMap<ListenerId, ListenerEntry>>,
    timers: RefCell<Vec<Timer>>,
    clock: Cell<u64>,
    next_handle: Cell<u64>,
}

impl MemoryDom {
    pub fn new() -> Self {
        Self::default()
    }

    fn alloc(&self, data: NodeData) -> NodeId {
        let mut nodes = self.nodes.borrow_mut();
        nodes.push(data);
        NodeId(nodes.len() - 1)
    }

    fn handle(&self) -> u64 {
        let id = self.next_handle.get();
        self.next_handle.set(id + 1);
        id
    }

    fn with<R>(&self, node: NodeId, f: impl FnOnce(&NodeData) -> R) -> R {
        f(&self.nodes.borrow()[node.0])
    }

    fn with_mut<R>(&self, node: NodeId, f: impl FnOnce(&mut NodeData) -> R) -> R {
        f(&mut self.nodes.borrow_mut()[node.0])
    }

    /// Parse `markup` and append the result to `parent`.
    pub fn mount_markup(&self, parent: NodeId, markup: &str) {
        let fragment = self.parse_html(markup);
        self.append_child(parent, fragment);
    }

    /// Create a `<div>` holding the parsed `markup`.
    pub fn root_with(&self, markup: &str) -> NodeId {
        let root = self.create_element("div");
        self.mount_markup(root, markup);
        root
    }

    fn build(&self, parsed: &ParsedNode) -> NodeId {
        match parsed {
            ParsedNode::Element {
                tag,
                attrs,
                children,
            } => {
                let node = self.create_element(tag);
                self.with_mut(node, |data| {
                    for (name, value) in attrs {
                        data.attrs.insert(name.clone(), value.clone());
                    }
                });
                for child in children {
                    let child = self.build(child);
                    self.append_child(node, child);
                }
                node
            }
            ParsedNode::Text(text) => self.create_text(text),
            ParsedNode::Comment(text) => self.create_comment(text),
        }
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// Elements below `root` with the given tag, in document order.
    pub fn elements_by_tag(&self, root: NodeId, tag: &str) -> Vec<NodeId> {
        super::descendant_elements(self, root)
            .into_iter()
            .filter(|node| self.with(*node, |data| data.tag == tag))
            .collect()
    }

    /// First element below `root` whose `id` attribute is `id`.
    pub fn element_by_id(&self, root: NodeId, id: &str) -> Option<NodeId> {
        super::descendant_elements(self, root)
            .into_iter()
            .find(|node| self.get_attribute(*node, "id").as_deref() == Some(id))
    }

    /// Number of listeners currently registered.
    pub fn listener_count(&self) -> usize {
        self.listeners.borrow().len()
    }

    /// Number of nodes ever allocated, attached or not.
    pub fn allocated_nodes(&self) -> usize {
        self.nodes.borrow().len()
    }

    /// Number of timers still pending.
    pub fn pending_timers(&self) -> usize {
        self.timers.borrow().len()
    }

    // ------------------------------------------------------------------
    // Events
    // ------------------------------------------------------------------

    /// Dispatch `event` at its target: capture listeners from the root
    /// down, then the target's own listeners, then bubble listeners back
    /// up. Returns `false` if a listener prevented the default action.
    pub fn dispatch(&self, event: &Event) -> bool {
        let target = event.target();
        let mut path: SmallVec<[NodeId; 16]> = SmallVec::new();
        let mut current = self.parent(target);
        while let Some(node) = current {
            path.push(node);
            current = self.parent(node);
        }
        trace!(event = event.event_type(), %target, depth = path.len(), "dispatch");

        for node in path.iter().rev() {
            self.invoke(*node, event, Some(true));
            if event.is_propagation_stopped() {
                return !event.is_default_prevented();
            }
        }
        self.invoke(target, event, None);
        if event.is_propagation_stopped() {
            return !event.is_default_prevented();
        }
        for node in path.iter() {
            self.invoke(*node, event, Some(false));
            if event.is_propagation_stopped() {
                break;
            }
        }
        !event.is_default_prevented()
    }

    /// Run the listeners on `node` for `event`. `capture` selects the phase;
    /// `None` is the target phase, which runs both kinds.
    fn invoke(&self, node: NodeId, event: &Event, capture: Option<bool>) {
        let matching: Vec<Listener> = self
            .listeners
            .borrow()
            .values()
            .filter(|entry| {
                entry.node == node
                    && entry.event_type == event.event_type()
                    && capture.map_or(true, |c| c == entry.capture)
            })
            .map(|entry| entry.listener.clone())
            .collect();
        for listener in matching {
            listener(event);
        }
    }

    /// Dispatch a plain event of `event_type` at `node`.
    pub fn fire(&self, node: NodeId, event_type: &str) -> bool {
        self.dispatch(&Event::new(event_type, node))
    }

    /// Dispatch a keyboard event with `key_code` at `node`.
    pub fn fire_key(&self, node: NodeId, event_type: &str, key_code: u32) -> bool {
        self.dispatch(&Event::key(event_type, node, key_code))
    }

    /// Simulate typing: set the control's value and fire `input`.
    pub fn type_text(&self, node: NodeId, value: &str) {
        self.set_value(node, value);
        self.fire(node, "input");
    }

    /// Simulate committing a value: set it and fire `change`.
    pub fn change_value(&self, node: NodeId, value: &str) {
        self.set_value(node, value);
        self.fire(node, "change");
    }

    /// Simulate a click on a checkbox or radio: toggle or select it, then
    /// fire `click` and `change`.
    pub fn click(&self, node: NodeId) {
        match self.get_attribute(node, "type").as_deref() {
            Some("checkbox") => self.set_checked(node, !self.checked(node)),
            Some("radio") => self.set_checked(node, true),
            _ => {}
        }
        self.fire(node, "click");
        if self.tag_name(node).as_deref() == Some("input") {
            self.fire(node, "change");
        }
    }

    /// Simulate picking options of a `<select>` by value, then fire `change`.
    pub fn choose(&self, select: NodeId, values: &[&str]) {
        for option in self.elements_by_tag(select, "option") {
            let selected = values.contains(&self.value(option).as_str());
            self.with_mut(option, |data| data.selected = Some(selected));
        }
        self.fire(select, "change");
    }

    // ------------------------------------------------------------------
    // Timers
    // ------------------------------------------------------------------

    /// Move the clock forward, running every timer that comes due, earliest
    /// first.
    pub fn advance(&self, ms: u64) {
        let until = self.clock.get() + ms;
        loop {
            let next = {
                let mut timers = self.timers.borrow_mut();
                let due = timers
                    .iter()
                    .enumerate()
                    .filter(|(_, timer)| timer.due <= until)
                    .min_by_key(|(_, timer)| (timer.due, timer.id.0))
                    .map(|(index, _)| index);
                due.map(|index| timers.remove(index))
            };
            let Some(timer) = next else {
                break;
            };
            self.clock.set(timer.due);
            (timer.callback)();
        }
        self.clock.set(until);
    }

    pub fn now(&self) -> u64 {
        self.clock.get()
    }

    // ------------------------------------------------------------------
    // Serialisation
    // ------------------------------------------------------------------

    /// Serialise `node` and its descendants.
    pub fn to_html(&self, node: NodeId) -> String {
        let mut out = String::new();
        self.write_html(node, &mut out);
        out
    }

    /// Serialise the children of `node`.
    pub fn inner_html(&self, node: NodeId) -> String {
        let mut out = String::new();
        for child in self.children(node) {
            self.write_html(child, &mut out);
        }
        out
    }

    fn write_html(&self, node: NodeId, out: &mut String) {
        let (kind, tag, text, attrs) = self.with(node, |data| {
            (
                data.kind,
                data.tag.clone(),
                data.text.clone(),
                data.attrs.clone(),
            )
        });
        match kind {
            NodeKind::Text => out.push_str(&escape(&text, false)),
            NodeKind::Comment => {
                let _ = write!(out, "<!--{text}-->");
            }
            NodeKind::Fragment => {
                for child in self.children(node) {
                    self.write_html(child, out);
                }
            }
            NodeKind::Element => {
                out.push('<');
                out.push_str(&tag);
                for (name, value) in &attrs {
                    let _ = write!(out, " {}=\"{}\"", name, escape(value, true));
                }
                out.push('>');
                if VOID_ELEMENTS.contains(&tag.as_str()) {
                    return;
                }
                for child in self.children(node) {
                    self.write_html(child, out);
                }
                let _ = write!(out, "</{tag}>");
            }
        }
    }

    /// The `<select>` an `<option>` belongs to.
    fn owning_select(&self, option: NodeId) -> Option<NodeId> {
        let mut current = self.parent(option);
        while let Some(node) = current {
            if self.tag_name(node).as_deref() == Some("select") {
                return Some(node);
            }
            current = self.parent(node);
        }
        None
    }

    fn option_value(&self, option: NodeId) -> String {
        self.get_attribute(option, "value")
            .unwrap_or_else(|| self.text(option).trim().to_string())
    }

    fn is_multiple(&self, select: NodeId) -> bool {
        self.has_attribute(select, "multiple")
    }
}

fn escape(text: &str, attribute: bool) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' if !attribute => out.push_str("&lt;"),
            '>' if !attribute => out.push_str("&gt;"),
            '"' if attribute => out.push_str("&quot;"),
            other => out.push(other),
        }
    }
    out
}

impl Dom for MemoryDom {
    fn create_element(&self, tag: &str) -> NodeId {
        let mut data = NodeData::new(NodeKind::Element);
        data.tag = tag.to_ascii_lowercase();
        self.alloc(data)
    }

    fn create_text(&self, text: &str) -> NodeId {
        let mut data = NodeData::new(NodeKind::Text);
        data.text = text.to_string();
        self.alloc(data)
    }

    fn create_comment(&self, text: &str) -> NodeId {
        let mut data = NodeData::new(NodeKind::Comment);
        data.text = text.to_string();
        self.alloc(data)
    }

    fn create_fragment(&self) -> NodeId {
        self.alloc(NodeData::new(NodeKind::Fragment))
    }

    fn kind(&self, node: NodeId) -> NodeKind {
        self.with(node, |data| data.kind)
    }

    fn tag_name(&self, node: NodeId) -> Option<String> {
        self.with(node, |data| {
            (data.kind == NodeKind::Element).then(|| data.tag.clone())
        })
    }

    fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.with(node, |data| data.parent)
    }

    fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.with(node, |data| data.children.clone())
    }

    fn next_sibling(&self, node: NodeId) -> Option<NodeId> {
        let parent = self.parent(node)?;
        self.with(parent, |data| {
            let index = data.children.iter().position(|c| *c == node)?;
            data.children.get(index + 1).copied()
        })
    }

    fn append_child(&self, parent: NodeId, child: NodeId) {
        self.insert_before(parent, child, None);
    }

    fn insert_before(&self, parent: NodeId, child: NodeId, reference: Option<NodeId>) {
        let moved = if self.kind(child) == NodeKind::Fragment {
            let children = self.with_mut(child, |data| std::mem::take(&mut data.children));
            for c in &children {
                self.with_mut(*c, |data| data.parent = None);
            }
            children
        } else {
            self.remove(child);
            vec![child]
        };

        let mut nodes = self.nodes.borrow_mut();
        let index = reference
            .and_then(|r| nodes[parent.0].children.iter().position(|c| *c == r))
            .unwrap_or(nodes[parent.0].children.len());
        for (offset, node) in moved.iter().enumerate() {
            nodes[node.0].parent = Some(parent);
            nodes[parent.0].children.insert(index + offset, *node);
        }
    }

    fn remove(&self, node: NodeId) {
        let Some(parent) = self.parent(node) else {
            return;
        };
        let mut nodes = self.nodes.borrow_mut();
        nodes[parent.0].children.retain(|c| *c != node);
        nodes[node.0].parent = None;
    }

    fn clone_node(&self, node: NodeId) -> NodeId {
        let copy = self.with(node, |data| NodeData {
            kind: data.kind,
            tag: data.tag.clone(),
            text: data.text.clone(),
            attrs: data.attrs.clone(),
            parent: None,
            children: Vec::new(),
            value: data.value.clone(),
            checked: data.checked,
            selected: data.selected,
        });
        let clone = self.alloc(copy);
        for child in self.children(node) {
            let child_clone = self.clone_node(child);
            self.append_child(clone, child_clone);
        }
        clone
    }

    fn text(&self, node: NodeId) -> String {
        match self.kind(node) {
            NodeKind::Text | NodeKind::Comment => self.with(node, |data| data.text.clone()),
            NodeKind::Element | NodeKind::Fragment => self
                .children(node)
                .into_iter()
                .filter(|c| self.kind(*c) != NodeKind::Comment)
                .map(|c| self.text(c))
                .collect(),
        }
    }

    fn set_text(&self, node: NodeId, text: &str) {
        match self.kind(node) {
            NodeKind::Text | NodeKind::Comment => {
                self.with_mut(node, |data| data.text = text.to_string())
            }
            NodeKind::Element | NodeKind::Fragment => {
                self.empty(node);
                let child = self.create_text(text);
                self.append_child(node, child);
            }
        }
    }

    fn attributes(&self, node: NodeId) -> Vec<(String, String)> {
        self.with(node, |data| {
            data.attrs
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect()
        })
    }

    fn get_attribute(&self, node: NodeId, name: &str) -> Option<String> {
        self.with(node, |data| data.attrs.get(name).cloned())
    }

    fn set_attribute(&self, node: NodeId, name: &str, value: &str) {
        self.with_mut(node, |data| {
            data.attrs.insert(name.to_string(), value.to_string())
        });
    }

    fn remove_attribute(&self, node: NodeId, name: &str) {
        self.with_mut(node, |data| data.attrs.shift_remove(name));
    }

    fn add_class(&self, node: NodeId, class: &str) {
        if class.is_empty() || self.has_class(node, class) {
            return;
        }
        let classes = match self.get_attribute(node, "class") {
            Some(existing) if !existing.trim().is_empty() => format!("{} {}", existing.trim(), class),
            _ => class.to_string(),
        };
        self.set_attribute(node, "class", &classes);
    }

    fn remove_class(&self, node: NodeId, class: &str) {
        let Some(existing) = self.get_attribute(node, "class") else {
            return;
        };
        let remaining: Vec<&str> = existing.split_whitespace().filter(|c| *c != class).collect();
        if remaining.is_empty() {
            self.remove_attribute(node, "class");
        } else {
            self.set_attribute(node, "class", &remaining.join(" "));
        }
    }

    fn value(&self, node: NodeId) -> String {
        match self.tag_name(node).as_deref() {
            Some("select") => {
                let options = self.elements_by_tag(node, "option");
                options
                    .iter()
                    .find(|o| self.selected(**o))
                    .or_else(|| if self.is_multiple(node) { None } else { options.first() })
                    .map(|o| self.option_value(*o))
                    .unwrap_or_default()
            }
            Some("option") => self.option_value(node),
            Some("textarea") => self
                .with(node, |data| data.value.clone())
                .unwrap_or_else(|| self.text(node)),
            _ => self.with(node, |data| data.value.clone()).unwrap_or_else(|| {
                self.get_attribute(node, "value").unwrap_or_else(|| {
                    match self.get_attribute(node, "type").as_deref() {
                        Some("checkbox") | Some("radio") => "on".to_string(),
                        _ => String::new(),
                    }
                })
            }),
        }
    }

    fn set_value(&self, node: NodeId, value: &str) {
        if self.tag_name(node).as_deref() == Some("select") {
            for option in self.elements_by_tag(node, "option") {
                let selected = self.option_value(option) == value;
                self.with_mut(option, |data| data.selected = Some(selected));
            }
            return;
        }
        self.with_mut(node, |data| data.value = Some(value.to_string()));
    }

    fn checked(&self, node: NodeId) -> bool {
        self.with(node, |data| {
            data.checked
                .unwrap_or_else(|| data.attrs.contains_key("checked"))
        })
    }

    fn set_checked(&self, node: NodeId, checked: bool) {
        self.with_mut(node, |data| data.checked = Some(checked));
    }

    fn selected(&self, node: NodeId) -> bool {
        self.with(node, |data| {
            data.selected
                .unwrap_or_else(|| data.attrs.contains_key("selected"))
        })
    }

    fn set_selected(&self, node: NodeId, selected: bool) {
        if selected {
            if let Some(select) = self.owning_select(node) {
                if !self.is_multiple(select) {
                    for option in self.elements_by_tag(select, "option") {
                        self.with_mut(option, |data| data.selected = Some(false));
                    }
                }
            }
        }
        self.with_mut(node, |data| data.selected = Some(selected));
    }

    fn add_listener(
        &self,
        node: NodeId,
        event_type: &str,
        capture: bool,
        listener: Listener,
    ) -> ListenerId {
        let id = ListenerId(self.handle());
        self.listeners.borrow_mut().insert(
            id,
            ListenerEntry {
                node,
                event_type: event_type.to_string(),
                capture,
                listener,
            },
        );
        id
    }

    fn remove_listener(&self, id: ListenerId) {
        self.listeners.borrow_mut().shift_remove(&id);
    }

    fn empty(&self, node: NodeId) {
        for child in self.children(node) {
            self.remove(child);
        }
    }

    fn to_fragment(&self, node: NodeId) -> NodeId {
        let fragment = self.create_fragment();
        for child in self.children(node) {
            self.append_child(fragment, child);
        }
        fragment
    }

    fn parse_html(&self, markup: &str) -> NodeId {
        let fragment = self.create_fragment();
        for parsed in parse_markup(markup) {
            let node = self.build(&parsed);
            self.append_child(fragment, node);
        }
        fragment
    }

    fn set_timeout(&self, delay_ms: u64, callback: Box<dyn FnOnce()>) -> TimerId {
        let id = TimerId(self.handle());
        self.timers.borrow_mut().push(Timer {
            id,
            due: self.clock.get() + delay_ms,
            callback,
        });
        id
    }

    fn clear_timeout(&self, id: TimerId) {
        self.timers.borrow_mut().retain(|timer| timer.id != id);
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
