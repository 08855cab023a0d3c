//! DOM Boundary
//!
//! The runtime never touches a platform document directly. Everything it
//! needs (creating nodes, moving them, reading and writing attributes and
//! form-control state, listening for events, parsing markup, scheduling a
//! timer) goes through the [`Dom`] trait, addressed by copyable [`NodeId`]
//! handles.
//!
//! [`MemoryDom`] is a complete in-memory implementation, used for headless
//! rendering and throughout the tests.
//!
//! # Conventions
//!
//! - Inserting a fragment inserts its children and leaves it empty.
//! - `remove` detaches a node from its parent; the node stays usable and
//!   may be inserted again.
//! - Methods take `&self`: listeners and timers call back into the runtime,
//!   which calls back into the DOM, so implementations use interior
//!   mutability and must not hold borrows while invoking callbacks.

mod html;
mod memory;

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

pub use memory::MemoryDom;

/// Handle to a node owned by a [`Dom`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Element,
    Text,
    Comment,
    Fragment,
}

/// Handle to a registered event listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub(crate) u64);

/// Handle to a scheduled timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerId(pub(crate) u64);

pub type Listener = Rc<dyn Fn(&Event)>;

/// A dispatched event.
///
/// Cloning shares the propagation and default-action flags, so a clone
/// handed to user code can still stop the original.
#[derive(Clone)]
pub struct Event {
    event_type: Rc<str>,
    target: NodeId,
    key_code: Option<u32>,
    propagation_stopped: Rc<Cell<bool>>,
    default_prevented: Rc<Cell<bool>>,
}

impl Event {
    pub fn new(event_type: &str, target: NodeId) -> Self {
        Self {
            event_type: Rc::from(event_type),
            target,
            key_code: None,
            propagation_stopped: Rc::new(Cell::new(false)),
            default_prevented: Rc::new(Cell::new(false)),
        }
    }

    /// A keyboard event carrying a key code.
    pub fn key(event_type: &str, target: NodeId, key_code: u32) -> Self {
        Self {
            key_code: Some(key_code),
            ..Self::new(event_type, target)
        }
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn target(&self) -> NodeId {
        self.target
    }

    pub fn key_code(&self) -> Option<u32> {
        self.key_code
    }

    pub fn stop_propagation(&self) {
        self.propagation_stopped.set(true);
    }

    pub fn is_propagation_stopped(&self) -> bool {
        self.propagation_stopped.get()
    }

    pub fn prevent_default(&self) {
        self.default_prevented.set(true);
    }

    pub fn is_default_prevented(&self) -> bool {
        self.default_prevented.get()
    }
}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("type", &self.event_type)
            .field("target", &self.target)
            .field("key_code", &self.key_code)
            .finish()
    }
}

/// The primitive document operations the runtime relies on.
pub trait Dom {
    fn create_element(&self, tag: &str) -> NodeId;
    fn create_text(&self, text: &str) -> NodeId;
    fn create_comment(&self, text: &str) -> NodeId;
    fn create_fragment(&self) -> NodeId;

    fn kind(&self, node: NodeId) -> NodeKind;

    /// Lowercase tag name of an element.
    fn tag_name(&self, node: NodeId) -> Option<String>;

    fn parent(&self, node: NodeId) -> Option<NodeId>;
    fn children(&self, node: NodeId) -> Vec<NodeId>;
    fn next_sibling(&self, node: NodeId) -> Option<NodeId>;

    fn append_child(&self, parent: NodeId, child: NodeId);

    /// Insert `child` before `reference`, or append when `reference` is
    /// `None`.
    fn insert_before(&self, parent: NodeId, child: NodeId, reference: Option<NodeId>);

    /// Detach `node` from its parent.
    fn remove(&self, node: NodeId);

    /// Deep copy of `node`, detached. Listeners are not copied.
    fn clone_node(&self, node: NodeId) -> NodeId;

    /// Text content: a text or comment node's data, or the concatenated
    /// text of an element's descendants.
    fn text(&self, node: NodeId) -> String;

    /// Set a text node's data, or replace an element's children with text.
    fn set_text(&self, node: NodeId, text: &str);

    fn attributes(&self, node: NodeId) -> Vec<(String, String)>;
    fn get_attribute(&self, node: NodeId, name: &str) -> Option<String>;
    fn set_attribute(&self, node: NodeId, name: &str, value: &str);
    fn remove_attribute(&self, node: NodeId, name: &str);

    fn has_attribute(&self, node: NodeId, name: &str) -> bool {
        self.get_attribute(node, name).is_some()
    }

    fn add_class(&self, node: NodeId, class: &str);
    fn remove_class(&self, node: NodeId, class: &str);
    fn has_class(&self, node: NodeId, class: &str) -> bool {
        self.get_attribute(node, "class")
            .is_some_and(|classes| classes.split_whitespace().any(|c| c == class))
    }

    /// Current value of a form control.
    fn value(&self, node: NodeId) -> String;
    fn set_value(&self, node: NodeId, value: &str);
    fn checked(&self, node: NodeId) -> bool;
    fn set_checked(&self, node: NodeId, checked: bool);
    fn selected(&self, node: NodeId) -> bool;
    fn set_selected(&self, node: NodeId, selected: bool);

    fn add_listener(
        &self,
        node: NodeId,
        event_type: &str,
        capture: bool,
        listener: Listener,
    ) -> ListenerId;
    fn remove_listener(&self, id: ListenerId);

    /// Remove every child of `node`.
    fn empty(&self, node: NodeId);

    /// Move the children of `node` into a new fragment.
    fn to_fragment(&self, node: NodeId) -> NodeId;

    /// Parse markup into a new fragment.
    fn parse_html(&self, markup: &str) -> NodeId;

    fn set_timeout(&self, delay_ms: u64, callback: Box<dyn FnOnce()>) -> TimerId;
    fn clear_timeout(&self, id: TimerId);
}

/// Every element below `root` (not including it), in document order.
pub fn descendant_elements(dom: &dyn Dom, root: NodeId) -> Vec<NodeId> {
    let mut out = Vec::new();
    let mut stack: Vec<NodeId> = dom.children(root).into_iter().rev().collect();
    while let Some(node) = stack.pop() {
        if dom.kind(node) == NodeKind::Element {
            out.push(node);
        }
        stack.extend(dom.children(node).into_iter().rev());
    }
    out
}

/// Whether `node` is `ancestor` or lies below it.
pub fn contains(dom: &dyn Dom, ancestor: NodeId, node: NodeId) -> bool {
    let mut current = Some(node);
    while let Some(n) = current {
        if n == ancestor {
            return true;
        }
        current = dom.parent(n);
    }
    false
}
