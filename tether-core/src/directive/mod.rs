//! Directives
//!
//! A directive binds one node to one piece of behaviour. It is built in two
//! phases:
//!
//! 1. **Parse**: the attribute is split into a [`Descriptor`], placement is
//!    validated, static facts are precomputed, and a [`Watcher`] is created
//!    over the directive's expression.
//! 2. **Update**: the directive's [`Parser`] receives `(new, old,
//!    mutation)` once on install with the initial value, then on every
//!    change the watcher reports.
//!
//! # Attribute grammar
//!
//! ```text
//! v-name                 v-show="visible"
//! v-name:arg             v-bind:href="url"
//! v-name:arg.mod.mod     v-on:keyup.enter.prevent="save"
//! v-name.mod             v-model.lazy="title"
//! ```
//!
//! Modifiers are only split off for `on` and `model`; for every other
//! directive the text after `:` is the argument verbatim.
//!
//! # Re-entrancy
//!
//! An update may write to the model, which may notify the same directive
//! again before the first update has returned. The parser is borrowed with
//! `try_borrow_mut`; a nested update is queued and replayed in order once
//! the running update returns.

mod bind;
mod conditional;
mod event;
mod list;
mod misc;
mod model;
mod text;

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;

use smallvec::SmallVec;
use tracing::{debug, trace};

use crate::compiler::Session;
use crate::dom::NodeId;
use crate::error::{Error, Result};
use crate::expr::{self, Getter};
use crate::reactive::{Mutation, Watcher};
use crate::scope::Scope;
use crate::value::Value;

pub(crate) use text::{install_interpolation, MUSTACHE};

/// A parsed directive attribute.
#[derive(Debug, Clone, PartialEq)]
pub struct Descriptor {
    /// Full attribute name, prefix included.
    pub attr: String,
    /// Directive name without the prefix (`on`, `bind`, `model`, ...).
    pub name: String,
    pub arg: Option<String>,
    pub modifiers: SmallVec<[String; 4]>,
    pub expression: String,
}

impl Descriptor {
    /// Parse `attr="value"`. Returns `None` when the attribute does not
    /// carry `prefix`.
    pub fn parse(prefix: &str, attr: &str, value: &str) -> Option<Self> {
        let rest = attr.strip_prefix(prefix)?;
        if rest.is_empty() {
            return None;
        }

        let name_end = rest.find([':', '.']).unwrap_or(rest.len());
        let name = &rest[..name_end];
        let tail = &rest[name_end..];
        let splits_modifiers = matches!(name, "on" | "model");

        let (arg, modifiers) = if splits_modifiers {
            let (arg, mods) = match tail.strip_prefix(':') {
                Some(after) => match after.find('.') {
                    Some(dot) => (Some(&after[..dot]), &after[dot..]),
                    None => (Some(after), ""),
                },
                None => (None, tail),
            };
            let modifiers = mods
                .split('.')
                .filter(|m| !m.is_empty())
                .map(str::to_string)
                .collect();
            (arg.filter(|a| !a.is_empty()).map(str::to_string), modifiers)
        } else {
            let arg = tail
                .strip_prefix(':')
                .filter(|a| !a.is_empty())
                .map(str::to_string);
            (arg, SmallVec::new())
        };

        Some(Self {
            attr: attr.to_string(),
            name: name.to_string(),
            arg,
            modifiers,
            expression: value.trim().to_string(),
        })
    }

    pub fn has_modifier(&self, modifier: &str) -> bool {
        self.modifiers.iter().any(|m| m == modifier)
    }

    /// The modifier following `modifier`, e.g. `300` in `debounce.300`.
    pub fn modifier_after(&self, modifier: &str) -> Option<&str> {
        let position = self.modifiers.iter().position(|m| m == modifier)?;
        self.modifiers.get(position + 1).map(String::as_str)
    }

    /// Whether this is one of the structural directives that own their
    /// element's subtree.
    pub fn is_structural(&self) -> bool {
        matches!(self.name.as_str(), "for" | "if" | "else")
    }
}

/// The DOM-update half of a directive.
pub(crate) trait Parser {
    fn update(&mut self, new: &Value, old: &Value, mutation: Option<&Mutation>);

    /// Release everything the parser holds: listeners, timers, rendered
    /// blocks, nested watchers.
    fn teardown(&mut self) {}
}

/// A live directive instance.
pub(crate) struct Directive {
    descriptor: Descriptor,
    node: NodeId,
    watcher: Option<Watcher>,
    parser: Rc<RefCell<dyn Parser>>,
    pending: Rc<RefCell<VecDeque<Update>>>,
}

/// An update that arrived while the parser was busy.
struct Update {
    new: Value,
    old: Value,
    mutation: Option<Mutation>,
}

impl Directive {
    /// Watch `getter` in `scope` and drive `parser` with its values. The
    /// parser receives the initial value before this returns.
    pub(crate) fn watched<P>(
        descriptor: Descriptor,
        node: NodeId,
        scope: &Scope,
        getter: Getter,
        deep: bool,
        parser: P,
    ) -> Self
    where
        P: Parser + 'static,
    {
        let parser: Rc<RefCell<dyn Parser>> = Rc::new(RefCell::new(parser));

        let pending = Rc::new(RefCell::new(VecDeque::new()));

        let target = Rc::downgrade(&parser);
        let queue = Rc::downgrade(&pending);
        let attr = descriptor.attr.clone();
        let callback = move |new: &Value, old: &Value, mutation: Option<&Mutation>| {
            if let (Some(parser), Some(queue)) = (target.upgrade(), queue.upgrade()) {
                dispatch(&attr, &parser, &queue, new, old, mutation);
            }
        };
        let read_scope = scope.clone();
        let read = move || getter.get(&read_scope);
        let watcher = if deep {
            Watcher::deep(descriptor.expression.clone(), read, callback)
        } else {
            Watcher::new(descriptor.expression.clone(), read, callback)
        };

        let initial = watcher.value();
        dispatch(
            &descriptor.attr,
            &parser,
            &pending,
            &initial,
            &Value::Undefined,
            None,
        );
        trace!(directive = %descriptor.attr, node = %node, "directive installed");

        Self {
            descriptor,
            node,
            watcher: Some(watcher),
            parser,
            pending,
        }
    }

    /// A directive with no watcher of its own; the parser manages whatever
    /// it needs.
    pub(crate) fn unwatched<P>(descriptor: Descriptor, node: NodeId, parser: P) -> Self
    where
        P: Parser + 'static,
    {
        trace!(directive = %descriptor.attr, node = %node, "directive installed");
        Self {
            descriptor,
            node,
            watcher: None,
            parser: Rc::new(RefCell::new(parser)),
            pending: Rc::new(RefCell::new(VecDeque::new())),
        }
    }

    pub fn descriptor(&self) -> &Descriptor {
        &self.descriptor
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn watcher(&self) -> Option<&Watcher> {
        self.watcher.as_ref()
    }

    /// Unsubscribe the watcher, then let the parser release its resources.
    pub fn teardown(&self) {
        if let Some(watcher) = &self.watcher {
            watcher.teardown();
        }
        self.pending.borrow_mut().clear();
        match self.parser.try_borrow_mut() {
            Ok(mut parser) => parser.teardown(),
            Err(_) => debug!(directive = %self.descriptor.attr, "teardown during update skipped"),
        }
    }
}

impl fmt::Debug for Directive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Directive")
            .field("attr", &self.descriptor.attr)
            .field("node", &self.node)
            .finish()
    }
}

/// Run one update. If the parser is already updating, the values are
/// queued and the running call replays them before releasing the parser.
fn dispatch(
    attr: &str,
    parser: &RefCell<dyn Parser>,
    pending: &RefCell<VecDeque<Update>>,
    new: &Value,
    old: &Value,
    mutation: Option<&Mutation>,
) {
    let Ok(mut parser) = parser.try_borrow_mut() else {
        debug!(directive = attr, "re-entrant update queued");
        pending.borrow_mut().push_back(Update {
            new: new.clone(),
            old: old.clone(),
            mutation: mutation.cloned(),
        });
        return;
    };
    parser.update(new, old, mutation);
    loop {
        let next = pending.borrow_mut().pop_front();
        let Some(update) = next else { break };
        trace!(directive = attr, "replaying queued update");
        parser.update(&update.new, &update.old, update.mutation.as_ref());
    }
}

/// Compile a directive's expression, mapping failures into [`Error`].
pub(crate) fn getter_for(descriptor: &Descriptor) -> Result<Getter> {
    expr::compile(&descriptor.expression)
        .map_err(|error| Error::expression(&descriptor.expression, error))
}

/// Install a non-structural directive on `node`.
pub(crate) fn install(
    session: &mut Session<'_>,
    node: NodeId,
    scope: &Scope,
    descriptor: Descriptor,
) -> Result<Directive> {
    match descriptor.name.as_str() {
        "text" => text::install_text(session, node, scope, descriptor),
        "html" => text::install_html(session, node, scope, descriptor),
        "show" => misc::install_show(session, node, scope, descriptor),
        "bind" => bind::install(session, node, scope, descriptor),
        "model" => model::install(session, node, scope, descriptor),
        "on" => event::install(session, node, scope, descriptor),
        "el" => misc::install_element_ref(session, node, descriptor),
        "for" | "if" | "else" => Err(Error::Misplaced {
            directive: descriptor.attr,
            reason: "structural directives are not allowed here".into(),
        }),
        name if session.host().has_custom(name) => {
            misc::install_custom(session, node, scope, descriptor)
        }
        _ => Err(Error::UnknownDirective(descriptor.attr)),
    }
}

/// Install a structural directive. `node` is replaced by anchors and kept
/// as a template.
pub(crate) fn install_structural(
    session: &mut Session<'_>,
    node: NodeId,
    scope: &Scope,
    descriptor: Descriptor,
) -> Result<Directive> {
    match descriptor.name.as_str() {
        "for" => list::install(session, node, scope, descriptor),
        "if" => conditional::install(session, node, scope, descriptor),
        _ => Err(Error::Misplaced {
            directive: descriptor.attr,
            reason: "must directly follow an element carrying an if directive".into(),
        }),
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
