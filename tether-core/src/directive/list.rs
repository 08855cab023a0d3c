//! List Reconciler
//!
//! `v-for="item in items"` (or `(item, i) in items`) renders one block per
//! array item between two anchor comments.
//!
//! # How Reconciliation Works
//!
//! The list's watcher depends on the source array's container dep, so an
//! in-place mutation arrives as a [`Mutation`] carrying the array's id,
//! the method and its arguments. When the id matches the array currently
//! rendered, the mutation maps to a minimal patch:
//!
//! | Mutation | Patch |
//! |---|---|
//! | `push` / `unshift` | render only the new items, at the tail / head |
//! | `pop` / `shift` | remove the tail / head block |
//! | `splice(start, n, ...ins)` | remove `n` blocks at `start`, render `ins` there |
//! | `sort` / `reverse` / anything else | rebuild every block |
//!
//! Reassigning the whole array (or receiving a mutation for a different
//! array) rebuilds. Each block has its own scope holding the alias and the
//! index as reactive properties; after a patch every block's index is
//! rewritten, so index bindings stay correct without re-rendering.
//!
//! Nested lists need no path bookkeeping: an inner list watches its own
//! array, so a mutation of an inner array only ever reaches the inner
//! reconciler.

use std::rc::Rc;

use lazy_static::lazy_static;
use regex::Regex;
use tracing::{debug, warn};

use crate::compiler::{render, Block, Host, Session};
use crate::dom::{Dom, NodeId};
use crate::error::{Error, Result};
use crate::expr;
use crate::reactive::{observe, Array, ArrayMethod, Mutation, Object};
use crate::scope::Scope;
use crate::value::Value;

use super::{Descriptor, Directive, Parser};

lazy_static! {
    static ref FOR_SYNTAX: Regex = Regex::new(
        r"^\s*(?:\(\s*([A-Za-z_$][\w$]*)\s*(?:,\s*([A-Za-z_$][\w$]*)\s*)?\)|([A-Za-z_$][\w$]*))\s+(?:in|of)\s+(.+?)\s*$"
    )
    .expect("iteration pattern");
}

const DEFAULT_INDEX: &str = "$index";

/// The parts of an iteration expression.
#[derive(Debug, Clone, PartialEq)]
struct ForSyntax {
    alias: String,
    index: String,
    source: String,
}

fn parse_for(expression: &str) -> Option<ForSyntax> {
    let captures = FOR_SYNTAX.captures(expression)?;
    let alias = captures.get(1).or_else(|| captures.get(3))?.as_str();
    let index = captures.get(2).map_or(DEFAULT_INDEX, |m| m.as_str());
    Some(ForSyntax {
        alias: alias.to_string(),
        index: index.to_string(),
        source: captures.get(4)?.as_str().to_string(),
    })
}

/// One rendered item.
struct Entry {
    locals: Object,
    block: Block,
}

struct ListParser {
    host: Rc<Host>,
    scope: Scope,
    template: NodeId,
    start: NodeId,
    end: NodeId,
    alias: String,
    index: String,
    array: Option<Array>,
    entries: Vec<Entry>,
}

impl ListParser {
    fn dom(&self) -> Rc<dyn Dom> {
        self.host.dom()
    }

    fn render_entry(&self, item: Value, index: usize) -> Entry {
        let locals = Object::from_pairs([
            (self.alias.clone(), item),
            (self.index.clone(), Value::from(index)),
        ]);
        observe(&Value::Object(locals.clone()));
        let block = render(&self.host, self.template, &self.scope.child(locals.clone()));
        Entry { locals, block }
    }

    /// Render `items` and insert them so the first lands at `at`.
    fn insert_items(&mut self, at: usize, items: Vec<Value>) {
        let dom = self.dom();
        let Some(parent) = dom.parent(self.end) else {
            return;
        };
        let at = at.min(self.entries.len());
        let reference = self
            .entries
            .get(at)
            .and_then(|entry| entry.block.first_node())
            .unwrap_or(self.end);

        for (offset, item) in items.into_iter().enumerate() {
            let mut entry = self.render_entry(item, at + offset);
            entry.block.insert(parent, Some(reference));
            self.entries.insert(at + offset, entry);
        }
    }

    fn remove_range(&mut self, start: usize, count: usize) {
        let start = start.min(self.entries.len());
        let end = (start + count).min(self.entries.len());
        for entry in self.entries.drain(start..end).collect::<Vec<_>>() {
            entry.block.remove();
        }
    }

    fn clear(&mut self) {
        let count = self.entries.len();
        self.remove_range(0, count);
    }

    fn rebuild(&mut self, array: &Array) {
        self.clear();
        self.insert_items(0, array.to_vec_untracked());
        debug!(anchor = %self.start, items = self.entries.len(), "list rebuilt");
    }

    /// Apply an in-place mutation of the rendered array. Returns `false`
    /// when the mutation cannot be patched.
    fn patch(&mut self, mutation: &Mutation) -> bool {
        let args = &mutation.args;
        match mutation.method {
            ArrayMethod::Push => {
                let at = self.entries.len();
                self.insert_items(at, args.clone());
            }
            ArrayMethod::Unshift => self.insert_items(0, args.clone()),
            ArrayMethod::Pop => {
                let Some(last) = self.entries.len().checked_sub(1) else {
                    return false;
                };
                self.remove_range(last, 1);
            }
            ArrayMethod::Shift => {
                if self.entries.is_empty() {
                    return false;
                }
                self.remove_range(0, 1);
            }
            ArrayMethod::Splice => {
                let (Some(start), Some(deleted)) = (
                    args.first().and_then(Value::as_number),
                    args.get(1).and_then(Value::as_number),
                ) else {
                    return false;
                };
                let (start, deleted) = (start as usize, deleted as usize);
                if start + deleted > self.entries.len() {
                    return false;
                }
                self.remove_range(start, deleted);
                self.insert_items(start, args[2..].to_vec());
            }
            ArrayMethod::Sort | ArrayMethod::Reverse => return false,
        }
        true
    }

    /// Rewrite every entry's index, and its alias where the item at that
    /// position changed.
    fn reindex(&self, array: &Array) {
        for (index, entry) in self.entries.iter().enumerate() {
            entry.locals.set(&self.index, Value::from(index));
            entry.locals.set(&self.alias, array.get_untracked(index));
        }
    }
}

impl Parser for ListParser {
    fn update(&mut self, new: &Value, _old: &Value, mutation: Option<&Mutation>) {
        let Value::Array(array) = new else {
            if !new.is_nullish() {
                let error = Error::TypeMismatch {
                    binding: "for".into(),
                    expected: "array",
                    found: new.type_name(),
                };
                warn!(%error, "list cleared");
            }
            self.clear();
            self.array = None;
            return;
        };

        let same_array = self.array.as_ref().is_some_and(|a| a.ptr_eq(array));
        let patched = match mutation {
            Some(mutation) if same_array && mutation.array_id == array.id() => {
                self.patch(mutation) && self.entries.len() == array.len()
            }
            _ => false,
        };

        if patched {
            self.reindex(array);
        } else if !(same_array && mutation.is_none() && self.entries.len() == array.len()) {
            self.rebuild(array);
        }
        self.array = Some(array.clone());
    }

    fn teardown(&mut self) {
        self.clear();
        self.array = None;
    }
}

pub(super) fn install(
    session: &mut Session<'_>,
    node: NodeId,
    scope: &Scope,
    descriptor: Descriptor,
) -> Result<Directive> {
    let host = session.host().clone();
    let dom = host.dom();
    let syntax = parse_for(&descriptor.expression).ok_or_else(|| Error::Misplaced {
        directive: descriptor.attr.clone(),
        reason: format!("expected `item in items`, got `{}`", descriptor.expression),
    })?;
    let getter = expr::compile(&syntax.source)
        .map_err(|error| Error::expression(&syntax.source, error))?;
    let parent = dom.parent(node).ok_or_else(|| Error::Misplaced {
        directive: descriptor.attr.clone(),
        reason: "element has no parent".into(),
    })?;

    let start = dom.create_comment(&format!("{}-start", descriptor.attr));
    let end = dom.create_comment(&format!("{}-end", descriptor.attr));
    dom.insert_before(parent, start, Some(node));
    dom.insert_before(parent, end, Some(node));
    dom.remove(node);

    let parser = ListParser {
        host,
        scope: scope.clone(),
        template: node,
        start,
        end,
        alias: syntax.alias,
        index: syntax.index,
        array: None,
        entries: Vec::new(),
    };
    Ok(Directive::watched(descriptor, start, scope, getter, false, parser))
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
