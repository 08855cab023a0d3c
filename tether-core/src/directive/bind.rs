//! Attribute, class and style binding.
//!
//! `v-bind:name="expr"` binds one attribute; `v-bind="{ name: expr, ... }"`
//! binds several. `class` and `style` accept a string, an array, or an
//! object (`{ active: isActive }` for classes, `{ color: c }` for styles),
//! and only the delta between the previously applied and the new value is
//! written: a class that stays on is never removed and re-added.

use std::rc::Rc;

use indexmap::IndexMap;
use tracing::warn;

use crate::compiler::Session;
use crate::dom::{Dom, NodeId};
use crate::error::{Error, Result};
use crate::reactive::Mutation;
use crate::scope::Scope;
use crate::value::Value;

use super::{getter_for, Descriptor, Directive, Parser};

/// What a binding last wrote for one attribute name.
#[derive(Debug, Clone, PartialEq)]
enum Applied {
    Attr,
    Classes(Vec<String>),
    Style(IndexMap<String, String>),
}

struct BindParser {
    dom: Rc<dyn Dom>,
    node: NodeId,
    /// `None` for the object form.
    attr: Option<String>,
    applied: IndexMap<String, Applied>,
}

impl BindParser {
    fn apply(&mut self, name: &str, value: &Value) {
        let previous = self.applied.shift_remove(name);
        let applied = match name {
            "class" => {
                let old = match previous {
                    Some(Applied::Classes(old)) => old,
                    _ => Vec::new(),
                };
                let new = class_names(value);
                for class in old.iter().filter(|c| !new.contains(c)) {
                    self.dom.remove_class(self.node, class);
                }
                for class in new.iter().filter(|c| !old.contains(c)) {
                    self.dom.add_class(self.node, class);
                }
                Applied::Classes(new)
            }
            "style" => {
                let old = match previous {
                    Some(Applied::Style(old)) => old,
                    _ => IndexMap::new(),
                };
                let new = style_value(value);
                let mut current = style_entries(self.dom.as_ref(), self.node);
                for property in old.keys().filter(|p| !new.contains_key(*p)) {
                    current.shift_remove(property);
                }
                for (property, value) in &new {
                    current.insert(property.clone(), value.clone());
                }
                write_style(self.dom.as_ref(), self.node, &current);
                Applied::Style(new)
            }
            _ => {
                self.write_attr(name, value);
                Applied::Attr
            }
        };
        self.applied.insert(name.to_string(), applied);
    }

    fn write_attr(&self, name: &str, value: &Value) {
        let is_control = matches!(
            self.dom.tag_name(self.node).as_deref(),
            Some("input" | "textarea" | "select")
        );
        match name {
            "value" if is_control => {
                self.dom.set_value(self.node, &value.to_display_string());
            }
            "checked" => self.dom.set_checked(self.node, value.is_truthy()),
            "selected" => self.dom.set_selected(self.node, value.is_truthy()),
            _ => match value {
                Value::Undefined | Value::Null | Value::Bool(false) => {
                    self.dom.remove_attribute(self.node, name)
                }
                Value::Bool(true) => self.dom.set_attribute(self.node, name, ""),
                other => self
                    .dom
                    .set_attribute(self.node, name, &other.to_display_string()),
            },
        }
    }

    /// Undo what was applied for `name`.
    fn clear(&mut self, name: &str) {
        match self.applied.shift_remove(name) {
            Some(Applied::Classes(classes)) => {
                for class in &classes {
                    self.dom.remove_class(self.node, class);
                }
            }
            Some(Applied::Style(old)) => {
                let mut current = style_entries(self.dom.as_ref(), self.node);
                for property in old.keys() {
                    current.shift_remove(property);
                }
                write_style(self.dom.as_ref(), self.node, &current);
            }
            Some(Applied::Attr) => self.write_attr(name, &Value::Undefined),
            None => {}
        }
    }
}

impl Parser for BindParser {
    fn update(&mut self, new: &Value, _old: &Value, _mutation: Option<&Mutation>) {
        if let Some(attr) = self.attr.clone() {
            self.apply(&attr, new);
            return;
        }

        let entries = match new {
            Value::Object(object) => object.entries_untracked(),
            Value::Undefined | Value::Null => Vec::new(),
            other => {
                let error = Error::TypeMismatch {
                    binding: "bind".into(),
                    expected: "object",
                    found: other.type_name(),
                };
                warn!(%error, "attribute binding skipped");
                return;
            }
        };

        let stale: Vec<String> = self
            .applied
            .keys()
            .filter(|name| !entries.iter().any(|(key, _)| key == *name))
            .cloned()
            .collect();
        for name in stale {
            self.clear(&name);
        }
        for (name, value) in &entries {
            self.apply(name, value);
        }
    }
}

pub(super) fn install(
    session: &mut Session<'_>,
    node: NodeId,
    scope: &Scope,
    descriptor: Descriptor,
) -> Result<Directive> {
    let getter = getter_for(&descriptor)?;
    let attr = descriptor.arg.clone();
    let deep = !matches!(attr.as_deref(), Some(name) if name != "class" && name != "style");
    let parser = BindParser {
        dom: session.host().dom(),
        node,
        attr,
        applied: IndexMap::new(),
    };
    Ok(Directive::watched(descriptor, node, scope, getter, deep, parser))
}

/// Class names from a string, array or object-of-booleans value.
fn class_names(value: &Value) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    let mut push = |name: &str| {
        if !name.is_empty() && !names.iter().any(|n| n == name) {
            names.push(name.to_string());
        }
    };
    match value {
        Value::Undefined | Value::Null | Value::Bool(false) => {}
        Value::Str(s) => s.split_whitespace().for_each(&mut push),
        Value::Array(array) => {
            for item in array.to_vec_untracked() {
                for name in class_names(&item) {
                    push(&name);
                }
            }
        }
        Value::Object(object) => {
            for (name, enabled) in object.entries_untracked() {
                if enabled.is_truthy() {
                    push(&name);
                }
            }
        }
        other => push(&other.to_display_string()),
    }
    names
}

/// Style declarations from a string, array or object value.
fn style_value(value: &Value) -> IndexMap<String, String> {
    let mut out = IndexMap::new();
    match value {
        Value::Str(s) => out.extend(parse_style(s)),
        Value::Array(array) => {
            for item in array.to_vec_untracked() {
                out.extend(style_value(&item));
            }
        }
        Value::Object(object) => {
            for (property, value) in object.entries_untracked() {
                let value = value.to_display_string();
                if !value.is_empty() {
                    out.insert(hyphenate(&property), value);
                }
            }
        }
        _ => {}
    }
    out
}

fn parse_style(text: &str) -> IndexMap<String, String> {
    text.split(';')
        .filter_map(|declaration| {
            let (property, value) = declaration.split_once(':')?;
            let property = property.trim();
            let value = value.trim();
            (!property.is_empty() && !value.is_empty())
                .then(|| (property.to_string(), value.to_string()))
        })
        .collect()
}

/// `fontSize` -> `font-size`.
fn hyphenate(property: &str) -> String {
    let mut out = String::with_capacity(property.len() + 2);
    for c in property.chars() {
        if c.is_ascii_uppercase() {
            out.push('-');
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

/// The declarations currently in `node`'s style attribute.
pub(super) fn style_entries(dom: &dyn Dom, node: NodeId) -> IndexMap<String, String> {
    dom.get_attribute(node, "style")
        .map(|style| parse_style(&style))
        .unwrap_or_default()
}

/// Write `entries` as `node`'s style attribute, removing it when empty.
pub(super) fn write_style(dom: &dyn Dom, node: NodeId, entries: &IndexMap<String, String>) {
    if entries.is_empty() {
        dom.remove_attribute(node, "style");
        return;
    }
    let style = entries
        .iter()
        .map(|(property, value)| format!("{property}: {value}"))
        .collect::<Vec<_>>()
        .join("; ");
    dom.set_attribute(node, "style", &style);
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
