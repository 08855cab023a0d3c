//! Two-way binding.
//!
//! `v-model` renders the model into a form control and writes user input
//! back through a compiled setter. The strategy is picked by the control:
//!
//! - **text**: `<input>` of a text-like type and `<textarea>`; commits on
//!   `input` (or on `change` with `lazy`), ignores input between
//!   `compositionstart` and `compositionend`, and with `debounce[.ms]`
//!   collapses a burst of input into one commit after the burst ends
//! - **radio**: checked when the model equals the control's value
//! - **checkbox**: a boolean model, or an array model collecting the values
//!   of every checked box
//! - **select**: single value, or an array model for `multiple`
//!
//! `number` and `trim` coerce the committed value. A path that cannot be
//! assigned leaves the binding read-only.

use std::cell::Cell;
use std::rc::{Rc, Weak};

use tracing::{debug, warn};

use crate::compiler::Session;
use crate::dom::{descendant_elements, Dom, Event, ListenerId, NodeId, TimerId};
use crate::error::{Error, Result};
use crate::expr::{self, Getter, Setter};
use crate::reactive::{Mutation, ReactiveContext};
use crate::scope::Scope;
use crate::value::Value;

use super::{getter_for, Descriptor, Directive, Parser};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Control {
    Text,
    Radio,
    Checkbox,
    Select { multiple: bool },
}

impl Control {
    fn of(dom: &dyn Dom, node: NodeId) -> Option<Self> {
        match dom.tag_name(node)?.as_str() {
            "textarea" => Some(Control::Text),
            "select" => Some(Control::Select {
                multiple: dom.has_attribute(node, "multiple"),
            }),
            "input" => {
                let kind = dom
                    .get_attribute(node, "type")
                    .map(|t| t.to_ascii_lowercase())
                    .unwrap_or_default();
                match kind.as_str() {
                    "radio" => Some(Control::Radio),
                    "checkbox" => Some(Control::Checkbox),
                    "file" | "submit" | "button" | "reset" | "image" => None,
                    _ => Some(Control::Text),
                }
            }
            _ => None,
        }
    }
}

/// Writes control state back into the model.
struct Writer {
    dom: Weak<dyn Dom>,
    node: NodeId,
    scope: Scope,
    getter: Getter,
    setter: Option<Setter>,
    number: bool,
    trim: bool,
}

impl Writer {
    fn coerce(&self, raw: String) -> Value {
        let text = if self.trim { raw.trim().to_string() } else { raw };
        if self.number {
            if let Ok(n) = text.trim().parse::<f64>() {
                return Value::Number(n);
            }
        }
        Value::from(text)
    }

    fn current(&self) -> Value {
        ReactiveContext::untracked(|| self.getter.get(&self.scope))
    }

    fn write(&self, value: Value) {
        match &self.setter {
            Some(setter) => setter.set(&self.scope, value),
            None => debug!(expression = self.getter.source(), "read-only binding ignored input"),
        }
    }

    fn commit_text(&self) {
        if let Some(dom) = self.dom.upgrade() {
            let value = self.coerce(dom.value(self.node));
            self.write(value);
        }
    }

    fn commit_radio(&self) {
        if let Some(dom) = self.dom.upgrade() {
            if dom.checked(self.node) {
                let value = self.coerce(dom.value(self.node));
                self.write(value);
            }
        }
    }

    fn commit_checkbox(&self) {
        let Some(dom) = self.dom.upgrade() else {
            return;
        };
        let checked = dom.checked(self.node);
        match self.current() {
            Value::Array(array) => {
                let value = self.coerce(dom.value(self.node));
                let position = array
                    .to_vec_untracked()
                    .iter()
                    .position(|item| same_choice(item, &value));
                match (checked, position) {
                    (true, None) => {
                        array.push([value]);
                    }
                    (false, Some(index)) => {
                        array.splice(index as isize, 1, []);
                    }
                    _ => {}
                }
            }
            _ => self.write(Value::Bool(checked)),
        }
    }

    fn commit_select(&self, multiple: bool) {
        let Some(dom) = self.dom.upgrade() else {
            return;
        };
        if multiple {
            let values: Vec<Value> = options(dom.as_ref(), self.node)
                .into_iter()
                .filter(|option| dom.selected(*option))
                .map(|option| self.coerce(dom.value(option)))
                .collect();
            self.write(Value::from(values));
        } else {
            let value = self.coerce(dom.value(self.node));
            self.write(value);
        }
    }
}

/// Values match as choices when their rendered forms are equal, so a
/// numeric model matches the string value of a control.
fn same_choice(model: &Value, control: &Value) -> bool {
    model.to_display_string() == control.to_display_string()
}

fn options(dom: &dyn Dom, select: NodeId) -> Vec<NodeId> {
    descendant_elements(dom, select)
        .into_iter()
        .filter(|node| dom.tag_name(*node).as_deref() == Some("option"))
        .collect()
}

/// Render `value` into a select.
fn render_select(dom: &dyn Dom, select: NodeId, value: &Value, multiple: bool) {
    if !multiple {
        let text = value.to_display_string();
        if dom.value(select) != text {
            dom.set_value(select, &text);
        }
        return;
    }
    match value {
        Value::Array(array) => {
            let chosen = array.to_vec_untracked();
            for option in options(dom, select) {
                let option_value = Value::from(dom.value(option));
                let selected = chosen.iter().any(|item| same_choice(item, &option_value));
                dom.set_selected(option, selected);
            }
        }
        Value::Undefined | Value::Null => {}
        other => {
            let error = Error::TypeMismatch {
                binding: "model".into(),
                expected: "array for a multiple select",
                found: other.type_name(),
            };
            warn!(%error, "select left unchanged");
        }
    }
}

struct ModelParser {
    dom: Rc<dyn Dom>,
    node: NodeId,
    control: Control,
    listeners: Vec<ListenerId>,
    pending: Rc<Cell<Option<TimerId>>>,
}

impl Parser for ModelParser {
    fn update(&mut self, new: &Value, _old: &Value, _mutation: Option<&Mutation>) {
        let dom = self.dom.as_ref();
        match self.control {
            Control::Text => {
                let text = new.to_display_string();
                if dom.value(self.node) != text {
                    dom.set_value(self.node, &text);
                }
            }
            Control::Radio => {
                let value = Value::from(dom.value(self.node));
                dom.set_checked(self.node, same_choice(new, &value));
            }
            Control::Checkbox => {
                let checked = match new {
                    Value::Array(array) => {
                        let value = Value::from(dom.value(self.node));
                        array
                            .to_vec_untracked()
                            .iter()
                            .any(|item| same_choice(item, &value))
                    }
                    other => other.is_truthy(),
                };
                dom.set_checked(self.node, checked);
            }
            Control::Select { multiple } => render_select(dom, self.node, new, multiple),
        }
    }

    fn teardown(&mut self) {
        for id in self.listeners.drain(..) {
            self.dom.remove_listener(id);
        }
        if let Some(timer) = self.pending.take() {
            self.dom.clear_timeout(timer);
        }
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
    let control = Control::of(dom.as_ref(), node).ok_or_else(|| Error::UnsupportedElement {
        directive: descriptor.attr.clone(),
        element: dom.tag_name(node).unwrap_or_else(|| "#text".into()),
    })?;

    let getter = getter_for(&descriptor)?;
    let setter = match expr::compile_setter(&descriptor.expression) {
        Ok(setter) => Some(setter),
        Err(error) => {
            let error = Error::expression(&descriptor.expression, error);
            warn!(%error, "two-way binding is read-only");
            None
        }
    };

    let writer = Rc::new(Writer {
        dom: Rc::downgrade(&dom),
        node,
        scope: scope.clone(),
        getter: getter.clone(),
        setter,
        number: descriptor.has_modifier("number"),
        trim: descriptor.has_modifier("trim"),
    });
    let pending: Rc<Cell<Option<TimerId>>> = Rc::new(Cell::new(None));

    let mut listeners = Vec::new();
    let mut listen = |event_type: &str, handler: Rc<dyn Fn(&Event)>| {
        listeners.push(dom.add_listener(node, event_type, false, handler));
    };

    match control {
        Control::Text => {
            let lazy = descriptor.has_modifier("lazy");
            let debounce = descriptor.has_modifier("debounce").then(|| {
                descriptor
                    .modifier_after("debounce")
                    .and_then(|ms| ms.parse::<u64>().ok())
                    .unwrap_or(host.config().debounce_ms)
            });
            let composing = Rc::new(Cell::new(false));

            let trigger: Rc<dyn Fn()> = {
                let writer = writer.clone();
                let pending = pending.clone();
                let weak_dom = Rc::downgrade(&dom);
                Rc::new(move || match debounce {
                    Some(ms) => {
                        let Some(dom) = weak_dom.upgrade() else {
                            return;
                        };
                        if let Some(timer) = pending.take() {
                            dom.clear_timeout(timer);
                        }
                        let writer = writer.clone();
                        let done = pending.clone();
                        let timer = dom.set_timeout(
                            ms,
                            Box::new(move || {
                                done.set(None);
                                writer.commit_text();
                            }),
                        );
                        pending.set(Some(timer));
                    }
                    None => writer.commit_text(),
                })
            };

            {
                let composing = composing.clone();
                listen(
                    "compositionstart",
                    Rc::new(move |_: &Event| composing.set(true)),
                );
            }
            {
                let composing = composing.clone();
                let trigger = trigger.clone();
                listen(
                    "compositionend",
                    Rc::new(move |_: &Event| {
                        composing.set(false);
                        trigger();
                    }),
                );
            }
            if !lazy {
                let composing = composing.clone();
                let trigger = trigger.clone();
                listen(
                    "input",
                    Rc::new(move |_: &Event| {
                        if !composing.get() {
                            trigger();
                        }
                    }),
                );
            }
            listen("change", Rc::new(move |_: &Event| trigger()));
        }
        Control::Radio => {
            let writer = writer.clone();
            listen("change", Rc::new(move |_: &Event| writer.commit_radio()));
        }
        Control::Checkbox => {
            let writer = writer.clone();
            listen("change", Rc::new(move |_: &Event| writer.commit_checkbox()));
        }
        Control::Select { multiple } => {
            let writer = writer.clone();
            listen(
                "change",
                Rc::new(move |_: &Event| writer.commit_select(multiple)),
            );
        }
    }

    let parser = ModelParser {
        dom: dom.clone(),
        node,
        control,
        listeners,
        pending,
    };
    let directive = Directive::watched(descriptor, node, scope, getter, false, parser);

    if let (Control::Select { multiple }, Some(watcher)) = (control, directive.watcher()) {
        let watcher = watcher.clone();
        session.defer(move || render_select(dom.as_ref(), node, &watcher.value(), multiple));
    }
    Ok(directive)
}
