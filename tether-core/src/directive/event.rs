//! Event binding.
//!
//! `v-on:click="save"`, `v-on:click="remove(item, $event)"` or the object
//! form `v-on="{ click: save, keyup: check }"`.
//!
//! A call expression is split into its callee and its argument list, each
//! with its own watcher. When the callee resolves to a different function
//! the DOM listener is swapped for one calling the new function. The
//! argument watcher keeps the arguments current; `$event` positions are
//! filled with the event object at dispatch. A bare handler is called with
//! the event as its only argument.

use std::cell::Cell;
use std::rc::{Rc, Weak};

use smallvec::SmallVec;
use tracing::{debug, warn};

use crate::compiler::Session;
use crate::dom::{Dom, Event, ListenerId, NodeId};
use crate::error::{Error, Result};
use crate::expr::{self, evaluate, Expr};
use crate::reactive::{Array, Mutation, Object, Watcher};
use crate::scope::Scope;
use crate::value::{Function, Value};

use super::{Descriptor, Directive, Parser};

/// Placeholder replaced by the event object at dispatch.
const EVENT_TOKEN: &str = "$event";

const KEY_ALIASES: &[(&str, u32)] = &[
    ("enter", 13),
    ("tab", 9),
    ("delete", 46),
    ("esc", 27),
    ("space", 32),
    ("up", 38),
    ("down", 40),
    ("left", 37),
    ("right", 39),
];

#[derive(Debug, Clone, Default)]
struct Modifiers {
    stop: bool,
    prevent: bool,
    self_only: bool,
    capture: bool,
    keys: SmallVec<[u32; 2]>,
}

impl Modifiers {
    fn from_descriptor(descriptor: &Descriptor) -> Self {
        let mut modifiers = Self::default();
        for modifier in &descriptor.modifiers {
            match modifier.as_str() {
                "stop" => modifiers.stop = true,
                "prevent" => modifiers.prevent = true,
                "self" => modifiers.self_only = true,
                "capture" => modifiers.capture = true,
                other => {
                    let code = other.parse::<u32>().ok().or_else(|| {
                        KEY_ALIASES
                            .iter()
                            .find(|(name, _)| *name == other)
                            .map(|(_, code)| *code)
                    });
                    match code {
                        Some(code) => modifiers.keys.push(code),
                        None => warn!(directive = %descriptor.attr, modifier = other, "unknown modifier ignored"),
                    }
                }
            }
        }
        modifiers
    }

    /// Whether a listener on `node` should react to `event`.
    fn accepts(&self, event: &Event, node: NodeId) -> bool {
        if self.self_only && event.target() != node {
            return false;
        }
        if !self.keys.is_empty() {
            return event
                .key_code()
                .is_some_and(|code| self.keys.contains(&code));
        }
        true
    }
}

/// One event type bound to one handler.
struct Binding {
    handler: Watcher,
    args: Option<Watcher>,
    listener: Rc<Cell<Option<ListenerId>>>,
}

struct EventParser {
    dom: Rc<dyn Dom>,
    bindings: Vec<Binding>,
}

impl Parser for EventParser {
    fn update(&mut self, _new: &Value, _old: &Value, _mutation: Option<&Mutation>) {}

    fn teardown(&mut self) {
        for binding in self.bindings.drain(..) {
            binding.handler.teardown();
            if let Some(args) = &binding.args {
                args.teardown();
            }
            if let Some(id) = binding.listener.take() {
                self.dom.remove_listener(id);
            }
        }
    }
}

pub(super) fn install(
    session: &mut Session<'_>,
    node: NodeId,
    scope: &Scope,
    descriptor: Descriptor,
) -> Result<Directive> {
    let dom = session.host().dom();
    let parsed = expr::parse(&descriptor.expression)
        .map_err(|error| Error::expression(&descriptor.expression, error))?;

    let pairs: Vec<(String, Expr)> = match (&descriptor.arg, parsed.as_ref()) {
        (Some(event_type), expression) => vec![(event_type.clone(), expression.clone())],
        (None, Expr::Object(entries)) => entries.clone(),
        (None, _) => {
            return Err(Error::Misplaced {
                directive: descriptor.attr,
                reason: "needs an event type or an object of handlers".into(),
            })
        }
    };

    let modifiers = Modifiers::from_descriptor(&descriptor);
    let bindings = pairs
        .into_iter()
        .map(|(event_type, expression)| {
            bind(&dom, node, scope, &event_type, expression, &modifiers, &descriptor.attr)
        })
        .collect();

    Ok(Directive::unwatched(
        descriptor,
        node,
        EventParser { dom, bindings },
    ))
}

fn bind(
    dom: &Rc<dyn Dom>,
    node: NodeId,
    scope: &Scope,
    event_type: &str,
    expression: Expr,
    modifiers: &Modifiers,
    attr: &str,
) -> Binding {
    let (callee, arguments) = match expression {
        Expr::Call(callee, arguments) => (*callee, Some(arguments)),
        other => (other, None),
    };

    let event_slots: SmallVec<[usize; 2]> = arguments
        .iter()
        .flatten()
        .enumerate()
        .filter(|(_, argument)| is_event_token(argument))
        .map(|(position, _)| position)
        .collect();

    let args = arguments.map(|arguments| {
        let scope = scope.clone();
        Watcher::new(
            format!("{attr} arguments"),
            move || {
                let values = arguments
                    .iter()
                    .map(|argument| {
                        if is_event_token(argument) {
                            Value::Undefined
                        } else {
                            evaluate(argument, &scope)
                        }
                    })
                    .collect();
                Value::Array(Array::from_vec(values))
            },
            |_: &Value, _: &Value, _: Option<&Mutation>| {},
        )
    });

    let listener: Rc<Cell<Option<ListenerId>>> = Rc::new(Cell::new(None));
    let attach = {
        let dom = dom.clone();
        let listener = listener.clone();
        let args = args.clone();
        let modifiers = modifiers.clone();
        let event_type = event_type.to_string();
        let attr = attr.to_string();
        move |handler: &Value| {
            if let Some(id) = listener.take() {
                dom.remove_listener(id);
            }
            let dispatch = Dispatch {
                dom: Rc::downgrade(&dom),
                node,
                handler: handler.clone(),
                args: args.clone(),
                event_slots: event_slots.clone(),
                modifiers: modifiers.clone(),
                attr: attr.clone(),
            };
            let id = dom.add_listener(
                node,
                &event_type,
                modifiers.capture,
                Rc::new(move |event: &Event| dispatch.run(event)),
            );
            listener.set(Some(id));
            debug!(directive = %attr, event = %event_type, "listener bound");
        }
    };

    let handler_scope = scope.clone();
    let attach = Rc::new(attach);
    let rebind = attach.clone();
    let handler = Watcher::new(
        attr.to_string(),
        move || evaluate(&callee, &handler_scope),
        move |new: &Value, _: &Value, _: Option<&Mutation>| rebind(new),
    );
    attach(&handler.value());

    Binding {
        handler,
        args,
        listener,
    }
}

fn is_event_token(expression: &Expr) -> bool {
    matches!(expression, Expr::Ident(name) if name == EVENT_TOKEN)
}

/// What a live listener needs to call its handler.
struct Dispatch {
    dom: Weak<dyn Dom>,
    node: NodeId,
    handler: Value,
    args: Option<Watcher>,
    event_slots: SmallVec<[usize; 2]>,
    modifiers: Modifiers,
    attr: String,
}

impl Dispatch {
    fn run(&self, event: &Event) {
        if !self.modifiers.accepts(event, self.node) {
            return;
        }
        if self.modifiers.stop {
            event.stop_propagation();
        }
        if self.modifiers.prevent {
            event.prevent_default();
        }

        let Value::Function(function) = &self.handler else {
            warn!(
                directive = %self.attr,
                found = self.handler.type_name(),
                "event handler is not a function"
            );
            return;
        };

        let event_value = match self.dom.upgrade() {
            Some(dom) => event_object(dom.as_ref(), event),
            None => Value::Undefined,
        };
        let args = match &self.args {
            Some(args) => {
                let mut values = match args.value() {
                    Value::Array(array) => array.to_vec_untracked(),
                    _ => Vec::new(),
                };
                for slot in &self.event_slots {
                    if let Some(value) = values.get_mut(*slot) {
                        *value = event_value.clone();
                    }
                }
                values
            }
            None => vec![event_value],
        };
        function.call(&args);
    }
}

/// The event as seen by handlers.
fn event_object(dom: &dyn Dom, event: &Event) -> Value {
    let target = event.target();
    let stop = event.clone();
    let prevent = event.clone();
    let object = Object::from_pairs([
        ("type", Value::str(event.event_type())),
        (
            "keyCode",
            event.key_code().map_or(Value::Undefined, |code| Value::from(code as f64)),
        ),
        ("value", Value::from(dom.value(target))),
        ("checked", Value::Bool(dom.checked(target))),
        (
            "stopPropagation",
            Value::Function(Function::new("stopPropagation", move |_: &[Value]| {
                stop.stop_propagation();
                Value::Undefined
            })),
        ),
        (
            "preventDefault",
            Value::Function(Function::new("preventDefault", move |_: &[Value]| {
                prevent.prevent_default();
                Value::Undefined
            })),
        ),
    ]);
    Value::Object(object)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(attr: &str) -> Descriptor {
        Descriptor::parse("v-", attr, "f").unwrap()
    }

    #[test]
    fn key_modifiers() {
        let modifiers = Modifiers::from_descriptor(&descriptor("v-on:keyup.enter.27.stop"));
        assert_eq!(modifiers.keys.as_slice(), &[13, 27]);
        assert!(modifiers.stop);

        let node = NodeId(1);
        assert!(modifiers.accepts(&Event::key("keyup", node, 27), node));
        assert!(!modifiers.accepts(&Event::key("keyup", node, 65), node));
        assert!(!modifiers.accepts(&Event::new("keyup", node), node));
    }

    #[test]
    fn self_modifier_checks_target() {
        let modifiers = Modifiers::from_descriptor(&descriptor("v-on:click.self"));
        assert!(modifiers.accepts(&Event::new("click", NodeId(1)), NodeId(1)));
        assert!(!modifiers.accepts(&Event::new("click", NodeId(2)), NodeId(1)));
    }

    #[test]
    fn event_token_detection() {
        assert!(is_event_token(&Expr::Ident("$event".into())));
        assert!(!is_event_token(&Expr::Ident("event".into())));
    }
}
