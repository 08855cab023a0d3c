//! Visibility, element references and user directives.

use std::rc::Rc;

use crate::compiler::{CustomDirective, Host, Session};
use crate::dom::{Dom, NodeId};
use crate::error::{Error, Result};
use crate::reactive::Mutation;
use crate::scope::Scope;
use crate::value::Value;

use super::bind::{style_entries, write_style};
use super::{getter_for, Descriptor, Directive, Parser};

/// `v-show`: toggles `display: none`, leaving other declarations alone.
struct ShowParser {
    dom: Rc<dyn Dom>,
    node: NodeId,
}

impl Parser for ShowParser {
    fn update(&mut self, new: &Value, _old: &Value, _mutation: Option<&Mutation>) {
        let mut style = style_entries(self.dom.as_ref(), self.node);
        if new.is_truthy() {
            if style.get("display").map(String::as_str) != Some("none") {
                return;
            }
            style.shift_remove("display");
        } else {
            style.insert("display".into(), "none".into());
        }
        write_style(self.dom.as_ref(), self.node, &style);
    }
}

pub(super) fn install_show(
    session: &mut Session<'_>,
    node: NodeId,
    scope: &Scope,
    descriptor: Descriptor,
) -> Result<Directive> {
    let getter = getter_for(&descriptor)?;
    let dom = session.host().dom();
    Ok(Directive::watched(
        descriptor,
        node,
        scope,
        getter,
        false,
        ShowParser { dom, node },
    ))
}

/// `v-el`: keeps the element in the instance's registry while it is live.
struct ElementRef {
    host: Rc<Host>,
    name: String,
    node: NodeId,
}

impl Parser for ElementRef {
    fn update(&mut self, _new: &Value, _old: &Value, _mutation: Option<&Mutation>) {}

    fn teardown(&mut self) {
        self.host.unregister_element(&self.name, self.node);
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_alphabetic() || c == '_' || c == '$')
        && chars.all(|c| c.is_alphanumeric() || c == '_' || c == '$' || c == '-')
}

pub(super) fn install_element_ref(
    session: &mut Session<'_>,
    node: NodeId,
    descriptor: Descriptor,
) -> Result<Directive> {
    let name = descriptor.expression.clone();
    if !is_identifier(&name) {
        return Err(Error::StaticOnly {
            directive: descriptor.attr,
            value: name,
        });
    }
    let host = session.host().clone();
    host.register_element(&name, node);
    Ok(Directive::unwatched(
        descriptor,
        node,
        ElementRef { host, name, node },
    ))
}

/// A registered user directive.
struct CustomParser {
    dom: Rc<dyn Dom>,
    node: NodeId,
    update: CustomDirective,
}

impl Parser for CustomParser {
    fn update(&mut self, new: &Value, old: &Value, _mutation: Option<&Mutation>) {
        (self.update)(self.dom.as_ref(), self.node, new, old);
    }
}

pub(super) fn install_custom(
    session: &mut Session<'_>,
    node: NodeId,
    scope: &Scope,
    descriptor: Descriptor,
) -> Result<Directive> {
    let host = session.host();
    let update = host
        .custom(&descriptor.name)
        .ok_or_else(|| Error::UnknownDirective(descriptor.attr.clone()))?;
    let getter = getter_for(&descriptor)?;
    let parser = CustomParser {
        dom: host.dom(),
        node,
        update,
    };
    Ok(Directive::watched(descriptor, node, scope, getter, false, parser))
}

#[cfg(test)]
mod tests {
    use super::is_identifier;

    #[test]
    fn element_names() {
        assert!(is_identifier("input"));
        assert!(is_identifier("$panel-2"));
        assert!(!is_identifier("a.b"));
        assert!(!is_identifier("x + 1"));
        assert!(!is_identifier(""));
    }
}
