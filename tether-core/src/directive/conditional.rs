//! Conditional rendering: `v-if` with an optional `v-else` sibling.
//!
//! The element is swapped for an anchor comment and kept as a template.
//! Rendered content always sits directly after the anchor.

use std::rc::Rc;

use tracing::debug;

use crate::compiler::{render, Block, Host, Session};
use crate::dom::{Dom, NodeId, NodeKind};
use crate::error::{Error, Result};
use crate::reactive::Mutation;
use crate::scope::Scope;
use crate::value::Value;

use super::{getter_for, Descriptor, Directive, Parser};

struct IfParser {
    host: Rc<Host>,
    scope: Scope,
    anchor: NodeId,
    template: NodeId,
    else_template: Option<NodeId>,
    block: Option<Block>,
    /// Which branch is rendered, once the first update has run.
    showing: Option<bool>,
}

impl IfParser {
    fn clear(&mut self) {
        if let Some(block) = self.block.take() {
            block.remove();
        }
    }
}

impl Parser for IfParser {
    fn update(&mut self, new: &Value, _old: &Value, _mutation: Option<&Mutation>) {
        let truthy = new.is_truthy();
        if self.showing == Some(truthy) {
            return;
        }
        self.clear();
        self.showing = Some(truthy);

        let template = if truthy {
            self.template
        } else {
            match self.else_template {
                Some(template) => template,
                None => return,
            }
        };

        let dom = self.host.dom();
        let Some(parent) = dom.parent(self.anchor) else {
            debug!(anchor = %self.anchor, "conditional anchor detached");
            return;
        };
        let mut block = render(&self.host, template, &self.scope);
        block.insert(parent, dom.next_sibling(self.anchor));
        self.block = Some(block);
    }

    fn teardown(&mut self) {
        self.clear();
        self.showing = None;
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
    let getter = getter_for(&descriptor)?;
    let parent = dom.parent(node).ok_or_else(|| Error::Misplaced {
        directive: descriptor.attr.clone(),
        reason: "element has no parent".into(),
    })?;

    let else_attr = format!("{}else", host.config().prefix);
    let else_template = next_element(dom.as_ref(), node)
        .filter(|sibling| dom.has_attribute(*sibling, &else_attr));
    if let Some(sibling) = else_template {
        dom.remove_attribute(sibling, &else_attr);
        dom.remove(sibling);
    }

    let anchor = dom.create_comment(&descriptor.attr);
    dom.insert_before(parent, anchor, Some(node));
    dom.remove(node);

    let parser = IfParser {
        host,
        scope: scope.clone(),
        anchor,
        template: node,
        else_template,
        block: None,
        showing: None,
    };
    Ok(Directive::watched(descriptor, anchor, scope, getter, false, parser))
}

/// The next element sibling, skipping whitespace and comments.
fn next_element(dom: &dyn Dom, node: NodeId) -> Option<NodeId> {
    let mut current = dom.next_sibling(node);
    while let Some(sibling) = current {
        match dom.kind(sibling) {
            NodeKind::Element => return Some(sibling),
            NodeKind::Text if !dom.text(sibling).trim().is_empty() => return None,
            _ => current = dom.next_sibling(sibling),
        }
    }
    None
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use crate::compiler::{compile_root, Host};
    use crate::config::Config;
    use crate::dom::{Dom, MemoryDom};
    use crate::reactive::observe;
    use crate::scope::Scope;
    use crate::value::Value;
    use std::rc::Rc;

    #[test]
    fn toggles_between_branches() {
        let dom = Rc::new(MemoryDom::default());
        let root = dom.root_with(r#"<p v-if="ok">yes {{ n }}</p> <p v-else>no</p>"#);
        let data = Value::from(serde_json::json!({ "ok": true, "n": 1 }));
        observe(&data);
        let data = data.as_object().cloned().unwrap();
        let host = Rc::new(Host::new(dom.clone(), Config::default()));
        let _directives = compile_root(&host, root, &Scope::root(data.clone()));

        assert_eq!(dom.text(root).trim(), "yes 1");
        data.set("ok", Value::Bool(false));
        assert_eq!(dom.text(root).trim(), "no");
        assert_eq!(data.dep("n").unwrap().subscriber_count(), 0);

        data.set("ok", Value::Bool(true));
        data.set("n", Value::from(2));
        assert_eq!(dom.text(root).trim(), "yes 2");
    }
}
