//! Text and HTML interpolation.
//!
//! `{{ expr }}` segments inside a text node are rewritten, together with
//! the literal text around them, into one concatenation expression:
//!
//! ```text
//! Hello {{ name }}!   =>   "" + "Hello " + (name) + "!"
//! ```
//!
//! The leading `""` forces string concatenation even when the only segment
//! is a number. A text node containing a triple mustache `{{{ expr }}}`
//! renders as markup into its parent element instead.

use std::rc::Rc;

use lazy_static::lazy_static;
use regex::Regex;

use crate::compiler::Session;
use crate::dom::{Dom, NodeId, NodeKind};
use crate::error::{Error, Result};
use crate::expr;
use crate::reactive::Mutation;
use crate::scope::Scope;
use crate::value::Value;

use super::{getter_for, Descriptor, Directive, Parser};

lazy_static! {
    /// Triple mustaches first so `{{{ x }}}` is never read as `{ {{ x }} }`.
    pub(crate) static ref MUSTACHE: Regex =
        Regex::new(r"(?s)\{\{\{(.+?)\}\}\}|\{\{(.+?)\}\}").expect("mustache pattern");
}

/// The concatenation expression for an interpolated string.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Interpolation {
    pub source: String,
    pub html: bool,
}

/// Rewrite `text` into a single expression. `None` when there is no
/// mustache in it.
pub(crate) fn interpolation(text: &str) -> Option<Interpolation> {
    let mut parts = vec![String::from("\"\"")];
    let mut html = false;
    let mut last = 0;

    for captures in MUSTACHE.captures_iter(text) {
        let whole = captures.get(0)?;
        if whole.start() > last {
            parts.push(quote(&text[last..whole.start()]));
        }
        let inner = match captures.get(1) {
            Some(triple) => {
                html = true;
                triple.as_str()
            }
            None => captures.get(2)?.as_str(),
        };
        parts.push(format!("({})", inner.trim()));
        last = whole.end();
    }

    if parts.len() == 1 {
        return None;
    }
    if last < text.len() {
        parts.push(quote(&text[last..]));
    }
    Some(Interpolation {
        source: parts.join(" + "),
        html,
    })
}

fn quote(literal: &str) -> String {
    serde_json::to_string(literal).unwrap_or_else(|_| String::from("\"\""))
}

/// Sets a node's text content.
struct TextParser {
    dom: Rc<dyn Dom>,
    node: NodeId,
}

impl Parser for TextParser {
    fn update(&mut self, new: &Value, _old: &Value, _mutation: Option<&Mutation>) {
        let text = new.to_display_string();
        if self.dom.text(self.node) != text {
            self.dom.set_text(self.node, &text);
        }
    }
}

/// Replaces an element's children with parsed markup.
struct HtmlParser {
    dom: Rc<dyn Dom>,
    node: NodeId,
}

impl Parser for HtmlParser {
    fn update(&mut self, new: &Value, _old: &Value, _mutation: Option<&Mutation>) {
        self.dom.empty(self.node);
        let fragment = self.dom.parse_html(&new.to_display_string());
        self.dom.append_child(self.node, fragment);
    }
}

pub(super) fn install_text(
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
        TextParser { dom, node },
    ))
}

pub(super) fn install_html(
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
        HtmlParser { dom, node },
    ))
}

/// Install the directive for an interpolated text node: text on the node
/// itself, or markup on `owner` (the element the node sits in) for a triple
/// mustache.
pub(crate) fn install_interpolation(
    session: &mut Session<'_>,
    node: NodeId,
    owner: NodeId,
    scope: &Scope,
) -> Result<Option<Directive>> {
    let dom = session.host().dom();
    let Some(interpolation) = interpolation(&dom.text(node)) else {
        return Ok(None);
    };

    let name = if interpolation.html { "html" } else { "text" };
    let descriptor = Descriptor {
        attr: format!("{{{{{name}}}}}"),
        name: name.to_string(),
        arg: None,
        modifiers: Default::default(),
        expression: interpolation.source,
    };
    let getter = expr::compile(&descriptor.expression)
        .map_err(|error| Error::expression(&descriptor.expression, error))?;

    if !interpolation.html {
        return Ok(Some(Directive::watched(
            descriptor,
            node,
            scope,
            getter,
            false,
            TextParser { dom, node },
        )));
    }

    if dom.kind(owner) != NodeKind::Element {
        return Err(Error::Misplaced {
            directive: descriptor.attr,
            reason: "markup interpolation needs a parent element".into(),
        });
    }
    Ok(Some(Directive::watched(
        descriptor,
        owner,
        scope,
        getter,
        false,
        HtmlParser { dom, node: owner },
    )))
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_has_no_interpolation() {
        assert_eq!(interpolation("just text"), None);
    }

    #[test]
    fn segments_are_concatenated() {
        let i = interpolation("Hello {{ name }}!").unwrap();
        assert_eq!(i.source, r#""" + "Hello " + (name) + "!""#);
        assert!(!i.html);
    }

    #[test]
    fn triple_mustache_is_markup() {
        let i = interpolation("{{{ body }}}").unwrap();
        assert_eq!(i.source, r#""" + (body)"#);
        assert!(i.html);
    }

    #[test]
    fn quotes_in_literal_text_survive() {
        let i = interpolation(r#"say "{{ word }}""#).unwrap();
        let getter = expr::compile(&i.source).unwrap();
        let data = crate::reactive::Object::from_pairs([("word", "hi")]);
        let scope = Scope::root(data);
        assert_eq!(getter.get(&scope), Value::str(r#"say "hi""#));
    }
}
