//! Markup parsing for [`MemoryDom`](super::MemoryDom).
//!
//! Markup goes through html5ever as a full document; the implied `html`,
//! `head` and `body` wrappers are flattened away and what remains is
//! returned as a plain tree.

use html5ever::parse_document;
use html5ever::tendril::TendrilSink;
use markup5ever_rcdom::{Handle, NodeData, RcDom};
use tracing::warn;

/// A parsed node, independent of any document.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ParsedNode {
    Element {
        tag: String,
        attrs: Vec<(String, String)>,
        children: Vec<ParsedNode>,
    },
    Text(String),
    Comment(String),
}

/// Parse `markup` as body content.
pub(crate) fn parse_markup(markup: &str) -> Vec<ParsedNode> {
    let dom = match parse_document(RcDom::default(), Default::default())
        .from_utf8()
        .read_from(&mut markup.as_bytes())
    {
        Ok(dom) => dom,
        Err(error) => {
            warn!(%error, "failed to parse markup");
            return Vec::new();
        }
    };

    let mut out = Vec::new();
    collect_content(&dom.document, &mut out);
    out
}

fn collect_content(handle: &Handle, out: &mut Vec<ParsedNode>) {
    match &handle.data {
        NodeData::Document => {
            for child in handle.children.borrow().iter() {
                collect_content(child, out);
            }
        }
        NodeData::Element { name, .. }
            if matches!(&*name.local, "html" | "head" | "body") =>
        {
            for child in handle.children.borrow().iter() {
                collect_content(child, out);
            }
        }
        NodeData::Doctype { .. } | NodeData::ProcessingInstruction { .. } => {}
        _ => out.extend(convert(handle)),
    }
}

fn convert(handle: &Handle) -> Option<ParsedNode> {
    match &handle.data {
        NodeData::Element { name, attrs, .. } => {
            let attrs = attrs
                .borrow()
                .iter()
                .map(|attr| (attr.name.local.to_string(), attr.value.to_string()))
                .collect();
            let children = handle
                .children
                .borrow()
                .iter()
                .filter_map(convert)
                .collect();
            Some(ParsedNode::Element {
                tag: name.local.to_string(),
                attrs,
                children,
            })
        }
        NodeData::Text { contents } => Some(ParsedNode::Text(contents.borrow().to_string())),
        NodeData::Comment { contents } => Some(ParsedNode::Comment(contents.to_string())),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrappers_are_flattened() {
        let nodes = parse_markup("<p class=\"a\">hi</p><!--note-->");
        assert_eq!(
            nodes,
            vec![
                ParsedNode::Element {
                    tag: "p".into(),
                    attrs: vec![("class".into(), "a".into())],
                    children: vec![ParsedNode::Text("hi".into())],
                },
                ParsedNode::Comment("note".into()),
            ]
        );
    }

    #[test]
    fn directive_attributes_survive() {
        let nodes = parse_markup(r#"<input v-model.lazy="name" v-on:keyup.13="save">"#);
        match &nodes[0] {
            ParsedNode::Element { attrs, .. } => {
                let names: Vec<&str> = attrs.iter().map(|(n, _)| n.as_str()).collect();
                assert_eq!(names, vec!["v-model.lazy", "v-on:keyup.13"]);
            }
            other => panic!("expected element, got {other:?}"),
        }
    }

    #[test]
    fn mustaches_stay_in_text() {
        let nodes = parse_markup("<span>{{ a }} and {{{ b }}}</span>");
        match &nodes[0] {
            ParsedNode::Element { children, .. } => {
                assert_eq!(children, &vec![ParsedNode::Text("{{ a }} and {{{ b }}}".into())]);
            }
            other => panic!("expected element, got {other:?}"),
        }
    }
}
