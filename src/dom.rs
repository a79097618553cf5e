//! Owned markup tree.
//!
//! html5ever parses into an `RcDom`; we immediately convert that into plain
//! owned [`Node`]s so directive links can mutate elements through `&mut`
//! without `RefCell` juggling, then serialize back to HTML once every
//! directive on the tree has settled.

use html5ever::{parse_document, parse_fragment, LocalName, Namespace, ParseOpts, QualName};
use indexmap::IndexMap;
use lazy_static::lazy_static;
use markup5ever_rcdom::{Handle, NodeData, RcDom};
use regex::Regex;
use tendril::TendrilSink;

const HTML_NAMESPACE: &str = "http://www.w3.org/1999/xhtml";

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "basefont", "bgsound", "br", "col", "embed", "frame", "hr", "img", "input",
    "keygen", "link", "meta", "param", "source", "track", "wbr",
];

/// Elements whose text children are serialized without escaping.
const RAW_TEXT_ELEMENTS: &[&str] = &[
    "iframe", "noembed", "noframes", "noscript", "plaintext", "script", "style", "xmp",
];

lazy_static! {
    static ref DOCUMENT_RE: Regex = Regex::new(r"(?i)^\s*(<!doctype|<html)").unwrap();
}

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Doctype(Doctype),
    Element(Element),
    Text(String),
    Comment(String),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Doctype {
    pub name: String,
    pub public_id: String,
    pub system_id: String,
}

/// Attribute map that keeps parse order. New attributes go to the end.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Attributes(IndexMap<String, String>);

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    /// Overwrites in place if present, appends otherwise.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.insert(name.into(), value.into());
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.0.shift_remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Attributes {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// An element as seen by directive links.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Element {
    pub tag: String,
    pub attrs: Attributes,
    pub children: Vec<Node>,
}

impl Element {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            ..Default::default()
        }
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs.get(name)
    }

    pub fn set_attr(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.attrs.set(name, value);
    }

    pub fn remove_attr(&mut self, name: &str) -> Option<String> {
        self.attrs.remove(name)
    }

    pub fn classes(&self) -> impl Iterator<Item = &str> {
        self.attr("class").unwrap_or("").split_whitespace()
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes().any(|c| c == class)
    }

    pub fn is_void(&self) -> bool {
        VOID_ELEMENTS.contains(&self.tag.as_str())
    }

    pub fn is_raw_text(&self) -> bool {
        RAW_TEXT_ELEMENTS.contains(&self.tag.as_str())
    }

    /// Concatenated text of all descendants.
    pub fn text(&self) -> String {
        let mut out = String::new();
        collect_text(&self.children, &mut out);
        out
    }

    pub fn inner_html(&self) -> String {
        let mut out = String::new();
        write_nodes(&mut out, &self.children, self.is_raw_text());
        out
    }

    /// Replaces the children with `html` parsed in the context of this
    /// element.
    pub fn set_inner_html(&mut self, html: &str) {
        self.children = self.parse_children(html);
    }

    pub fn prepend_html(&mut self, html: &str) {
        let mut children = self.parse_children(html);
        children.append(&mut self.children);
        self.children = children;
    }

    pub fn append_html(&mut self, html: &str) {
        let mut children = self.parse_children(html);
        self.children.append(&mut children);
    }

    pub fn outer_html(&self) -> String {
        self.serialize_with_inner(&self.inner_html())
    }

    /// Start tag, `inner`, end tag. `inner` must already be serialized.
    pub fn serialize_with_inner(&self, inner: &str) -> String {
        let mut out = String::with_capacity(inner.len() + self.tag.len() * 2 + 5);
        out.push('<');
        out.push_str(&self.tag);
        for (name, value) in self.attrs.iter() {
            out.push(' ');
            out.push_str(name);
            out.push_str("=\"");
            escape_into(&mut out, value, true);
            out.push('"');
        }
        out.push('>');
        if self.is_void() {
            return out;
        }
        out.push_str(inner);
        out.push_str("</");
        out.push_str(&self.tag);
        out.push('>');
        out
    }

    fn parse_children(&self, html: &str) -> Vec<Node> {
        if self.is_raw_text() {
            return if html.is_empty() {
                Vec::new()
            } else {
                vec![Node::Text(html.to_string())]
            };
        }
        parse_fragment_in(html, &self.tag)
    }
}

impl Node {
    pub fn as_element(&self) -> Option<&Element> {
        match self {
            Node::Element(el) => Some(el),
            _ => None,
        }
    }

    pub fn as_element_mut(&mut self) -> Option<&mut Element> {
        match self {
            Node::Element(el) => Some(el),
            _ => None,
        }
    }

    pub fn to_html(&self) -> String {
        let mut out = String::new();
        write_node(&mut out, self, false);
        out
    }
}

impl Doctype {
    pub fn to_html(&self) -> String {
        let mut out = format!("<!DOCTYPE {}", self.name);
        if !self.public_id.is_empty() {
            out.push_str(&format!(" PUBLIC \"{}\"", self.public_id));
        }
        if !self.system_id.is_empty() {
            if self.public_id.is_empty() {
                out.push_str(" SYSTEM");
            }
            out.push_str(&format!(" \"{}\"", self.system_id));
        }
        out.push('>');
        out
    }
}

/// Parses markup, choosing document mode for input that starts with a
/// doctype or an `<html>` tag and body-fragment mode otherwise.
pub fn parse_markup(html: &str) -> Vec<Node> {
    if DOCUMENT_RE.is_match(html) {
        parse_document_nodes(html)
    } else {
        parse_fragment_in(html, "body")
    }
}

pub fn parse_document_nodes(html: &str) -> Vec<Node> {
    let dom = parse_document(RcDom::default(), ParseOpts::default()).one(html);
    convert_children(&dom.document)
}

pub fn parse_fragment_nodes(html: &str) -> Vec<Node> {
    parse_fragment_in(html, "body")
}

fn parse_fragment_in(html: &str, context: &str) -> Vec<Node> {
    if html.is_empty() {
        return Vec::new();
    }
    let context = QualName::new(
        None,
        Namespace::from(HTML_NAMESPACE),
        LocalName::from(context),
    );
    let dom = parse_fragment(RcDom::default(), ParseOpts::default(), context, vec![]).one(html);

    // The fragment parser roots everything under a synthetic <html>.
    let document_children = dom.document.children.borrow();
    document_children
        .iter()
        .find(|child| matches!(child.data, NodeData::Element { .. }))
        .map(convert_children)
        .unwrap_or_default()
}

fn convert_children(handle: &Handle) -> Vec<Node> {
    handle
        .children
        .borrow()
        .iter()
        .filter_map(convert_node)
        .collect()
}

fn convert_node(handle: &Handle) -> Option<Node> {
    match &handle.data {
        NodeData::Doctype {
            name,
            public_id,
            system_id,
        } => Some(Node::Doctype(Doctype {
            name: name.to_string(),
            public_id: public_id.to_string(),
            system_id: system_id.to_string(),
        })),

        NodeData::Text { contents } => Some(Node::Text(contents.borrow().to_string())),

        NodeData::Comment { contents } => Some(Node::Comment(contents.to_string())),

        NodeData::Element {
            name,
            attrs,
            template_contents,
            ..
        } => {
            let attrs = attrs
                .borrow()
                .iter()
                .map(|attr| {
                    let name = match &attr.name.prefix {
                        Some(prefix) => format!("{}:{}", prefix, attr.name.local),
                        None => attr.name.local.to_string(),
                    };
                    (name, attr.value.to_string())
                })
                .collect();

            // <template> keeps its content in a separate fragment.
            let children = match template_contents.borrow().as_ref() {
                Some(contents) => convert_children(contents),
                None => convert_children(handle),
            };

            Some(Node::Element(Element {
                tag: name.local.to_string(),
                attrs,
                children,
            }))
        }

        NodeData::Document | NodeData::ProcessingInstruction { .. } => None,
    }
}

/// Serializes a node list. A doctype is always followed by a newline.
pub fn serialize(nodes: &[Node]) -> String {
    let mut out = String::new();
    write_nodes(&mut out, nodes, false);
    out
}

fn write_nodes(out: &mut String, nodes: &[Node], raw_text: bool) {
    for node in nodes {
        write_node(out, node, raw_text);
    }
}

fn write_node(out: &mut String, node: &Node, raw_text: bool) {
    match node {
        Node::Doctype(doctype) => {
            out.push_str(&doctype.to_html());
            out.push('\n');
        }
        Node::Text(text) if raw_text => out.push_str(text),
        Node::Text(text) => escape_into(out, text, false),
        Node::Comment(text) => {
            out.push_str("<!--");
            out.push_str(text);
            out.push_str("-->");
        }
        Node::Element(el) => out.push_str(&el.outer_html()),
    }
}

fn collect_text(nodes: &[Node], out: &mut String) {
    for node in nodes {
        match node {
            Node::Text(text) => out.push_str(text),
            Node::Element(el) => collect_text(&el.children, out),
            _ => {}
        }
    }
}

/// HTML serialization escaping: `& nbsp` always, `"` in attributes,
/// `< >` in text.
pub(crate) fn escape_into(out: &mut String, text: &str, attr_mode: bool) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '\u{00A0}' => out.push_str("&nbsp;"),
            '"' if attr_mode => out.push_str("&quot;"),
            '<' if !attr_mode => out.push_str("&lt;"),
            '>' if !attr_mode => out.push_str("&gt;"),
            c => out.push(c),
        }
    }
}
