use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ops::Path;

pub type Attrs = BTreeMap<String, Value>;
pub type NodeKind = String;

/// Name of the node type every text leaf belongs to.
pub const TEXT_KIND: &str = "text";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Document {
    #[serde(default)]
    pub children: Vec<Node>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "node", rename_all = "snake_case")]
pub enum Node {
    Element(ElementNode),
    Text(TextNode),
}

impl Node {
    pub fn paragraph(text: impl Into<String>) -> Self {
        Self::element("paragraph", Attrs::default(), vec![Node::text(text)])
    }

    pub fn element(kind: impl Into<String>, attrs: Attrs, children: Vec<Node>) -> Self {
        Node::Element(ElementNode {
            kind: kind.into(),
            attrs,
            children,
        })
    }

    pub fn text(text: impl Into<String>) -> Self {
        Node::Text(TextNode {
            text: text.into(),
            marks: Vec::new(),
        })
    }

    pub fn marked_text(text: impl Into<String>, marks: Vec<Mark>) -> Self {
        Node::Text(TextNode {
            text: text.into(),
            marks,
        })
    }

    pub fn kind(&self) -> &str {
        match self {
            Node::Element(el) => &el.kind,
            Node::Text(_) => TEXT_KIND,
        }
    }

    pub fn as_element(&self) -> Option<&ElementNode> {
        match self {
            Node::Element(el) => Some(el),
            Node::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&TextNode> {
        match self {
            Node::Text(t) => Some(t),
            Node::Element(_) => None,
        }
    }

    pub fn children(&self) -> &[Node] {
        match self {
            Node::Element(el) => &el.children,
            Node::Text(_) => &[],
        }
    }

    pub fn text_content(&self) -> String {
        match self {
            Node::Text(t) => t.text.clone(),
            Node::Element(el) => el.text_content(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementNode {
    pub kind: NodeKind,
    #[serde(default)]
    pub attrs: Attrs,
    #[serde(default)]
    pub children: Vec<Node>,
}

impl ElementNode {
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        for child in &self.children {
            match child {
                Node::Text(t) => out.push_str(&t.text),
                Node::Element(el) => out.push_str(&el.text_content()),
            }
        }
        out
    }

    pub fn attr_str(&self, name: &str) -> &str {
        self.attrs.get(name).and_then(|v| v.as_str()).unwrap_or("")
    }

    pub fn attr_bool(&self, name: &str) -> bool {
        self.attrs.get(name).and_then(|v| v.as_bool()).unwrap_or(false)
    }

    /// True when the node holds nothing but (possibly empty) text leaves whose
    /// combined length is zero.
    pub fn is_empty_textblock(&self) -> bool {
        self.children
            .iter()
            .all(|n| matches!(n, Node::Text(t) if t.text.is_empty()))
    }

    /// Same type and attributes, ignoring content.
    pub fn has_markup(&self, kind: &str, attrs: &Attrs) -> bool {
        self.kind == kind && &self.attrs == attrs
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextNode {
    pub text: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub marks: Vec<Mark>,
}

impl TextNode {
    pub fn has_mark(&self, kind: &str) -> bool {
        self.marks.iter().any(|m| m.kind == kind)
    }

    pub fn mark(&self, kind: &str) -> Option<&Mark> {
        self.marks.iter().find(|m| m.kind == kind)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mark {
    pub kind: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attrs: Attrs,
}

impl Mark {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            attrs: Attrs::default(),
        }
    }

    pub fn with_attrs(kind: impl Into<String>, attrs: Attrs) -> Self {
        Self {
            kind: kind.into(),
            attrs,
        }
    }
}

impl Document {
    pub fn new(children: Vec<Node>) -> Self {
        Self { children }
    }

    pub fn node_at(&self, path: &[usize]) -> Option<&Node> {
        node_at_path(self, path)
    }

    pub fn element_at(&self, path: &[usize]) -> Option<&ElementNode> {
        node_at_path(self, path).and_then(Node::as_element)
    }

    /// Children of the node at `path`; the empty path addresses the document itself.
    pub fn children_at(&self, path: &[usize]) -> Option<&[Node]> {
        if path.is_empty() {
            return Some(&self.children);
        }
        match node_at_path(self, path)? {
            Node::Element(el) => Some(&el.children),
            Node::Text(_) => None,
        }
    }

    pub fn text_content(&self) -> String {
        self.children.iter().map(Node::text_content).collect()
    }

    /// Walks every node depth-first, handing out its path.
    pub fn descendants(&self, mut f: impl FnMut(&Node, &[usize])) {
        fn walk(children: &[Node], path: &mut Path, f: &mut dyn FnMut(&Node, &[usize])) {
            for (ix, node) in children.iter().enumerate() {
                path.push(ix);
                f(node, path);
                if let Node::Element(el) = node {
                    walk(&el.children, path, f);
                }
                path.pop();
            }
        }
        walk(&self.children, &mut Vec::new(), &mut f);
    }
}

pub(crate) fn node_at_path<'a>(doc: &'a Document, path: &[usize]) -> Option<&'a Node> {
    if path.is_empty() {
        return None;
    }

    let mut node = doc.children.get(path[0])?;
    for &ix in path.iter().skip(1) {
        node = match node {
            Node::Element(el) => el.children.get(ix)?,
            Node::Text(_) => return None,
        };
    }
    Some(node)
}

pub(crate) fn children_mut<'a>(
    doc: &'a mut Document,
    path: &[usize],
) -> Option<&'a mut Vec<Node>> {
    let mut children = &mut doc.children;
    for &ix in path {
        children = match children.get_mut(ix)? {
            Node::Element(el) => &mut el.children,
            Node::Text(_) => return None,
        };
    }
    Some(children)
}

pub(crate) fn node_mut<'a>(doc: &'a mut Document, path: &[usize]) -> Option<&'a mut Node> {
    let (last, parent) = path.split_last()?;
    children_mut(doc, parent)?.get_mut(*last)
}
