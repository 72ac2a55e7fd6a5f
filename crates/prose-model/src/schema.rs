use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::content::{ContentExpr, ContentParseError};
use crate::node::{Attrs, Document, ElementNode, Mark, Node, TEXT_KIND, TextNode};
use crate::ops::Path;

/// Name of the node type that describes the document itself.
pub const TOP_NODE: &str = "doc";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AttrSpec {
    /// `None` makes the attribute required.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

impl AttrSpec {
    pub fn with_default(default: Value) -> Self {
        Self {
            default: Some(default),
        }
    }

    pub fn required() -> Self {
        Self { default: None }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    /// `None` allows every mark, `""` none, otherwise space separated names (`_` for all).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub marks: Option<String>,
    #[serde(default)]
    pub attrs: BTreeMap<String, AttrSpec>,
    #[serde(default)]
    pub inline: bool,
    #[serde(default)]
    pub defining: bool,
    #[serde(default)]
    pub isolating: bool,
    #[serde(default)]
    pub code: bool,
    #[serde(default)]
    pub draggable: bool,
}

impl NodeSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    pub fn group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    pub fn marks(mut self, marks: impl Into<String>) -> Self {
        self.marks = Some(marks.into());
        self
    }

    pub fn attr(mut self, name: impl Into<String>, default: Value) -> Self {
        self.attrs.insert(name.into(), AttrSpec::with_default(default));
        self
    }

    pub fn required_attr(mut self, name: impl Into<String>) -> Self {
        self.attrs.insert(name.into(), AttrSpec::required());
        self
    }

    pub fn inline(mut self) -> Self {
        self.inline = true;
        self
    }

    pub fn defining(mut self) -> Self {
        self.defining = true;
        self
    }

    pub fn isolating(mut self) -> Self {
        self.isolating = true;
        self
    }

    pub fn code(mut self) -> Self {
        self.code = true;
        self
    }

    pub fn draggable(mut self) -> Self {
        self.draggable = true;
        self
    }
}

fn default_inclusive() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkSpec {
    #[serde(default)]
    pub attrs: BTreeMap<String, AttrSpec>,
    /// Whether text typed at the mark's end boundary picks the mark up.
    #[serde(default = "default_inclusive")]
    pub inclusive: bool,
    /// Space separated mark names this mark cannot coexist with (`_` for all).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub excludes: Option<String>,
}

impl Default for MarkSpec {
    fn default() -> Self {
        Self {
            attrs: BTreeMap::new(),
            inclusive: true,
            excludes: None,
        }
    }
}

impl MarkSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attr(mut self, name: impl Into<String>, default: Value) -> Self {
        self.attrs.insert(name.into(), AttrSpec::with_default(default));
        self
    }

    pub fn inclusive(mut self, inclusive: bool) -> Self {
        self.inclusive = inclusive;
        self
    }

    pub fn excludes(mut self, excludes: impl Into<String>) -> Self {
        self.excludes = Some(excludes.into());
        self
    }
}

/// Ordered node and mark specs, the input to [`Schema::new`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaSpec {
    #[serde(default)]
    pub nodes: Vec<(String, NodeSpec)>,
    #[serde(default)]
    pub marks: Vec<(String, MarkSpec)>,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchemaError {
    #[error("invalid content expression for `{node}`: {error}")]
    InvalidContent {
        node: String,
        error: ContentParseError,
    },
    #[error("`{node}` references unknown node type or group `{name}` in its content")]
    UnresolvedContent { node: String, name: String },
    #[error("`{owner}` references unknown mark type `{name}`")]
    UnresolvedMark { owner: String, name: String },
    #[error("schema has no top node `doc`")]
    MissingTopNode,
    #[error("schema has no `text` node type")]
    MissingTextNode,
    #[error("`{0}` cannot be filled with a valid empty instance")]
    Unfillable(String),
    #[error("missing required attribute `{attr}` on `{kind}`")]
    MissingAttr { kind: String, attr: String },
    #[error("unknown node type `{0}`")]
    UnknownNode(String),
    #[error("duplicate schema entry `{0}`")]
    DuplicateName(String),
}

/// Reason a document does not satisfy the schema.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{reason} at {path:?}")]
pub struct SchemaViolation {
    pub path: Path,
    pub reason: String,
}

#[derive(Debug, Clone)]
pub struct NodeType {
    pub name: String,
    pub spec: NodeSpec,
    pub content: ContentExpr,
    pub groups: Vec<String>,
    allowed_marks: Option<Vec<String>>,
    textblock: bool,
}

impl NodeType {
    pub fn is_textblock(&self) -> bool {
        self.textblock
    }

    pub fn is_inline(&self) -> bool {
        self.spec.inline || self.name == TEXT_KIND
    }

    pub fn is_leaf(&self) -> bool {
        self.content.is_empty()
    }

    pub fn in_group(&self, group: &str) -> bool {
        self.groups.iter().any(|g| g == group)
    }

    pub fn allows_mark(&self, mark: &str) -> bool {
        match &self.allowed_marks {
            None => true,
            Some(names) => names.iter().any(|m| m == mark),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MarkType {
    pub name: String,
    pub spec: MarkSpec,
    pub rank: usize,
    excluded: Option<Vec<String>>,
}

impl MarkType {
    pub fn excludes(&self, other: &str) -> bool {
        match &self.excluded {
            None => other == self.name,
            Some(names) => names.iter().any(|n| n == "_" || n == other),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Schema {
    nodes: Vec<NodeType>,
    marks: Vec<MarkType>,
    node_index: HashMap<String, usize>,
    mark_index: HashMap<String, usize>,
}

impl Schema {
    pub fn new(spec: SchemaSpec) -> Result<Self, SchemaError> {
        let mut node_index = HashMap::new();
        for (ix, (name, _)) in spec.nodes.iter().enumerate() {
            if node_index.insert(name.clone(), ix).is_some() {
                return Err(SchemaError::DuplicateName(name.clone()));
            }
        }
        let mut mark_index = HashMap::new();
        for (ix, (name, _)) in spec.marks.iter().enumerate() {
            if mark_index.insert(name.clone(), ix).is_some() {
                return Err(SchemaError::DuplicateName(name.clone()));
            }
        }
        if !node_index.contains_key(TOP_NODE) {
            return Err(SchemaError::MissingTopNode);
        }
        if !node_index.contains_key(TEXT_KIND) {
            return Err(SchemaError::MissingTextNode);
        }

        let groups_of = |spec: &NodeSpec| -> Vec<String> {
            spec.group
                .as_deref()
                .unwrap_or("")
                .split_whitespace()
                .map(str::to_string)
                .collect()
        };

        let resolve_marks = |owner: &str, list: &str| -> Result<Option<Vec<String>>, SchemaError> {
            let names: Vec<&str> = list.split_whitespace().collect();
            if names.iter().any(|n| *n == "_") {
                return Ok(None);
            }
            names
                .into_iter()
                .map(|name| {
                    if mark_index.contains_key(name) {
                        Ok(name.to_string())
                    } else {
                        Err(SchemaError::UnresolvedMark {
                            owner: owner.to_string(),
                            name: name.to_string(),
                        })
                    }
                })
                .collect::<Result<Vec<_>, _>>()
                .map(Some)
        };

        let mut nodes = Vec::with_capacity(spec.nodes.len());
        for (name, node_spec) in &spec.nodes {
            let mut content = ContentExpr::parse(node_spec.content.as_deref().unwrap_or(""))
                .map_err(|error| SchemaError::InvalidContent {
                    node: name.clone(),
                    error,
                })?;
            for term in content.terms_mut() {
                term.candidates = if node_index.contains_key(&term.name) {
                    vec![term.name.clone()]
                } else {
                    spec.nodes
                        .iter()
                        .filter(|(_, s)| groups_of(s).iter().any(|g| *g == term.name))
                        .map(|(n, _)| n.clone())
                        .collect()
                };
                if term.candidates.is_empty() {
                    return Err(SchemaError::UnresolvedContent {
                        node: name.clone(),
                        name: term.name.clone(),
                    });
                }
            }

            let allowed_marks = match node_spec.marks.as_deref() {
                None => None,
                Some(list) => resolve_marks(name, list)?,
            };

            nodes.push(NodeType {
                name: name.clone(),
                groups: groups_of(node_spec),
                spec: node_spec.clone(),
                content,
                allowed_marks,
                textblock: false,
            });
        }

        let inline: Vec<bool> = spec
            .nodes
            .iter()
            .map(|(n, s)| s.inline || n == TEXT_KIND)
            .collect();
        for node in &mut nodes {
            node.textblock = !node.content.is_empty()
                && node
                    .content
                    .allowed_kinds()
                    .all(|kind| node_index.get(kind).is_some_and(|ix| inline[*ix]));
        }

        let mut marks = Vec::with_capacity(spec.marks.len());
        for (rank, (name, mark_spec)) in spec.marks.iter().enumerate() {
            let excluded = match mark_spec.excludes.as_deref() {
                None => None,
                Some(list) => {
                    let names: Vec<String> = list.split_whitespace().map(str::to_string).collect();
                    for n in &names {
                        if n != "_" && !mark_index.contains_key(n) {
                            return Err(SchemaError::UnresolvedMark {
                                owner: name.clone(),
                                name: n.clone(),
                            });
                        }
                    }
                    Some(names)
                }
            };
            marks.push(MarkType {
                name: name.clone(),
                spec: mark_spec.clone(),
                rank,
                excluded,
            });
        }

        let schema = Self {
            nodes,
            marks,
            node_index,
            mark_index,
        };

        for node in &schema.nodes {
            if node.name == TEXT_KIND {
                continue;
            }
            if schema.fill_children(&node.name, &mut Vec::new()).is_none() {
                return Err(SchemaError::Unfillable(node.name.clone()));
            }
        }
        schema.create_empty_doc()?;

        tracing::debug!(
            nodes = schema.nodes.len(),
            marks = schema.marks.len(),
            "schema built"
        );
        Ok(schema)
    }

    pub fn node(&self, name: &str) -> Option<&NodeType> {
        self.node_index.get(name).map(|ix| &self.nodes[*ix])
    }

    pub fn mark(&self, name: &str) -> Option<&MarkType> {
        self.mark_index.get(name).map(|ix| &self.marks[*ix])
    }

    pub fn nodes(&self) -> &[NodeType] {
        &self.nodes
    }

    pub fn marks(&self) -> &[MarkType] {
        &self.marks
    }

    pub fn node_names(&self) -> impl Iterator<Item = &str> {
        self.nodes.iter().map(|n| n.name.as_str())
    }

    pub fn mark_names(&self) -> impl Iterator<Item = &str> {
        self.marks.iter().map(|m| m.name.as_str())
    }

    pub fn top_node(&self) -> Option<&NodeType> {
        self.node(TOP_NODE)
    }

    pub fn is_textblock(&self, kind: &str) -> bool {
        self.node(kind).is_some_and(NodeType::is_textblock)
    }

    /// Content expression of the node owning the children at `parent_kind`;
    /// the document itself is addressed by [`TOP_NODE`].
    pub fn content_of(&self, parent_kind: &str) -> Option<&ContentExpr> {
        self.node(parent_kind).map(|n| &n.content)
    }

    /// Whether `kinds` is a valid child sequence for `parent_kind`.
    pub fn valid_content<S: AsRef<str>>(&self, parent_kind: &str, kinds: &[S]) -> bool {
        self.content_of(parent_kind)
            .is_some_and(|expr| expr.matches(kinds))
    }

    /// First textblock type the parent's content admits, used when a command
    /// needs to create a plain block (e.g. leaving a code block).
    pub fn default_textblock_in(&self, parent_kind: &str) -> Option<&str> {
        self.content_of(parent_kind)?
            .allowed_kinds()
            .find(|kind| self.is_textblock(kind) && !self.node(kind).is_some_and(|t| t.spec.code))
    }

    pub fn compute_attrs(&self, kind: &str, overrides: &Attrs) -> Result<Attrs, SchemaError> {
        let node = self
            .node(kind)
            .ok_or_else(|| SchemaError::UnknownNode(kind.to_string()))?;
        compute_attrs_from(&node.spec.attrs, kind, overrides)
    }

    pub fn compute_mark_attrs(&self, kind: &str, overrides: &Attrs) -> Result<Attrs, SchemaError> {
        let mark = self
            .mark(kind)
            .ok_or_else(|| SchemaError::UnknownNode(kind.to_string()))?;
        compute_attrs_from(&mark.spec.attrs, kind, overrides)
    }

    /// Builds a node of `kind` with the given attributes (defaults filled in)
    /// and the smallest valid content.
    pub fn create_and_fill(&self, kind: &str, overrides: &Attrs) -> Result<Node, SchemaError> {
        let attrs = self.compute_attrs(kind, overrides)?;
        let children = self
            .fill_children(kind, &mut Vec::new())
            .ok_or_else(|| SchemaError::Unfillable(kind.to_string()))?;
        Ok(Node::Element(ElementNode {
            kind: kind.to_string(),
            attrs,
            children,
        }))
    }

    /// Builds a node of `kind` around existing children when they satisfy its content.
    pub fn create_checked(
        &self,
        kind: &str,
        overrides: &Attrs,
        children: Vec<Node>,
    ) -> Option<Node> {
        let attrs = self.compute_attrs(kind, overrides).ok()?;
        let kinds: Vec<&str> = children.iter().map(Node::kind).collect();
        if !self.valid_content(kind, &kinds) {
            return None;
        }
        Some(Node::element(kind, attrs, children))
    }

    pub fn create_empty_doc(&self) -> Result<Document, SchemaError> {
        let children = self
            .fill_children(TOP_NODE, &mut Vec::new())
            .ok_or_else(|| SchemaError::Unfillable(TOP_NODE.to_string()))?;
        Ok(Document { children })
    }

    fn fill_children(&self, kind: &str, visiting: &mut Vec<String>) -> Option<Vec<Node>> {
        let node = self.node(kind)?;
        if node.textblock {
            return Some(vec![Node::text("")]);
        }
        if visiting.iter().any(|k| k == kind) {
            return None;
        }
        visiting.push(kind.to_string());

        let mut children = Vec::new();
        for term in node.content.terms() {
            for _ in 0..term.quantifier.min() {
                let child = term.candidates.iter().find_map(|candidate| {
                    if candidate == TEXT_KIND {
                        return Some(Node::text(""));
                    }
                    let attrs = self.compute_attrs(candidate, &Attrs::new()).ok()?;
                    let grandchildren = self.fill_children(candidate, visiting)?;
                    Some(Node::element(candidate.clone(), attrs, grandchildren))
                });
                match child {
                    Some(child) => children.push(child),
                    None => {
                        visiting.pop();
                        return None;
                    }
                }
            }
        }

        visiting.pop();
        Some(children)
    }

    /// Orders a mark set by schema rank, drops marks excluded by later ones and
    /// replaces an existing mark of the same kind.
    pub fn add_mark(&self, marks: &[Mark], mark: Mark) -> Vec<Mark> {
        let Some(mark_type) = self.mark(&mark.kind) else {
            return marks.to_vec();
        };
        let mut out: Vec<Mark> = marks
            .iter()
            .filter(|m| m.kind != mark.kind && !mark_type.excludes(&m.kind))
            .cloned()
            .collect();
        out.push(mark);
        out.sort_by_key(|m| self.mark(&m.kind).map(|t| t.rank).unwrap_or(usize::MAX));
        out
    }

    pub fn remove_mark(&self, marks: &[Mark], kind: &str) -> Vec<Mark> {
        marks.iter().filter(|m| m.kind != kind).cloned().collect()
    }

    /// Validates the whole document.
    pub fn check(&self, doc: &Document) -> Result<(), SchemaViolation> {
        let top = self.top_node().ok_or_else(|| SchemaViolation {
            path: Vec::new(),
            reason: "schema has no top node".into(),
        })?;
        self.check_children(top, &doc.children, &mut Vec::new())
    }

    fn check_children(
        &self,
        parent: &NodeType,
        children: &[Node],
        path: &mut Path,
    ) -> Result<(), SchemaViolation> {
        let kinds: Vec<&str> = children.iter().map(Node::kind).collect();
        if !parent.content.matches(&kinds) {
            return Err(SchemaViolation {
                path: path.clone(),
                reason: format!(
                    "`{}` does not allow content [{}] (expects `{}`)",
                    parent.name,
                    kinds.join(", "),
                    parent.content.source()
                ),
            });
        }

        for (ix, child) in children.iter().enumerate() {
            path.push(ix);
            match child {
                Node::Text(text) => self.check_text(parent, text, path)?,
                Node::Element(el) => {
                    let Some(node_type) = self.node(&el.kind) else {
                        return Err(SchemaViolation {
                            path: path.clone(),
                            reason: format!("unknown node type `{}`", el.kind),
                        });
                    };
                    if let Some(attr) = el
                        .attrs
                        .keys()
                        .find(|k| !node_type.spec.attrs.contains_key(*k))
                    {
                        return Err(SchemaViolation {
                            path: path.clone(),
                            reason: format!("`{}` has undeclared attribute `{attr}`", el.kind),
                        });
                    }
                    self.check_children(node_type, &el.children, path)?;
                }
            }
            path.pop();
        }
        Ok(())
    }

    fn check_text(
        &self,
        parent: &NodeType,
        text: &TextNode,
        path: &Path,
    ) -> Result<(), SchemaViolation> {
        for (ix, mark) in text.marks.iter().enumerate() {
            let violation = |reason: String| SchemaViolation {
                path: path.clone(),
                reason,
            };
            let Some(mark_type) = self.mark(&mark.kind) else {
                return Err(violation(format!("unknown mark type `{}`", mark.kind)));
            };
            if !parent.allows_mark(&mark.kind) {
                return Err(violation(format!(
                    "`{}` does not allow mark `{}`",
                    parent.name, mark.kind
                )));
            }
            if let Some(attr) = mark
                .attrs
                .keys()
                .find(|k| !mark_type.spec.attrs.contains_key(*k))
            {
                return Err(violation(format!(
                    "mark `{}` has undeclared attribute `{attr}`",
                    mark.kind
                )));
            }
            if text.marks[..ix].iter().any(|m| m.kind == mark.kind) {
                return Err(violation(format!("mark `{}` appears twice", mark.kind)));
            }
        }
        Ok(())
    }
}

fn compute_attrs_from(
    specs: &BTreeMap<String, AttrSpec>,
    kind: &str,
    overrides: &Attrs,
) -> Result<Attrs, SchemaError> {
    let mut attrs = Attrs::new();
    for (name, spec) in specs {
        let value = match overrides.get(name) {
            Some(value) => value.clone(),
            None => spec.default.clone().ok_or_else(|| SchemaError::MissingAttr {
                kind: kind.to_string(),
                attr: name.clone(),
            })?,
        };
        attrs.insert(name.clone(), value);
    }
    Ok(attrs)
}
