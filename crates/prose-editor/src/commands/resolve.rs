use manos_prose_model::{Attrs, Document, EditorState, ElementNode, Node, Path, Schema};

use super::{can_replace, kind_at, kinds_of};

/// Ancestor found by [`is_in_parent_node_of_type`].
#[derive(Debug, Clone, PartialEq)]
pub struct ParentNodeInfo {
    pub path: Path,
    pub depth: usize,
    pub node: ElementNode,
}

/// Innermost ancestor (the textblock itself included) of kind `kind` around a
/// selection whose ends share a textblock.
pub fn is_in_parent_node_of_type(state: &EditorState, kind: &str) -> Option<ParentNodeInfo> {
    let selection = state.selection();
    if !selection.same_parent() {
        return None;
    }
    let block = selection.from().block_path();
    (1..=block.len()).rev().find_map(|depth| {
        let path = &block[..depth];
        let el = state.doc().element_at(path)?;
        (el.kind == kind).then(|| ParentNodeInfo {
            path: path.to_vec(),
            depth,
            node: el.clone(),
        })
    })
}

/// Sibling run `start..end` under the node at `parent` covering the selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockRange {
    pub parent: Path,
    pub start: usize,
    pub end: usize,
}

impl BlockRange {
    pub fn depth(&self) -> usize {
        self.parent.len()
    }

    pub fn child_path(&self, index: usize) -> Path {
        let mut path = self.parent.clone();
        path.push(index);
        path
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    pub fn contains(&self, path: &[usize]) -> bool {
        path.len() > self.parent.len()
            && path.starts_with(&self.parent)
            && (self.start..self.end).contains(&path[self.parent.len()])
    }

    pub fn nodes<'a>(&self, doc: &'a Document) -> &'a [Node] {
        doc.children_at(&self.parent)
            .and_then(|children| children.get(self.start..self.end))
            .unwrap_or(&[])
    }
}

pub fn block_range(state: &EditorState) -> Option<BlockRange> {
    block_range_where(state, &|_, _| true)
}

/// Deepest block range around the selection whose parent satisfies `pred`
/// (called with the parent's kind and children).
pub fn block_range_where(
    state: &EditorState,
    pred: &dyn Fn(&str, &[Node]) -> bool,
) -> Option<BlockRange> {
    let selection = state.selection();
    let from = selection.from().block_path();
    let to = selection.to().block_path();
    if from.is_empty() || to.is_empty() {
        return None;
    }
    let doc = state.doc();

    (0..from.len()).rev().find_map(|depth| {
        let parent = &from[..depth];
        if to.len() <= depth || !to.starts_with(parent) {
            return None;
        }
        let kind = kind_at(doc, parent)?;
        let children = doc.children_at(parent)?;
        if !pred(kind, children) {
            return None;
        }
        Some(BlockRange {
            parent: parent.to_vec(),
            start: from[depth],
            end: to[depth] + 1,
        })
    })
}

/// Wrapper chain (outermost first) that lets `kind` wrap the range: the
/// parent must accept the wrapper, and the wrapper must accept the range
/// directly or through one intermediate node type.
pub fn find_wrapping(
    schema: &Schema,
    doc: &Document,
    range: &BlockRange,
    kind: &str,
    attrs: &Attrs,
) -> Option<Vec<(String, Attrs)>> {
    let parent_kind = kind_at(doc, &range.parent)?;
    let siblings = doc.children_at(&range.parent)?;
    if !can_replace(schema, parent_kind, siblings, range.start, range.end, &[kind]) {
        return None;
    }
    let outer = (kind.to_string(), schema.compute_attrs(kind, attrs).ok()?);

    let inner_kinds = kinds_of(range.nodes(doc));
    if schema.valid_content(kind, &inner_kinds) {
        return Some(vec![outer]);
    }

    let content = schema.content_of(kind)?;
    content.allowed_kinds().find_map(|candidate| {
        let node_type = schema.node(candidate)?;
        if node_type.is_inline() || node_type.is_textblock() {
            return None;
        }
        if !schema.valid_content(kind, &[candidate]) || !schema.valid_content(candidate, &inner_kinds)
        {
            return None;
        }
        let inner_attrs = schema.compute_attrs(candidate, &Attrs::new()).ok()?;
        Some(vec![outer.clone(), (candidate.to_string(), inner_attrs)])
    })
}

/// Depth the range can be lifted to: the nearest ancestor that accepts the
/// range's nodes in place of its child, cutting every node in between.
pub fn lift_target(schema: &Schema, doc: &Document, range: &BlockRange) -> Option<usize> {
    let mid = kinds_of(range.nodes(doc));
    for depth in (0..=range.depth()).rev() {
        let path = &range.parent[..depth];
        let kind = kind_at(doc, path)?;
        let children = doc.children_at(path)?;
        let (index, end) = if depth == range.depth() {
            (range.start, range.end)
        } else {
            (range.parent[depth], range.parent[depth] + 1)
        };

        if depth < range.depth() && can_replace(schema, kind, children, index, end, &mid) {
            return Some(depth);
        }
        let isolating = schema.node(kind).is_some_and(|n| n.spec.isolating);
        if depth == 0 || isolating || !can_cut(schema, kind, children, index, end) {
            break;
        }
    }
    None
}

fn can_cut(schema: &Schema, kind: &str, children: &[Node], start: usize, end: usize) -> bool {
    (start == 0 || schema.valid_content(kind, &kinds_of(&children[..start])))
        && (end == children.len() || schema.valid_content(kind, &kinds_of(&children[end..])))
}
