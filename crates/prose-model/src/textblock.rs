//! Helpers for addressing text inside a textblock by a flat byte offset
//! that runs across all of its text leaves.

use crate::node::{Document, ElementNode, Mark, Node, TextNode};
use crate::ops::Path;
use crate::schema::Schema;
use crate::selection::{Point, clamp_to_char_boundary};

pub struct TextBlockRef<'a> {
    pub path: Path,
    pub el: &'a ElementNode,
}

pub fn textblock_len(children: &[Node]) -> usize {
    children
        .iter()
        .filter_map(Node::as_text)
        .map(|t| t.text.len())
        .sum()
}

/// Flat offset of `(child_ix, offset)` inside the block's children.
pub fn point_global_offset(children: &[Node], child_ix: usize, offset: usize) -> usize {
    let mut global = 0usize;
    for (ix, node) in children.iter().enumerate() {
        let Node::Text(t) = node else {
            continue;
        };
        if ix < child_ix {
            global += t.text.len();
            continue;
        }
        if ix == child_ix {
            global += clamp_to_char_boundary(&t.text, offset);
        }
        break;
    }
    global
}

/// Point for a flat offset. At a leaf boundary the point stays at the end of
/// the left leaf unless `prefer_right` asks for the start of the next one.
pub fn point_for_global_offset(
    block_path: &[usize],
    children: &[Node],
    global_offset: usize,
    prefer_right: bool,
) -> Point {
    let mut remaining = global_offset;
    for (child_ix, node) in children.iter().enumerate() {
        let Node::Text(t) = node else {
            continue;
        };
        let at_end = remaining == t.text.len();
        let has_next = matches!(children.get(child_ix + 1), Some(Node::Text(_)));
        if remaining < t.text.len() || (at_end && !(prefer_right && has_next)) {
            let mut path = block_path.to_vec();
            path.push(child_ix);
            return Point::new(path, clamp_to_char_boundary(&t.text, remaining));
        }
        remaining -= t.text.len();
    }

    // Fallback to the end of the last text leaf.
    for (child_ix, node) in children.iter().enumerate().rev() {
        if let Node::Text(t) = node {
            let mut path = block_path.to_vec();
            path.push(child_ix);
            return Point::new(path, t.text.len());
        }
    }

    let mut path = block_path.to_vec();
    path.push(0);
    Point::new(path, 0)
}

pub fn is_point_in_block(point: &Point, block_path: &[usize]) -> bool {
    point.path.len() == block_path.len() + 1 && point.path.starts_with(block_path)
}

pub fn textblocks_in_order<'a>(doc: &'a Document, schema: &Schema) -> Vec<TextBlockRef<'a>> {
    fn walk<'a>(
        nodes: &'a [Node],
        path: &mut Path,
        schema: &Schema,
        out: &mut Vec<TextBlockRef<'a>>,
    ) {
        for (ix, node) in nodes.iter().enumerate() {
            let Node::Element(el) = node else {
                continue;
            };
            path.push(ix);
            if schema.is_textblock(&el.kind) {
                out.push(TextBlockRef {
                    path: path.clone(),
                    el,
                });
            } else {
                walk(&el.children, path, schema, out);
            }
            path.pop();
        }
    }

    let mut out = Vec::new();
    walk(&doc.children, &mut Vec::new(), schema, &mut out);
    out
}

/// Splits the leaves at a flat offset. Both halves keep at least one leaf.
pub fn split_children(children: &[Node], at: usize) -> (Vec<Node>, Vec<Node>) {
    let mut left: Vec<Node> = Vec::new();
    let mut right: Vec<Node> = Vec::new();
    let mut cursor = 0usize;

    for node in children {
        let Node::Text(t) = node else {
            if cursor < at {
                left.push(node.clone());
            } else {
                right.push(node.clone());
            }
            continue;
        };
        let start = cursor;
        let end = cursor + t.text.len();
        cursor = end;

        if end <= at {
            left.push(node.clone());
        } else if start >= at {
            right.push(node.clone());
        } else {
            let split = clamp_to_char_boundary(&t.text, at - start);
            left.push(Node::marked_text(&t.text[..split], t.marks.clone()));
            right.push(Node::marked_text(&t.text[split..], t.marks.clone()));
        }
    }

    if left.is_empty() {
        left.push(empty_leaf_like(right.first()));
    }
    if right.is_empty() {
        right.push(empty_leaf_like(left.last()));
    }
    (left, right)
}

fn empty_leaf_like(node: Option<&Node>) -> Node {
    let marks = node
        .and_then(Node::as_text)
        .map(|t| t.marks.clone())
        .unwrap_or_default();
    Node::marked_text("", marks)
}

/// Leaves covering `start..end`.
pub fn slice_children(children: &[Node], start: usize, end: usize) -> Vec<Node> {
    let (_, tail) = split_children(children, start);
    let (middle, _) = split_children(&tail, end.saturating_sub(start));
    middle
}

/// Concatenates two leaf runs, dropping an empty boundary leaf.
pub fn join_children(left: &[Node], right: &[Node]) -> Vec<Node> {
    let keep = |n: &&Node| !matches!(n, Node::Text(t) if t.text.is_empty());
    let mut out: Vec<Node> = left.iter().filter(keep).cloned().collect();
    out.extend(right.iter().filter(keep).cloned());
    if out.is_empty() {
        out.push(empty_leaf_like(left.first()));
    }
    out
}

/// Rewrites the marks of the text covering `start..end`, splitting leaves at
/// the range boundaries.
pub fn map_marks_in_range(
    children: &[Node],
    start: usize,
    end: usize,
    apply: &dyn Fn(&[Mark]) -> Vec<Mark>,
) -> Vec<Node> {
    if start >= end {
        return children.to_vec();
    }

    let mut out: Vec<Node> = Vec::new();
    let mut cursor = 0usize;

    for node in children {
        let Node::Text(t) = node else {
            out.push(node.clone());
            continue;
        };
        let node_start = cursor;
        let node_end = cursor + t.text.len();
        cursor = node_end;

        if end <= node_start || start >= node_end {
            out.push(node.clone());
            continue;
        }

        let sel_start = clamp_to_char_boundary(&t.text, start.saturating_sub(node_start));
        let sel_end = clamp_to_char_boundary(&t.text, end.saturating_sub(node_start));

        let prefix = &t.text[..sel_start];
        let middle = &t.text[sel_start..sel_end];
        let suffix = &t.text[sel_end..];

        if !prefix.is_empty() {
            out.push(Node::marked_text(prefix, t.marks.clone()));
        }
        if !middle.is_empty() {
            out.push(Node::Text(TextNode {
                text: middle.to_string(),
                marks: apply(&t.marks),
            }));
        }
        if !suffix.is_empty() {
            out.push(Node::marked_text(suffix, t.marks.clone()));
        }
    }

    if out.is_empty() {
        out.push(Node::text(""));
    }
    out
}

/// Whether any character in `start..end` carries a mark of `kind`.
pub fn range_has_mark(children: &[Node], start: usize, end: usize, kind: &str) -> bool {
    let mut cursor = 0usize;
    children.iter().filter_map(Node::as_text).any(|t| {
        let node_start = cursor;
        cursor += t.text.len();
        cursor > start && node_start < end && !t.text.is_empty() && t.has_mark(kind)
    })
}

/// Marks in effect at a flat offset, the way typed text would inherit them:
/// inside a leaf its marks, at a boundary the left leaf's marks minus the
/// non-inclusive ones the right leaf does not share.
pub fn marks_at(children: &[Node], offset: usize, schema: &Schema) -> Vec<Mark> {
    let leaves: Vec<&TextNode> = children.iter().filter_map(Node::as_text).collect();
    if textblock_len(children) == 0 {
        return Vec::new();
    }

    let mut cursor = 0usize;
    let mut before: Option<&TextNode> = None;
    let mut after: Option<&TextNode> = None;
    for leaf in leaves.iter().copied().filter(|t| !t.text.is_empty()) {
        let start = cursor;
        let end = cursor + leaf.text.len();
        cursor = end;
        if offset > start && offset < end {
            return leaf.marks.clone();
        }
        if end == offset {
            before = Some(leaf);
        }
        if start == offset && after.is_none() {
            after = Some(leaf);
        }
    }

    let (main, other) = match before {
        Some(main) => (main, after),
        None => match after {
            Some(main) => (main, None),
            None => return Vec::new(),
        },
    };
    main.marks
        .iter()
        .filter(|mark| {
            let inclusive = schema
                .mark(&mark.kind)
                .map(|m| m.spec.inclusive)
                .unwrap_or(true);
            inclusive || other.is_some_and(|o| o.marks.contains(mark))
        })
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_in_middle_of_leaf_keeps_marks() {
        let bold = vec![Mark::new("bold")];
        let children = vec![Node::text("ab"), Node::marked_text("cd", bold.clone())];
        let (left, right) = split_children(&children, 3);
        assert_eq!(left, vec![Node::text("ab"), Node::marked_text("c", bold.clone())]);
        assert_eq!(right, vec![Node::marked_text("d", bold)]);
    }

    #[test]
    fn split_at_end_leaves_empty_right_leaf() {
        let children = vec![Node::text("abc")];
        let (left, right) = split_children(&children, 3);
        assert_eq!(left, vec![Node::text("abc")]);
        assert_eq!(right, vec![Node::text("")]);
    }

    #[test]
    fn boundary_point_prefers_requested_side() {
        let children = vec![Node::text("ab"), Node::marked_text("cd", vec![Mark::new("bold")])];
        assert_eq!(
            point_for_global_offset(&[0], &children, 2, false),
            Point::new(vec![0, 0], 2)
        );
        assert_eq!(
            point_for_global_offset(&[0], &children, 2, true),
            Point::new(vec![0, 1], 0)
        );
    }
}
