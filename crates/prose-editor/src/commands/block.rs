use manos_prose_model::{Attrs, EditorState, Node, Op, Point, Transaction, textblock};

use super::{
    BlockRange, block_range, can_replace, find_wrapping, is_in_parent_node_of_type, kind_at,
    kinds_of, lift_target, map_selection, replace_children_ops,
};
use crate::keymap::{KeyHandler, key_handler};

/// Lifts out of the nearest `kind` ancestor when inside one, otherwise wraps
/// the selected blocks in `kind`.
pub fn toggle_wrap(kind: &str) -> KeyHandler {
    let kind = kind.to_string();
    key_handler(move |state, dispatch| {
        if is_in_parent_node_of_type(state, &kind).is_some() {
            return lift(state, dispatch);
        }
        wrap_in_command(state, dispatch, &kind, &Attrs::new())
    })
}

pub fn wrap_in(kind: &str, attrs: Attrs) -> KeyHandler {
    let kind = kind.to_string();
    key_handler(move |state, dispatch| wrap_in_command(state, dispatch, &kind, &attrs))
}

fn wrap_in_command(
    state: &EditorState,
    dispatch: Option<&dyn Fn(Transaction)>,
    kind: &str,
    attrs: &Attrs,
) -> bool {
    let Some(range) = block_range(state) else {
        return false;
    };
    let Some(wrappers) = find_wrapping(state.schema(), state.doc(), &range, kind, attrs) else {
        return false;
    };
    if let Some(dispatch) = dispatch {
        dispatch(wrap_tx(state, &range, wrappers));
    }
    true
}

fn wrap_tx(state: &EditorState, range: &BlockRange, wrappers: Vec<(String, Attrs)>) -> Transaction {
    let mut content: Vec<Node> = range.nodes(state.doc()).to_vec();
    for (kind, attrs) in wrappers.iter().rev() {
        content = vec![Node::element(kind.clone(), attrs.clone(), content)];
    }

    let ops = replace_children_ops(&range.parent, range.start, range.len(), content);

    // parent/start+k/rest -> parent/start/0../k/rest
    let remap = |point: &Point| -> Point {
        if !range.contains(&point.path) {
            return point.clone();
        }
        let depth = range.depth();
        let mut path = range.child_path(range.start);
        path.extend(std::iter::repeat_n(0, wrappers.len() - 1));
        path.push(point.path[depth] - range.start);
        path.extend_from_slice(&point.path[depth + 1..]);
        Point::new(path, point.offset)
    };

    Transaction::new(ops)
        .selection_after(map_selection(state.selection(), remap))
        .source("command:wrap_in")
}

/// Moves the selected blocks out of their parent, splitting it around them.
pub fn lift(state: &EditorState, dispatch: Option<&dyn Fn(Transaction)>) -> bool {
    let Some(range) = block_range(state) else {
        return false;
    };
    lift_range(state, dispatch, &range)
}

pub(crate) fn lift_range(
    state: &EditorState,
    dispatch: Option<&dyn Fn(Transaction)>,
    range: &BlockRange,
) -> bool {
    let Some(target) = lift_target(state.schema(), state.doc(), range) else {
        return false;
    };
    let Some(tx) = lift_tx(state, range, target) else {
        return false;
    };
    if let Some(dispatch) = dispatch {
        dispatch(tx);
    }
    true
}

fn lift_tx(state: &EditorState, range: &BlockRange, target: usize) -> Option<Transaction> {
    let doc = state.doc();
    let schema = state.schema();
    let mid: Vec<Node> = range.nodes(doc).to_vec();
    let siblings = doc.children_at(&range.parent)?;
    let mut before: Vec<Node> = siblings[..range.start].to_vec();
    let mut after: Vec<Node> = siblings[range.end..].to_vec();
    let mut current = range.parent.clone();

    loop {
        let el = doc.element_at(&current)?;
        let before_node = split_part(schema, &el.kind, &el.attrs, before)?;
        let after_node = split_part(schema, &el.kind, &el.attrs, after)?;
        let (&ix, up) = current.split_last()?;

        if up.len() == target {
            let leading = before_node.is_some() as usize;
            let mid_len = mid.len();
            let mut replacement: Vec<Node> = before_node.into_iter().collect();
            replacement.extend(mid);
            replacement.extend(after_node);

            let up_kind = kind_at(doc, up)?;
            let up_children = doc.children_at(up)?;
            let kinds = kinds_of(&replacement);
            if !can_replace(schema, up_kind, up_children, ix, ix + 1, &kinds) {
                return None;
            }

            let ops = replace_children_ops(up, ix, 1, replacement);
            let depth = range.depth();
            let remap = |point: &Point| -> Point {
                if !range.contains(&point.path) {
                    return point.clone();
                }
                let k = point.path[depth] - range.start;
                let mut path = up.to_vec();
                path.push(ix + leading + k.min(mid_len.saturating_sub(1)));
                path.extend_from_slice(&point.path[depth + 1..]);
                Point::new(path, point.offset)
            };
            return Some(
                Transaction::new(ops)
                    .selection_after(map_selection(state.selection(), remap))
                    .source("command:lift"),
            );
        }

        let up_children = doc.children_at(up)?;
        let mut next_before = up_children[..ix].to_vec();
        next_before.extend(before_node);
        let mut next_after: Vec<Node> = after_node.into_iter().collect();
        next_after.extend_from_slice(&up_children[ix + 1..]);
        before = next_before;
        after = next_after;
        current = up.to_vec();
    }
}

/// The part of a split node on one side of the lifted range, `None` inside
/// when that side is empty. Fails when the part is not valid content.
fn split_part(
    schema: &manos_prose_model::Schema,
    kind: &str,
    attrs: &Attrs,
    children: Vec<Node>,
) -> Option<Option<Node>> {
    if children.is_empty() {
        return Some(None);
    }
    if !schema.valid_content(kind, &kinds_of(&children)) {
        return None;
    }
    Some(Some(Node::element(kind, attrs.clone(), children)))
}

/// Retypes every textblock in the selection that is not already `kind` with
/// `attrs` and whose parent accepts the new type. Marks the new type does not
/// allow are dropped.
pub fn set_block_type(kind: &str, attrs: Attrs) -> KeyHandler {
    let kind = kind.to_string();
    key_handler(move |state, dispatch| set_block_type_command(state, dispatch, &kind, &attrs))
}

pub(crate) fn set_block_type_command(
    state: &EditorState,
    dispatch: Option<&dyn Fn(Transaction)>,
    kind: &str,
    attrs: &Attrs,
) -> bool {
    let schema = state.schema();
    let doc = state.doc();
    let Some(node_type) = schema.node(kind) else {
        return false;
    };
    if !node_type.is_textblock() {
        return false;
    }
    let Ok(attrs) = schema.compute_attrs(kind, attrs) else {
        return false;
    };

    let selection = state.selection();
    let first = selection.from().block_path();
    let last = selection.to().block_path();

    let mut ops: Vec<Op> = Vec::new();
    for block in textblock::textblocks_in_order(doc, schema) {
        if block.path.as_slice() < first || block.path.as_slice() > last {
            continue;
        }
        if block.el.has_markup(kind, &attrs) {
            continue;
        }
        let Some((&ix, parent)) = block.path.split_last() else {
            continue;
        };
        let (Some(parent_kind), Some(siblings)) = (kind_at(doc, parent), doc.children_at(parent))
        else {
            continue;
        };
        if !can_replace(schema, parent_kind, siblings, ix, ix + 1, &[kind]) {
            continue;
        }
        if !schema.valid_content(kind, &kinds_of(&block.el.children)) {
            continue;
        }

        ops.push(Op::SetNodeKind {
            path: block.path.clone(),
            kind: kind.to_string(),
            attrs: attrs.clone(),
        });
        for (leaf_ix, child) in block.el.children.iter().enumerate() {
            let Node::Text(t) = child else {
                continue;
            };
            let kept: Vec<_> = t
                .marks
                .iter()
                .filter(|m| node_type.allows_mark(&m.kind))
                .cloned()
                .collect();
            if kept.len() != t.marks.len() {
                let mut path = block.path.clone();
                path.push(leaf_ix);
                ops.push(Op::SetTextMarks { path, marks: kept });
            }
        }
    }

    if ops.is_empty() {
        return false;
    }
    if let Some(dispatch) = dispatch {
        dispatch(Transaction::new(ops).source("command:set_block_type"));
    }
    true
}

/// Sets `fallback` when the selection is already inside `kind`, otherwise
/// sets `kind` with `attrs`.
pub fn toggle_block_type(kind: &str, fallback: &str, attrs: Attrs) -> KeyHandler {
    let kind = kind.to_string();
    let fallback = fallback.to_string();
    key_handler(move |state, dispatch| {
        if is_in_parent_node_of_type(state, &kind).is_some() {
            return set_block_type_command(state, dispatch, &fallback, &Attrs::new());
        }
        set_block_type_command(state, dispatch, &kind, &attrs)
    })
}
