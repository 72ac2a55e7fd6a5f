use manos_prose_model::{
    Attrs, EditorState, ElementNode, Node, Op, Path, Point, Schema, Selection, Transaction,
    textblock,
};

use super::{
    BlockRange, block_range, block_range_where, can_replace, kind_at, kinds_of, map_selection,
    replace_children_ops,
};
use crate::keymap::{KeyHandler, key_handler};

/// A node type whose content admits only `item_kind` children.
pub fn is_list(schema: &Schema, kind: &str, item_kind: &str) -> bool {
    schema.content_of(kind).is_some_and(|content| {
        !content.is_empty() && content.allowed_kinds().all(|k| k == item_kind)
    })
}

/// Nearest list ancestor of the selection start.
fn find_parent_list<'a>(
    state: &'a EditorState,
    item_kind: &str,
) -> Option<(Path, &'a ElementNode)> {
    let block = state.selection().from().block_path();
    (1..=block.len()).rev().find_map(|depth| {
        let path = &block[..depth];
        let el = state.doc().element_at(path)?;
        is_list(state.schema(), &el.kind, item_kind).then(|| (path.to_vec(), el))
    })
}

/// Lifts out of a list of the same kind, converts a list of another kind in
/// place, or wraps the selection in a new list.
pub fn toggle_list(list_kind: &str, item_kind: &str) -> KeyHandler {
    let list_kind = list_kind.to_string();
    let item_kind = item_kind.to_string();
    key_handler(move |state, dispatch| {
        let Some(range) = block_range(state) else {
            return false;
        };
        if let Some((list_path, list)) = find_parent_list(state, &item_kind) {
            if range.depth() >= 1 && range.depth() <= list_path.len() + 1 {
                if list.kind == list_kind {
                    return lift_list_item_command(state, dispatch, &item_kind);
                }
                let kinds = kinds_of(&list.children);
                if state.schema().valid_content(&list_kind, &kinds) {
                    let Ok(attrs) = state.schema().compute_attrs(&list_kind, &Attrs::new()) else {
                        return false;
                    };
                    if let Some(dispatch) = dispatch {
                        dispatch(
                            Transaction::new(vec![Op::SetNodeKind {
                                path: list_path,
                                kind: list_kind.clone(),
                                attrs,
                            }])
                            .source("command:toggle_list"),
                        );
                    }
                    return true;
                }
            }
        }
        wrap_in_list_command(state, dispatch, &list_kind, &item_kind, &Attrs::new())
    })
}

pub fn wrap_in_list(list_kind: &str, item_kind: &str, attrs: Attrs) -> KeyHandler {
    let list_kind = list_kind.to_string();
    let item_kind = item_kind.to_string();
    key_handler(move |state, dispatch| {
        wrap_in_list_command(state, dispatch, &list_kind, &item_kind, &attrs)
    })
}

/// Each block of the range becomes the single child of its own list item.
fn wrap_in_list_command(
    state: &EditorState,
    dispatch: Option<&dyn Fn(Transaction)>,
    list_kind: &str,
    item_kind: &str,
    attrs: &Attrs,
) -> bool {
    let schema = state.schema();
    let doc = state.doc();
    let Some(range) = block_range(state) else {
        return false;
    };
    let (Some(parent_kind), Some(siblings)) =
        (kind_at(doc, &range.parent), doc.children_at(&range.parent))
    else {
        return false;
    };
    if !can_replace(schema, parent_kind, siblings, range.start, range.end, &[list_kind]) {
        return false;
    }

    let mut items = Vec::with_capacity(range.len());
    for node in range.nodes(doc) {
        let Some(item) = schema.create_checked(item_kind, &Attrs::new(), vec![node.clone()]) else {
            return false;
        };
        items.push(item);
    }
    let Some(list) = schema.create_checked(list_kind, attrs, items) else {
        return false;
    };

    if let Some(dispatch) = dispatch {
        let ops = replace_children_ops(&range.parent, range.start, range.len(), vec![list]);
        let depth = range.depth();
        let remap = |point: &Point| -> Point {
            if !range.contains(&point.path) {
                return point.clone();
            }
            let mut path = range.child_path(range.start);
            path.push(point.path[depth] - range.start);
            path.push(0);
            path.extend_from_slice(&point.path[depth + 1..]);
            Point::new(path, point.offset)
        };
        dispatch(
            Transaction::new(ops)
                .selection_after(map_selection(state.selection(), remap))
                .source("command:wrap_in_list"),
        );
    }
    true
}

fn list_items_range(state: &EditorState, item_kind: &str) -> Option<BlockRange> {
    block_range_where(state, &|_, children| {
        children.first().is_some_and(|c| c.kind() == item_kind)
    })
}

/// Splits the list item around the cursor. An empty last block leaves the
/// list instead.
pub fn split_list_item(item_kind: &str) -> KeyHandler {
    let item_kind = item_kind.to_string();
    key_handler(move |state, dispatch| split_list_item_command(state, dispatch, &item_kind))
}

fn split_list_item_command(
    state: &EditorState,
    dispatch: Option<&dyn Fn(Transaction)>,
    item_kind: &str,
) -> bool {
    let schema = state.schema();
    let doc = state.doc();
    let selection = state.selection();
    if !selection.same_parent() {
        return false;
    }
    let block_path = selection.from().block_path();
    if block_path.len() < 2 {
        return false;
    }
    let (&block_ix, item_path) = match block_path.split_last() {
        Some(split) => split,
        None => return false,
    };
    let (Some(item), Some(block)) = (doc.element_at(item_path), doc.element_at(block_path)) else {
        return false;
    };
    if item.kind != item_kind {
        return false;
    }

    if block.is_empty_textblock() && block_ix + 1 == item.children.len() {
        return lift_list_item_command(state, dispatch, item_kind);
    }

    let from = selection.from();
    let to = selection.to();
    let start = textblock::point_global_offset(&block.children, from.leaf_index(), from.offset);
    let end = textblock::point_global_offset(&block.children, to.leaf_index(), to.offset);
    let at_end = end == textblock::textblock_len(&block.children);

    let (left, _) = textblock::split_children(&block.children, start);
    let (_, right) = textblock::split_children(&block.children, end);
    let left_block = Node::element(block.kind.clone(), block.attrs.clone(), left);
    let right_block = if at_end {
        let Some(kind) = schema.default_textblock_in(item_kind) else {
            return false;
        };
        match schema.create_and_fill(kind, &Attrs::new()) {
            Ok(node) => node,
            Err(_) => return false,
        }
    } else {
        Node::element(block.kind.clone(), block.attrs.clone(), right)
    };

    let mut first_children = item.children[..block_ix].to_vec();
    first_children.push(left_block);
    let mut second_children = vec![right_block];
    second_children.extend_from_slice(&item.children[block_ix + 1..]);

    let (Some(first), Some(second)) = (
        schema.create_checked(item_kind, &item.attrs, first_children),
        schema.create_checked(item_kind, &item.attrs, second_children),
    ) else {
        return false;
    };
    let Some((&item_ix, list_path)) = item_path.split_last() else {
        return false;
    };

    if let Some(dispatch) = dispatch {
        let ops = replace_children_ops(list_path, item_ix, 1, vec![first, second]);
        let mut cursor = list_path.to_vec();
        cursor.extend([item_ix + 1, 0, 0]);
        dispatch(
            Transaction::new(ops)
                .selection_after(Selection::collapsed(Point::new(cursor, 0)))
                .source("command:split_list_item"),
        );
    }
    true
}

/// Nests the selected items inside the previous item, appending to its
/// trailing sub-list when it already ends with one of the same kind.
pub fn sink_list_item(item_kind: &str) -> KeyHandler {
    let item_kind = item_kind.to_string();
    key_handler(move |state, dispatch| {
        let schema = state.schema();
        let doc = state.doc();
        let Some(range) = list_items_range(state, &item_kind) else {
            return false;
        };
        if range.start == 0 || range.parent.is_empty() {
            return false;
        }
        let Some(list) = doc.element_at(&range.parent) else {
            return false;
        };
        let Some(Node::Element(prev)) = list.children.get(range.start - 1) else {
            return false;
        };
        if prev.kind != item_kind {
            return false;
        }

        let items = range.nodes(doc).to_vec();
        let mut prev_children = prev.children.clone();
        let nested_before = matches!(prev_children.last(), Some(Node::Element(el)) if el.kind == list.kind);
        let (sublist_ix, existing) = if nested_before {
            let ix = prev_children.len() - 1;
            let Some(Node::Element(sublist)) = prev_children.get_mut(ix) else {
                return false;
            };
            let existing = sublist.children.len();
            sublist.children.extend(items);
            if !schema.valid_content(&sublist.kind, &kinds_of(&sublist.children)) {
                return false;
            }
            (ix, existing)
        } else {
            let Some(sublist) = schema.create_checked(&list.kind, &Attrs::new(), items) else {
                return false;
            };
            prev_children.push(sublist);
            (prev_children.len() - 1, 0)
        };
        let Some(new_prev) = schema.create_checked(&item_kind, &prev.attrs, prev_children) else {
            return false;
        };

        if let Some(dispatch) = dispatch {
            let ops =
                replace_children_ops(&range.parent, range.start - 1, range.len() + 1, vec![new_prev]);
            let depth = range.depth();
            let remap = |point: &Point| -> Point {
                if !range.contains(&point.path) {
                    return point.clone();
                }
                let mut path = range.child_path(range.start - 1);
                path.push(sublist_ix);
                path.push(existing + point.path[depth] - range.start);
                path.extend_from_slice(&point.path[depth + 1..]);
                Point::new(path, point.offset)
            };
            dispatch(
                Transaction::new(ops)
                    .selection_after(map_selection(state.selection(), remap))
                    .source("command:sink_list_item"),
            );
        }
        true
    })
}

/// Moves the selected items one level out: into the outer list when nested,
/// otherwise out of the list altogether.
pub fn lift_list_item(item_kind: &str) -> KeyHandler {
    let item_kind = item_kind.to_string();
    key_handler(move |state, dispatch| lift_list_item_command(state, dispatch, &item_kind))
}

pub(crate) fn lift_list_item_command(
    state: &EditorState,
    dispatch: Option<&dyn Fn(Transaction)>,
    item_kind: &str,
) -> bool {
    let Some(range) = list_items_range(state, item_kind) else {
        return false;
    };
    if range.parent.is_empty() {
        return false;
    }
    let outer_is_item = range.parent.len() >= 2
        && state
            .doc()
            .element_at(&range.parent[..range.parent.len() - 1])
            .is_some_and(|el| el.kind == item_kind);
    let tx = if outer_is_item {
        lift_to_outer_list(state, &range, item_kind)
    } else {
        lift_out_of_list(state, &range)
    };
    let Some(tx) = tx else {
        return false;
    };
    if let Some(dispatch) = dispatch {
        dispatch(tx);
    }
    true
}

fn lift_to_outer_list(state: &EditorState, range: &BlockRange, item_kind: &str) -> Option<Transaction> {
    let schema = state.schema();
    let doc = state.doc();
    let list = doc.element_at(&range.parent)?;
    let mut items: Vec<Node> = range.nodes(doc).to_vec();

    // Items after the lifted ones become a sub-list of the last lifted item.
    let trailing = &list.children[range.end..];
    if !trailing.is_empty() {
        let sublist = Node::element(list.kind.clone(), list.attrs.clone(), trailing.to_vec());
        let Some(Node::Element(last)) = items.last_mut() else {
            return None;
        };
        last.children.push(sublist);
        if !schema.valid_content(item_kind, &kinds_of(&last.children)) {
            return None;
        }
    }

    let (&list_ix, outer_item_path) = range.parent.split_last()?;
    let outer_item = doc.element_at(outer_item_path)?;
    let (&outer_ix, outer_list_path) = outer_item_path.split_last()?;

    let mut before_children = outer_item.children[..list_ix].to_vec();
    let before_items = &list.children[..range.start];
    if !before_items.is_empty() {
        before_children.push(Node::element(list.kind.clone(), list.attrs.clone(), before_items.to_vec()));
    }
    let after_children = outer_item.children[list_ix + 1..].to_vec();

    let mut replacement: Vec<Node> = Vec::new();
    if !before_children.is_empty() {
        replacement.push(schema.create_checked(item_kind, &outer_item.attrs, before_children)?);
    }
    let leading = replacement.len();
    replacement.extend(items);
    if !after_children.is_empty() {
        replacement.push(schema.create_checked(item_kind, &outer_item.attrs, after_children)?);
    }

    let outer_list_kind = kind_at(doc, outer_list_path)?;
    let outer_siblings = doc.children_at(outer_list_path)?;
    if !can_replace(schema, outer_list_kind, outer_siblings, outer_ix, outer_ix + 1, &kinds_of(&replacement)) {
        return None;
    }

    let ops = replace_children_ops(outer_list_path, outer_ix, 1, replacement);
    let depth = range.depth();
    let remap = |point: &Point| -> Point {
        if !range.contains(&point.path) {
            return point.clone();
        }
        let mut path = outer_list_path.to_vec();
        path.push(outer_ix + leading + point.path[depth] - range.start);
        path.extend_from_slice(&point.path[depth + 1..]);
        Point::new(path, point.offset)
    };
    Some(
        Transaction::new(ops)
            .selection_after(map_selection(state.selection(), remap))
            .source("command:lift_list_item"),
    )
}

/// Unwraps the selected items into the list's parent, splitting the list
/// around them.
fn lift_out_of_list(state: &EditorState, range: &BlockRange) -> Option<Transaction> {
    let schema = state.schema();
    let doc = state.doc();
    let list = doc.element_at(&range.parent)?;
    let (&list_ix, parent) = range.parent.split_last()?;

    let items = range.nodes(doc);
    let mut offsets = Vec::with_capacity(items.len());
    let mut blocks: Vec<Node> = Vec::new();
    for item in items {
        offsets.push(blocks.len());
        blocks.extend_from_slice(item.children());
    }

    let before = &list.children[..range.start];
    let after = &list.children[range.end..];
    let mut replacement: Vec<Node> = Vec::new();
    if !before.is_empty() {
        replacement.push(Node::element(list.kind.clone(), list.attrs.clone(), before.to_vec()));
    }
    let leading = replacement.len();
    replacement.extend(blocks);
    if !after.is_empty() {
        replacement.push(Node::element(list.kind.clone(), list.attrs.clone(), after.to_vec()));
    }

    let parent_kind = kind_at(doc, parent)?;
    let siblings = doc.children_at(parent)?;
    if !can_replace(schema, parent_kind, siblings, list_ix, list_ix + 1, &kinds_of(&replacement)) {
        return None;
    }

    let ops = replace_children_ops(parent, list_ix, 1, replacement);
    let depth = range.depth();
    let remap = |point: &Point| -> Point {
        if !range.contains(&point.path) || point.path.len() < depth + 2 {
            return point.clone();
        }
        let item = point.path[depth] - range.start;
        let mut path = parent.to_vec();
        path.push(list_ix + leading + offsets[item] + point.path[depth + 1]);
        path.extend_from_slice(&point.path[depth + 2..]);
        Point::new(path, point.offset)
    };
    Some(
        Transaction::new(ops)
            .selection_after(map_selection(state.selection(), remap))
            .source("command:lift_list_item"),
    )
}
