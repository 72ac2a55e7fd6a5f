use manos_prose_model::{
    Attrs, EditorState, ElementNode, Mark, Node, Op, Path, Point, Selection, Transaction,
    textblock,
};

use crate::keymap::{KeyHandler, key_handler};

/// A textblock touched by a range, with the flat offsets the range covers.
pub(crate) struct BlockSpan<'a> {
    pub(crate) path: Path,
    pub(crate) el: &'a ElementNode,
    pub(crate) start: usize,
    pub(crate) end: usize,
}

pub(crate) fn spans_between<'a>(state: &'a EditorState, from: &Point, to: &Point) -> Vec<BlockSpan<'a>> {
    let first = from.block_path();
    let last = to.block_path();
    textblock::textblocks_in_order(state.doc(), state.schema())
        .into_iter()
        .filter(|b| b.path.as_slice() >= first && b.path.as_slice() <= last)
        .map(|b| {
            let len = textblock::textblock_len(&b.el.children);
            let start = if b.path.as_slice() == first {
                textblock::point_global_offset(&b.el.children, from.leaf_index(), from.offset)
            } else {
                0
            };
            let end = if b.path.as_slice() == last {
                textblock::point_global_offset(&b.el.children, to.leaf_index(), to.offset)
            } else {
                len
            };
            BlockSpan {
                path: b.path,
                el: b.el,
                start,
                end,
            }
        })
        .collect()
}

/// Ops swapping every leaf of the textblock at `path` for `children`.
pub(crate) fn rewrite_leaves_ops(path: &[usize], old_len: usize, children: Vec<Node>) -> Vec<Op> {
    let mut first = path.to_vec();
    first.push(0);
    let mut ops: Vec<Op> = (0..old_len)
        .map(|_| Op::RemoveNode { path: first.clone() })
        .collect();
    for (ix, node) in children.into_iter().enumerate() {
        let mut at = path.to_vec();
        at.push(ix);
        ops.push(Op::InsertNode { path: at, node });
    }
    ops
}

/// Re-expresses `point` against rewritten leaves of the block at `path`,
/// keeping its flat offset.
fn relocate(
    point: &Point,
    path: &[usize],
    old: &[Node],
    new: &[Node],
    prefer_right: bool,
) -> Point {
    if !textblock::is_point_in_block(point, path) {
        return point.clone();
    }
    let global = textblock::point_global_offset(old, point.leaf_index(), point.offset);
    textblock::point_for_global_offset(path, new, global, prefer_right)
}

/// Applies `rewrite` to the marks of every character between `from` and `to`
/// in blocks that `allowed` accepts. `None` when nothing changes.
fn rewrite_marks(
    state: &EditorState,
    from: &Point,
    to: &Point,
    allowed: &dyn Fn(&ElementNode) -> bool,
    rewrite: &dyn Fn(&[Mark]) -> Vec<Mark>,
    source: &str,
) -> Option<Transaction> {
    let selection = state.selection();
    let mut ops = Vec::new();
    let mut anchor = selection.anchor.clone();
    let mut focus = selection.focus.clone();

    for span in spans_between(state, from, to) {
        if span.start >= span.end || !allowed(span.el) {
            continue;
        }
        let children = textblock::map_marks_in_range(&span.el.children, span.start, span.end, rewrite);
        if children == span.el.children {
            continue;
        }
        let anchor_first = anchor <= focus;
        let (first, last) = if anchor_first { (&anchor, &focus) } else { (&focus, &anchor) };
        let first = relocate(first, &span.path, &span.el.children, &children, true);
        let last = relocate(last, &span.path, &span.el.children, &children, false);
        (anchor, focus) = if anchor_first { (first, last) } else { (last, first) };
        ops.extend(rewrite_leaves_ops(&span.path, span.el.children.len(), children));
    }

    if ops.is_empty() {
        return None;
    }
    Some(
        Transaction::new(ops)
            .selection_after(Selection::range(anchor, focus))
            .source(source),
    )
}

/// Adds `mark` to the text between `from` and `to` wherever the parent
/// textblock allows it.
pub fn add_mark(state: &EditorState, from: &Point, to: &Point, mark: Mark) -> Option<Transaction> {
    let schema = state.schema().clone();
    let kind = mark.kind.clone();
    let allowed = move |el: &ElementNode| schema.node(&el.kind).is_some_and(|t| t.allows_mark(&kind));
    let schema = state.schema().clone();
    rewrite_marks(
        state,
        from,
        to,
        &allowed,
        &|marks: &[Mark]| schema.add_mark(marks, mark.clone()),
        "command:add_mark",
    )
}

pub fn remove_mark(state: &EditorState, from: &Point, to: &Point, kind: &str) -> Option<Transaction> {
    let schema = state.schema().clone();
    rewrite_marks(
        state,
        from,
        to,
        &|_: &ElementNode| true,
        &|marks: &[Mark]| schema.remove_mark(marks, kind),
        "command:remove_mark",
    )
}

/// Marks typed text at the cursor would get: stored marks when set,
/// otherwise the marks at the cursor.
pub fn marks_at_cursor(state: &EditorState) -> Vec<Mark> {
    if let Some(stored) = state.stored_marks() {
        return stored.to_vec();
    }
    let head = &state.selection().focus;
    let Some(block) = state.doc().element_at(head.block_path()) else {
        return Vec::new();
    };
    let global = textblock::point_global_offset(&block.children, head.leaf_index(), head.offset);
    textblock::marks_at(&block.children, global, state.schema())
}

/// Toggles `kind` on the selection. With a collapsed selection the change is
/// stored for the next typed text.
pub fn toggle_mark(kind: &str, attrs: Attrs) -> KeyHandler {
    let kind = kind.to_string();
    key_handler(move |state, dispatch| {
        let schema = state.schema();
        let Ok(mark_attrs) = schema.compute_mark_attrs(&kind, &attrs) else {
            return false;
        };
        let mark = Mark::with_attrs(kind.clone(), mark_attrs);
        let selection = state.selection();

        if selection.is_collapsed() {
            let head = &selection.focus;
            let allowed = state
                .doc()
                .element_at(head.block_path())
                .and_then(|el| schema.node(&el.kind))
                .is_some_and(|t| t.allows_mark(&kind));
            if !allowed {
                return false;
            }
            if let Some(dispatch) = dispatch {
                let current = marks_at_cursor(state);
                let stored = if current.iter().any(|m| m.kind == kind) {
                    schema.remove_mark(&current, &kind)
                } else {
                    schema.add_mark(&current, mark)
                };
                dispatch(
                    Transaction::new(Vec::new())
                        .stored_marks(stored)
                        .source("command:toggle_mark"),
                );
            }
            return true;
        }

        let from = selection.from().clone();
        let to = selection.to().clone();
        let spans = spans_between(state, &from, &to);
        let mut applicable = false;
        let mut has = false;
        for span in &spans {
            let allows = schema.node(&span.el.kind).is_some_and(|t| t.allows_mark(&kind));
            applicable |= allows;
            has |= textblock::range_has_mark(&span.el.children, span.start, span.end, &kind);
        }
        if !applicable {
            return false;
        }

        let tx = if has {
            remove_mark(state, &from, &to, &kind)
        } else {
            add_mark(state, &from, &to, mark)
        };
        if let (Some(dispatch), Some(tx)) = (dispatch, tx) {
            dispatch(tx);
        }
        true
    })
}

/// Replaces the selection with `text`, marked with the cursor's marks.
pub fn insert_text(text: &str) -> KeyHandler {
    let text = text.to_string();
    key_handler(move |state, dispatch| insert_text_command(state, dispatch, &text))
}

pub(crate) fn insert_text_command(
    state: &EditorState,
    dispatch: Option<&dyn Fn(Transaction)>,
    text: &str,
) -> bool {
    if !state.selection().is_collapsed() {
        let Some(delete) = super::base::delete_selection_tx(state) else {
            return false;
        };
        let Ok(after) = state.apply(delete.clone()) else {
            return false;
        };
        let Some(insert) = insert_text_tx(&after, text) else {
            return false;
        };
        if let Some(dispatch) = dispatch {
            dispatch(delete);
            dispatch(insert);
        }
        return true;
    }

    let Some(tx) = insert_text_tx(state, text) else {
        return false;
    };
    if let Some(dispatch) = dispatch {
        dispatch(tx);
    }
    true
}

fn insert_text_tx(state: &EditorState, text: &str) -> Option<Transaction> {
    let schema = state.schema();
    let head = state.selection().focus.clone();
    let block_path = head.block_path().to_vec();
    let block = state.doc().element_at(&block_path)?;
    let node_type = schema.node(&block.kind)?;
    let marks: Vec<Mark> = marks_at_cursor(state)
        .into_iter()
        .filter(|m| node_type.allows_mark(&m.kind))
        .collect();

    if let Some(Node::Text(leaf)) = block.children.get(head.leaf_index()) {
        if leaf.marks == marks {
            let mut cursor = head.clone();
            cursor.offset += text.len();
            return Some(
                Transaction::new(vec![Op::InsertText {
                    path: head.path.clone(),
                    offset: head.offset,
                    text: text.to_string(),
                }])
                .selection_after(Selection::collapsed(cursor))
                .source("command:insert_text"),
            );
        }
    }

    let global = textblock::point_global_offset(&block.children, head.leaf_index(), head.offset);
    let (left, right) = textblock::split_children(&block.children, global);
    let mut children = left;
    children.push(Node::marked_text(text, marks));
    let children = textblock::join_children(&children, &right);
    let cursor = textblock::point_for_global_offset(&block_path, &children, global + text.len(), false);
    Some(
        Transaction::new(rewrite_leaves_ops(&block_path, block.children.len(), children))
            .selection_after(Selection::collapsed(cursor))
            .source("command:insert_text"),
    )
}
