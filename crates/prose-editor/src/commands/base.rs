use manos_prose_model::{
    Attrs, Document, EditorState, ElementNode, Node, Op, Path, Point, Schema, Selection,
    Transaction, textblock,
};

use super::block::lift_range;
use super::marks::{insert_text_command, rewrite_leaves_ops, spans_between};
use super::{BlockRange, can_replace, chain_commands, command, kind_at, lift_target};
use crate::keymap::Keymap;

/// Collapsed cursor resolved against its textblock.
struct Cursor<'a> {
    point: Point,
    block_path: Path,
    block: &'a ElementNode,
    offset: usize,
}

fn cursor(state: &EditorState) -> Option<Cursor<'_>> {
    let selection = state.selection();
    if !selection.is_collapsed() {
        return None;
    }
    let point = selection.focus.clone();
    let block_path = point.block_path().to_vec();
    let block = state.doc().element_at(&block_path)?;
    let offset = textblock::point_global_offset(&block.children, point.leaf_index(), point.offset);
    Some(Cursor {
        point,
        block_path,
        block,
        offset,
    })
}

fn child_path(parent: &[usize], index: usize) -> Path {
    let mut path = parent.to_vec();
    path.push(index);
    path
}

/// Leaves with the flat range `start..end` cut out.
fn cut_children(children: &[Node], start: usize, end: usize) -> Vec<Node> {
    let (left, _) = textblock::split_children(children, start);
    let (_, right) = textblock::split_children(children, end);
    textblock::join_children(&left, &right)
}

/// Drops the marks `kind` does not allow from text leaves.
fn strip_marks(schema: &Schema, kind: &str, nodes: &[Node]) -> Vec<Node> {
    let Some(node_type) = schema.node(kind) else {
        return nodes.to_vec();
    };
    nodes
        .iter()
        .map(|node| match node {
            Node::Text(t) => Node::marked_text(
                t.text.clone(),
                t.marks
                    .iter()
                    .filter(|m| node_type.allows_mark(&m.kind))
                    .cloned()
                    .collect(),
            ),
            other => other.clone(),
        })
        .collect()
}

/// Deletes the selected text. Blocks sharing a parent are joined into the
/// first one; otherwise each touched block only loses its selected text.
pub(crate) fn delete_selection_tx(state: &EditorState) -> Option<Transaction> {
    let selection = state.selection();
    if selection.is_collapsed() {
        return None;
    }
    let schema = state.schema();
    let from = selection.from().clone();
    let to = selection.to().clone();
    let spans = spans_between(state, &from, &to);
    let first = spans.first()?;
    let last = spans.last()?;
    let same_parent = first.path.len() == last.path.len()
        && first.path[..first.path.len() - 1] == last.path[..last.path.len() - 1];

    let mut ops: Vec<Op> = Vec::new();
    let first_children;
    if first.path == last.path {
        first_children = cut_children(&first.el.children, first.start, first.end);
        ops.extend(rewrite_leaves_ops(
            &first.path,
            first.el.children.len(),
            first_children.clone(),
        ));
    } else if same_parent {
        let (left, _) = textblock::split_children(&first.el.children, first.start);
        let (_, right) = textblock::split_children(&last.el.children, last.end);
        first_children =
            textblock::join_children(&left, &strip_marks(schema, &first.el.kind, &right));
        ops.extend(rewrite_leaves_ops(
            &first.path,
            first.el.children.len(),
            first_children.clone(),
        ));
        let (&first_ix, parent) = first.path.split_last()?;
        let last_ix = *last.path.last()?;
        let next = child_path(parent, first_ix + 1);
        ops.extend((first_ix..last_ix).map(|_| Op::RemoveNode { path: next.clone() }));
    } else {
        first_children = cut_children(&first.el.children, first.start, first.end);
        for span in &spans {
            if span.start >= span.end {
                continue;
            }
            let children = cut_children(&span.el.children, span.start, span.end);
            ops.extend(rewrite_leaves_ops(&span.path, span.el.children.len(), children));
        }
    }

    if ops.is_empty() {
        return None;
    }
    let point = textblock::point_for_global_offset(&first.path, &first_children, first.start, false);
    Some(
        Transaction::new(ops)
            .selection_after(Selection::collapsed(point))
            .source("command:delete_selection"),
    )
}

pub fn delete_selection(state: &EditorState, dispatch: Option<&dyn Fn(Transaction)>) -> bool {
    let Some(tx) = delete_selection_tx(state) else {
        return false;
    };
    if let Some(dispatch) = dispatch {
        dispatch(tx);
    }
    true
}

fn is_code_block(state: &EditorState, block_path: &[usize]) -> bool {
    state
        .doc()
        .element_at(block_path)
        .and_then(|el| state.schema().node(&el.kind))
        .is_some_and(|t| t.spec.code)
}

/// Inserts a newline when the selection sits in a code block.
pub fn newline_in_code(state: &EditorState, dispatch: Option<&dyn Fn(Transaction)>) -> bool {
    let selection = state.selection();
    if !selection.same_parent() || !is_code_block(state, selection.focus.block_path()) {
        return false;
    }
    insert_text_command(state, dispatch, "\n")
}

/// Leaves a code block by creating a default block after it.
pub fn exit_code(state: &EditorState, dispatch: Option<&dyn Fn(Transaction)>) -> bool {
    let selection = state.selection();
    let block_path = selection.to().block_path();
    if !selection.same_parent() || !is_code_block(state, block_path) {
        return false;
    }
    let schema = state.schema();
    let doc = state.doc();
    let Some((&ix, parent)) = block_path.split_last() else {
        return false;
    };
    let (Some(parent_kind), Some(siblings)) = (kind_at(doc, parent), doc.children_at(parent)) else {
        return false;
    };
    let Some(kind) = schema.default_textblock_in(parent_kind) else {
        return false;
    };
    if !can_replace(schema, parent_kind, siblings, ix + 1, ix + 1, &[kind]) {
        return false;
    }
    let Ok(node) = schema.create_and_fill(kind, &Attrs::new()) else {
        return false;
    };

    if let Some(dispatch) = dispatch {
        let path = child_path(parent, ix + 1);
        let cursor = Point::new(child_path(&path, 0), 0);
        dispatch(
            Transaction::new(vec![Op::InsertNode { path, node }])
                .selection_after(Selection::collapsed(cursor))
                .source("command:exit_code"),
        );
    }
    true
}

/// Lifts an empty nested textblock out of its parent.
pub fn lift_empty_block(state: &EditorState, dispatch: Option<&dyn Fn(Transaction)>) -> bool {
    let Some(cursor) = cursor(state) else {
        return false;
    };
    if !cursor.block.is_empty_textblock() {
        return false;
    }
    let Some((&ix, parent)) = cursor.block_path.split_last() else {
        return false;
    };
    if parent.is_empty() {
        return false;
    }
    let range = BlockRange {
        parent: parent.to_vec(),
        start: ix,
        end: ix + 1,
    };
    lift_range(state, dispatch, &range)
}

/// Splits the textblock at the cursor, deleting the selection first. At the
/// end of a block the new block gets the parent's default textblock type.
pub fn split_block(state: &EditorState, dispatch: Option<&dyn Fn(Transaction)>) -> bool {
    if !state.selection().is_collapsed() {
        let Some(delete) = delete_selection_tx(state) else {
            return false;
        };
        let Ok(after) = state.apply(delete.clone()) else {
            return false;
        };
        let Some(split) = split_block_tx(&after) else {
            return false;
        };
        if let Some(dispatch) = dispatch {
            dispatch(delete);
            dispatch(split);
        }
        return true;
    }

    let Some(tx) = split_block_tx(state) else {
        return false;
    };
    if let Some(dispatch) = dispatch {
        dispatch(tx);
    }
    true
}

fn split_block_tx(state: &EditorState) -> Option<Transaction> {
    let schema = state.schema();
    let doc = state.doc();
    let cursor = cursor(state)?;
    let block = cursor.block;
    let (&ix, parent) = cursor.block_path.split_last()?;
    let parent_kind = kind_at(doc, parent)?;
    let siblings = doc.children_at(parent)?;
    let at_end = cursor.offset == textblock::textblock_len(&block.children);

    let mut ops = Vec::new();
    let right = if at_end {
        let kind = schema
            .default_textblock_in(parent_kind)
            .unwrap_or(block.kind.as_str());
        schema.create_and_fill(kind, &Attrs::new()).ok()?
    } else {
        let (left, right) = textblock::split_children(&block.children, cursor.offset);
        ops.extend(rewrite_leaves_ops(&cursor.block_path, block.children.len(), left));
        Node::element(block.kind.clone(), block.attrs.clone(), right)
    };
    if !can_replace(schema, parent_kind, siblings, ix, ix + 1, &[block.kind.as_str(), right.kind()]) {
        return None;
    }

    let path = child_path(parent, ix + 1);
    let point = Point::new(child_path(&path, 0), 0);
    ops.push(Op::InsertNode { path, node: right });
    Some(
        Transaction::new(ops)
            .selection_after(Selection::collapsed(point))
            .source("command:split_block"),
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Backward,
    Forward,
}

/// Boundary between two siblings of `parent`; `index` is the child right
/// after it.
struct Cut {
    parent: Path,
    index: usize,
}

/// Nearest boundary before (or after) the block that has a sibling on that
/// side, not crossing isolating nodes.
fn find_cut(schema: &Schema, doc: &Document, block_path: &[usize], side: Side) -> Option<Cut> {
    for depth in (1..=block_path.len()).rev() {
        let parent = &block_path[..depth - 1];
        let ix = block_path[depth - 1];
        let len = doc.children_at(parent)?.len();
        match side {
            Side::Backward if ix > 0 => {
                return Some(Cut {
                    parent: parent.to_vec(),
                    index: ix,
                });
            }
            Side::Forward if ix + 1 < len => {
                return Some(Cut {
                    parent: parent.to_vec(),
                    index: ix + 1,
                });
            }
            _ => {}
        }
        let isolating = kind_at(doc, parent)
            .and_then(|kind| schema.node(kind))
            .is_some_and(|t| t.spec.isolating);
        if isolating {
            break;
        }
    }
    None
}

/// Path of the first (or last) textblock inside the node at `path`.
fn edge_textblock(schema: &Schema, doc: &Document, path: &[usize], side: Side) -> Option<Path> {
    let mut path = path.to_vec();
    loop {
        let el = doc.element_at(&path)?;
        if schema.is_textblock(&el.kind) {
            return Some(path);
        }
        let ix = match side {
            Side::Backward => el.children.len().checked_sub(1)?,
            Side::Forward => 0,
        };
        path.push(ix);
    }
}

/// Joins across `cut`. The cursor sits in the node after the cut when
/// joining backward and in the node before it when joining forward.
fn join_at_cut(state: &EditorState, cursor: &Cursor<'_>, cut: &Cut, side: Side) -> Option<Transaction> {
    let schema = state.schema();
    let doc = state.doc();
    let parent_kind = kind_at(doc, &cut.parent)?;
    let siblings = doc.children_at(&cut.parent)?;
    let before_path = child_path(&cut.parent, cut.index - 1);
    let after_path = child_path(&cut.parent, cut.index);
    let (Some(Node::Element(before)), Some(Node::Element(after))) =
        (siblings.get(cut.index - 1), siblings.get(cut.index))
    else {
        return None;
    };
    let depth = cut.parent.len();

    // An empty block in front of the cut disappears.
    if before.is_empty_textblock()
        && can_replace(schema, parent_kind, siblings, cut.index - 1, cut.index, &[])
    {
        let point = match side {
            Side::Backward => {
                let mut path = cursor.point.path.clone();
                path[depth] -= 1;
                Point::new(path, cursor.point.offset)
            }
            Side::Forward => {
                let block = edge_textblock(schema, doc, &after_path, Side::Forward)?;
                let mut path = child_path(&block, 0);
                path[depth] -= 1;
                Point::new(path, 0)
            }
        };
        return Some(
            Transaction::new(vec![Op::RemoveNode { path: before_path }])
                .selection_after(Selection::collapsed(point))
                .source("command:join"),
        );
    }

    // Same-kind containers merge their children.
    if before.kind == after.kind && !schema.is_textblock(&before.kind) {
        let mut kinds: Vec<&str> = before.children.iter().map(Node::kind).collect();
        kinds.extend(after.children.iter().map(Node::kind));
        if !schema.valid_content(&before.kind, &kinds) {
            return None;
        }
        let mut ops: Vec<Op> = after
            .children
            .iter()
            .enumerate()
            .map(|(k, node)| Op::InsertNode {
                path: child_path(&before_path, before.children.len() + k),
                node: node.clone(),
            })
            .collect();
        ops.push(Op::RemoveNode { path: after_path });
        let point = match side {
            Side::Backward => {
                let mut path = before_path.clone();
                path.push(before.children.len() + cursor.point.path[depth + 1]);
                path.extend_from_slice(&cursor.point.path[depth + 2..]);
                Point::new(path, cursor.point.offset)
            }
            Side::Forward => cursor.point.clone(),
        };
        return Some(
            Transaction::new(ops)
                .selection_after(Selection::collapsed(point))
                .source("command:join"),
        );
    }

    // Pull the text of one textblock into its neighbour across the cut.
    let (target_path, source_path) = match side {
        Side::Backward => {
            if cursor.block_path != after_path {
                return None;
            }
            (edge_textblock(schema, doc, &before_path, Side::Backward)?, after_path)
        }
        Side::Forward => {
            if cursor.block_path != before_path {
                return None;
            }
            (before_path, edge_textblock(schema, doc, &after_path, Side::Forward)?)
        }
    };
    let target = doc.element_at(&target_path)?;
    let source = doc.element_at(&source_path)?;
    let joined_at = textblock::textblock_len(&target.children);
    let merged = textblock::join_children(
        &target.children,
        &strip_marks(schema, &target.kind, &source.children),
    );
    if !schema.valid_content(&target.kind, &merged.iter().map(Node::kind).collect::<Vec<_>>()) {
        return None;
    }

    // Remove the source along with ancestors it would leave empty.
    let mut removed = source_path.clone();
    while removed.len() > depth + 1 {
        let parent = &removed[..removed.len() - 1];
        if doc.children_at(parent).map_or(0, <[Node]>::len) != 1 {
            break;
        }
        removed.pop();
    }

    let point = textblock::point_for_global_offset(&target_path, &merged, joined_at, false);
    let mut ops = rewrite_leaves_ops(&target_path, target.children.len(), merged);
    ops.push(Op::RemoveNode { path: removed });
    Some(
        Transaction::new(ops)
            .selection_after(Selection::collapsed(point))
            .source("command:join"),
    )
}

/// At the start of a textblock: joins it with the content before it, or
/// lifts it out of its parent when nothing precedes it.
pub fn join_backward(state: &EditorState, dispatch: Option<&dyn Fn(Transaction)>) -> bool {
    let Some(cursor) = cursor(state) else {
        return false;
    };
    if cursor.offset > 0 {
        return false;
    }
    let schema = state.schema();
    let Some((&ix, parent)) = cursor.block_path.split_last() else {
        return false;
    };
    let own_range = BlockRange {
        parent: parent.to_vec(),
        start: ix,
        end: ix + 1,
    };

    let Some(cut) = find_cut(schema, state.doc(), &cursor.block_path, Side::Backward) else {
        return lift_range(state, dispatch, &own_range);
    };
    if let Some(tx) = join_at_cut(state, &cursor, &cut, Side::Backward) {
        if let Some(dispatch) = dispatch {
            dispatch(tx);
        }
        return true;
    }
    let liftable = lift_target(schema, state.doc(), &own_range).is_some_and(|t| t >= cut.parent.len());
    liftable && lift_range(state, dispatch, &own_range)
}

/// At the end of a textblock: joins the content after it into it.
pub fn join_forward(state: &EditorState, dispatch: Option<&dyn Fn(Transaction)>) -> bool {
    let Some(cursor) = cursor(state) else {
        return false;
    };
    if cursor.offset < textblock::textblock_len(&cursor.block.children) {
        return false;
    }
    let Some(cut) = find_cut(state.schema(), state.doc(), &cursor.block_path, Side::Forward) else {
        return false;
    };
    let Some(tx) = join_at_cut(state, &cursor, &cut, Side::Forward) else {
        return false;
    };
    if let Some(dispatch) = dispatch {
        dispatch(tx);
    }
    true
}

/// Removes the character before the cursor inside its textblock.
pub fn delete_char_backward(state: &EditorState, dispatch: Option<&dyn Fn(Transaction)>) -> bool {
    let Some(cursor) = cursor(state) else {
        return false;
    };
    if cursor.offset == 0 {
        return false;
    }
    let point = textblock::point_for_global_offset(
        &cursor.block_path,
        &cursor.block.children,
        cursor.offset,
        false,
    );
    let Some(Node::Text(leaf)) = cursor.block.children.get(point.leaf_index()) else {
        return false;
    };
    let Some(ch) = leaf.text[..point.offset].chars().next_back() else {
        return false;
    };
    let start = point.offset - ch.len_utf8();

    if let Some(dispatch) = dispatch {
        let after = Point::new(point.path.clone(), start);
        dispatch(
            Transaction::new(vec![Op::RemoveText {
                path: point.path,
                range: start..point.offset,
            }])
            .selection_after(Selection::collapsed(after))
            .source("command:delete_char"),
        );
    }
    true
}

/// Removes the character after the cursor inside its textblock.
pub fn delete_char_forward(state: &EditorState, dispatch: Option<&dyn Fn(Transaction)>) -> bool {
    let Some(cursor) = cursor(state) else {
        return false;
    };
    if cursor.offset >= textblock::textblock_len(&cursor.block.children) {
        return false;
    }
    let point = textblock::point_for_global_offset(
        &cursor.block_path,
        &cursor.block.children,
        cursor.offset,
        true,
    );
    let Some(Node::Text(leaf)) = cursor.block.children.get(point.leaf_index()) else {
        return false;
    };
    let Some(ch) = leaf.text[point.offset..].chars().next() else {
        return false;
    };

    if let Some(dispatch) = dispatch {
        let end = point.offset + ch.len_utf8();
        dispatch(
            Transaction::new(vec![Op::RemoveText {
                path: point.path.clone(),
                range: point.offset..end,
            }])
            .selection_after(Selection::collapsed(cursor.point.clone()))
            .source("command:delete_char"),
        );
    }
    true
}

pub fn select_all(state: &EditorState, dispatch: Option<&dyn Fn(Transaction)>) -> bool {
    let Some(selection) = Selection::all(state.doc()) else {
        return false;
    };
    if let Some(dispatch) = dispatch {
        dispatch(Transaction::select(selection).source("command:select_all"));
    }
    true
}

/// Editing keys every editor gets unless default extensions are disabled.
pub fn base_keymap() -> Keymap {
    let backspace = chain_commands(vec![
        command(delete_selection),
        command(join_backward),
        command(delete_char_backward),
    ]);
    let delete = chain_commands(vec![
        command(delete_selection),
        command(join_forward),
        command(delete_char_forward),
    ]);

    Keymap::new()
        .bind(
            "Enter",
            "Split the current block",
            chain_commands(vec![
                command(newline_in_code),
                command(lift_empty_block),
                command(split_block),
            ]),
        )
        .bind("Mod-Enter", "Leave the code block", command(exit_code))
        .bind("Backspace", "Delete backward", backspace.clone())
        .bind("Mod-Backspace", "Delete backward", backspace.clone())
        .bind("Shift-Backspace", "Delete backward", backspace)
        .bind("Delete", "Delete forward", delete.clone())
        .bind("Mod-Delete", "Delete forward", delete)
        .bind("Mod-a", "Select the whole document", command(select_all))
}

