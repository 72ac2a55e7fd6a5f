//! Commands in the `(state, dispatch) -> bool` form bound to keys. A command
//! called without a dispatch sink only reports whether it would apply.

mod base;
mod block;
mod list;
mod marks;
mod resolve;

use std::cell::RefCell;
use std::rc::Rc;

use manos_prose_model::{
    ApplyError, AttrPatch, Attrs, Document, EditorState, Node, Op, Path, Point, Schema, Selection,
    TOP_NODE, Transaction,
};

pub use base::*;
pub use block::*;
pub use list::*;
pub use marks::*;
pub use resolve::*;

pub(crate) use marks::{insert_text_command, rewrite_leaves_ops};

use crate::keymap::{KeyHandler, key_handler};

/// Runs `command` against `state` and applies every transaction it dispatches,
/// in order. `Ok(None)` when the command does not apply.
pub fn apply_command(
    state: &EditorState,
    command: &KeyHandler,
) -> Result<Option<EditorState>, ApplyError> {
    let emitted: RefCell<Vec<Transaction>> = RefCell::new(Vec::new());
    let dispatch = |tx: Transaction| emitted.borrow_mut().push(tx);
    if !command(state, Some(&dispatch)) {
        return Ok(None);
    }

    let mut next = state.clone();
    for tx in emitted.into_inner() {
        next = next.apply(tx)?;
    }
    Ok(Some(next))
}

/// First command that applies wins.
pub fn chain_commands(commands: Vec<KeyHandler>) -> KeyHandler {
    key_handler(move |state, dispatch| commands.iter().any(|command| command(state, dispatch)))
}

/// Attribute-only update of the node at `path`.
pub fn set_node_attrs(path: Path, attrs: Attrs) -> Transaction {
    Transaction::new(vec![Op::SetNodeAttrs {
        path,
        patch: AttrPatch::from_attrs(attrs),
    }])
    .source("command:set_node_attrs")
}

pub fn undo() -> KeyHandler {
    key_handler(|state, dispatch| {
        if !state.can_undo() {
            return false;
        }
        if let Some(dispatch) = dispatch {
            dispatch(Transaction::undo());
        }
        true
    })
}

pub fn redo() -> KeyHandler {
    key_handler(|state, dispatch| {
        if !state.can_redo() {
            return false;
        }
        if let Some(dispatch) = dispatch {
            dispatch(Transaction::redo());
        }
        true
    })
}

/// Wraps a plain command function as a shareable handler.
pub fn command(f: fn(&EditorState, Option<&dyn Fn(Transaction)>) -> bool) -> KeyHandler {
    Rc::new(f)
}

/// Kind of the node owning the children at `path`; the document for `[]`.
pub(crate) fn kind_at<'a>(doc: &'a Document, path: &[usize]) -> Option<&'a str> {
    if path.is_empty() {
        return Some(TOP_NODE);
    }
    doc.element_at(path).map(|el| el.kind.as_str())
}

pub(crate) fn kinds_of(nodes: &[Node]) -> Vec<&str> {
    nodes.iter().map(Node::kind).collect()
}

/// Ops replacing `remove` children of `parent` starting at `start` with `insert`.
pub(crate) fn replace_children_ops(
    parent: &[usize],
    start: usize,
    remove: usize,
    insert: Vec<Node>,
) -> Vec<Op> {
    let mut at = parent.to_vec();
    at.push(start);
    let mut ops: Vec<Op> = (0..remove)
        .map(|_| Op::RemoveNode { path: at.clone() })
        .collect();
    for (ix, node) in insert.into_iter().enumerate() {
        let mut path = parent.to_vec();
        path.push(start + ix);
        ops.push(Op::InsertNode { path, node });
    }
    ops
}

pub(crate) fn map_selection(selection: &Selection, f: impl Fn(&Point) -> Point) -> Selection {
    Selection::range(f(&selection.anchor), f(&selection.focus))
}

/// Whether `parent` accepts `children` with the slice `start..end` swapped for `with`.
pub(crate) fn can_replace(
    schema: &Schema,
    parent_kind: &str,
    children: &[Node],
    start: usize,
    end: usize,
    with: &[&str],
) -> bool {
    let mut kinds: Vec<&str> = kinds_of(&children[..start]);
    kinds.extend_from_slice(with);
    kinds.extend(kinds_of(&children[end..]));
    schema.valid_content(parent_kind, &kinds)
}
