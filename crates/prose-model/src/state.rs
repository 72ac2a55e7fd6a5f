use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::mapping::{MapStep, Mapping, map_point_step};
use crate::node::{Document, Mark, Node, TextNode, children_mut, node_mut};
use crate::normalize::{NormalizePass, default_passes};
use crate::ops::{HistoryMode, Op, Transaction};
use crate::schema::{Schema, SchemaError, SchemaViolation};
use crate::selection::{Point, Selection, clamp_to_char_boundary, normalize_selection};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ApplyError {
    #[error("invalid path: {0}")]
    InvalidPath(String),
    #[error("document does not satisfy the schema: {0}")]
    SchemaViolation(#[from] SchemaViolation),
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error("normalization did not converge")]
    NormalizeDidNotConverge,
    #[error("nothing to undo")]
    NothingToUndo,
    #[error("nothing to redo")]
    NothingToRedo,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub max_undo: usize,
    #[serde(default)]
    pub max_normalize_iterations: usize,
}

impl EngineConfig {
    /// Zero fields fall back to the defaults.
    pub fn with_defaults(mut self) -> Self {
        if self.max_undo == 0 {
            self.max_undo = 200;
        }
        if self.max_normalize_iterations == 0 {
            self.max_normalize_iterations = 100;
        }
        self
    }
}

#[derive(Debug, Clone)]
struct UndoRecord {
    inverse_ops: Vec<Op>,
    selection_before: Selection,
    selection_after: Selection,
}

#[derive(Debug, Clone, Default)]
struct History {
    undo: Vec<UndoRecord>,
    redo: Vec<UndoRecord>,
}

static NEXT_STATE_ID: AtomicU64 = AtomicU64::new(1);

fn next_state_id() -> u64 {
    NEXT_STATE_ID.fetch_add(1, Ordering::Relaxed)
}

/// Immutable editor state. Every applied transaction produces a new value;
/// clones share the document.
#[derive(Clone)]
pub struct EditorState {
    schema: Arc<Schema>,
    passes: Arc<Vec<Box<dyn NormalizePass>>>,
    config: EngineConfig,
    doc: Arc<Document>,
    selection: Selection,
    stored_marks: Option<Vec<Mark>>,
    history: Arc<History>,
    id: u64,
    version: u64,
}

impl fmt::Debug for EditorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EditorState")
            .field("id", &self.id)
            .field("version", &self.version)
            .field("doc", &self.doc)
            .field("selection", &self.selection)
            .field("stored_marks", &self.stored_marks)
            .finish_non_exhaustive()
    }
}

impl EditorState {
    /// Builds the initial state, seeding an empty document from the schema
    /// when none is given.
    pub fn create(
        schema: Arc<Schema>,
        doc: Option<Document>,
        config: EngineConfig,
    ) -> Result<Self, ApplyError> {
        let config = config.with_defaults();
        let passes = Arc::new(default_passes());
        let mut doc = match doc {
            Some(doc) => doc,
            None => schema.create_empty_doc()?,
        };
        let mut selection = Selection::collapsed(Point::new(vec![0, 0], 0));
        let mut mapping = Mapping::new();
        normalize(
            &schema,
            &passes,
            config.max_normalize_iterations,
            &mut doc,
            &mut selection,
            &mut mapping,
        )?;
        schema.check(&doc)?;
        let selection = normalize_selection(&doc, &selection);

        Ok(Self {
            schema,
            passes,
            config,
            doc: Arc::new(doc),
            selection,
            stored_marks: None,
            history: Arc::default(),
            id: next_state_id(),
            version: 0,
        })
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn doc(&self) -> &Document {
        &self.doc
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn stored_marks(&self) -> Option<&[Mark]> {
        self.stored_marks.as_deref()
    }

    pub fn config(&self) -> EngineConfig {
        self.config
    }

    /// Process-unique identity of this state value.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Number of document-changing transactions since creation.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn can_undo(&self) -> bool {
        !self.history.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.history.redo.is_empty()
    }

    pub fn undo_depth(&self) -> usize {
        self.history.undo.len()
    }

    pub fn apply(&self, tx: Transaction) -> Result<EditorState, ApplyError> {
        self.apply_with_mapping(tx).map(|(state, _)| state)
    }

    pub fn apply_with_mapping(&self, tx: Transaction) -> Result<(EditorState, Mapping), ApplyError> {
        match tx.meta.history {
            HistoryMode::Undo => self.step_history(true),
            HistoryMode::Redo => self.step_history(false),
            HistoryMode::Record | HistoryMode::Skip => self.apply_ops(tx),
        }
    }

    fn apply_ops(&self, tx: Transaction) -> Result<(EditorState, Mapping), ApplyError> {
        let mut doc = Document::clone(&self.doc);
        let mut selection = self.selection.clone();
        let mut mapping = Mapping::new();
        let doc_changed = tx.doc_changed();

        let mut inverse_ops: Vec<Op> = Vec::with_capacity(tx.ops.len());
        for op in tx.ops {
            inverse_ops.push(apply_op_to(&mut doc, &mut selection, op, &mut mapping)?);
        }

        let selection_set = tx.selection_after.is_some();
        if let Some(sel) = tx.selection_after {
            selection = sel;
        }

        let mut inverse_normalize = normalize(
            &self.schema,
            &self.passes,
            self.config.max_normalize_iterations,
            &mut doc,
            &mut selection,
            &mut mapping,
        )?;
        inverse_ops.append(&mut inverse_normalize);
        inverse_ops.reverse();

        if doc_changed {
            self.schema.check(&doc)?;
        }
        let selection = normalize_selection(&doc, &selection);

        let mut history = History::clone(&self.history);
        if doc_changed {
            match tx.meta.history {
                HistoryMode::Skip => {
                    history.undo.clear();
                    history.redo.clear();
                }
                _ => {
                    history.undo.push(UndoRecord {
                        inverse_ops,
                        selection_before: self.selection.clone(),
                        selection_after: selection.clone(),
                    });
                    history.redo.clear();
                    if history.undo.len() > self.config.max_undo {
                        history.undo.remove(0);
                    }
                }
            }
        }

        // An explicit empty set means "type without marks" until the cursor moves.
        let stored_marks = match tx.stored_marks {
            Some(marks) => Some(marks),
            None if doc_changed || selection_set => None,
            None => self.stored_marks.clone(),
        };

        Ok((
            EditorState {
                schema: self.schema.clone(),
                passes: self.passes.clone(),
                config: self.config,
                doc: Arc::new(doc),
                selection,
                stored_marks,
                history: Arc::new(history),
                id: next_state_id(),
                version: self.version + doc_changed as u64,
            },
            mapping,
        ))
    }

    fn step_history(&self, undo: bool) -> Result<(EditorState, Mapping), ApplyError> {
        let mut history = History::clone(&self.history);
        let record = if undo {
            history.undo.pop().ok_or(ApplyError::NothingToUndo)?
        } else {
            history.redo.pop().ok_or(ApplyError::NothingToRedo)?
        };
        let UndoRecord {
            inverse_ops,
            selection_before,
            selection_after,
        } = record;

        let mut doc = Document::clone(&self.doc);
        let mut selection = self.selection.clone();
        let mut mapping = Mapping::new();
        let mut reverse_ops: Vec<Op> = Vec::with_capacity(inverse_ops.len());
        for op in inverse_ops {
            reverse_ops.push(apply_op_to(&mut doc, &mut selection, op, &mut mapping)?);
        }
        reverse_ops.reverse();

        selection = if undo {
            selection_before.clone()
        } else {
            selection_after.clone()
        };
        normalize(
            &self.schema,
            &self.passes,
            self.config.max_normalize_iterations,
            &mut doc,
            &mut selection,
            &mut mapping,
        )?;
        self.schema.check(&doc)?;
        let selection = normalize_selection(&doc, &selection);

        let record = UndoRecord {
            inverse_ops: reverse_ops,
            selection_before,
            selection_after,
        };
        if undo {
            history.redo.push(record);
        } else {
            history.undo.push(record);
        }

        Ok((
            EditorState {
                schema: self.schema.clone(),
                passes: self.passes.clone(),
                config: self.config,
                doc: Arc::new(doc),
                selection,
                stored_marks: None,
                history: Arc::new(history),
                id: next_state_id(),
                version: self.version + 1,
            },
            mapping,
        ))
    }
}

fn normalize(
    schema: &Schema,
    passes: &[Box<dyn NormalizePass>],
    max_iterations: usize,
    doc: &mut Document,
    selection: &mut Selection,
    mapping: &mut Mapping,
) -> Result<Vec<Op>, ApplyError> {
    let mut inverse_ops: Vec<Op> = Vec::new();
    for _ in 0..max_iterations {
        let mut changed = false;
        for pass in passes {
            let ops = pass.run(doc, schema);
            if !ops.is_empty() {
                tracing::trace!(pass = pass.id(), ops = ops.len(), "normalize");
                changed = true;
            }
            for op in ops {
                inverse_ops.push(apply_op_to(doc, selection, op, mapping)?);
            }
        }
        if !changed {
            return Ok(inverse_ops);
        }
    }
    Err(ApplyError::NormalizeDidNotConverge)
}

fn invalid_path(what: &str, path: &[usize]) -> ApplyError {
    ApplyError::InvalidPath(format!("{what} at {path:?}"))
}

fn text_mut<'a>(doc: &'a mut Document, path: &[usize]) -> Result<&'a mut TextNode, ApplyError> {
    match node_mut(doc, path) {
        Some(Node::Text(t)) => Ok(t),
        _ => Err(invalid_path("expected text node", path)),
    }
}

fn apply_op_to(
    doc: &mut Document,
    selection: &mut Selection,
    op: Op,
    mapping: &mut Mapping,
) -> Result<Op, ApplyError> {
    let (inverse, step) = match op {
        Op::InsertText { path, offset, text } => {
            let text_node = text_mut(doc, &path)?;
            let offset = clamp_to_char_boundary(&text_node.text, offset);
            text_node.text.insert_str(offset, &text);
            let step = MapStep::InsertText {
                path: path.clone(),
                offset,
                len: text.len(),
            };
            let inverse = Op::RemoveText {
                path,
                range: offset..offset + text.len(),
            };
            (inverse, step)
        }
        Op::RemoveText { path, range } => {
            let text_node = text_mut(doc, &path)?;
            let start = clamp_to_char_boundary(&text_node.text, range.start);
            let end = clamp_to_char_boundary(&text_node.text, range.end);
            if start >= end {
                let inverse = Op::InsertText {
                    path,
                    offset: start,
                    text: String::new(),
                };
                (inverse, MapStep::Retain)
            } else {
                let removed = text_node.text[start..end].to_string();
                text_node.text.replace_range(start..end, "");
                let step = MapStep::RemoveText {
                    path: path.clone(),
                    range: start..end,
                };
                let inverse = Op::InsertText {
                    path,
                    offset: start,
                    text: removed,
                };
                (inverse, step)
            }
        }
        Op::InsertNode { path, node } => {
            let (index, parent) = path
                .split_last()
                .ok_or_else(|| invalid_path("empty insert path", &path))?;
            let children =
                children_mut(doc, parent).ok_or_else(|| invalid_path("insert parent", parent))?;
            if *index > children.len() {
                return Err(invalid_path("insert index out of bounds", &path));
            }
            children.insert(*index, node);
            let step = MapStep::InsertNode { path: path.clone() };
            (Op::RemoveNode { path }, step)
        }
        Op::RemoveNode { path } => {
            let (index, parent) = path
                .split_last()
                .ok_or_else(|| invalid_path("empty remove path", &path))?;
            let children =
                children_mut(doc, parent).ok_or_else(|| invalid_path("remove parent", parent))?;
            if *index >= children.len() {
                return Err(invalid_path("remove index out of bounds", &path));
            }
            let removed = children.remove(*index);
            let merged_into_left = merged_prefix(children, *index, &removed);
            let step = MapStep::RemoveNode {
                path: path.clone(),
                merged_into_left,
            };
            (
                Op::InsertNode {
                    path,
                    node: removed,
                },
                step,
            )
        }
        Op::SetNodeAttrs { path, patch } => {
            let old = match node_mut(doc, &path) {
                Some(Node::Element(el)) => patch.apply_to(&mut el.attrs),
                _ => return Err(invalid_path("expected element for attrs", &path)),
            };
            (Op::SetNodeAttrs { path, patch: old }, MapStep::Retain)
        }
        Op::SetNodeKind { path, kind, attrs } => {
            let (old_kind, old_attrs) = match node_mut(doc, &path) {
                Some(Node::Element(el)) => (
                    std::mem::replace(&mut el.kind, kind),
                    std::mem::replace(&mut el.attrs, attrs),
                ),
                _ => return Err(invalid_path("expected element to retype", &path)),
            };
            (
                Op::SetNodeKind {
                    path,
                    kind: old_kind,
                    attrs: old_attrs,
                },
                MapStep::Retain,
            )
        }
        Op::SetTextMarks { path, marks } => {
            let text_node = text_mut(doc, &path)?;
            let old = std::mem::replace(&mut text_node.marks, marks);
            (Op::SetTextMarks { path, marks: old }, MapStep::Retain)
        }
    };

    map_point_step(&step, &mut selection.anchor);
    map_point_step(&step, &mut selection.focus);
    mapping.push(step);
    Ok(inverse)
}

/// When a text leaf is removed right after its text was appended to the left
/// sibling (leaf merge), returns where the removed text now starts inside that
/// sibling together with its length.
fn merged_prefix(children: &[Node], index: usize, removed: &Node) -> Option<(usize, usize)> {
    let Node::Text(removed) = removed else {
        return None;
    };
    let Some(Node::Text(left)) = index.checked_sub(1).and_then(|ix| children.get(ix)) else {
        return None;
    };
    if left.marks != removed.marks {
        return None;
    }

    let mut run = removed.text.clone();
    for node in &children[index..] {
        match node {
            Node::Text(t) if t.marks == removed.marks => run.push_str(&t.text),
            _ => break,
        }
    }
    let suffix = if left.text.ends_with(&run) {
        run.len()
    } else if left.text.ends_with(&removed.text) {
        removed.text.len()
    } else {
        return None;
    };
    Some((left.text.len() - suffix, removed.text.len()))
}

