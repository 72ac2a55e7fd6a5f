use std::collections::BTreeMap;
use std::ops::Range;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::node::{Attrs, Mark, Node};
use crate::selection::Selection;

pub type Path = Vec<usize>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Op {
    InsertText {
        #[serde(default)]
        path: Path,
        offset: usize,
        text: String,
    },
    RemoveText {
        #[serde(default)]
        path: Path,
        range: Range<usize>,
    },
    InsertNode {
        #[serde(default)]
        path: Path,
        node: Node,
    },
    RemoveNode {
        #[serde(default)]
        path: Path,
    },
    SetNodeAttrs {
        #[serde(default)]
        path: Path,
        patch: AttrPatch,
    },
    /// Retypes an element in place, keeping its children.
    SetNodeKind {
        #[serde(default)]
        path: Path,
        kind: String,
        #[serde(default)]
        attrs: Attrs,
    },
    SetTextMarks {
        #[serde(default)]
        path: Path,
        #[serde(default)]
        marks: Vec<Mark>,
    },
}

impl Op {
    pub fn path(&self) -> &[usize] {
        match self {
            Op::InsertText { path, .. }
            | Op::RemoveText { path, .. }
            | Op::InsertNode { path, .. }
            | Op::RemoveNode { path }
            | Op::SetNodeAttrs { path, .. }
            | Op::SetNodeKind { path, .. }
            | Op::SetTextMarks { path, .. } => path,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AttrPatch {
    #[serde(default)]
    pub set: Attrs,
    #[serde(default)]
    pub remove: Vec<String>,
}

impl AttrPatch {
    pub fn set(key: impl Into<String>, value: Value) -> Self {
        let mut set = Attrs::new();
        set.insert(key.into(), value);
        Self {
            set,
            remove: Vec::new(),
        }
    }

    pub fn from_attrs(attrs: Attrs) -> Self {
        Self {
            set: attrs,
            remove: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.set.is_empty() && self.remove.is_empty()
    }

    /// Applies the patch and returns the patch that undoes it.
    pub(crate) fn apply_to(&self, attrs: &mut Attrs) -> AttrPatch {
        let mut old_set: Attrs = Attrs::new();
        let mut old_remove: Vec<String> = Vec::new();

        for (k, v) in &self.set {
            if let Some(prev) = attrs.insert(k.clone(), v.clone()) {
                old_set.insert(k.clone(), prev);
            } else {
                old_remove.push(k.clone());
            }
        }

        for key in &self.remove {
            if let Some(prev) = attrs.remove(key) {
                old_set.insert(key.clone(), prev);
            }
        }

        AttrPatch {
            set: old_set,
            remove: old_remove,
        }
    }
}

/// How the history keeps track of a transaction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryMode {
    #[default]
    Record,
    /// Applied outside of history. Existing undo/redo entries are dropped when
    /// the transaction changes the document, because their paths may no longer
    /// line up.
    Skip,
    Undo,
    Redo,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransactionMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default)]
    pub history: HistoryMode,
    /// Plugin-keyed metadata, e.g. `"link" -> {"pending": ...}`.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    #[serde(default)]
    pub ops: Vec<Op>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selection_after: Option<Selection>,
    /// Marks for the next typed text, overriding the marks at the cursor.
    /// `Some(vec![])` types plain text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stored_marks: Option<Vec<Mark>>,
    #[serde(default)]
    pub meta: TransactionMeta,
}

impl Transaction {
    pub fn new(ops: Vec<Op>) -> Self {
        Self {
            ops,
            ..Default::default()
        }
    }

    /// A selection-only transaction.
    pub fn select(selection: Selection) -> Self {
        Self::default().selection_after(selection)
    }

    pub fn undo() -> Self {
        let mut tx = Self::default();
        tx.meta.history = HistoryMode::Undo;
        tx
    }

    pub fn redo() -> Self {
        let mut tx = Self::default();
        tx.meta.history = HistoryMode::Redo;
        tx
    }

    pub fn selection_after(mut self, selection_after: Selection) -> Self {
        self.selection_after = Some(selection_after);
        self
    }

    pub fn stored_marks(mut self, marks: Vec<Mark>) -> Self {
        self.stored_marks = Some(marks);
        self
    }

    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.meta.source = Some(source.into());
        self
    }

    pub fn set_meta(mut self, key: impl Into<String>, value: Value) -> Self {
        self.meta.extra.insert(key.into(), value);
        self
    }

    pub fn get_meta(&self, key: &str) -> Option<&Value> {
        self.meta.extra.get(key)
    }

    pub fn without_history(mut self) -> Self {
        self.meta.history = HistoryMode::Skip;
        self
    }

    pub fn push(&mut self, op: Op) {
        self.ops.push(op);
    }

    pub fn doc_changed(&self) -> bool {
        !self.ops.is_empty()
    }
}
