use crate::node::{Document, ElementNode, Node};
use crate::ops::{Op, Path};
use crate::schema::Schema;

/// A structural fix-up run after every transaction until no pass produces ops.
pub trait NormalizePass: Send + Sync {
    fn id(&self) -> &'static str;
    fn run(&self, doc: &Document, schema: &Schema) -> Vec<Op>;
}

pub fn default_passes() -> Vec<Box<dyn NormalizePass>> {
    vec![
        Box::new(EnsureNonEmptyDocument),
        Box::new(EnsureTextblockHasTextLeaf),
        Box::new(DropEmptyTextLeaves),
        Box::new(MergeAdjacentTextLeaves),
    ]
}

struct EnsureNonEmptyDocument;

impl NormalizePass for EnsureNonEmptyDocument {
    fn id(&self) -> &'static str {
        "core.ensure_non_empty_document"
    }

    fn run(&self, doc: &Document, schema: &Schema) -> Vec<Op> {
        if !doc.children.is_empty() {
            return Vec::new();
        }
        let Ok(empty) = schema.create_empty_doc() else {
            return Vec::new();
        };
        empty
            .children
            .into_iter()
            .enumerate()
            .map(|(ix, node)| Op::InsertNode {
                path: vec![ix],
                node,
            })
            .collect()
    }
}

/// Visits every textblock, handing out its path.
fn for_each_textblock(
    doc: &Document,
    schema: &Schema,
    mut f: impl FnMut(&ElementNode, &Path),
) {
    fn walk(
        children: &[Node],
        path: &mut Path,
        schema: &Schema,
        f: &mut dyn FnMut(&ElementNode, &Path),
    ) {
        for (ix, node) in children.iter().enumerate() {
            let Node::Element(el) = node else {
                continue;
            };
            path.push(ix);
            if schema.is_textblock(&el.kind) {
                f(el, path);
            } else {
                walk(&el.children, path, schema, f);
            }
            path.pop();
        }
    }

    walk(&doc.children, &mut Vec::new(), schema, &mut f);
}

struct EnsureTextblockHasTextLeaf;

impl NormalizePass for EnsureTextblockHasTextLeaf {
    fn id(&self) -> &'static str {
        "core.ensure_textblock_has_text_leaf"
    }

    fn run(&self, doc: &Document, schema: &Schema) -> Vec<Op> {
        let mut ops = Vec::new();
        for_each_textblock(doc, schema, |el, path| {
            if !el.children.iter().any(|n| matches!(n, Node::Text(_))) {
                let mut insert_path = path.clone();
                insert_path.push(0);
                ops.push(Op::InsertNode {
                    path: insert_path,
                    node: Node::text(""),
                });
            }
        });
        ops
    }
}

struct DropEmptyTextLeaves;

impl NormalizePass for DropEmptyTextLeaves {
    fn id(&self) -> &'static str {
        "core.drop_empty_text_leaves"
    }

    fn run(&self, doc: &Document, schema: &Schema) -> Vec<Op> {
        let mut ops = Vec::new();
        for_each_textblock(doc, schema, |el, path| {
            if el.children.len() < 2 {
                return;
            }
            let mut remaining = el.children.len();
            for ix in (0..el.children.len()).rev() {
                let Node::Text(t) = &el.children[ix] else {
                    continue;
                };
                if t.text.is_empty() && remaining > 1 {
                    let mut remove_path = path.clone();
                    remove_path.push(ix);
                    ops.push(Op::RemoveNode { path: remove_path });
                    remaining -= 1;
                }
            }
        });
        ops
    }
}

struct MergeAdjacentTextLeaves;

impl NormalizePass for MergeAdjacentTextLeaves {
    fn id(&self) -> &'static str {
        "core.merge_adjacent_text_leaves"
    }

    fn run(&self, doc: &Document, schema: &Schema) -> Vec<Op> {
        let mut ops = Vec::new();
        for_each_textblock(doc, schema, |el, path| {
            if el.children.len() < 2 {
                return;
            }
            let mut ix = el.children.len();
            while ix > 0 {
                ix -= 1;
                let Node::Text(right) = &el.children[ix] else {
                    continue;
                };

                let mut start = ix;
                while start > 0 {
                    let Some(Node::Text(left)) = el.children.get(start - 1) else {
                        break;
                    };
                    if left.marks != right.marks {
                        break;
                    }
                    start -= 1;
                }

                if start == ix {
                    continue;
                }

                let Some(Node::Text(first)) = el.children.get(start) else {
                    continue;
                };
                let appended: String = el.children[start + 1..=ix]
                    .iter()
                    .filter_map(Node::as_text)
                    .map(|t| t.text.as_str())
                    .collect();

                if !appended.is_empty() {
                    let mut insert_text_path = path.clone();
                    insert_text_path.push(start);
                    ops.push(Op::InsertText {
                        path: insert_text_path,
                        offset: first.text.len(),
                        text: appended,
                    });
                }

                // Left to right, so each removed leaf's text is still followed by
                // the rest of the run inside the merged leaf.
                let mut remove_path = path.clone();
                remove_path.push(start + 1);
                for _ in start + 1..=ix {
                    ops.push(Op::RemoveNode {
                        path: remove_path.clone(),
                    });
                }

                ix = start;
            }
        });
        ops
    }
}
