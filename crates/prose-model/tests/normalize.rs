use std::sync::Arc;

use manos_prose_model::{
    Document, EditorState, EngineConfig, Mark, MarkSpec, Node, NodeSpec, Op, Point, Schema,
    SchemaSpec, Selection, Transaction,
};

fn schema() -> Arc<Schema> {
    Arc::new(
        Schema::new(SchemaSpec {
            nodes: vec![
                ("doc".into(), NodeSpec::new().content("block+")),
                (
                    "paragraph".into(),
                    NodeSpec::new().content("inline*").group("block"),
                ),
                ("text".into(), NodeSpec::new().group("inline")),
            ],
            marks: vec![("bold".into(), MarkSpec::new())],
        })
        .unwrap(),
    )
}

#[test]
fn empty_document_is_filled_from_schema() {
    let state = EditorState::create(schema(), None, EngineConfig::default()).unwrap();
    assert_eq!(state.doc().children, vec![Node::paragraph("")]);
    assert_eq!(state.selection().focus, Point::new(vec![0, 0], 0));
}

#[test]
fn removing_every_block_refills_document() {
    let doc = Document::new(vec![Node::paragraph("a")]);
    let state = EditorState::create(schema(), Some(doc), EngineConfig::default()).unwrap();
    let state = state
        .apply(Transaction::new(vec![Op::RemoveNode { path: vec![0] }]))
        .unwrap();
    assert_eq!(state.doc().children, vec![Node::paragraph("")]);
}

#[test]
fn adjacent_leaves_with_equal_marks_merge_and_selection_follows() {
    let bold = vec![Mark::new("bold")];
    let doc = Document::new(vec![Node::element(
        "paragraph",
        Default::default(),
        vec![
            Node::text("ab"),
            Node::marked_text("cd", bold.clone()),
            Node::marked_text("ef", bold.clone()),
            Node::marked_text("gh", bold.clone()),
        ],
    )]);
    let state = EditorState::create(schema(), Some(doc), EngineConfig::default()).unwrap();
    let Node::Element(paragraph) = &state.doc().children[0] else {
        panic!("expected paragraph");
    };
    assert_eq!(
        paragraph.children,
        vec![Node::text("ab"), Node::marked_text("cdefgh", bold.clone())]
    );

    // Unbolding the middle leaf and re-bolding it merges back; a cursor inside
    // the third leaf lands at the right spot of the merged leaf.
    let doc = Document::new(vec![Node::element(
        "paragraph",
        Default::default(),
        vec![Node::text("ab"), Node::marked_text("cd", bold.clone()), Node::text("ef")],
    )]);
    let state = EditorState::create(schema(), Some(doc), EngineConfig::default()).unwrap();
    let state = state
        .apply(
            Transaction::new(vec![Op::SetTextMarks {
                path: vec![0, 1],
                marks: Vec::new(),
            }])
            .selection_after(Selection::collapsed(Point::new(vec![0, 2], 1))),
        )
        .unwrap();
    assert_eq!(state.doc().children, vec![Node::paragraph("abcdef")]);
    assert_eq!(state.selection().focus, Point::new(vec![0, 0], 5));
}

#[test]
fn empty_leaves_are_dropped_next_to_text() {
    let doc = Document::new(vec![Node::element(
        "paragraph",
        Default::default(),
        vec![Node::marked_text("", vec![Mark::new("bold")]), Node::text("x")],
    )]);
    let state = EditorState::create(schema(), Some(doc), EngineConfig::default()).unwrap();
    assert_eq!(state.doc().children, vec![Node::paragraph("x")]);
}

#[test]
fn schema_violations_reject_the_transaction() {
    let state = EditorState::create(schema(), None, EngineConfig::default()).unwrap();
    let result = state.apply(Transaction::new(vec![Op::InsertNode {
        path: vec![1],
        node: Node::element("table", Default::default(), Vec::new()),
    }]));
    assert!(result.is_err());
}

#[test]
fn every_state_has_a_fresh_id() {
    let state = EditorState::create(schema(), None, EngineConfig::default()).unwrap();
    let next = state
        .apply(Transaction::select(state.selection().clone()))
        .unwrap();
    assert_ne!(state.id(), next.id());
    assert_eq!(state.version(), next.version());
}

#[test]
fn mapping_tracks_node_paths() {
    let doc = Document::new(vec![Node::paragraph("a"), Node::paragraph("b")]);
    let state = EditorState::create(schema(), Some(doc), EngineConfig::default()).unwrap();
    let (_, mapping) = state
        .apply_with_mapping(Transaction::new(vec![Op::InsertNode {
            path: vec![0],
            node: Node::paragraph("new"),
        }]))
        .unwrap();
    assert_eq!(mapping.map_path(&[1]), Some(vec![2]));
    assert_eq!(mapping.map_path(&[0]), Some(vec![1]));
}
