use std::rc::Rc;

use manos_prose_editor::commands::{
    apply_command, chain_commands, command, delete_selection, join_backward, join_forward,
    lift_empty_block, newline_in_code, select_all, split_block,
};
use manos_prose_editor::extensions::{Blockquote, CodeBlock, Doc, Paragraph, Text};
use manos_prose_editor::headless::ScriptedPrompt;
use manos_prose_editor::model::{
    Attrs, Document, EditorState, EngineConfig, Node, Point, Selection, Transaction,
};
use manos_prose_editor::{CollisionPolicy, Extension, MetadataSource, build_schema};

fn state(doc: Document, selection: Selection) -> EditorState {
    let extensions: Vec<Rc<dyn Extension>> = vec![
        Rc::new(Doc),
        Rc::new(Text),
        Rc::new(Paragraph),
        Rc::new(Blockquote),
        Rc::new(CodeBlock::new(MetadataSource::Prompt(Rc::new(
            ScriptedPrompt::default(),
        )))),
    ];
    let schema = build_schema(&extensions, CollisionPolicy::default()).unwrap();
    EditorState::create(schema, Some(doc), EngineConfig::default())
        .unwrap()
        .apply(Transaction::select(selection))
        .unwrap()
}

fn at(path: Vec<usize>, offset: usize) -> Selection {
    Selection::collapsed(Point::new(path, offset))
}

fn quote(children: Vec<Node>) -> Node {
    Node::element("blockquote", Attrs::new(), children)
}

fn code(text: &str) -> Node {
    Node::element("code", Attrs::new(), vec![Node::text(text)])
}

#[test]
fn join_backward_pulls_the_block_into_the_previous_one() {
    let state = state(
        Document::new(vec![Node::paragraph("ab"), Node::paragraph("cd")]),
        at(vec![1, 0], 0),
    );
    let next = apply_command(&state, &command(join_backward)).unwrap().unwrap();
    assert_eq!(next.doc().children, vec![Node::paragraph("abcd")]);
    assert_eq!(next.selection().focus, Point::new(vec![0, 0], 2));
}

#[test]
fn join_backward_drops_an_empty_previous_block() {
    let state = state(
        Document::new(vec![Node::paragraph(""), Node::paragraph("cd")]),
        at(vec![1, 0], 0),
    );
    let next = apply_command(&state, &command(join_backward)).unwrap().unwrap();
    assert_eq!(next.doc().children, vec![Node::paragraph("cd")]);
    assert_eq!(next.selection().focus, Point::new(vec![0, 0], 0));
}

#[test]
fn join_backward_mid_block_does_not_apply() {
    let state = state(
        Document::new(vec![Node::paragraph("ab"), Node::paragraph("cd")]),
        at(vec![1, 0], 1),
    );
    assert!(!join_backward(&state, None));
    assert!(apply_command(&state, &command(join_backward)).unwrap().is_none());
}

#[test]
fn join_backward_at_the_start_of_a_quote_lifts_out() {
    let state = state(
        Document::new(vec![quote(vec![Node::paragraph("quoted")])]),
        at(vec![0, 0, 0], 0),
    );
    let next = apply_command(&state, &command(join_backward)).unwrap().unwrap();
    assert_eq!(next.doc().children, vec![Node::paragraph("quoted")]);
}

#[test]
fn join_forward_pulls_the_next_block_in() {
    let state = state(
        Document::new(vec![Node::paragraph("ab"), Node::paragraph("cd")]),
        at(vec![0, 0], 2),
    );
    let next = apply_command(&state, &command(join_forward)).unwrap().unwrap();
    assert_eq!(next.doc().children, vec![Node::paragraph("abcd")]);
    assert_eq!(next.selection().focus, Point::new(vec![0, 0], 2));
}

#[test]
fn dry_run_reports_without_changing_anything() {
    let state = state(
        Document::new(vec![Node::paragraph("ab"), Node::paragraph("cd")]),
        at(vec![0, 0], 2),
    );
    let before = state.doc().clone();
    assert!(join_forward(&state, None));
    assert_eq!(state.doc(), &before);
}

#[test]
fn delete_selection_joins_blocks_sharing_a_parent() {
    let state = state(
        Document::new(vec![Node::paragraph("abc"), Node::paragraph("def")]),
        Selection::range(Point::new(vec![0, 0], 1), Point::new(vec![1, 0], 2)),
    );
    let next = apply_command(&state, &command(delete_selection)).unwrap().unwrap();
    assert_eq!(next.doc().children, vec![Node::paragraph("af")]);
    assert_eq!(next.selection().focus, Point::new(vec![0, 0], 1));
}

#[test]
fn delete_selection_needs_a_range() {
    let state = state(Document::new(vec![Node::paragraph("abc")]), at(vec![0, 0], 1));
    assert!(!delete_selection(&state, None));
}

#[test]
fn select_all_spans_the_document() {
    let state = state(
        Document::new(vec![Node::paragraph("ab"), Node::paragraph("cd")]),
        at(vec![0, 0], 1),
    );
    let next = apply_command(&state, &command(select_all)).unwrap().unwrap();
    assert_eq!(next.selection().anchor, Point::new(vec![0, 0], 0));
    assert_eq!(next.selection().focus, Point::new(vec![1, 0], 2));
    assert!(!next.can_undo());
}

#[test]
fn enter_in_code_inserts_a_newline() {
    let state = state(Document::new(vec![code("ab")]), at(vec![0, 0], 1));
    let next = apply_command(&state, &command(newline_in_code)).unwrap().unwrap();
    assert_eq!(next.doc().children[0].text_content(), "a\nb");
    assert_eq!(next.selection().focus, Point::new(vec![0, 0], 2));
}

#[test]
fn chain_stops_at_the_first_command_that_applies() {
    let enter = chain_commands(vec![command(newline_in_code), command(split_block)]);

    let in_code = state(Document::new(vec![code("ab")]), at(vec![0, 0], 1));
    let next = apply_command(&in_code, &enter).unwrap().unwrap();
    assert_eq!(next.doc().children.len(), 1);

    let in_paragraph = state(Document::new(vec![Node::paragraph("ab")]), at(vec![0, 0], 1));
    let next = apply_command(&in_paragraph, &enter).unwrap().unwrap();
    assert_eq!(
        next.doc().children,
        vec![Node::paragraph("a"), Node::paragraph("b")]
    );
}

#[test]
fn split_at_the_end_starts_a_default_block() {
    let state = state(Document::new(vec![code("ab")]), at(vec![0, 0], 2));
    let next = apply_command(&state, &command(split_block)).unwrap().unwrap();
    let doc = next.doc();
    assert_eq!(doc.children.len(), 2);
    assert_eq!(doc.children[1].kind(), "paragraph");
    assert_eq!(doc.children[1].text_content(), "");
    assert_eq!(next.selection().focus, Point::new(vec![1, 0], 0));
}

#[test]
fn split_replaces_a_selected_range() {
    let state = state(
        Document::new(vec![Node::paragraph("hello world")]),
        Selection::range(Point::new(vec![0, 0], 5), Point::new(vec![0, 0], 6)),
    );
    let next = apply_command(&state, &command(split_block)).unwrap().unwrap();
    assert_eq!(
        next.doc().children,
        vec![Node::paragraph("hello"), Node::paragraph("world")]
    );
}

#[test]
fn empty_nested_block_is_lifted() {
    let state = state(
        Document::new(vec![quote(vec![Node::paragraph("a"), Node::paragraph("")])]),
        at(vec![0, 1, 0], 0),
    );
    let next = apply_command(&state, &command(lift_empty_block)).unwrap().unwrap();
    let doc = next.doc();
    assert_eq!(doc.children.len(), 2);
    assert_eq!(doc.children[0], quote(vec![Node::paragraph("a")]));
    assert_eq!(doc.children[1].kind(), "paragraph");
    assert_eq!(doc.children[1].text_content(), "");

    let top_level = state_with_empty_top_level();
    assert!(!lift_empty_block(&top_level, None));
}

fn state_with_empty_top_level() -> EditorState {
    state(
        Document::new(vec![Node::paragraph("a"), Node::paragraph("")]),
        at(vec![1, 0], 0),
    )
}
