use std::rc::Rc;

use manos_prose_editor::extensions::{Doc, Heading, Paragraph, SimpleMark, Text};
use manos_prose_editor::headless::HeadlessHost;
use manos_prose_editor::model::{Document, Node, Point, Selection, Transaction};
use manos_prose_editor::{Editor, EditorOptions, Extension};

fn editor(doc: Document) -> Editor {
    let extensions: Vec<Rc<dyn Extension>> = vec![
        Rc::new(Doc),
        Rc::new(Text),
        Rc::new(Paragraph),
        Rc::new(Heading::default()),
        Rc::new(SimpleMark::bold()),
        Rc::new(SimpleMark::italic()),
        Rc::new(SimpleMark::underline()),
        Rc::new(SimpleMark::inline_code()),
    ];
    let options = EditorOptions::default().doc(serde_json::to_value(&doc).unwrap());
    Editor::new(Rc::new(HeadlessHost::new()), extensions, options).unwrap()
}

fn select(editor: &Editor, anchor: Point, focus: Point) {
    editor
        .view()
        .dispatch(Transaction::select(Selection::range(anchor, focus)));
}

/// `(text, mark kinds)` of every leaf of the top-level block `ix`.
fn leaves(editor: &Editor, ix: usize) -> Vec<(String, Vec<String>)> {
    editor.state().doc().children[ix]
        .children()
        .iter()
        .filter_map(Node::as_text)
        .map(|t| {
            (
                t.text.clone(),
                t.marks.iter().map(|m| m.kind.clone()).collect(),
            )
        })
        .collect()
}

fn plain(text: &str) -> (String, Vec<String>) {
    (text.to_string(), Vec::new())
}

fn marked(text: &str, kinds: &[&str]) -> (String, Vec<String>) {
    (
        text.to_string(),
        kinds.iter().map(|k| k.to_string()).collect(),
    )
}

#[test]
fn bold_toggles_over_a_range() {
    let editor = editor(Document::new(vec![Node::paragraph("make this bold")]));
    select(&editor, Point::new(vec![0, 0], 5), Point::new(vec![0, 0], 9));

    assert!(editor.press("Mod-b").unwrap());
    assert_eq!(
        leaves(&editor, 0),
        vec![plain("make "), marked("this", &["bold"]), plain(" bold")]
    );

    assert!(editor.press("Mod-b").unwrap());
    assert_eq!(leaves(&editor, 0), vec![plain("make this bold")]);
}

#[test]
fn partially_marked_range_is_cleared_first() {
    let editor = editor(Document::new(vec![Node::paragraph("abcdef")]));
    select(&editor, Point::new(vec![0, 0], 0), Point::new(vec![0, 0], 3));
    assert!(editor.press("Mod-i").unwrap());

    // The range now covers marked and unmarked text.
    let state = editor.state();
    let start = Point::new(vec![0, 0], 1);
    let end = Point::new(vec![0, 1], 2);
    assert_eq!(state.doc().children[0].children().len(), 2);
    select(&editor, start, end);

    assert!(editor.press("Mod-i").unwrap());
    assert_eq!(
        leaves(&editor, 0),
        vec![marked("a", &["italic"]), plain("bcdef")]
    );
}

#[test]
fn marks_stack() {
    let editor = editor(Document::new(vec![Node::paragraph("stacked")]));
    select(&editor, Point::new(vec![0, 0], 0), Point::new(vec![0, 0], 7));

    assert!(editor.press("Mod-b").unwrap());
    assert!(editor.press("Mod-u").unwrap());
    let leaves = leaves(&editor, 0);
    assert_eq!(leaves.len(), 1);
    let (text, kinds) = &leaves[0];
    assert_eq!(text, "stacked");
    assert!(kinds.contains(&"bold".to_string()));
    assert!(kinds.contains(&"underline".to_string()));
}

#[test]
fn collapsed_toggle_marks_the_next_typed_text() {
    let editor = editor(Document::new(vec![Node::paragraph("plain")]));
    editor
        .view()
        .dispatch(Transaction::select(Selection::collapsed(Point::new(vec![0, 0], 5))));

    assert!(editor.press("Mod-b").unwrap());
    assert_eq!(leaves(&editor, 0), vec![plain("plain")]);
    assert!(editor.view().handle_text_input("!"));
    assert_eq!(
        leaves(&editor, 0),
        vec![plain("plain"), marked("!", &["bold"])]
    );

    assert!(editor.press("Mod-b").unwrap());
    assert!(editor.view().handle_text_input("?"));
    assert_eq!(
        leaves(&editor, 0),
        vec![plain("plain"), marked("!", &["bold"]), plain("?")]
    );
}

#[test]
fn headings_refuse_marks() {
    let editor = editor(Document::new(vec![Node::element(
        "heading",
        Default::default(),
        vec![Node::text("Title")],
    )]));
    select(&editor, Point::new(vec![0, 0], 0), Point::new(vec![0, 0], 5));

    assert!(!editor.press("Mod-b").unwrap());
    assert_eq!(leaves(&editor, 0), vec![plain("Title")]);
}

#[test]
fn inline_code_uses_the_question_mark_shortcut() {
    let editor = editor(Document::new(vec![Node::paragraph("let x")]));
    let binding = editor
        .key_bindings()
        .into_iter()
        .find(|b| b.key == "Alt-Ctrl-?")
        .unwrap();
    assert_eq!(binding.description, "Toggle the selection to/from inline code");

    select(&editor, Point::new(vec![0, 0], 0), Point::new(vec![0, 0], 5));
    assert!(editor.press("Mod-Alt-?").unwrap());
    assert_eq!(leaves(&editor, 0), vec![marked("let x", &["inline_code"])]);
}
