use std::rc::Rc;

use manos_prose_editor::extensions::{Align, Blockquote, Doc, Heading, Paragraph, SimpleMark, Text};
use manos_prose_editor::headless::HeadlessHost;
use manos_prose_editor::model::{Document, ElementNode, Mark, Node, Point, Selection, Transaction};
use manos_prose_editor::{Editor, EditorOptions, Extension};
use serde_json::json;

fn editor(doc: Document, align: &[&str]) -> Editor {
    let extensions: Vec<Rc<dyn Extension>> = vec![
        Rc::new(Doc),
        Rc::new(Text),
        Rc::new(Paragraph),
        Rc::new(Heading::default()),
        Rc::new(Blockquote),
        Rc::new(SimpleMark::bold()),
        Rc::new(Align::new(align.iter().copied())),
    ];
    let options = EditorOptions::default().doc(serde_json::to_value(&doc).unwrap());
    Editor::new(Rc::new(HeadlessHost::new()), extensions, options).unwrap()
}

fn place(editor: &Editor, path: Vec<usize>, offset: usize) {
    editor
        .view()
        .dispatch(Transaction::select(Selection::collapsed(Point::new(path, offset))));
}

fn block(editor: &Editor, ix: usize) -> ElementNode {
    editor.state().doc().children[ix]
        .as_element()
        .cloned()
        .expect("top-level element")
}

#[test]
fn heading_shortcut_and_back_to_paragraph() {
    let editor = editor(
        Document::new(vec![Node::paragraph("Title"), Node::paragraph("body")]),
        &[],
    );
    place(&editor, vec![0, 0], 2);

    assert!(editor.press("Mod-Alt-2").unwrap());
    let heading = block(&editor, 0);
    assert_eq!(heading.kind, "heading");
    assert_eq!(heading.attrs.get("level"), Some(&json!(2)));
    assert_eq!(heading.text_content(), "Title");
    assert_eq!(block(&editor, 1).kind, "paragraph");

    assert!(!editor.press("Mod-Alt-2").unwrap(), "already an h2");
    assert!(editor.press("Mod-Alt-4").unwrap());
    assert_eq!(block(&editor, 0).attrs.get("level"), Some(&json!(4)));

    assert!(editor.press("Mod-G").unwrap());
    let paragraph = block(&editor, 0);
    assert_eq!(paragraph.kind, "paragraph");
    assert_eq!(paragraph.text_content(), "Title");
}

#[test]
fn heading_levels_are_configurable() {
    let extensions: Vec<Rc<dyn Extension>> = vec![
        Rc::new(Doc),
        Rc::new(Text),
        Rc::new(Paragraph),
        Rc::new(Heading::new([1, 2])),
    ];
    let editor = Editor::new(Rc::new(HeadlessHost::new()), extensions, EditorOptions::default())
        .unwrap();
    let keys: Vec<String> = editor.key_bindings().into_iter().map(|k| k.key).collect();
    assert!(keys.contains(&"Alt-Ctrl-2".to_string()));
    assert!(!keys.contains(&"Alt-Ctrl-3".to_string()));
    assert!(!editor.press("Mod-Alt-3").unwrap());
}

#[test]
fn headings_drop_marks_they_do_not_allow() {
    let editor = editor(
        Document::new(vec![Node::element(
            "paragraph",
            Default::default(),
            vec![
                Node::text("quiet "),
                Node::marked_text("loud", vec![Mark::new("bold")]),
            ],
        )]),
        &[],
    );
    place(&editor, vec![0, 0], 0);

    assert!(editor.press("Mod-Alt-1").unwrap());
    let heading = block(&editor, 0);
    assert_eq!(heading.kind, "heading");
    assert_eq!(heading.text_content(), "quiet loud");
    assert!(
        heading
            .children
            .iter()
            .filter_map(Node::as_text)
            .all(|t| t.marks.is_empty())
    );
}

#[test]
fn block_type_change_is_undoable() {
    let editor = editor(Document::new(vec![Node::paragraph("Title")]), &[]);
    place(&editor, vec![0, 0], 0);

    assert!(editor.press("Mod-Alt-3").unwrap());
    assert_eq!(block(&editor, 0).kind, "heading");

    assert!(editor.press("Mod-z").unwrap());
    assert_eq!(editor.state().doc().children, vec![Node::paragraph("Title")]);

    assert!(editor.press("Mod-y").unwrap());
    assert_eq!(block(&editor, 0).attrs.get("level"), Some(&json!(3)));
}

#[test]
fn quote_wraps_then_lifts() {
    let editor = editor(
        Document::new(vec![Node::paragraph("quote me"), Node::paragraph("after")]),
        &[],
    );
    place(&editor, vec![0, 0], 3);

    assert!(editor.press("Mod->").unwrap());
    let quote = block(&editor, 0);
    assert_eq!(quote.kind, "blockquote");
    assert_eq!(quote.children, vec![Node::paragraph("quote me")]);
    let selection = editor.state().selection().clone();
    assert_eq!(selection.focus, Point::new(vec![0, 0, 0], 3));

    assert!(editor.press("Mod->").unwrap());
    assert_eq!(
        editor.state().doc().children,
        vec![Node::paragraph("quote me"), Node::paragraph("after")]
    );
    assert_eq!(editor.state().selection().focus, Point::new(vec![0, 0], 3));
}

#[test]
fn quote_covers_every_selected_block() {
    let editor = editor(
        Document::new(vec![
            Node::paragraph("one"),
            Node::paragraph("two"),
            Node::paragraph("three"),
        ]),
        &[],
    );
    editor.view().dispatch(Transaction::select(Selection::range(
        Point::new(vec![0, 0], 1),
        Point::new(vec![1, 0], 1),
    )));

    assert!(editor.press("Mod->").unwrap());
    let doc = editor.state().doc().clone();
    assert_eq!(doc.children.len(), 2);
    let quote = doc.children[0].as_element().unwrap();
    assert_eq!(quote.kind, "blockquote");
    assert_eq!(quote.children.len(), 2);
    assert_eq!(doc.children[1], Node::paragraph("three"));
}

#[test]
fn enter_splits_the_paragraph() {
    let editor = editor(Document::new(vec![Node::paragraph("hello world")]), &[]);
    place(&editor, vec![0, 0], 5);

    assert!(editor.press("Enter").unwrap());
    let doc = editor.state().doc().clone();
    assert_eq!(doc.children.len(), 2);
    assert_eq!(doc.children[0].text_content(), "hello");
    assert_eq!(doc.children[1].text_content(), " world");
    assert_eq!(editor.state().selection().focus, Point::new(vec![1, 0], 0));
}

#[test]
fn align_toggles_on_supported_blocks() {
    let editor = editor(
        Document::new(vec![Node::paragraph("centered"), Node::paragraph("plain")]),
        &["paragraph", "heading"],
    );
    place(&editor, vec![0, 0], 0);

    assert!(editor.press("Mod-E").unwrap());
    assert_eq!(block(&editor, 0).attr_str("align"), "center");

    assert!(editor.press("Mod-R").unwrap());
    assert_eq!(block(&editor, 0).attr_str("align"), "right");

    assert!(editor.press("Mod-R").unwrap());
    assert_eq!(block(&editor, 0).attr_str("align"), "");
    assert_eq!(block(&editor, 1).attr_str("align"), "");
}

#[test]
fn align_ignores_unsupported_blocks_and_multi_block_selections() {
    let headings_only = editor(
        Document::new(vec![Node::paragraph("one"), Node::paragraph("two")]),
        &["heading"],
    );
    place(&headings_only, vec![0, 0], 0);
    assert!(!headings_only.press("Mod-L").unwrap());

    let paragraphs = editor(
        Document::new(vec![Node::paragraph("one"), Node::paragraph("two")]),
        &["paragraph"],
    );
    paragraphs.view().dispatch(Transaction::select(Selection::range(
        Point::new(vec![0, 0], 0),
        Point::new(vec![1, 0], 2),
    )));
    assert!(!paragraphs.press("Mod-L").unwrap());
    assert_eq!(block(&paragraphs, 0).attr_str("align"), "");
}
