use std::rc::Rc;

use manos_prose_editor::extensions::{Doc, ListItem, OrderedList, Paragraph, Text, UnorderedList};
use manos_prose_editor::headless::HeadlessHost;
use manos_prose_editor::model::{Attrs, Document, ElementNode, Node, Point, Selection, Transaction};
use manos_prose_editor::{Editor, EditorOptions, Extension};
use serde_json::json;

fn editor(doc: Document) -> Editor {
    let extensions: Vec<Rc<dyn Extension>> = vec![
        Rc::new(Doc),
        Rc::new(Text),
        Rc::new(Paragraph),
        Rc::new(OrderedList::default()),
        Rc::new(UnorderedList::default()),
        Rc::new(ListItem),
    ];
    let options = EditorOptions::default().doc(serde_json::to_value(&doc).unwrap());
    Editor::new(Rc::new(HeadlessHost::new()), extensions, options).unwrap()
}

fn place(editor: &Editor, path: Vec<usize>, offset: usize) {
    editor
        .view()
        .dispatch(Transaction::select(Selection::collapsed(Point::new(path, offset))));
}

fn item(text: &str) -> Node {
    Node::element("list_item", Attrs::new(), vec![Node::paragraph(text)])
}

fn bullets(items: Vec<Node>) -> Node {
    Node::element("unordered_list", Attrs::new(), items)
}

fn element(node: &Node) -> &ElementNode {
    node.as_element().expect("element")
}

#[test]
fn shortcut_wraps_the_paragraph_in_a_list() {
    let editor = editor(Document::new(vec![Node::paragraph("groceries")]));
    place(&editor, vec![0, 0], 4);

    assert!(editor.press("Mod-Alt-8").unwrap());
    let state = editor.state();
    let list = element(&state.doc().children[0]);
    assert_eq!(list.kind, "unordered_list");
    let first = element(&list.children[0]);
    assert_eq!(first.kind, "list_item");
    assert_eq!(first.children, vec![Node::paragraph("groceries")]);
    assert_eq!(state.selection().focus, Point::new(vec![0, 0, 0, 0], 4));
}

#[test]
fn same_shortcut_inside_the_list_lifts_out() {
    let editor = editor(Document::new(vec![bullets(vec![item("only")])]));
    place(&editor, vec![0, 0, 0, 0], 1);

    assert!(editor.press("Mod-Alt-8").unwrap());
    assert_eq!(editor.state().doc().children, vec![Node::paragraph("only")]);
    assert_eq!(editor.state().selection().focus, Point::new(vec![0, 0], 1));
}

#[test]
fn other_list_shortcut_converts_in_place() {
    let editor = editor(Document::new(vec![bullets(vec![item("a"), item("b")])]));
    place(&editor, vec![0, 1, 0, 0], 0);

    assert!(editor.press("Mod-Alt-9").unwrap());
    let state = editor.state();
    let list = element(&state.doc().children[0]);
    assert_eq!(list.kind, "ordered_list");
    assert_eq!(list.attrs.get("order"), Some(&json!(1)));
    assert_eq!(list.children.len(), 2);
}

#[test]
fn enter_splits_the_item_at_the_cursor() {
    let editor = editor(Document::new(vec![bullets(vec![item("abcd")])]));
    place(&editor, vec![0, 0, 0, 0], 2);

    assert!(editor.press("Enter").unwrap());
    let state = editor.state();
    let list = element(&state.doc().children[0]);
    assert_eq!(list.children.len(), 2);
    assert_eq!(list.children[0].text_content(), "ab");
    assert_eq!(list.children[1].text_content(), "cd");
    assert_eq!(state.selection().focus, Point::new(vec![0, 1, 0, 0], 0));
}

#[test]
fn enter_on_an_empty_last_item_leaves_the_list() {
    let editor = editor(Document::new(vec![bullets(vec![item("ab"), item("")])]));
    place(&editor, vec![0, 1, 0, 0], 0);

    assert!(editor.press("Enter").unwrap());
    let doc = editor.state().doc().clone();
    assert_eq!(doc.children.len(), 2);
    assert_eq!(element(&doc.children[0]).children, vec![item("ab")]);
    assert_eq!(doc.children[1].kind(), "paragraph");
    assert_eq!(doc.children[1].text_content(), "");
}

#[test]
fn enter_outside_a_list_falls_through_to_the_base_keymap() {
    let editor = editor(Document::new(vec![Node::paragraph("plain")]));
    place(&editor, vec![0, 0], 2);

    assert!(editor.press("Enter").unwrap());
    let doc = editor.state().doc().clone();
    assert_eq!(doc.children.len(), 2);
    assert_eq!(doc.children[1].text_content(), "ain");
}

#[test]
fn tab_nests_and_shift_tab_lifts_back() {
    let editor = editor(Document::new(vec![bullets(vec![item("ab"), item("cd")])]));
    place(&editor, vec![0, 1, 0, 0], 1);

    assert!(editor.press("Tab").unwrap());
    let state = editor.state();
    let list = element(&state.doc().children[0]);
    assert_eq!(list.children.len(), 1);
    let parent = element(&list.children[0]);
    assert_eq!(parent.children.len(), 2);
    assert_eq!(parent.children[0], Node::paragraph("ab"));
    let nested = element(&parent.children[1]);
    assert_eq!(nested.kind, "unordered_list");
    assert_eq!(nested.children[0].text_content(), "cd");
    assert_eq!(state.selection().focus, Point::new(vec![0, 0, 1, 0, 0, 0], 1));

    assert!(editor.press("Shift-Tab").unwrap());
    let state = editor.state();
    let list = element(&state.doc().children[0]);
    assert_eq!(list.children.len(), 2);
    assert_eq!(element(&list.children[0]).children, vec![Node::paragraph("ab")]);
    assert_eq!(list.children[1].text_content(), "cd");
    assert_eq!(state.selection().focus, Point::new(vec![0, 1, 0, 0], 1));
}

#[test]
fn first_item_cannot_be_nested() {
    let editor = editor(Document::new(vec![bullets(vec![item("ab"), item("cd")])]));
    place(&editor, vec![0, 0, 0, 0], 0);

    assert!(!editor.press("Tab").unwrap());
    assert_eq!(element(&editor.state().doc().children[0]).children.len(), 2);
}

#[test]
fn nesting_is_undoable() {
    let original = Document::new(vec![bullets(vec![item("ab"), item("cd")])]);
    let editor = editor(original.clone());
    place(&editor, vec![0, 1, 0, 0], 0);

    assert!(editor.press("Tab").unwrap());
    assert_ne!(editor.state().doc(), &original);
    assert!(editor.press("Mod-z").unwrap());
    assert_eq!(editor.state().doc(), &original);
}
