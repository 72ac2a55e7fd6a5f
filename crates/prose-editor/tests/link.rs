use std::cell::RefCell;
use std::rc::Rc;

use manos_prose_editor::extensions::{Doc, FloatView, Link, PENDING_CLASS, Paragraph, PendingRange, Text};
use manos_prose_editor::headless::{HeadlessHost, HeadlessOverlaySurface};
use manos_prose_editor::model::{Attrs, Document, Mark, Node, Op, Point, Selection, Transaction};
use manos_prose_editor::{ClickEvent, Decoration, Editor, EditorOptions, Extension, FloatingOverlay};
use serde_json::json;

struct Fixture {
    editor: Editor,
    link: Rc<Link>,
    overlay: FloatingOverlay,
    surface: HeadlessOverlaySurface,
    opened: Rc<RefCell<Vec<String>>>,
}

fn fixture_with(doc: Document, float_view: bool) -> Fixture {
    let surface = HeadlessOverlaySurface::default();
    let overlay = FloatingOverlay::new(Rc::new(surface.clone()));
    let opened: Rc<RefCell<Vec<String>>> = Rc::default();
    let log = opened.clone();
    let link = Rc::new(
        Link::new(Some(overlay.clone()))
            .opener(Rc::new(move |href: &str| log.borrow_mut().push(href.to_string()))),
    );

    let mut extensions: Vec<Rc<dyn Extension>> = vec![
        Rc::new(Doc),
        Rc::new(Text),
        Rc::new(Paragraph),
        link.clone(),
    ];
    if float_view {
        extensions.push(Rc::new(FloatView::new(overlay.clone())));
    }
    let options = EditorOptions::default().doc(serde_json::to_value(&doc).unwrap());
    let editor = Editor::new(Rc::new(HeadlessHost::new()), extensions, options).unwrap();
    Fixture {
        editor,
        link,
        overlay,
        surface,
        opened,
    }
}

fn fixture(doc: Document) -> Fixture {
    fixture_with(doc, true)
}

fn linked(text: &str, href: &str) -> Node {
    let mut attrs = Attrs::new();
    attrs.insert("href".into(), json!(href));
    attrs.insert("title".into(), json!("A"));
    attrs.insert("newTab".into(), json!(false));
    Node::marked_text(text, vec![Mark::with_attrs("link", attrs)])
}

fn with_link() -> Document {
    Document::new(vec![Node::element(
        "paragraph",
        Attrs::new(),
        vec![Node::text("see "), linked("here", "https://a.example")],
    )])
}

fn select(editor: &Editor, anchor: Point, focus: Point) {
    editor
        .view()
        .dispatch(Transaction::select(Selection::range(anchor, focus)));
}

fn href_values(values: &[(&str, serde_json::Value)]) -> Attrs {
    values
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

fn link_marks(editor: &Editor) -> Vec<(String, Attrs)> {
    editor.state().doc().children[0]
        .children()
        .iter()
        .filter_map(Node::as_text)
        .filter_map(|t| t.mark("link").map(|m| (t.text.clone(), m.attrs.clone())))
        .collect()
}

#[test]
fn mod_k_on_a_range_opens_the_form_and_highlights_it() {
    let f = fixture(Document::new(vec![Node::paragraph("read the docs")]));
    let from = Point::new(vec![0, 0], 9);
    let to = Point::new(vec![0, 0], 13);
    select(&f.editor, from.clone(), to.clone());

    assert!(f.editor.press("Mod-k").unwrap());
    assert_eq!(f.overlay.mounted_title().as_deref(), Some("Add link details"));
    let names: Vec<String> = f
        .overlay
        .mounted_fields()
        .unwrap()
        .into_iter()
        .map(|field| field.name)
        .collect();
    assert_eq!(names, vec!["href", "title", "newTab"]);

    assert_eq!(
        f.link.pending(),
        Some(PendingRange {
            from: from.clone(),
            to: to.clone(),
        })
    );
    assert!(f.editor.view().decorations().contains(&Decoration::Inline {
        from,
        to,
        class: PENDING_CLASS.to_string(),
    }));
    assert_eq!(f.surface.last_placement(), Some((72.0, 20.0)));
}

#[test]
fn submitting_the_form_links_the_range() {
    let f = fixture(Document::new(vec![Node::paragraph("read the docs")]));
    select(&f.editor, Point::new(vec![0, 0], 9), Point::new(vec![0, 0], 13));
    assert!(f.editor.press("Mod-k").unwrap());

    f.overlay.submit(href_values(&[
        ("href", json!("https://example.com")),
        ("newTab", json!(true)),
    ]));

    let marks = link_marks(&f.editor);
    assert_eq!(marks.len(), 1);
    let (text, attrs) = &marks[0];
    assert_eq!(text, "docs");
    assert_eq!(attrs.get("href"), Some(&json!("https://example.com")));
    assert_eq!(attrs.get("title"), Some(&json!("")));
    assert_eq!(attrs.get("newTab"), Some(&json!(true)));

    assert!(!f.overlay.is_mounted());
    assert_eq!(f.link.pending(), None);
    assert!(f.editor.view().decorations().is_empty());
}

#[test]
fn cursor_inside_a_link_edits_the_whole_link() {
    let f = fixture(with_link());
    select(&f.editor, Point::new(vec![0, 1], 2), Point::new(vec![0, 1], 2));

    assert!(f.editor.press("Mod-k").unwrap());
    let fields = f.overlay.mounted_fields().unwrap();
    assert_eq!(fields[0].value, json!("https://a.example"));
    assert_eq!(fields[1].value, json!("A"));
    assert_eq!(
        f.link.pending(),
        Some(PendingRange {
            from: Point::new(vec![0, 1], 0),
            to: Point::new(vec![0, 1], 4),
        })
    );

    f.overlay
        .submit(href_values(&[("href", json!("https://b.example"))]));
    let marks = link_marks(&f.editor);
    assert_eq!(marks.len(), 1);
    assert_eq!(marks[0].0, "here");
    assert_eq!(marks[0].1.get("href"), Some(&json!("https://b.example")));
    assert_eq!(marks[0].1.get("title"), Some(&json!("A")));
}

#[test]
fn empty_href_removes_the_link() {
    let f = fixture(with_link());
    select(&f.editor, Point::new(vec![0, 1], 1), Point::new(vec![0, 1], 1));
    assert!(f.editor.press("Mod-k").unwrap());

    f.overlay.submit(href_values(&[("href", json!(""))]));
    assert!(link_marks(&f.editor).is_empty());
    assert_eq!(f.editor.state().doc().children[0].text_content(), "see here");
}

#[test]
fn empty_href_on_plain_text_is_a_no_op() {
    let f = fixture(Document::new(vec![Node::paragraph("plain")]));
    select(&f.editor, Point::new(vec![0, 0], 0), Point::new(vec![0, 0], 5));
    assert!(f.editor.press("Mod-k").unwrap());
    let before = f.editor.state().doc().clone();

    f.overlay.submit(href_values(&[("href", json!(""))]));
    assert_eq!(f.editor.state().doc(), &before);
    assert!(!f.overlay.is_mounted());
}

#[test]
fn collapsed_cursor_outside_a_link_does_nothing() {
    let f = fixture(with_link());
    select(&f.editor, Point::new(vec![0, 0], 1), Point::new(vec![0, 0], 1));

    assert!(!f.editor.press("Mod-k").unwrap());
    assert!(!f.overlay.is_mounted());
    assert_eq!(f.link.pending(), None);
}

#[test]
fn moving_the_selection_closes_the_form() {
    let f = fixture(Document::new(vec![Node::paragraph("read the docs")]));
    select(&f.editor, Point::new(vec![0, 0], 0), Point::new(vec![0, 0], 4));
    assert!(f.editor.press("Mod-k").unwrap());
    assert!(f.overlay.is_shown());

    select(&f.editor, Point::new(vec![0, 0], 6), Point::new(vec![0, 0], 6));
    assert!(!f.overlay.is_mounted());
    assert!(!f.overlay.is_shown());
    assert_eq!(f.link.pending(), None);
}

#[test]
fn submission_after_the_document_changed_is_discarded() {
    let f = fixture_with(Document::new(vec![Node::paragraph("read the docs")]), false);
    select(&f.editor, Point::new(vec![0, 0], 9), Point::new(vec![0, 0], 13));
    assert!(f.editor.press("Mod-k").unwrap());

    f.editor.view().dispatch(Transaction::new(vec![Op::InsertText {
        path: vec![0, 0],
        offset: 0,
        text: "> ".into(),
    }]));
    assert!(f.overlay.is_mounted(), "no float view to close it");

    f.overlay
        .submit(href_values(&[("href", json!("https://example.com"))]));
    assert!(link_marks(&f.editor).is_empty());
    assert_eq!(
        f.editor.state().doc().children[0].text_content(),
        "> read the docs"
    );
}

#[test]
fn link_without_an_overlay_leaves_mod_k_unhandled() {
    let extensions: Vec<Rc<dyn Extension>> = vec![
        Rc::new(Doc),
        Rc::new(Text),
        Rc::new(Paragraph),
        Rc::new(Link::new(None)),
    ];
    let editor = Editor::new(
        Rc::new(HeadlessHost::new()),
        extensions,
        EditorOptions::default().doc(serde_json::to_value(with_link()).unwrap()),
    )
    .unwrap();
    select(&editor, Point::new(vec![0, 1], 1), Point::new(vec![0, 1], 1));
    assert!(!editor.press("Mod-k").unwrap());
}

#[test]
fn ctrl_alt_click_opens_the_link() {
    let f = fixture(with_link());
    let on_link = Point::new(vec![0, 1], 1);
    let follow = ClickEvent {
        ctrl: true,
        alt: true,
        ..Default::default()
    };

    assert!(!f.editor.view().handle_click(&on_link, &ClickEvent::default()));
    assert!(f.opened.borrow().is_empty());

    assert!(f.editor.view().handle_click(&on_link, &follow));
    assert_eq!(*f.opened.borrow(), vec!["https://a.example".to_string()]);

    assert!(!f.editor.view().handle_click(&Point::new(vec![0, 0], 1), &follow));
    assert_eq!(f.opened.borrow().len(), 1);
}
