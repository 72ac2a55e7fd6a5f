use std::cell::RefCell;
use std::rc::Rc;

use manos_prose_editor::extensions::{Doc, FloatView, Paragraph, Text};
use manos_prose_editor::headless::{HeadlessHost, HeadlessOverlaySurface, OverlayEvent};
use manos_prose_editor::model::{Attrs, Document, Node, Point, Selection, Transaction};
use manos_prose_editor::{Editor, EditorOptions, Extension, Field, FloatingOverlay, Form};
use serde_json::json;

struct Fixture {
    editor: Editor,
    overlay: FloatingOverlay,
    surface: HeadlessOverlaySurface,
}

fn fixture() -> Fixture {
    let surface = HeadlessOverlaySurface::default();
    let overlay = FloatingOverlay::new(Rc::new(surface.clone()));
    let extensions: Vec<Rc<dyn Extension>> = vec![
        Rc::new(Doc),
        Rc::new(Text),
        Rc::new(Paragraph),
        Rc::new(FloatView::new(overlay.clone())),
    ];
    let doc = Document::new(vec![Node::paragraph("first line"), Node::paragraph("second")]);
    let options = EditorOptions::default().doc(serde_json::to_value(&doc).unwrap());
    let editor = Editor::new(Rc::new(HeadlessHost::new()), extensions, options).unwrap();
    Fixture {
        editor,
        overlay,
        surface,
    }
}

fn form(title: &str, submitted: Rc<RefCell<Option<Attrs>>>) -> Form {
    Form::new(
        title,
        "Done",
        vec![
            Field::text("Name", "name", "draft"),
            Field::boolean("Pinned", "pinned", false),
        ],
        move |values| *submitted.borrow_mut() = Some(values),
    )
}

fn fields() -> Vec<Field> {
    vec![
        Field::text("Name", "name", "draft"),
        Field::boolean("Pinned", "pinned", false),
    ]
}

#[test]
fn float_view_attaches_the_overlay_with_the_view() {
    let f = fixture();
    assert!(f.overlay.is_attached());
    assert_eq!(f.surface.events(), vec![OverlayEvent::Attached]);
    assert!(!f.overlay.is_shown());
}

#[test]
fn mounting_replaces_the_previous_form() {
    let f = fixture();
    let submitted = Rc::new(RefCell::new(None));
    f.overlay.mount(form("First", submitted.clone()));
    f.overlay.mount(form("Second", submitted.clone()));

    assert_eq!(f.overlay.mounted_title().as_deref(), Some("Second"));
    assert_eq!(
        f.surface.events(),
        vec![
            OverlayEvent::Attached,
            OverlayEvent::Rendered {
                title: "First".into(),
                fields: fields(),
            },
            OverlayEvent::Visible { visible: true },
            OverlayEvent::Placed {
                left: 0.0,
                top: 20.0,
            },
            OverlayEvent::Visible { visible: false },
            OverlayEvent::Cleared,
            OverlayEvent::Rendered {
                title: "Second".into(),
                fields: fields(),
            },
            OverlayEvent::Visible { visible: true },
            OverlayEvent::Placed {
                left: 0.0,
                top: 20.0,
            },
        ]
    );
    assert!(submitted.borrow().is_none());
}

#[test]
fn overlay_follows_the_cursor() {
    let f = fixture();
    f.editor
        .view()
        .dispatch(Transaction::select(Selection::collapsed(Point::new(vec![1, 0], 3))));
    f.overlay.mount(form("Details", Rc::default()));
    assert_eq!(f.surface.last_placement(), Some((24.0, 40.0)));
}

#[test]
fn submit_merges_values_over_the_fields() {
    let f = fixture();
    let submitted = Rc::new(RefCell::new(None));
    f.overlay.mount(form("Details", submitted.clone()));

    let mut values = Attrs::new();
    values.insert("pinned".into(), json!("on"));
    values.insert("unknown".into(), json!(1));
    f.overlay.submit(values);

    let values = submitted.borrow().clone().expect("form submitted");
    assert_eq!(values.get("name"), Some(&json!("draft")));
    assert_eq!(values.get("pinned"), Some(&json!(true)));
    assert!(!values.contains_key("unknown"));
    assert!(!f.overlay.is_mounted());
    assert!(!f.overlay.is_shown());
}

#[test]
fn submit_without_a_form_is_ignored() {
    let f = fixture();
    f.overlay.submit(Attrs::new());
    assert!(!f.overlay.is_mounted());
    assert_eq!(f.surface.events().len(), 3);
}

#[test]
fn selection_change_closes_the_form() {
    let f = fixture();
    let submitted = Rc::new(RefCell::new(None));
    f.overlay.mount(form("Details", submitted.clone()));

    f.editor
        .view()
        .dispatch(Transaction::new(Vec::new()).set_meta("ping", json!(true)));
    assert!(f.overlay.is_shown(), "selection did not move");

    f.editor
        .view()
        .dispatch(Transaction::select(Selection::collapsed(Point::new(vec![0, 0], 4))));
    assert!(!f.overlay.is_shown());
    assert!(!f.overlay.is_mounted());

    f.overlay.submit(Attrs::new());
    assert!(submitted.borrow().is_none());
}

#[test]
fn destroying_the_view_detaches_the_overlay() {
    let f = fixture();
    f.overlay.mount(form("Details", Rc::default()));
    f.editor.destroy();

    assert!(!f.overlay.is_attached());
    assert!(!f.overlay.is_mounted());
    assert_eq!(f.surface.events().last(), Some(&OverlayEvent::Detached));
}
