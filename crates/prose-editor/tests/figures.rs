use std::rc::Rc;

use manos_prose_editor::extensions::{ArrowHandler, Doc, EMPTY_CAPTION_CLASS, Embed, FloatView, Image, Paragraph, Placeholder, Text};
use manos_prose_editor::headless::{HeadlessHost, HeadlessOverlaySurface, ScriptedPrompt};
use manos_prose_editor::model::{Attrs, Document, ElementNode, Node, Op, Point, Selection, Transaction};
use manos_prose_editor::node_view::{ADD_IMAGE_ACTION, SHOW_FRAME_ACTION};
use manos_prose_editor::{Decoration, Editor, EditorOptions, Extension, FloatingOverlay, MetadataSource};
use serde_json::json;

fn figure(kind: &str, src: &str, caption: &str) -> Node {
    let attrs: Attrs = [("src".to_string(), json!(src))].into_iter().collect();
    let children = if caption.is_empty() {
        Vec::new()
    } else {
        vec![Node::text(caption)]
    };
    Node::element(kind, attrs, children)
}

fn editor(doc: Document, metadata: MetadataSource, extra: Vec<Rc<dyn Extension>>) -> Editor {
    let mut extensions: Vec<Rc<dyn Extension>> = vec![
        Rc::new(Doc),
        Rc::new(Text),
        Rc::new(Paragraph),
        Rc::new(Embed::new(metadata.clone())),
        Rc::new(Image::new(metadata)),
    ];
    extensions.extend(extra);
    let options = EditorOptions::default().doc(serde_json::to_value(&doc).unwrap());
    Editor::new(Rc::new(HeadlessHost::new()), extensions, options).unwrap()
}

fn prompted(doc: Document, answers: Vec<Option<&'static str>>) -> (Editor, Rc<ScriptedPrompt>) {
    let prompt = Rc::new(ScriptedPrompt::new(answers));
    let editor = editor(doc, MetadataSource::Prompt(prompt.clone()), Vec::new());
    (editor, prompt)
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

fn asked(messages: &[(&str, &str)]) -> Vec<(String, String)> {
    messages
        .iter()
        .map(|(m, d)| (m.to_string(), d.to_string()))
        .collect()
}

#[test]
fn embed_shortcut_turns_the_block_into_an_embed() {
    let (editor, _) = prompted(Document::new(vec![Node::paragraph("A talk")]), Vec::new());
    place(&editor, vec![0, 0], 0);

    assert!(editor.press("Mod-Alt-e").unwrap());
    let embed = block(&editor, 0);
    assert_eq!(embed.kind, "embed");
    assert_eq!(embed.attr_str("src"), "");
    assert_eq!(embed.text_content(), "A talk");
    assert_eq!(editor.view().node_view_count(), 1);
}

#[test]
fn embed_metadata_asks_for_the_url() {
    let (editor, prompt) = prompted(
        Document::new(vec![figure("embed", "", "A talk")]),
        vec![Some("https://video.example/talk")],
    );
    place(&editor, vec![0, 0], 2);

    assert!(editor.press("Mod-Alt-E").unwrap());
    assert_eq!(prompt.asked(), asked(&[("Please enter the embed url", "")]));
    assert_eq!(block(&editor, 0).attr_str("src"), "https://video.example/talk");
    assert!(editor.view().has_focus());
}

#[test]
fn embed_metadata_needs_the_cursor_inside_an_embed() {
    let (editor, prompt) = prompted(
        Document::new(vec![Node::paragraph("text"), figure("embed", "", "A talk")]),
        vec![Some("https://video.example/talk")],
    );
    place(&editor, vec![0, 0], 0);

    assert!(!editor.press("Mod-Alt-E").unwrap());
    assert!(prompt.asked().is_empty());
}

#[test]
fn unchanged_answer_leaves_the_embed_alone() {
    let (editor, _) = prompted(
        Document::new(vec![figure("embed", "https://a.example", "A talk")]),
        vec![Some("https://a.example")],
    );
    place(&editor, vec![0, 0], 0);
    let before = editor.state().doc().clone();

    assert!(editor.press("Mod-Alt-E").unwrap());
    assert_eq!(editor.state().doc(), &before);
}

#[test]
fn embed_frame_is_shown_on_request_and_stays_shown() {
    let (editor, _) = prompted(
        Document::new(vec![figure("embed", "", "A talk")]),
        vec![Some("https://a.example"), Some("https://b.example")],
    );
    assert!(!editor.view().handle_node_view_click(&[0], SHOW_FRAME_ACTION));

    place(&editor, vec![0, 0], 0);
    assert!(editor.press("Mod-Alt-E").unwrap());
    let view = editor.view().node_view_at(&[0]).unwrap();
    assert!(view.dom().find("iframe").is_none());

    assert!(editor.view().handle_node_view_click(&[0], SHOW_FRAME_ACTION));
    let frame = view.dom();
    let iframe = frame.find("iframe").expect("frame shown");
    assert_eq!(iframe.attrs.get("src").map(String::as_str), Some("https://a.example"));

    place(&editor, vec![0, 0], 0);
    assert!(editor.press("Mod-Alt-E").unwrap());
    let iframe = view.dom().find("iframe").cloned().expect("still shown");
    assert_eq!(iframe.attrs.get("src").map(String::as_str), Some("https://b.example"));
}

#[test]
fn image_shortcut_creates_an_image_with_defaults() {
    let (editor, _) = prompted(Document::new(vec![Node::paragraph("A cat")]), Vec::new());
    place(&editor, vec![0, 0], 0);

    assert!(editor.press("Mod-Alt-m").unwrap());
    let image = block(&editor, 0);
    assert_eq!(image.kind, "image");
    assert_eq!(image.attr_str("src"), "");
    assert_eq!(image.attr_str("alt"), "");
    assert_eq!(image.text_content(), "A cat");
}

#[test]
fn image_metadata_asks_for_url_then_alt_text() {
    let (editor, prompt) = prompted(
        Document::new(vec![figure("image", "", "A cat")]),
        vec![Some("https://img.example/cat.png"), Some("A sleeping cat")],
    );
    place(&editor, vec![0, 0], 0);

    assert!(editor.press("Mod-Alt-M").unwrap());
    assert_eq!(
        prompt.asked(),
        asked(&[
            ("Please enter the image url", ""),
            ("Please enter the alt text for the image", ""),
        ])
    );
    let image = block(&editor, 0);
    assert_eq!(image.attr_str("src"), "https://img.example/cat.png");
    assert_eq!(image.attr_str("alt"), "A sleeping cat");
}

#[test]
fn cancelling_the_alt_prompt_drops_the_whole_update() {
    let (editor, _) = prompted(
        Document::new(vec![figure("image", "", "A cat")]),
        vec![Some("https://img.example/cat.png"), None],
    );
    place(&editor, vec![0, 0], 0);

    assert!(editor.press("Mod-Alt-M").unwrap());
    assert_eq!(block(&editor, 0).attr_str("src"), "");
}

#[test]
fn add_image_button_runs_the_metadata_command() {
    let (editor, prompt) = prompted(
        Document::new(vec![figure("image", "", "A cat")]),
        vec![Some("cat.png"), Some("cat")],
    );
    place(&editor, vec![0, 0], 1);
    let view = editor.view().node_view_at(&[0]).unwrap();
    assert!(view.dom().find_by_attr("data-action").is_some());

    assert!(editor.view().handle_node_view_click(&[0], ADD_IMAGE_ACTION));
    assert_eq!(prompt.asked().len(), 2);
    assert_eq!(block(&editor, 0).attr_str("src"), "cat.png");
    let img = view.dom().find("img").cloned().expect("image rendered");
    assert_eq!(img.attrs.get("alt").map(String::as_str), Some("cat"));
}

#[test]
fn overlay_form_updates_the_image() {
    let surface = HeadlessOverlaySurface::default();
    let overlay = FloatingOverlay::new(Rc::new(surface));
    let editor = editor(
        Document::new(vec![figure("image", "", "A cat")]),
        MetadataSource::Overlay(overlay.clone()),
        vec![Rc::new(FloatView::new(overlay.clone()))],
    );
    place(&editor, vec![0, 0], 0);

    assert!(editor.press("Mod-Alt-M").unwrap());
    assert_eq!(overlay.mounted_title().as_deref(), Some("Update image data"));
    let mut values = Attrs::new();
    values.insert("src".into(), json!("cat.png"));
    values.insert("alt".into(), json!("A cat"));
    overlay.submit(values);

    let image = block(&editor, 0);
    assert_eq!(image.attr_str("src"), "cat.png");
    assert_eq!(image.attr_str("alt"), "A cat");
    assert!(!overlay.is_mounted());
}

#[test]
fn stale_overlay_submission_is_discarded() {
    let overlay = FloatingOverlay::new(Rc::new(HeadlessOverlaySurface::default()));
    let editor = editor(
        Document::new(vec![figure("image", "", "A cat")]),
        MetadataSource::Overlay(overlay.clone()),
        Vec::new(),
    );
    place(&editor, vec![0, 0], 0);
    assert!(editor.press("Mod-Alt-M").unwrap());

    editor.view().dispatch(Transaction::new(vec![Op::InsertText {
        path: vec![0, 0],
        offset: 5,
        text: " nap".into(),
    }]));
    let mut values = Attrs::new();
    values.insert("src".into(), json!("cat.png"));
    overlay.submit(values);

    let image = block(&editor, 0);
    assert_eq!(image.attr_str("src"), "");
    assert_eq!(image.text_content(), "A cat nap");
    assert!(editor.view().has_focus());
}

#[test]
fn empty_captions_are_decorated() {
    let editor = editor(
        Document::new(vec![figure("image", "cat.png", ""), Node::paragraph("")]),
        MetadataSource::Prompt(Rc::new(ScriptedPrompt::default())),
        vec![Rc::new(Placeholder::new(["image", "embed"]))],
    );
    let empty_caption = Decoration::Node {
        path: vec![0],
        class: EMPTY_CAPTION_CLASS.to_string(),
    };
    assert_eq!(editor.view().decorations(), vec![empty_caption]);

    place(&editor, vec![0, 0], 0);
    assert!(editor.view().handle_text_input("A cat"));
    assert!(editor.view().decorations().is_empty());
}

#[test]
fn arrow_up_leaves_an_embed_caption() {
    let (editor, _) = prompted(
        Document::new(vec![Node::paragraph("intro"), figure("embed", "", "caption")]),
        Vec::new(),
    );
    place(&editor, vec![1, 0], 0);

    assert!(editor.press("ArrowUp").unwrap());
    assert_eq!(editor.state().selection().focus, Point::new(vec![0, 0], 5));

    place(&editor, vec![1, 0], 3);
    assert!(!editor.press("ArrowLeft").unwrap());
    assert_eq!(editor.state().selection().focus, Point::new(vec![1, 0], 3));
}

#[test]
fn arrow_handler_covers_configured_captions() {
    let doc = Document::new(vec![Node::paragraph("intro"), figure("image", "cat.png", "cap")]);
    let without = editor(
        doc.clone(),
        MetadataSource::Prompt(Rc::new(ScriptedPrompt::default())),
        Vec::new(),
    );
    place(&without, vec![1, 0], 0);
    assert!(!without.press("ArrowLeft").unwrap());

    let with = editor(
        doc,
        MetadataSource::Prompt(Rc::new(ScriptedPrompt::default())),
        vec![Rc::new(ArrowHandler::new(["image"]))],
    );
    place(&with, vec![1, 0], 0);
    assert!(with.press("ArrowLeft").unwrap());
    assert_eq!(with.state().selection().focus, Point::new(vec![0, 0], 5));
}
