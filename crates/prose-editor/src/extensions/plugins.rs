use std::rc::Rc;

use manos_prose_model::{Attrs, Bias, EditorState, Node, Selection, Transaction};
use serde_json::json;

use crate::commands::{base_keymap, redo, set_node_attrs, undo};
use crate::dom::Direction;
use crate::extension::{Extension, ExtensionKind, InitContext, KeymapContext, ViewSlot};
use crate::keymap::{KeyHandler, Keymap, key_handler};
use crate::overlay::FloatingOverlay;
use crate::plugin::{Decoration, KeymapPlugin, Plugin};
use crate::view::EditorView;

/// Moves a collapsed cursor out of a `kinds` textblock to the end of the
/// previous text when it is about to leave the block in `dir`.
pub(crate) fn escape_backward(slot: ViewSlot, kinds: Vec<String>, dir: Direction) -> KeyHandler {
    key_handler(move |state, dispatch| {
        let selection = state.selection();
        let block = selection.focus.block_path();
        let in_caption = state
            .doc()
            .element_at(block)
            .is_some_and(|el| kinds.iter().any(|k| *k == el.kind));
        if !in_caption || !selection.is_collapsed() {
            return false;
        }
        let Some(view) = slot.get() else {
            return false;
        };
        if !view.end_of_textblock(dir) {
            return false;
        }
        if let Some(dispatch) = dispatch {
            if let Some(before) = Selection::near(state.doc(), block, Bias::Backward) {
                dispatch(Transaction::select(before).source("arrow:escape"));
            }
        }
        true
    })
}

pub(crate) fn escape_keymap(slot: &ViewSlot, kinds: &[String]) -> Keymap {
    Keymap::new()
        .bind(
            "ArrowUp",
            "",
            escape_backward(slot.clone(), kinds.to_vec(), Direction::Up),
        )
        .bind(
            "ArrowLeft",
            "",
            escape_backward(slot.clone(), kinds.to_vec(), Direction::Left),
        )
}

/// Lets ArrowUp and ArrowLeft leave caption-like blocks that would
/// otherwise trap the cursor.
pub struct ArrowHandler {
    node_names: Vec<String>,
    view: ViewSlot,
}

impl ArrowHandler {
    pub fn new<I, S>(node_names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            node_names: node_names.into_iter().map(Into::into).collect(),
            view: ViewSlot::new(),
        }
    }
}

impl Extension for ArrowHandler {
    fn name(&self) -> &str {
        "arrowHandler"
    }

    fn kind(&self) -> ExtensionKind {
        ExtensionKind::Plugin
    }

    fn plugins(&self) -> Vec<Rc<dyn Plugin>> {
        vec![Rc::new(KeymapPlugin::new(
            self.name(),
            escape_keymap(&self.view, &self.node_names),
        ))]
    }

    fn init(&self, ctx: &InitContext) {
        self.view.set(ctx.view.clone());
    }
}

/// `Mod-L`, `Mod-R` and `Mod-E` toggle the `align` attribute of the block
/// around the cursor, for the configured block types.
pub struct Align {
    supported_blocks: Vec<String>,
}

impl Align {
    pub fn new<I, S>(supported_blocks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            supported_blocks: supported_blocks.into_iter().map(Into::into).collect(),
        }
    }

    fn handler(&self, align: &'static str) -> KeyHandler {
        let supported = self.supported_blocks.clone();
        key_handler(move |state, dispatch| toggle_align(state, dispatch, &supported, align))
    }
}

fn toggle_align(
    state: &EditorState,
    dispatch: Option<&dyn Fn(Transaction)>,
    supported: &[String],
    align: &str,
) -> bool {
    let selection = state.selection();
    if !selection.same_parent() {
        return false;
    }
    let path = selection.from().block_path();
    let Some(block) = state.doc().element_at(path) else {
        return false;
    };
    if !supported.iter().any(|kind| *kind == block.kind) {
        return false;
    }
    let declares_align = state
        .schema()
        .node(&block.kind)
        .is_some_and(|t| t.spec.attrs.contains_key("align"));
    if !declares_align {
        return false;
    }

    if let Some(dispatch) = dispatch {
        let next = if block.attr_str("align") == align { "" } else { align };
        let attrs: Attrs = [("align".to_string(), json!(next))].into_iter().collect();
        dispatch(set_node_attrs(path.to_vec(), attrs).source("command:align"));
    }
    true
}

impl Extension for Align {
    fn name(&self) -> &str {
        "align"
    }

    fn kind(&self) -> ExtensionKind {
        ExtensionKind::Plugin
    }

    fn keymap(&self, _ctx: &KeymapContext<'_>) -> Keymap {
        [("left", "L"), ("right", "R"), ("center", "E")]
            .into_iter()
            .fold(Keymap::new(), |keymap, (align, key)| {
                keymap.bind(format!("Mod-{key}"), format!("Align {align}"), self.handler(align))
            })
    }
}

struct FloatViewPlugin {
    overlay: FloatingOverlay,
}

impl Plugin for FloatViewPlugin {
    fn key(&self) -> &str {
        "floatView"
    }

    fn view_attached(&self, view: &EditorView) {
        self.overlay.attach(view);
    }

    fn view_updated(&self, view: &EditorView, prev: &EditorState) {
        if !self.overlay.is_attached() {
            self.overlay.attach(view);
        }
        self.overlay.on_view_update(view, prev);
    }

    fn view_destroyed(&self) {
        self.overlay.detach();
    }
}

/// Owns the lifecycle of the shared [`FloatingOverlay`].
pub struct FloatView {
    overlay: FloatingOverlay,
}

impl FloatView {
    pub fn new(overlay: FloatingOverlay) -> Self {
        Self { overlay }
    }

    pub fn overlay(&self) -> &FloatingOverlay {
        &self.overlay
    }
}

impl Extension for FloatView {
    fn name(&self) -> &str {
        "floatView"
    }

    fn kind(&self) -> ExtensionKind {
        ExtensionKind::Plugin
    }

    fn plugins(&self) -> Vec<Rc<dyn Plugin>> {
        vec![Rc::new(FloatViewPlugin {
            overlay: self.overlay.clone(),
        })]
    }
}

pub const EMPTY_CAPTION_CLASS: &str = "empty-caption";

struct PlaceholderPlugin {
    node_names: Vec<String>,
}

impl Plugin for PlaceholderPlugin {
    fn key(&self) -> &str {
        "placeholder"
    }

    fn decorations(&self, state: &EditorState) -> Vec<Decoration> {
        let mut out = Vec::new();
        state.doc().descendants(|node, path| {
            let Node::Element(el) = node else {
                return;
            };
            if self.node_names.iter().any(|k| *k == el.kind) && el.is_empty_textblock() {
                out.push(Decoration::Node {
                    path: path.to_vec(),
                    class: EMPTY_CAPTION_CLASS.to_string(),
                });
            }
        });
        out
    }
}

/// Marks empty blocks of the configured types so the host can show a
/// placeholder caption.
pub struct Placeholder {
    node_names: Vec<String>,
}

impl Placeholder {
    pub fn new<I, S>(node_names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            node_names: node_names.into_iter().map(Into::into).collect(),
        }
    }
}

impl Extension for Placeholder {
    fn name(&self) -> &str {
        "placeholder"
    }

    fn kind(&self) -> ExtensionKind {
        ExtensionKind::Plugin
    }

    fn plugins(&self) -> Vec<Rc<dyn Plugin>> {
        vec![Rc::new(PlaceholderPlugin {
            node_names: self.node_names.clone(),
        })]
    }
}

/// Enter, Backspace, Delete and friends.
pub struct BaseKeymap;

impl Extension for BaseKeymap {
    fn name(&self) -> &str {
        "base_keymap"
    }

    fn kind(&self) -> ExtensionKind {
        ExtensionKind::Plugin
    }

    fn plugins(&self) -> Vec<Rc<dyn Plugin>> {
        vec![Rc::new(KeymapPlugin::new(self.name(), base_keymap()))]
    }
}

pub struct History;

impl Extension for History {
    fn name(&self) -> &str {
        "history"
    }

    fn kind(&self) -> ExtensionKind {
        ExtensionKind::Plugin
    }

    fn keymap(&self, _ctx: &KeymapContext<'_>) -> Keymap {
        Keymap::new()
            .bind("Mod-z", "Undo last change", undo())
            .bind("Mod-y", "Redo last change", redo())
    }
}
