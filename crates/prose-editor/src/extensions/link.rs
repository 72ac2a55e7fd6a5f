use std::cell::RefCell;
use std::rc::Rc;

use manos_prose_model::{EditorState, Mark, MarkSpec, Node, Point, TextNode, Transaction};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::commands::{add_mark, remove_mark};
use crate::extension::{Extension, ExtensionKind, InitContext, KeymapContext, SchemaFragment, ViewSlot};
use crate::form::{Field, Form};
use crate::keymap::{KeyHandler, Keymap, key_handler};
use crate::overlay::FloatingOverlay;
use crate::plugin::{ClickEvent, Decoration, Plugin};
use crate::view::EditorView;

pub const LINK: &str = "link";
pub const PENDING_META: &str = "dummySelection";
pub const PENDING_CLASS: &str = "dummySelection";

/// Opens a link target outside the editor.
pub type LinkOpener = Rc<dyn Fn(&str)>;

/// Range being edited through the link form, kept highlighted while the
/// editor itself has lost focus to the form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingRange {
    pub from: Point,
    pub to: Point,
}

/// Leaf a click or cursor at `point` refers to: the one holding the character
/// after the point.
fn leaf_after<'a>(state: &'a EditorState, point: &Point) -> Option<(usize, &'a TextNode)> {
    let block = state.doc().element_at(point.block_path())?;
    let ix = point.leaf_index();
    let leaf = block.children.get(ix)?.as_text()?;
    if point.offset < leaf.text.len() {
        return Some((ix, leaf));
    }
    match block.children.get(ix + 1) {
        Some(Node::Text(next)) if !next.text.is_empty() => Some((ix + 1, next)),
        _ => None,
    }
}

/// The link mark after `point` and the run of neighbouring leaves that carry
/// the same mark.
fn link_at(state: &EditorState, point: &Point) -> Option<(Mark, PendingRange)> {
    let (ix, leaf) = leaf_after(state, point)?;
    let mark = leaf.mark(LINK)?.clone();
    let block_path = point.block_path();
    let children = &state.doc().element_at(block_path)?.children;
    let same = |node: &Node| node.as_text().and_then(|t| t.mark(LINK)) == Some(&mark);

    let mut first = ix;
    while first > 0 && same(&children[first - 1]) {
        first -= 1;
    }
    let mut last = ix;
    while last + 1 < children.len() && same(&children[last + 1]) {
        last += 1;
    }
    let end = children[last].as_text().map_or(0, |t| t.text.len());

    let leaf_point = |leaf: usize, offset: usize| {
        let mut path = block_path.to_vec();
        path.push(leaf);
        Point::new(path, offset)
    };
    Some((
        mark,
        PendingRange {
            from: leaf_point(first, 0),
            to: leaf_point(last, end),
        },
    ))
}

struct LinkPlugin {
    pending: Rc<RefCell<Option<PendingRange>>>,
    open_on_click: bool,
    opener: Option<LinkOpener>,
}

impl Plugin for LinkPlugin {
    fn key(&self) -> &str {
        "linkDecoration"
    }

    fn apply(&self, tx: &Transaction, _old: &EditorState, _new: &EditorState) {
        let pending = tx
            .get_meta(PENDING_META)
            .and_then(|value| serde_json::from_value(value.clone()).ok());
        *self.pending.borrow_mut() = pending;
    }

    fn decorations(&self, _state: &EditorState) -> Vec<Decoration> {
        self.pending
            .borrow()
            .iter()
            .map(|range| Decoration::Inline {
                from: range.from.clone(),
                to: range.to.clone(),
                class: PENDING_CLASS.to_string(),
            })
            .collect()
    }

    /// Ctrl+Alt click follows the link under the pointer.
    fn handle_click(&self, view: &EditorView, point: &Point, event: &ClickEvent) -> bool {
        if !self.open_on_click || !(event.ctrl && event.alt) {
            return false;
        }
        let state = view.state();
        let Some((_, leaf)) = leaf_after(&state, point) else {
            return false;
        };
        let Some(mark) = leaf.mark(LINK) else {
            return false;
        };
        let href = mark.attrs.get("href").and_then(|v| v.as_str()).unwrap_or_default();
        match &self.opener {
            Some(open) => {
                tracing::debug!(href, "opening link");
                open(href);
                true
            }
            None => false,
        }
    }
}

/// Hyperlinks edited through the floating overlay with `Mod-k`.
pub struct Link {
    overlay: Option<FloatingOverlay>,
    open_on_click: bool,
    opener: Option<LinkOpener>,
    view: ViewSlot,
    pending: Rc<RefCell<Option<PendingRange>>>,
}

impl Link {
    pub fn new(overlay: Option<FloatingOverlay>) -> Self {
        Self {
            overlay,
            open_on_click: true,
            opener: None,
            view: ViewSlot::new(),
            pending: Rc::default(),
        }
    }

    pub fn open_on_click(mut self, enabled: bool) -> Self {
        self.open_on_click = enabled;
        self
    }

    pub fn opener(mut self, opener: LinkOpener) -> Self {
        self.opener = Some(opener);
        self
    }

    /// Range currently highlighted for the link form.
    pub fn pending(&self) -> Option<PendingRange> {
        self.pending.borrow().clone()
    }

    fn edit_handler(&self) -> KeyHandler {
        let overlay = self.overlay.clone();
        let slot = self.view.clone();
        key_handler(move |state, dispatch| {
            let Some(overlay) = &overlay else {
                return false;
            };
            let selection = state.selection();
            let existing = link_at(state, selection.from());
            let range = match (&existing, selection.is_collapsed()) {
                (None, true) => return false,
                (Some((_, extent)), true) => extent.clone(),
                (_, false) => PendingRange {
                    from: selection.from().clone(),
                    to: selection.to().clone(),
                },
            };
            if dispatch.is_none() {
                return true;
            }
            let Some(view) = slot.get() else {
                return false;
            };

            let attrs = existing.as_ref().map(|(mark, _)| mark.attrs.clone()).unwrap_or_default();
            let text = |name: &str| attrs.get(name).and_then(|v| v.as_str()).unwrap_or_default().to_string();
            let fields = vec![
                Field::text("Link URL", "href", text("href")),
                Field::text("Link Title", "title", text("title")),
                Field::boolean(
                    "Should open in new tab",
                    "newTab",
                    attrs.get("newTab").and_then(|v| v.as_bool()).unwrap_or(false),
                ),
            ];

            let highlight = Transaction::new(Vec::new())
                .set_meta(PENDING_META, json!(range))
                .source("link:pending");
            view.dispatch(highlight);
            let captured = view.state().id();
            let had_link = existing.is_some();
            let weak = view.downgrade();

            overlay.mount(Form::new("Add link details", "Done", fields, move |values| {
                let Some(view) = weak.upgrade() else {
                    return;
                };
                let state = view.state();
                if state.id() != captured {
                    tracing::debug!("discarding stale link submission");
                    return;
                }
                let href = values.get("href").and_then(|v| v.as_str()).unwrap_or_default();
                let tx = if href.is_empty() {
                    had_link
                        .then(|| remove_mark(&state, &range.from, &range.to, LINK))
                        .flatten()
                } else {
                    add_mark(&state, &range.from, &range.to, Mark::with_attrs(LINK, values))
                };
                if let Some(tx) = tx {
                    view.dispatch(tx.source("link:update"));
                    view.focus();
                }
            }));
            true
        })
    }
}

impl Extension for Link {
    fn name(&self) -> &str {
        LINK
    }

    fn kind(&self) -> ExtensionKind {
        ExtensionKind::Mark
    }

    fn schema(&self) -> Option<SchemaFragment> {
        Some(SchemaFragment::Mark(
            MarkSpec::new()
                .attr("href", json!(""))
                .attr("title", json!(""))
                .attr("newTab", json!(false))
                .inclusive(false),
        ))
    }

    fn keymap(&self, _ctx: &KeymapContext<'_>) -> Keymap {
        Keymap::new().bind(
            "Mod-k",
            "Add link to selected text or update metadata if cursor is inside a link",
            self.edit_handler(),
        )
    }

    fn plugins(&self) -> Vec<Rc<dyn Plugin>> {
        vec![Rc::new(LinkPlugin {
            pending: self.pending.clone(),
            open_on_click: self.open_on_click,
            opener: self.opener.clone(),
        })]
    }

    fn init(&self, ctx: &InitContext) {
        self.view.set(ctx.view.clone());
    }
}
