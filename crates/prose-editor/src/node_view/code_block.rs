use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use manos_prose_model::{Bias, ElementNode, Node, Op, Selection, Transaction, textblock};
use serde::{Deserialize, Serialize};

use super::{NodePosition, NodeView, NodeViewContext, NodeViewFactory};
use crate::commands::{exit_code, rewrite_leaves_ops};
use crate::dom::DomElement;
use crate::error::WidgetError;
use crate::keymap::{KeyEvent, KeyHandler};
use crate::view::{EditorView, WeakView};

pub const MIN_WIDGET_HEIGHT: f64 = 200.0;
pub const MAX_WIDGET_HEIGHT: f64 = 500.0;

/// Height of the widget box for a given content height.
pub fn widget_height(content_height: f64) -> f64 {
    if content_height <= MIN_WIDGET_HEIGHT {
        MIN_WIDGET_HEIGHT
    } else if content_height <= MAX_WIDGET_HEIGHT {
        content_height
    } else {
        MAX_WIDGET_HEIGHT
    }
}

/// Replace `from..to` of the old text with `text`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextChange {
    pub from: usize,
    pub to: usize,
    pub text: String,
}

/// Smallest single replacement turning `old` into `new`: the common prefix
/// and then the common suffix of what remains are left alone.
pub fn compute_change(old: &str, new: &str) -> Option<TextChange> {
    if old == new {
        return None;
    }
    let (old_bytes, new_bytes) = (old.as_bytes(), new.as_bytes());

    let mut start = old_bytes
        .iter()
        .zip(new_bytes)
        .take_while(|(a, b)| a == b)
        .count();
    while !old.is_char_boundary(start) || !new.is_char_boundary(start) {
        start -= 1;
    }

    let mut old_end = old.len();
    let mut new_end = new.len();
    while old_end > start && new_end > start && old_bytes[old_end - 1] == new_bytes[new_end - 1] {
        old_end -= 1;
        new_end -= 1;
    }
    while !old.is_char_boundary(old_end) || !new.is_char_boundary(new_end) {
        old_end += 1;
        new_end += 1;
    }

    Some(TextChange {
        from: start,
        to: old_end,
        text: new[start..new_end].to_string(),
    })
}

#[derive(Debug, Clone, PartialEq)]
pub enum WidgetEvent {
    ContentChanged,
    CursorMoved,
    Focus,
    Blur,
    /// Sent before typed text is inserted.
    WillType,
    KeyDown(KeyEvent),
}

/// Listener registered with a widget. For [`WidgetEvent::KeyDown`] a `true`
/// return keeps the widget from handling the key itself.
pub type WidgetListener = Box<dyn Fn(&WidgetEvent) -> bool>;

/// An embedded line-based code editor. Offsets are byte offsets into
/// [`CodeWidget::value`]; lines and columns are zero-based.
pub trait CodeWidget {
    fn value(&self) -> String;

    /// Replaces `from..to` with `text` and notifies listeners.
    fn apply_edit(&self, from: usize, to: usize, text: &str);

    /// `(anchor, head)`.
    fn selection(&self) -> (usize, usize);

    fn set_selection(&self, anchor: usize, head: usize);

    /// `(line, column)` of the head.
    fn cursor(&self) -> (usize, usize);

    fn line_count(&self) -> usize;

    fn line_len(&self, line: usize) -> usize;

    fn has_focus(&self) -> bool;

    fn focus(&self);

    fn set_language(&self, language: &str);

    fn set_line_numbers(&self, on: bool);

    fn content_height(&self) -> f64;

    fn set_height(&self, height: f64);

    fn layout(&self);

    fn on_event(&self, listener: WidgetListener);

    fn dispose(&self) -> Result<(), WidgetError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeWidgetOptions {
    pub value: String,
    pub language: String,
    pub line_numbers: bool,
}

pub trait CodeWidgetFactory {
    fn create(&self, options: CodeWidgetOptions) -> Rc<dyn CodeWidget>;
}

/// Direction the two text buffers are currently being synchronized in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    #[default]
    Idle,
    /// A document change is being copied into the widget; widget
    /// notifications must not travel back to the document.
    ApplyingInbound,
    /// Widget edits are on their way to the document; the widget holds the
    /// newer text and selection.
    AwaitingOutbound,
}

/// Commands the widget forwards from its own key handling.
#[derive(Clone, Default)]
pub struct CodeBlockKeys {
    /// `Mod-Alt-Shift-L` inside the widget.
    pub metadata: Option<KeyHandler>,
    /// `Mod-Alt-/` inside the widget.
    pub toggle: Option<KeyHandler>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Unit {
    Char,
    Line,
}

/// Node view hosting a [`CodeWidget`] for a code block, keeping the widget's
/// buffer and the block's text in step in both directions.
pub struct CodeBlockView {
    node: RefCell<ElementNode>,
    widget: Rc<dyn CodeWidget>,
    view: WeakView,
    position: NodePosition,
    keys: CodeBlockKeys,
    sync: Cell<SyncState>,
    height: Cell<f64>,
    disposed: Cell<bool>,
}

impl CodeBlockView {
    pub fn new(
        node: &ElementNode,
        ctx: NodeViewContext,
        widgets: &dyn CodeWidgetFactory,
        keys: CodeBlockKeys,
    ) -> Rc<Self> {
        let widget = widgets.create(CodeWidgetOptions {
            value: node.text_content(),
            language: node.attr_str("language").to_string(),
            line_numbers: node.attr_bool("showLineNumbers"),
        });
        let view = Rc::new(Self {
            node: RefCell::new(node.clone()),
            widget,
            view: ctx.view,
            position: ctx.position,
            keys,
            sync: Cell::new(SyncState::Idle),
            height: Cell::new(MIN_WIDGET_HEIGHT),
            disposed: Cell::new(false),
        });

        let weak: Weak<Self> = Rc::downgrade(&view);
        view.widget.on_event(Box::new(move |event| {
            weak.upgrade()
                .is_some_and(|this| this.handle_widget_event(event))
        }));
        view.adjust_height();
        view
    }

    pub fn sync_state(&self) -> SyncState {
        self.sync.get()
    }

    pub fn widget(&self) -> &Rc<dyn CodeWidget> {
        &self.widget
    }

    pub fn height(&self) -> f64 {
        self.height.get()
    }

    fn handle_widget_event(&self, event: &WidgetEvent) -> bool {
        let inbound = self.sync.get() == SyncState::ApplyingInbound;
        match event {
            WidgetEvent::ContentChanged => {
                if !inbound {
                    self.sync.set(SyncState::AwaitingOutbound);
                    self.value_changed();
                    self.forward_selection();
                    self.sync.set(SyncState::Idle);
                }
                self.adjust_height();
                false
            }
            WidgetEvent::CursorMoved | WidgetEvent::Focus => {
                if !inbound {
                    self.forward_selection();
                }
                false
            }
            WidgetEvent::Blur => false,
            WidgetEvent::WillType => {
                self.sync.set(SyncState::AwaitingOutbound);
                false
            }
            WidgetEvent::KeyDown(key) => self.handle_key(key),
        }
    }

    fn handle_key(&self, event: &KeyEvent) -> bool {
        let Some(view) = self.view.upgrade() else {
            return false;
        };
        let dispatch = |tx: Transaction| view.dispatch(tx);

        if event.is_mod(view.platform()) && event.alt {
            if event.shift && event.key.eq_ignore_ascii_case("l") {
                if let Some(metadata) = &self.keys.metadata {
                    metadata(&view.state(), Some(&dispatch));
                }
                return true;
            }
            if event.key == "/" {
                if let Some(toggle) = &self.keys.toggle {
                    toggle(&view.state(), Some(&dispatch));
                }
                view.focus();
                return true;
            }
        }

        if event.ctrl && event.key == "Enter" {
            if exit_code(&view.state(), Some(&dispatch)) {
                view.focus();
            }
            return true;
        }

        if event.has_modifier() {
            return false;
        }
        match event.key.as_str() {
            "ArrowUp" => self.maybe_escape(&view, Unit::Line, -1),
            "ArrowLeft" => self.maybe_escape(&view, Unit::Char, -1),
            "ArrowDown" => self.maybe_escape(&view, Unit::Line, 1),
            "ArrowRight" => self.maybe_escape(&view, Unit::Char, 1),
            _ => false,
        }
    }

    /// Moves the outer selection out of the block when the cursor is on the
    /// edge the arrow points at.
    fn maybe_escape(&self, view: &EditorView, unit: Unit, dir: i32) -> bool {
        let (anchor, head) = self.widget.selection();
        if anchor != head {
            return false;
        }
        let (line, column) = self.widget.cursor();
        let edge_line = if dir < 0 {
            0
        } else {
            self.widget.line_count().saturating_sub(1)
        };
        if line != edge_line {
            return false;
        }
        if unit == Unit::Char {
            let edge_column = if dir < 0 { 0 } else { self.widget.line_len(line) };
            if column != edge_column {
                return false;
            }
        }

        let Some(path) = self.position.get() else {
            return false;
        };
        let bias = if dir < 0 { Bias::Backward } else { Bias::Forward };
        let state = view.state();
        let Some(selection) = Selection::near(state.doc(), &path, bias) else {
            return false;
        };
        view.focus();
        view.dispatch(Transaction::select(selection).source("code_block:escape"));
        true
    }

    /// Widget to document: one replacement covering only the changed span.
    fn value_changed(&self) {
        let old = self.node.borrow().text_content();
        let Some(change) = compute_change(&old, &self.widget.value()) else {
            return;
        };
        let (Some(view), Some(path)) = (self.view.upgrade(), self.position.get()) else {
            return;
        };
        let state = view.state();
        let Some(block) = state.doc().element_at(&path) else {
            return;
        };

        let ops = match block.children.as_slice() {
            [Node::Text(_)] => {
                let mut leaf = path.clone();
                leaf.push(0);
                let mut ops = Vec::new();
                if change.to > change.from {
                    ops.push(Op::RemoveText {
                        path: leaf.clone(),
                        range: change.from..change.to,
                    });
                }
                if !change.text.is_empty() {
                    ops.push(Op::InsertText {
                        path: leaf,
                        offset: change.from,
                        text: change.text.clone(),
                    });
                }
                ops
            }
            children => {
                let (left, _) = textblock::split_children(children, change.from);
                let (_, right) = textblock::split_children(children, change.to);
                let mut merged = left;
                merged.push(Node::text(change.text.clone()));
                let merged = textblock::join_children(&merged, &right);
                rewrite_leaves_ops(&path, children.len(), merged)
            }
        };
        if ops.is_empty() {
            return;
        }
        view.dispatch(Transaction::new(ops).source("code_block:edit"));
    }

    /// Pushes the widget's selection to the editor while the widget has focus.
    fn forward_selection(&self) {
        if !self.widget.has_focus() {
            return;
        }
        let (Some(view), Some(path)) = (self.view.upgrade(), self.position.get()) else {
            return;
        };
        let state = view.state();
        let Some(block) = state.doc().element_at(&path) else {
            return;
        };
        let (anchor, head) = self.widget.selection();
        let selection = Selection::range(
            textblock::point_for_global_offset(&path, &block.children, anchor, false),
            textblock::point_for_global_offset(&path, &block.children, head, false),
        );
        if &selection != state.selection() {
            view.dispatch(Transaction::select(selection).source("code_block:selection"));
        }
    }

    fn adjust_height(&self) {
        let height = widget_height(self.widget.content_height());
        self.height.set(height);
        self.widget.set_height(height);
        self.widget.layout();
    }
}

impl NodeView for CodeBlockView {
    fn dom(&self) -> DomElement {
        let node = self.node.borrow();
        let class = if self.widget.has_focus() {
            "code-block code-block--focused"
        } else {
            "code-block"
        };
        DomElement::new("div")
            .class(class)
            .attr("data-language", node.attr_str("language"))
            .attr("style", format!("height: {}px", self.height.get()))
    }

    fn content_dom(&self) -> Option<DomElement> {
        None
    }

    /// Document to widget: attribute changes become widget options and a
    /// text change is replayed as one edit without echoing it back.
    fn update(&self, node: &ElementNode) -> bool {
        let old = self.node.borrow().clone();
        if node.kind != old.kind {
            return false;
        }
        if node.attr_bool("showLineNumbers") != old.attr_bool("showLineNumbers") {
            self.widget.set_line_numbers(node.attr_bool("showLineNumbers"));
        }
        if node.attr_str("language") != old.attr_str("language") {
            self.widget.set_language(node.attr_str("language"));
        }
        *self.node.borrow_mut() = node.clone();

        if let Some(change) = compute_change(&self.widget.value(), &node.text_content()) {
            self.sync.set(SyncState::ApplyingInbound);
            self.widget.apply_edit(change.from, change.to, &change.text);
            self.sync.set(SyncState::Idle);
        }
        true
    }

    /// Ignored while a widget edit is on its way to the document; the widget
    /// selection is the newer one then.
    fn set_selection(&self, anchor: usize, head: usize) {
        if self.sync.get() == SyncState::AwaitingOutbound {
            return;
        }
        if self.widget.has_focus() && self.widget.selection() == (anchor, head) {
            return;
        }
        let previous = self.sync.replace(SyncState::ApplyingInbound);
        self.widget.focus();
        self.widget.set_selection(anchor, head);
        self.sync.set(previous);
    }

    fn stop_event(&self, event: &KeyEvent) -> bool {
        if !self.widget.has_focus() {
            return false;
        }
        let platform = self.view.upgrade().map(|v| v.platform()).unwrap_or_default();
        !(event.is_mod(platform) && event.key == "L")
    }

    fn resize(&self) {
        self.widget.layout();
    }

    fn destroy(&self) {
        if self.disposed.replace(true) {
            return;
        }
        if let Err(err) = self.widget.dispose() {
            tracing::error!(%err, "failed to dispose code widget");
        }
    }
}

/// Creates [`CodeBlockView`]s backed by widgets from `widgets`.
pub struct CodeBlockViewFactory {
    widgets: Rc<dyn CodeWidgetFactory>,
    keys: CodeBlockKeys,
}

impl CodeBlockViewFactory {
    pub fn new(widgets: Rc<dyn CodeWidgetFactory>, keys: CodeBlockKeys) -> Self {
        Self { widgets, keys }
    }
}

impl NodeViewFactory for CodeBlockViewFactory {
    fn create(&self, node: &ElementNode, ctx: NodeViewContext) -> Rc<dyn NodeView> {
        CodeBlockView::new(node, ctx, self.widgets.as_ref(), self.keys.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insertion_in_the_middle_is_minimal() {
        assert_eq!(
            compute_change("hello world", "hello brave world"),
            Some(TextChange {
                from: 6,
                to: 6,
                text: "brave ".to_string(),
            })
        );
    }

    #[test]
    fn deletion_and_identity() {
        assert_eq!(
            compute_change("abcdef", "abef"),
            Some(TextChange {
                from: 2,
                to: 4,
                text: String::new(),
            })
        );
        assert_eq!(compute_change("same", "same"), None);
    }

    #[test]
    fn multibyte_edits_stay_on_char_boundaries() {
        let change = compute_change("aé", "aè").unwrap();
        assert_eq!(change.from, 1);
        assert_eq!(change.to, 3);
        assert_eq!(change.text, "è");
    }

    #[test]
    fn height_is_clamped() {
        assert_eq!(widget_height(20.0), 200.0);
        assert_eq!(widget_height(320.0), 320.0);
        assert_eq!(widget_height(900.0), 500.0);
    }
}
