//! In-memory collaborators for running the editor without a DOM: a view host
//! with a fixed character grid, an overlay surface that records what it was
//! asked to show, a rope-backed code widget and a scripted prompt.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use manos_prose_model::{Document, EditorState, Point, textblock};
use ropey::{LineType, Rope};
use serde::Serialize;

use crate::dom::{Direction, Rect, Size};
use crate::error::WidgetError;
use crate::form::{BlockingPrompt, Field, Form};
use crate::keymap::KeyEvent;
use crate::node_view::{CodeWidget, CodeWidgetFactory, CodeWidgetOptions, WidgetEvent, WidgetListener};
use crate::overlay::OverlaySurface;
use crate::plugin::Decoration;
use crate::view::ViewHost;

pub const CHAR_WIDTH: f64 = 8.0;
pub const LINE_HEIGHT: f64 = 20.0;

const HOST_FOCUS: usize = 0;

/// Which element holds keyboard focus: the editable surface or one widget.
#[derive(Clone, Debug, Default)]
pub struct FocusRing {
    owner: Rc<Cell<usize>>,
    next: Rc<Cell<usize>>,
}

impl FocusRing {
    fn register(&self) -> usize {
        let id = self.next.get() + 1;
        self.next.set(id);
        id
    }

    fn focus(&self, id: usize) {
        self.owner.set(id);
    }

    fn has_focus(&self, id: usize) -> bool {
        self.owner.get() == id
    }
}

/// [`ViewHost`] laying text out on a grid of [`CHAR_WIDTH`] by
/// [`LINE_HEIGHT`] cells, one textblock per line.
pub struct HeadlessHost {
    focus: FocusRing,
    surface: Cell<Rect>,
    renders: Cell<usize>,
    doc: RefCell<Option<Document>>,
    decorations: RefCell<Vec<Decoration>>,
}

impl Default for HeadlessHost {
    fn default() -> Self {
        Self::new()
    }
}

impl HeadlessHost {
    pub fn new() -> Self {
        Self {
            focus: FocusRing::default(),
            surface: Cell::new(Rect::new(100.0, 50.0, 700.0, 650.0)),
            renders: Cell::new(0),
            doc: RefCell::new(None),
            decorations: RefCell::new(Vec::new()),
        }
    }

    pub fn focus_ring(&self) -> FocusRing {
        self.focus.clone()
    }

    pub fn set_surface(&self, rect: Rect) {
        self.surface.set(rect);
    }

    pub fn render_count(&self) -> usize {
        self.renders.get()
    }

    pub fn rendered_doc(&self) -> Option<Document> {
        self.doc.borrow().clone()
    }

    pub fn decorations(&self) -> Vec<Decoration> {
        self.decorations.borrow().clone()
    }

    fn row_and_column(state: &EditorState, point: &Point) -> (usize, usize) {
        let blocks = textblock::textblocks_in_order(state.doc(), state.schema());
        let row = blocks
            .iter()
            .position(|b| b.path.as_slice() == point.block_path())
            .unwrap_or(0);
        let column = blocks.get(row).map_or(0, |b| {
            textblock::point_global_offset(&b.el.children, point.leaf_index(), point.offset)
        });
        (row, column)
    }
}

impl ViewHost for HeadlessHost {
    fn render(&self, state: &EditorState, decorations: &[Decoration]) {
        self.renders.set(self.renders.get() + 1);
        *self.doc.borrow_mut() = Some(state.doc().clone());
        *self.decorations.borrow_mut() = decorations.to_vec();
    }

    fn focus(&self) {
        self.focus.focus(HOST_FOCUS);
    }

    fn has_focus(&self) -> bool {
        self.focus.has_focus(HOST_FOCUS)
    }

    fn surface_rect(&self) -> Rect {
        self.surface.get()
    }

    fn coords_at(&self, state: &EditorState, point: &Point) -> Rect {
        let surface = self.surface.get();
        let (row, column) = Self::row_and_column(state, point);
        let left = surface.left + column as f64 * CHAR_WIDTH;
        let top = surface.top + row as f64 * LINE_HEIGHT;
        Rect::new(left, top, left + 1.0, top + LINE_HEIGHT)
    }

    fn end_of_textblock(&self, state: &EditorState, dir: Direction) -> bool {
        let selection = state.selection();
        if !selection.is_collapsed() {
            return false;
        }
        let head = &selection.focus;
        let Some(block) = state.doc().element_at(head.block_path()) else {
            return false;
        };
        let offset =
            textblock::point_global_offset(&block.children, head.leaf_index(), head.offset);
        match dir {
            Direction::Left | Direction::Up => offset == 0,
            Direction::Right | Direction::Down => offset == textblock::textblock_len(&block.children),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum OverlayEvent {
    Attached,
    Detached,
    Rendered { title: String, fields: Vec<Field> },
    Cleared,
    Visible { visible: bool },
    Placed { left: f64, top: f64 },
}

/// [`OverlaySurface`] recording every call. Clones share the log.
#[derive(Clone)]
pub struct HeadlessOverlaySurface {
    size: Size,
    log: Rc<RefCell<Vec<OverlayEvent>>>,
}

impl HeadlessOverlaySurface {
    pub fn new(size: Size) -> Self {
        Self {
            size,
            log: Rc::default(),
        }
    }

    pub fn events(&self) -> Vec<OverlayEvent> {
        self.log.borrow().clone()
    }

    pub fn last_placement(&self) -> Option<(f64, f64)> {
        self.log.borrow().iter().rev().find_map(|event| match event {
            OverlayEvent::Placed { left, top } => Some((*left, *top)),
            _ => None,
        })
    }

    fn push(&self, event: OverlayEvent) {
        self.log.borrow_mut().push(event);
    }
}

impl Default for HeadlessOverlaySurface {
    fn default() -> Self {
        Self::new(Size {
            width: 240.0,
            height: 120.0,
        })
    }
}

impl OverlaySurface for HeadlessOverlaySurface {
    fn attach(&self) {
        self.push(OverlayEvent::Attached);
    }

    fn detach(&self) {
        self.push(OverlayEvent::Detached);
    }

    fn render_form(&self, form: &Form) {
        self.push(OverlayEvent::Rendered {
            title: form.title.clone(),
            fields: form.fields.clone(),
        });
    }

    fn clear(&self) {
        self.push(OverlayEvent::Cleared);
    }

    fn set_visible(&self, visible: bool) {
        self.push(OverlayEvent::Visible { visible });
    }

    fn measure(&self) -> Size {
        self.size
    }

    fn place(&self, left: f64, top: f64) {
        self.push(OverlayEvent::Placed { left, top });
    }
}

/// [`BlockingPrompt`] answering from a queue; `None` entries cancel. Runs
/// out as cancellation.
#[derive(Default)]
pub struct ScriptedPrompt {
    answers: RefCell<VecDeque<Option<String>>>,
    asked: RefCell<Vec<(String, String)>>,
}

impl ScriptedPrompt {
    pub fn new<I>(answers: I) -> Self
    where
        I: IntoIterator<Item = Option<&'static str>>,
    {
        Self {
            answers: RefCell::new(answers.into_iter().map(|a| a.map(str::to_string)).collect()),
            asked: RefCell::default(),
        }
    }

    /// `(message, default)` of every prompt shown so far.
    pub fn asked(&self) -> Vec<(String, String)> {
        self.asked.borrow().clone()
    }
}

impl BlockingPrompt for ScriptedPrompt {
    fn prompt(&self, message: &str, default: &str) -> Option<String> {
        self.asked
            .borrow_mut()
            .push((message.to_string(), default.to_string()));
        self.answers.borrow_mut().pop_front().flatten()
    }
}

type SharedListener = Rc<dyn Fn(&WidgetEvent) -> bool>;

/// Rope-backed [`CodeWidget`] with helpers that simulate a user typing,
/// moving the cursor and pressing keys.
pub struct HeadlessCodeWidget {
    id: usize,
    focus: FocusRing,
    text: RefCell<Rope>,
    selection: Cell<(usize, usize)>,
    language: RefCell<String>,
    line_numbers: Cell<bool>,
    height: Cell<f64>,
    listeners: RefCell<Vec<SharedListener>>,
    fail_dispose: Cell<bool>,
    disposed: Cell<bool>,
}

impl HeadlessCodeWidget {
    pub fn new(options: CodeWidgetOptions, focus: FocusRing) -> Self {
        Self {
            id: focus.register(),
            focus,
            text: RefCell::new(Rope::from_str(&options.value)),
            selection: Cell::new((0, 0)),
            language: RefCell::new(options.language),
            line_numbers: Cell::new(options.line_numbers),
            height: Cell::new(0.0),
            listeners: RefCell::default(),
            fail_dispose: Cell::new(false),
            disposed: Cell::new(false),
        }
    }

    /// Notifies listeners in registration order; `true` when one claimed the
    /// event. No borrow is held while listeners run.
    fn emit(&self, event: WidgetEvent) -> bool {
        let listeners: Vec<SharedListener> = self.listeners.borrow().clone();
        let mut claimed = false;
        for listener in listeners {
            claimed |= listener(&event);
        }
        claimed
    }

    fn clamp(&self, offset: usize) -> usize {
        let text = self.text.borrow();
        let mut offset = offset.min(text.len());
        while !text.is_char_boundary(offset) {
            offset -= 1;
        }
        offset
    }

    fn replace(&self, from: usize, to: usize, text: &str) {
        let (from, to) = (self.clamp(from), self.clamp(to.max(from)));
        {
            let mut rope = self.text.borrow_mut();
            rope.remove(from..to);
            rope.insert(from, text);
        }
        let map = |offset: usize| {
            if offset >= to {
                offset - (to - from) + text.len()
            } else if offset > from {
                from + text.len()
            } else {
                offset
            }
        };
        let (anchor, head) = self.selection.get();
        self.selection.set((map(anchor), map(head)));
    }

    fn line_start(&self, line: usize) -> usize {
        self.text.borrow().line_to_byte_idx(line, LineType::LF)
    }

    pub fn language(&self) -> String {
        self.language.borrow().clone()
    }

    pub fn line_numbers(&self) -> bool {
        self.line_numbers.get()
    }

    pub fn height(&self) -> f64 {
        self.height.get()
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.get()
    }

    pub fn set_fail_dispose(&self, fail: bool) {
        self.fail_dispose.set(fail);
    }

    /// Gives the widget keyboard focus, as a click into it would.
    pub fn click(&self) {
        self.focus.focus(self.id);
        self.emit(WidgetEvent::Focus);
    }

    pub fn blur(&self) {
        if self.has_focus() {
            self.focus.focus(HOST_FOCUS);
        }
        self.emit(WidgetEvent::Blur);
    }

    /// Replaces the selection with `text` the way typing does.
    pub fn type_text(&self, text: &str) {
        self.emit(WidgetEvent::WillType);
        let (anchor, head) = self.selection.get();
        let (from, to) = (anchor.min(head), anchor.max(head));
        self.replace(from, to, text);
        let end = from + text.len();
        self.selection.set((end, end));
        self.emit(WidgetEvent::ContentChanged);
    }

    /// Offers `event` to listeners first; unclaimed arrows move the cursor,
    /// Enter and Backspace edit. Returns whether a listener claimed it.
    pub fn press(&self, event: KeyEvent) -> bool {
        if self.emit(WidgetEvent::KeyDown(event.clone())) {
            return true;
        }
        if event.ctrl || event.meta || event.alt {
            return false;
        }
        let (_, head) = self.selection.get();
        let (line, column) = self.cursor();
        let moved = match event.key.as_str() {
            "ArrowLeft" => Some(self.prev_char(head)),
            "ArrowRight" => Some(self.next_char(head)),
            "ArrowUp" if line > 0 => {
                Some(self.line_start(line - 1) + column.min(self.line_len(line - 1)))
            }
            "ArrowDown" if line + 1 < self.line_count() => {
                Some(self.line_start(line + 1) + column.min(self.line_len(line + 1)))
            }
            "Enter" => {
                self.type_text("\n");
                None
            }
            "Backspace" => {
                let (anchor, head) = self.selection.get();
                let from = if anchor == head { self.prev_char(head) } else { anchor.min(head) };
                self.emit(WidgetEvent::WillType);
                self.replace(from, anchor.max(head), "");
                self.selection.set((from, from));
                self.emit(WidgetEvent::ContentChanged);
                None
            }
            _ => None,
        };
        if let Some(offset) = moved {
            let offset = self.clamp(offset);
            self.selection.set((offset, offset));
            self.emit(WidgetEvent::CursorMoved);
        }
        false
    }

    fn prev_char(&self, offset: usize) -> usize {
        if offset == 0 {
            return 0;
        }
        self.clamp(offset - 1)
    }

    fn next_char(&self, offset: usize) -> usize {
        let text = self.text.borrow();
        let mut next = (offset + 1).min(text.len());
        while !text.is_char_boundary(next) {
            next += 1;
        }
        next
    }
}

impl CodeWidget for HeadlessCodeWidget {
    fn value(&self) -> String {
        self.text.borrow().to_string()
    }

    fn apply_edit(&self, from: usize, to: usize, text: &str) {
        self.replace(from, to, text);
        self.emit(WidgetEvent::ContentChanged);
    }

    fn selection(&self) -> (usize, usize) {
        self.selection.get()
    }

    fn set_selection(&self, anchor: usize, head: usize) {
        self.selection.set((self.clamp(anchor), self.clamp(head)));
        self.emit(WidgetEvent::CursorMoved);
    }

    fn cursor(&self) -> (usize, usize) {
        let (_, head) = self.selection.get();
        let line = self.text.borrow().byte_to_line_idx(head, LineType::LF);
        (line, head - self.line_start(line))
    }

    fn line_count(&self) -> usize {
        self.text.borrow().len_lines(LineType::LF)
    }

    fn line_len(&self, line: usize) -> usize {
        let text = self.text.borrow();
        if line >= text.len_lines(LineType::LF) {
            return 0;
        }
        let slice = text.line(line, LineType::LF);
        let len = slice.len();
        if len > 0 && slice.is_char_boundary(len - 1) && slice.char(len - 1) == '\n' {
            len - 1
        } else {
            len
        }
    }

    fn has_focus(&self) -> bool {
        self.focus.has_focus(self.id)
    }

    fn focus(&self) {
        if self.has_focus() {
            return;
        }
        self.focus.focus(self.id);
        self.emit(WidgetEvent::Focus);
    }

    fn set_language(&self, language: &str) {
        *self.language.borrow_mut() = language.to_string();
    }

    fn set_line_numbers(&self, on: bool) {
        self.line_numbers.set(on);
    }

    fn content_height(&self) -> f64 {
        self.line_count() as f64 * LINE_HEIGHT
    }

    fn set_height(&self, height: f64) {
        self.height.set(height);
    }

    fn layout(&self) {}

    fn on_event(&self, listener: WidgetListener) {
        self.listeners.borrow_mut().push(Rc::from(listener));
    }

    fn dispose(&self) -> Result<(), WidgetError> {
        self.listeners.borrow_mut().clear();
        self.disposed.set(true);
        if self.fail_dispose.get() {
            return Err(WidgetError::new("widget already detached"));
        }
        Ok(())
    }
}

/// Creates [`HeadlessCodeWidget`]s sharing the host's focus and keeps them
/// reachable for tests.
pub struct HeadlessWidgetFactory {
    focus: FocusRing,
    created: RefCell<Vec<Rc<HeadlessCodeWidget>>>,
}

impl HeadlessWidgetFactory {
    pub fn new(focus: FocusRing) -> Self {
        Self {
            focus,
            created: RefCell::default(),
        }
    }

    pub fn widgets(&self) -> Vec<Rc<HeadlessCodeWidget>> {
        self.created.borrow().clone()
    }

    pub fn last(&self) -> Option<Rc<HeadlessCodeWidget>> {
        self.created.borrow().last().cloned()
    }
}

impl CodeWidgetFactory for HeadlessWidgetFactory {
    fn create(&self, options: CodeWidgetOptions) -> Rc<dyn CodeWidget> {
        let widget = Rc::new(HeadlessCodeWidget::new(options, self.focus.clone()));
        self.created.borrow_mut().push(widget.clone());
        widget
    }
}
