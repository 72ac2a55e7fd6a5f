use std::cell::{Cell, RefCell};
use std::rc::Rc;

use manos_prose_model::{Attrs, EditorState};

use crate::dom::{Rect, Size};
use crate::form::{Field, Form};
use crate::view::{EditorView, WeakView};

/// The host element backing the floating overlay.
pub trait OverlaySurface {
    /// Inserts the element next to the editable surface.
    fn attach(&self);

    fn detach(&self);

    fn render_form(&self, form: &Form);

    fn clear(&self);

    fn set_visible(&self, visible: bool);

    fn measure(&self) -> Size;

    /// Moves the element to `left`/`top` relative to the editable surface.
    fn place(&self, left: f64, top: f64);
}

/// Offset of an overlay of `size` from the surface origin: above the cursor
/// line when there is room for it, otherwise just below the line, never past
/// the surface's right edge.
pub fn place_overlay(surface: Rect, cursor: Rect, size: Size) -> (f64, f64) {
    let mut top = (surface.top - cursor.top).abs();
    let mut left = cursor.left - surface.left;

    if top < size.height {
        top += (cursor.bottom - cursor.top).abs();
    } else {
        top -= size.height;
    }
    if left + size.width >= surface.width() {
        left = surface.width() - size.width;
    }
    (left.max(0.0), top)
}

struct OverlayInner {
    surface: Rc<dyn OverlaySurface>,
    view: RefCell<WeakView>,
    attached: Cell<bool>,
    shown: Cell<bool>,
    size: Cell<Size>,
    mounted: RefCell<Option<Form>>,
}

/// Single transient panel anchored to the selection. At most one form is
/// mounted at a time; mounting replaces the previous one.
#[derive(Clone)]
pub struct FloatingOverlay(Rc<OverlayInner>);

impl FloatingOverlay {
    pub fn new(surface: Rc<dyn OverlaySurface>) -> Self {
        Self(Rc::new(OverlayInner {
            surface,
            view: RefCell::new(WeakView::default()),
            attached: Cell::new(false),
            shown: Cell::new(false),
            size: Cell::new(Size::default()),
            mounted: RefCell::new(None),
        }))
    }

    pub fn attach(&self, view: &EditorView) {
        *self.0.view.borrow_mut() = view.downgrade();
        if self.0.attached.replace(true) {
            return;
        }
        self.0.surface.attach();
        tracing::debug!("overlay attached");
    }

    pub fn is_attached(&self) -> bool {
        self.0.attached.get()
    }

    pub fn is_shown(&self) -> bool {
        self.0.shown.get()
    }

    pub fn is_mounted(&self) -> bool {
        self.0.mounted.borrow().is_some()
    }

    pub fn mounted_title(&self) -> Option<String> {
        self.0.mounted.borrow().as_ref().map(|f| f.title.clone())
    }

    pub fn mounted_fields(&self) -> Option<Vec<Field>> {
        self.0.mounted.borrow().as_ref().map(|f| f.fields.clone())
    }

    pub fn mount(&self, form: Form) {
        if self.is_mounted() {
            self.unmount();
        }
        self.0.surface.render_form(&form);
        *self.0.mounted.borrow_mut() = Some(form);
        self.0.shown.set(true);
        self.0.surface.set_visible(true);
        self.0.size.set(self.0.surface.measure());
        self.update_position();
    }

    /// Hides and clears the panel. Safe to call when nothing is mounted.
    pub fn unmount(&self) {
        self.0.shown.set(false);
        self.0.surface.set_visible(false);
        self.0.surface.clear();
        self.0.mounted.borrow_mut().take();
    }

    /// Entry point for the form surface: unmounts, then hands `values` to the
    /// mounted form. Ignored when nothing is mounted.
    pub fn submit(&self, values: Attrs) {
        let form = self.0.mounted.borrow_mut().take();
        self.unmount();
        match form {
            Some(form) => form.submit(values),
            None => tracing::debug!("overlay submit without a mounted form"),
        }
    }

    /// Closes a shown panel once the selection moves.
    pub fn on_view_update(&self, view: &EditorView, prev: &EditorState) {
        *self.0.view.borrow_mut() = view.downgrade();
        if !self.0.shown.get() {
            return;
        }
        if view.state().selection() != prev.selection() {
            self.unmount();
            self.update_position();
        }
    }

    pub fn detach(&self) {
        if !self.0.attached.replace(false) {
            return;
        }
        self.unmount();
        self.0.surface.detach();
        tracing::debug!("overlay detached");
    }

    fn update_position(&self) {
        let Some(view) = self.0.view.borrow().upgrade() else {
            return;
        };
        let state = view.state();
        let cursor = view.coords_at(state.selection().from());
        let (left, top) = place_overlay(view.surface_rect(), cursor, self.0.size.get());
        self.0.surface.place(left, top);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn surface() -> Rect {
        Rect::new(100.0, 50.0, 700.0, 650.0)
    }

    #[test]
    fn goes_above_the_cursor_when_there_is_room() {
        let cursor = Rect::new(150.0, 300.0, 151.0, 320.0);
        let size = Size {
            width: 200.0,
            height: 120.0,
        };
        assert_eq!(place_overlay(surface(), cursor, size), (50.0, 130.0));
    }

    #[test]
    fn drops_below_the_line_near_the_top() {
        let cursor = Rect::new(150.0, 60.0, 151.0, 80.0);
        let size = Size {
            width: 200.0,
            height: 120.0,
        };
        assert_eq!(place_overlay(surface(), cursor, size), (50.0, 30.0));
    }

    #[test]
    fn clamps_to_the_right_edge() {
        let cursor = Rect::new(650.0, 300.0, 651.0, 320.0);
        let size = Size {
            width: 200.0,
            height: 100.0,
        };
        let (left, _) = place_overlay(surface(), cursor, size);
        assert_eq!(left, 400.0);
    }
}
