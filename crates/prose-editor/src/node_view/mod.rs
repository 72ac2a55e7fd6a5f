//! Custom rendering for complex block nodes. The view creates one
//! [`NodeView`] per on-screen node whose type has a factory, keeps its
//! [`NodePosition`] current across edits and destroys it when the node leaves
//! the document or changes type.

mod code_block;
mod figure;

use std::cell::RefCell;
use std::rc::Rc;

use manos_prose_model::{ElementNode, Path};

pub use code_block::*;
pub use figure::*;

use crate::dom::DomElement;
use crate::keymap::KeyEvent;
use crate::view::WeakView;

pub trait NodeView {
    /// Current rendering of the node.
    fn dom(&self) -> DomElement;

    /// Element the editor renders the node's own content into, if any.
    fn content_dom(&self) -> Option<DomElement> {
        self.dom().content_element().cloned()
    }

    /// Reconciles with a new value of the same node. `false` asks the view to
    /// destroy this instance and create a fresh one.
    fn update(&self, node: &ElementNode) -> bool;

    /// The editor selection moved inside this node; offsets are flat byte
    /// offsets into the node's text.
    fn set_selection(&self, _anchor: usize, _head: usize) {}

    /// A click on the element carrying `data-action="<target>"`.
    fn handle_click(&self, _target: &str) -> bool {
        false
    }

    /// Whether the view keeps `event` to itself instead of letting the
    /// editor handle it.
    fn stop_event(&self, _event: &KeyEvent) -> bool {
        false
    }

    /// The window was resized.
    fn resize(&self) {}

    fn destroy(&self) {}
}

/// Live position of a node view's node. Cleared once the view is destroyed.
#[derive(Clone, Debug, Default)]
pub struct NodePosition(Rc<RefCell<Option<Path>>>);

impl NodePosition {
    pub fn new(path: Path) -> Self {
        Self(Rc::new(RefCell::new(Some(path))))
    }

    pub fn get(&self) -> Option<Path> {
        self.0.borrow().clone()
    }

    pub(crate) fn set(&self, path: Path) {
        *self.0.borrow_mut() = Some(path);
    }

    pub(crate) fn clear(&self) {
        self.0.borrow_mut().take();
    }
}

pub struct NodeViewContext {
    pub view: WeakView,
    pub position: NodePosition,
}

pub trait NodeViewFactory {
    fn create(&self, node: &ElementNode, ctx: NodeViewContext) -> Rc<dyn NodeView>;
}
