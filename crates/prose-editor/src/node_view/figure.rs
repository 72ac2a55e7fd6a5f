use std::cell::{Cell, RefCell};
use std::rc::Rc;

use manos_prose_model::{ElementNode, Transaction};

use super::{NodeView, NodeViewContext, NodeViewFactory};
use crate::dom::DomElement;
use crate::keymap::KeyHandler;
use crate::view::WeakView;

pub const SHOW_FRAME_ACTION: &str = "show";
pub const ADD_IMAGE_ACTION: &str = "add-image-url";

fn figure(data_attr: &str, src: &str, panel: DomElement) -> DomElement {
    DomElement::new("figure")
        .attr(data_attr, src)
        .child(panel)
        .child(DomElement::new("figcaption").content_slot())
}

/// Captioned external frame. The frame stays hidden behind an info panel
/// until the reader asks for it.
pub struct EmbedView {
    node: RefCell<ElementNode>,
    show_frame: Cell<bool>,
}

impl EmbedView {
    pub fn new(node: &ElementNode) -> Self {
        Self {
            node: RefCell::new(node.clone()),
            show_frame: Cell::new(false),
        }
    }

    pub fn is_frame_shown(&self) -> bool {
        self.show_frame.get()
    }

    fn panel(&self, src: &str) -> DomElement {
        let panel = DomElement::new("div").class("iframe-container");
        if src.is_empty() {
            return panel.child(
                DomElement::new("p")
                    .class("embed-info")
                    .text("Add embed url by pressing the relevant shortcut"),
            );
        }
        if self.show_frame.get() {
            return panel.child(
                DomElement::new("iframe")
                    .attr("src", src)
                    .attr("allowfullscreen", "true")
                    .attr("width", "400")
                    .attr("height", "200"),
            );
        }
        panel.child(
            DomElement::new("p")
                .class("embed-info")
                .child(DomElement::new("code").text(src))
                .child(DomElement::new("br"))
                .child(
                    DomElement::new("button")
                        .attr("data-action", SHOW_FRAME_ACTION)
                        .text("Show"),
                ),
        )
    }
}

impl NodeView for EmbedView {
    fn dom(&self) -> DomElement {
        let node = self.node.borrow();
        let src = node.attr_str("src");
        figure("data-embed", src, self.panel(src))
    }

    fn update(&self, node: &ElementNode) -> bool {
        if node.kind != self.node.borrow().kind {
            return false;
        }
        *self.node.borrow_mut() = node.clone();
        true
    }

    fn handle_click(&self, target: &str) -> bool {
        if target != SHOW_FRAME_ACTION || self.node.borrow().attr_str("src").is_empty() {
            return false;
        }
        self.show_frame.set(true);
        true
    }
}

#[derive(Default)]
pub struct EmbedViewFactory;

impl NodeViewFactory for EmbedViewFactory {
    fn create(&self, node: &ElementNode, _ctx: NodeViewContext) -> Rc<dyn NodeView> {
        Rc::new(EmbedView::new(node))
    }
}

/// Captioned image. Without a source it shows a call-to-action that runs the
/// image metadata command.
pub struct ImageView {
    node: RefCell<ElementNode>,
    view: WeakView,
    request_metadata: KeyHandler,
}

impl ImageView {
    pub fn new(node: &ElementNode, view: WeakView, request_metadata: KeyHandler) -> Self {
        Self {
            node: RefCell::new(node.clone()),
            view,
            request_metadata,
        }
    }
}

impl NodeView for ImageView {
    fn dom(&self) -> DomElement {
        let node = self.node.borrow();
        let src = node.attr_str("src");
        let panel = DomElement::new("div").class("image-container");
        let panel = if src.is_empty() {
            panel.child(
                DomElement::new("p").class("image-info").child(
                    DomElement::new("button")
                        .attr("data-action", ADD_IMAGE_ACTION)
                        .text("Add image URL"),
                ),
            )
        } else {
            panel.child(
                DomElement::new("img")
                    .attr("src", src)
                    .attr("alt", node.attr_str("alt")),
            )
        };
        figure("data-image", src, panel)
    }

    fn update(&self, node: &ElementNode) -> bool {
        if node.kind != self.node.borrow().kind {
            return false;
        }
        *self.node.borrow_mut() = node.clone();
        true
    }

    fn handle_click(&self, target: &str) -> bool {
        if target != ADD_IMAGE_ACTION {
            return false;
        }
        let Some(view) = self.view.upgrade() else {
            return false;
        };
        let dispatch = |tx: Transaction| view.dispatch(tx);
        (self.request_metadata)(&view.state(), Some(&dispatch))
    }
}

pub struct ImageViewFactory {
    request_metadata: KeyHandler,
}

impl ImageViewFactory {
    pub fn new(request_metadata: KeyHandler) -> Self {
        Self { request_metadata }
    }
}

impl NodeViewFactory for ImageViewFactory {
    fn create(&self, node: &ElementNode, ctx: NodeViewContext) -> Rc<dyn NodeView> {
        Rc::new(ImageView::new(
            node,
            ctx.view,
            self.request_metadata.clone(),
        ))
    }
}
