use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::rc::{Rc, Weak};
use std::sync::Arc;

use manos_prose_model::{EditorState, Mapping, Node, Path, Point, Schema, Transaction, textblock};

use crate::commands::insert_text;
use crate::dom::{Direction, Rect};
use crate::keymap::KeyEvent;
use crate::node_view::{NodePosition, NodeView, NodeViewContext, NodeViewFactory};
use crate::options::Platform;
use crate::plugin::{ClickEvent, Decoration, Plugin};

/// The surface the editor renders into.
pub trait ViewHost {
    fn render(&self, state: &EditorState, decorations: &[Decoration]);

    fn focus(&self);

    fn has_focus(&self) -> bool;

    /// Bounding box of the editable surface.
    fn surface_rect(&self) -> Rect;

    /// Screen box of the caret at `point`.
    fn coords_at(&self, state: &EditorState, point: &Point) -> Rect;

    /// Whether moving the cursor in `dir` would leave its textblock.
    fn end_of_textblock(&self, state: &EditorState, dir: Direction) -> bool;
}

struct MountedView {
    kind: String,
    position: NodePosition,
    view: Rc<dyn NodeView>,
}

struct ViewInner {
    state: RefCell<EditorState>,
    host: Rc<dyn ViewHost>,
    platform: Platform,
    plugins: Vec<Rc<dyn Plugin>>,
    factories: HashMap<String, Rc<dyn NodeViewFactory>>,
    node_views: RefCell<Vec<MountedView>>,
    queue: RefCell<VecDeque<Transaction>>,
    dispatching: Cell<bool>,
    destroyed: Cell<bool>,
}

/// Shared handle to the interactive view. Owns the current state; every
/// change goes through [`EditorView::dispatch`].
#[derive(Clone)]
pub struct EditorView(Rc<ViewInner>);

/// Non-owning handle for back-references from extensions and node views.
#[derive(Clone, Default)]
pub struct WeakView(Weak<ViewInner>);

impl WeakView {
    pub fn upgrade(&self) -> Option<EditorView> {
        self.0.upgrade().map(EditorView)
    }
}

impl EditorView {
    pub fn new(
        state: EditorState,
        host: Rc<dyn ViewHost>,
        plugins: Vec<Rc<dyn Plugin>>,
        factories: HashMap<String, Rc<dyn NodeViewFactory>>,
        platform: Platform,
    ) -> Self {
        let view = EditorView(Rc::new(ViewInner {
            state: RefCell::new(state.clone()),
            host,
            platform,
            plugins,
            factories,
            node_views: RefCell::new(Vec::new()),
            queue: RefCell::new(VecDeque::new()),
            dispatching: Cell::new(false),
            destroyed: Cell::new(false),
        }));

        view.create_missing_node_views(&state, Vec::new());
        view.render();
        for plugin in &view.0.plugins {
            plugin.view_attached(&view);
        }
        tracing::debug!(
            plugins = view.0.plugins.len(),
            node_views = view.0.node_views.borrow().len(),
            "view attached"
        );
        view
    }

    pub fn downgrade(&self) -> WeakView {
        WeakView(Rc::downgrade(&self.0))
    }

    pub fn state(&self) -> EditorState {
        self.0.state.borrow().clone()
    }

    pub fn schema(&self) -> Arc<Schema> {
        self.0.state.borrow().schema().clone()
    }

    pub fn platform(&self) -> Platform {
        self.0.platform
    }

    pub fn is_destroyed(&self) -> bool {
        self.0.destroyed.get()
    }

    /// Applies `tx`. A dispatch issued while another one is being applied is
    /// queued and runs once the current one finishes.
    pub fn dispatch(&self, tx: Transaction) {
        if self.0.destroyed.get() {
            tracing::debug!("dispatch after destroy ignored");
            return;
        }
        self.0.queue.borrow_mut().push_back(tx);
        if self.0.dispatching.replace(true) {
            return;
        }
        loop {
            let next = self.0.queue.borrow_mut().pop_front();
            let Some(tx) = next else {
                break;
            };
            self.apply_transaction(tx);
        }
        self.0.dispatching.set(false);
    }

    fn apply_transaction(&self, tx: Transaction) {
        let prev = self.state();
        let (next, mapping) = match prev.apply_with_mapping(tx.clone()) {
            Ok(applied) => applied,
            Err(err) => {
                tracing::warn!(%err, source = ?tx.meta.source, "transaction rejected");
                return;
            }
        };
        *self.0.state.borrow_mut() = next.clone();
        tracing::trace!(source = ?tx.meta.source, version = next.version(), "transaction applied");

        for plugin in &self.0.plugins {
            plugin.apply(&tx, &prev, &next);
        }
        if tx.doc_changed() || !mapping.is_empty() {
            self.reconcile_node_views(&next, &mapping);
        }
        self.forward_selection(&next);
        self.render();
        for plugin in &self.0.plugins {
            plugin.view_updated(self, &prev);
        }
    }

    fn reconcile_node_views(&self, state: &EditorState, mapping: &Mapping) {
        let mounted = std::mem::take(&mut *self.0.node_views.borrow_mut());
        let mut kept = Vec::with_capacity(mounted.len());
        for entry in mounted {
            let path = entry.position.get().and_then(|p| mapping.map_path(&p));
            let node = path.as_deref().and_then(|p| state.doc().element_at(p));
            match (path, node) {
                (Some(path), Some(el)) if el.kind == entry.kind && entry.view.update(el) => {
                    entry.position.set(path);
                    kept.push(entry);
                }
                _ => {
                    tracing::debug!(kind = %entry.kind, "destroying node view");
                    entry.position.clear();
                    entry.view.destroy();
                }
            }
        }
        self.create_missing_node_views(state, kept);
    }

    fn create_missing_node_views(&self, state: &EditorState, mut mounted: Vec<MountedView>) {
        let mut missing: Vec<(Path, Node)> = Vec::new();
        state.doc().descendants(|node, path| {
            let Node::Element(el) = node else {
                return;
            };
            if !self.0.factories.contains_key(&el.kind) {
                return;
            }
            let exists = mounted
                .iter()
                .any(|m| m.position.get().as_deref() == Some(path));
            if !exists {
                missing.push((path.to_vec(), node.clone()));
            }
        });

        for (path, node) in missing {
            let (Node::Element(el), Some(factory)) = (&node, self.0.factories.get(node.kind()))
            else {
                continue;
            };
            let position = NodePosition::new(path);
            let view = factory.create(
                el,
                NodeViewContext {
                    view: self.downgrade(),
                    position: position.clone(),
                },
            );
            tracing::debug!(kind = %el.kind, "created node view");
            mounted.push(MountedView {
                kind: el.kind.clone(),
                position,
                view,
            });
        }
        *self.0.node_views.borrow_mut() = mounted;
    }

    /// Hands the selection to the node view whose node contains it.
    fn forward_selection(&self, state: &EditorState) {
        let selection = state.selection();
        let Some((path, view)) = self.node_view_holding(selection.from().block_path()) else {
            return;
        };
        if selection.to().block_path() != path.as_slice() {
            return;
        }
        let Some(el) = state.doc().element_at(&path) else {
            return;
        };
        let offset = |point: &Point| {
            textblock::point_global_offset(&el.children, point.leaf_index(), point.offset)
        };
        view.set_selection(offset(&selection.anchor), offset(&selection.focus));
    }

    fn node_view_holding(&self, block_path: &[usize]) -> Option<(Path, Rc<dyn NodeView>)> {
        self.0.node_views.borrow().iter().find_map(|m| {
            let path = m.position.get()?;
            block_path
                .starts_with(&path)
                .then(|| (path, m.view.clone()))
        })
    }

    pub fn node_view_at(&self, path: &[usize]) -> Option<Rc<dyn NodeView>> {
        self.0
            .node_views
            .borrow()
            .iter()
            .find(|m| m.position.get().as_deref() == Some(path))
            .map(|m| m.view.clone())
    }

    pub fn node_view_count(&self) -> usize {
        self.0.node_views.borrow().len()
    }

    pub fn decorations(&self) -> Vec<Decoration> {
        let state = self.state();
        self.0
            .plugins
            .iter()
            .flat_map(|plugin| plugin.decorations(&state))
            .collect()
    }

    fn render(&self) {
        let state = self.state();
        let decorations = self.decorations();
        self.0.host.render(&state, &decorations);
    }

    /// Offers a key press to node views, then to plugins in order. `false`
    /// leaves the event to the host.
    pub fn handle_key_down(&self, event: &KeyEvent) -> bool {
        if self.0.destroyed.get() {
            return false;
        }
        let views: Vec<Rc<dyn NodeView>> =
            self.0.node_views.borrow().iter().map(|m| m.view.clone()).collect();
        if views.iter().any(|v| v.stop_event(event)) {
            return false;
        }
        self.0
            .plugins
            .iter()
            .any(|plugin| plugin.handle_key_down(self, event))
    }

    pub fn handle_click(&self, point: &Point, event: &ClickEvent) -> bool {
        if self.0.destroyed.get() {
            return false;
        }
        self.0
            .plugins
            .iter()
            .any(|plugin| plugin.handle_click(self, point, event))
    }

    /// Routes a click on an element inside the node view at `path`.
    pub fn handle_node_view_click(&self, path: &[usize], target: &str) -> bool {
        match self.node_view_at(path) {
            Some(view) => view.handle_click(target),
            None => false,
        }
    }

    /// Text typed into the editable surface.
    pub fn handle_text_input(&self, text: &str) -> bool {
        let state = self.state();
        let dispatch = |tx: Transaction| self.dispatch(tx);
        insert_text(text)(&state, Some(&dispatch))
    }

    pub fn notify_resize(&self) {
        let views: Vec<Rc<dyn NodeView>> =
            self.0.node_views.borrow().iter().map(|m| m.view.clone()).collect();
        for view in views {
            view.resize();
        }
    }

    pub fn focus(&self) {
        self.0.host.focus();
    }

    pub fn has_focus(&self) -> bool {
        self.0.host.has_focus()
    }

    pub fn end_of_textblock(&self, dir: Direction) -> bool {
        let state = self.state();
        self.0.host.end_of_textblock(&state, dir)
    }

    pub fn coords_at(&self, point: &Point) -> Rect {
        let state = self.state();
        self.0.host.coords_at(&state, point)
    }

    pub fn surface_rect(&self) -> Rect {
        self.0.host.surface_rect()
    }

    /// Destroys node views and notifies plugins. Later dispatches are ignored.
    pub fn destroy(&self) {
        if self.0.destroyed.replace(true) {
            return;
        }
        let mounted = std::mem::take(&mut *self.0.node_views.borrow_mut());
        for entry in mounted {
            entry.position.clear();
            entry.view.destroy();
        }
        for plugin in &self.0.plugins {
            plugin.view_destroyed();
        }
        tracing::debug!("view destroyed");
    }
}
