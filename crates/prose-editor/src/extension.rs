use std::cell::OnceCell;
use std::rc::Rc;
use std::sync::Arc;

use manos_prose_model::{MarkSpec, MarkType, NodeSpec, NodeType, Schema};
use serde::{Deserialize, Serialize};

use crate::keymap::Keymap;
use crate::node_view::NodeViewFactory;
use crate::plugin::Plugin;
use crate::view::{EditorView, WeakView};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtensionKind {
    Node,
    Mark,
    Plugin,
}

/// The schema entry an extension contributes under its name.
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaFragment {
    Node(NodeSpec),
    Mark(MarkSpec),
}

/// Handed to [`Extension::keymap`] once the schema exists. `node_type` or
/// `mark_type` is the resolved type registered under the extension's name.
pub struct KeymapContext<'a> {
    pub node_type: Option<&'a NodeType>,
    pub mark_type: Option<&'a MarkType>,
    pub schema: &'a Arc<Schema>,
}

impl<'a> KeymapContext<'a> {
    pub(crate) fn new(name: &str, kind: ExtensionKind, schema: &'a Arc<Schema>) -> Self {
        let (node_type, mark_type) = match kind {
            ExtensionKind::Node => (schema.node(name), None),
            ExtensionKind::Mark => (None, schema.mark(name)),
            ExtensionKind::Plugin => (None, None),
        };
        Self {
            node_type,
            mark_type,
            schema,
        }
    }

    /// Name of the resolved node or mark type, falling back to `fallback`.
    pub fn type_name<'b>(&'b self, fallback: &'b str) -> &'b str {
        self.node_type
            .map(|t| t.name.as_str())
            .or_else(|| self.mark_type.map(|t| t.name.as_str()))
            .unwrap_or(fallback)
    }
}

pub struct InitContext {
    pub view: WeakView,
}

/// A named unit contributing schema, plugins, key bindings, a node view and
/// an init hook. Only `name` and `kind` are required.
pub trait Extension {
    fn name(&self) -> &str;

    fn kind(&self) -> ExtensionKind;

    fn schema(&self) -> Option<SchemaFragment> {
        None
    }

    fn plugins(&self) -> Vec<Rc<dyn Plugin>> {
        Vec::new()
    }

    fn keymap(&self, _ctx: &KeymapContext<'_>) -> Keymap {
        Keymap::new()
    }

    fn init(&self, _ctx: &InitContext) {}

    fn node_view(&self) -> Option<Rc<dyn NodeViewFactory>> {
        None
    }
}

/// Late-bound, non-owning reference to the view, set once by `init`.
/// Handlers created before the view exists clone this and resolve it when
/// they run.
#[derive(Clone, Default)]
pub struct ViewSlot(Rc<OnceCell<WeakView>>);

impl ViewSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores the view. Later calls are ignored.
    pub fn set(&self, view: WeakView) {
        if self.0.set(view).is_err() {
            tracing::debug!("view already bound");
        }
    }

    pub fn get(&self) -> Option<EditorView> {
        self.0.get()?.upgrade()
    }

    pub fn weak(&self) -> Option<WeakView> {
        self.0.get().cloned()
    }
}
