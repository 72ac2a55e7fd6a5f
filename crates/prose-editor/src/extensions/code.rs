use std::rc::Rc;

use manos_prose_model::{Attrs, Bias, NodeSpec, Selection, Transaction};
use serde_json::json;

use crate::commands::{is_in_parent_node_of_type, toggle_block_type};
use crate::dom::Direction;
use crate::extension::{Extension, ExtensionKind, InitContext, KeymapContext, SchemaFragment, ViewSlot};
use crate::form::{Field, Form, MetadataSource, submit_node_attrs};
use crate::keymap::{KeyHandler, Keymap, key_handler};
use crate::node_view::{CodeBlockKeys, CodeBlockViewFactory, CodeWidgetFactory, NodeViewFactory};

pub const CODE: &str = "code";

/// Code blocks. With a widget factory each block is edited through an
/// embedded [`CodeWidget`](crate::node_view::CodeWidget) and arrow keys move
/// the cursor into it from the neighbouring blocks.
pub struct CodeBlock {
    metadata: MetadataSource,
    widgets: Option<Rc<dyn CodeWidgetFactory>>,
    view: ViewSlot,
    fallback: String,
}

impl CodeBlock {
    pub fn new(metadata: MetadataSource) -> Self {
        Self {
            metadata,
            widgets: None,
            view: ViewSlot::new(),
            fallback: "paragraph".to_string(),
        }
    }

    pub fn with_widgets(mut self, widgets: Rc<dyn CodeWidgetFactory>) -> Self {
        self.widgets = Some(widgets);
        self
    }

    /// Block type `Mod-Alt-/` switches back to.
    pub fn fallback(mut self, kind: impl Into<String>) -> Self {
        self.fallback = kind.into();
        self
    }

    fn toggle_handler(&self) -> KeyHandler {
        toggle_block_type(CODE, &self.fallback, Attrs::new())
    }

    /// Opens the language / line number form for the enclosing code block.
    fn metadata_handler(&self) -> KeyHandler {
        let source = self.metadata.clone();
        let slot = self.view.clone();
        key_handler(move |state, dispatch| {
            let Some(code) = is_in_parent_node_of_type(state, CODE) else {
                return false;
            };
            if dispatch.is_none() {
                return true;
            }
            let Some(view) = slot.weak() else {
                tracing::debug!("code metadata requested before init");
                return false;
            };

            let captured = state.id();
            let path = code.path;
            let fields = vec![
                Field::text("Code language", "language", code.node.attr_str("language"))
                    .prompt("Please enter the language for the code block"),
                Field::boolean(
                    "Show line numbers",
                    "showLineNumbers",
                    code.node.attr_bool("showLineNumbers"),
                ),
            ];
            source.request(Form::new("Update code metadata", "Done", fields, move |values| {
                if let Some(view) = view.upgrade() {
                    submit_node_attrs(&view, captured, path, values);
                }
            }));
            true
        })
    }

    /// Moves the cursor into an adjacent code block when it is about to leave
    /// its textblock in `dir`.
    fn enter_handler(&self, dir: Direction) -> KeyHandler {
        let slot = self.view.clone();
        key_handler(move |state, dispatch| {
            let selection = state.selection();
            if !selection.is_collapsed() {
                return false;
            }
            let Some(view) = slot.get() else {
                return false;
            };
            if !view.end_of_textblock(dir) {
                return false;
            }
            let bias = if dir.sign() < 0 {
                Bias::Backward
            } else {
                Bias::Forward
            };
            let block = selection.focus.block_path();
            let Some(next) = Selection::near(state.doc(), block, bias) else {
                return false;
            };
            let target = next.focus.block_path();
            if state.doc().element_at(target).is_none_or(|el| el.kind != CODE) {
                return false;
            }
            if let Some(dispatch) = dispatch {
                dispatch(Transaction::select(next).source("code_block:enter"));
            }
            true
        })
    }
}

impl Extension for CodeBlock {
    fn name(&self) -> &str {
        CODE
    }

    fn kind(&self) -> ExtensionKind {
        ExtensionKind::Node
    }

    fn schema(&self) -> Option<SchemaFragment> {
        Some(SchemaFragment::Node(
            NodeSpec::new()
                .content("text*")
                .marks("")
                .group("block")
                .attr("language", json!(""))
                .attr("showLineNumbers", json!(true))
                .code()
                .defining()
                .isolating()
                .draggable(),
        ))
    }

    fn keymap(&self, _ctx: &KeymapContext<'_>) -> Keymap {
        let keymap = Keymap::new()
            .bind("Mod-Alt-/", "Toggle block type to/from code", self.toggle_handler())
            .bind(
                "Mod-Alt-L",
                "Set language and other metadata of a code block",
                self.metadata_handler(),
            );
        if self.widgets.is_none() {
            return keymap;
        }
        keymap
            .bind("ArrowLeft", "", self.enter_handler(Direction::Left))
            .bind("ArrowRight", "", self.enter_handler(Direction::Right))
            .bind("ArrowUp", "", self.enter_handler(Direction::Up))
            .bind("ArrowDown", "", self.enter_handler(Direction::Down))
    }

    fn init(&self, ctx: &InitContext) {
        self.view.set(ctx.view.clone());
    }

    fn node_view(&self) -> Option<Rc<dyn NodeViewFactory>> {
        let widgets = self.widgets.clone()?;
        let keys = CodeBlockKeys {
            metadata: Some(self.metadata_handler()),
            toggle: Some(self.toggle_handler()),
        };
        Some(Rc::new(CodeBlockViewFactory::new(widgets, keys)))
    }
}
