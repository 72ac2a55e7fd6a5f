use std::rc::Rc;

use manos_prose_model::{Attrs, NodeSpec};
use serde_json::json;

use crate::commands::{is_in_parent_node_of_type, set_block_type};
use crate::extension::{Extension, ExtensionKind, InitContext, KeymapContext, SchemaFragment, ViewSlot};
use crate::form::{Field, Form, MetadataSource, submit_node_attrs};
use crate::keymap::{KeyHandler, Keymap, key_handler};
use crate::node_view::{EmbedViewFactory, ImageViewFactory, NodeViewFactory};
use crate::plugin::{KeymapPlugin, Plugin};

use super::plugins::escape_keymap;

pub const EMBED: &str = "embed";
pub const IMAGE: &str = "image";

fn figure_spec() -> NodeSpec {
    NodeSpec::new()
        .content("text*")
        .group("block")
        .attr("src", json!(""))
        .defining()
        .draggable()
}

fn empty_src() -> Attrs {
    [("src".to_string(), json!(""))].into_iter().collect()
}

/// Builds a handler that asks for new attributes of the enclosing `kind`
/// node through `source`. `fields` turns the node's current attributes into
/// the form fields.
fn metadata_handler(
    kind: &'static str,
    source: MetadataSource,
    slot: ViewSlot,
    title: &'static str,
    submit_text: &'static str,
    fields: fn(&Attrs) -> Vec<Field>,
) -> KeyHandler {
    key_handler(move |state, dispatch| {
        let Some(node) = is_in_parent_node_of_type(state, kind) else {
            return false;
        };
        if dispatch.is_none() {
            return true;
        }
        let Some(view) = slot.weak() else {
            tracing::debug!(kind, "metadata requested before init");
            return false;
        };

        let captured = state.id();
        let path = node.path;
        source.request(Form::new(title, submit_text, fields(&node.node.attrs), move |values| {
            if let Some(view) = view.upgrade() {
                submit_node_attrs(&view, captured, path, values);
            }
        }));
        true
    })
}

fn attr_string(attrs: &Attrs, name: &str) -> String {
    attrs
        .get(name)
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string()
}

/// Captioned external frame identified by `src`.
pub struct Embed {
    metadata: MetadataSource,
    view: ViewSlot,
}

impl Embed {
    pub fn new(metadata: MetadataSource) -> Self {
        Self {
            metadata,
            view: ViewSlot::new(),
        }
    }
}

impl Extension for Embed {
    fn name(&self) -> &str {
        EMBED
    }

    fn kind(&self) -> ExtensionKind {
        ExtensionKind::Node
    }

    fn schema(&self) -> Option<SchemaFragment> {
        Some(SchemaFragment::Node(figure_spec()))
    }

    fn keymap(&self, _ctx: &KeymapContext<'_>) -> Keymap {
        let update = metadata_handler(
            EMBED,
            self.metadata.clone(),
            self.view.clone(),
            "Update embed url",
            "Update",
            |attrs| {
                vec![
                    Field::text("Enter embed source", "src", attr_string(attrs, "src"))
                        .prompt("Please enter the embed url"),
                ]
            },
        );
        Keymap::new()
            .bind(
                "Mod-Alt-e",
                "Toggle block type to/from embed",
                set_block_type(EMBED, empty_src()),
            )
            .bind("Mod-Alt-E", "Update metadata of embed block", update)
    }

    /// ArrowUp and ArrowLeft leave the caption.
    fn plugins(&self) -> Vec<Rc<dyn Plugin>> {
        let keymap = escape_keymap(&self.view, &[EMBED.to_string()]);
        vec![Rc::new(KeymapPlugin::new(EMBED, keymap))]
    }

    fn init(&self, ctx: &InitContext) {
        self.view.set(ctx.view.clone());
    }

    fn node_view(&self) -> Option<Rc<dyn NodeViewFactory>> {
        Some(Rc::new(EmbedViewFactory))
    }
}

/// Captioned image with `src` and `alt`.
pub struct Image {
    metadata: MetadataSource,
    view: ViewSlot,
}

impl Image {
    pub fn new(metadata: MetadataSource) -> Self {
        Self {
            metadata,
            view: ViewSlot::new(),
        }
    }

    fn metadata_handler(&self) -> KeyHandler {
        metadata_handler(
            IMAGE,
            self.metadata.clone(),
            self.view.clone(),
            "Update image data",
            "Update",
            |attrs| {
                vec![
                    Field::text("Enter image url", "src", attr_string(attrs, "src"))
                        .prompt("Please enter the image url"),
                    Field::text("Enter alt text for the image", "alt", attr_string(attrs, "alt"))
                        .prompt("Please enter the alt text for the image"),
                ]
            },
        )
    }
}

impl Extension for Image {
    fn name(&self) -> &str {
        IMAGE
    }

    fn kind(&self) -> ExtensionKind {
        ExtensionKind::Node
    }

    fn schema(&self) -> Option<SchemaFragment> {
        Some(SchemaFragment::Node(figure_spec().attr("alt", json!(""))))
    }

    fn keymap(&self, _ctx: &KeymapContext<'_>) -> Keymap {
        Keymap::new()
            .bind(
                "Mod-Alt-m",
                "Create an image block",
                set_block_type(IMAGE, empty_src()),
            )
            .bind("Mod-Alt-M", "Update image metadata", self.metadata_handler())
    }

    fn init(&self, ctx: &InitContext) {
        self.view.set(ctx.view.clone());
    }

    fn node_view(&self) -> Option<Rc<dyn NodeViewFactory>> {
        Some(Rc::new(ImageViewFactory::new(self.metadata_handler())))
    }
}
