use manos_prose_model::{Attrs, NodeSpec, TOP_NODE, TEXT_KIND};
use serde_json::json;

use crate::commands::{set_block_type, toggle_wrap};
use crate::extension::{Extension, ExtensionKind, KeymapContext, SchemaFragment};
use crate::keymap::Keymap;

pub struct Doc;

impl Extension for Doc {
    fn name(&self) -> &str {
        TOP_NODE
    }

    fn kind(&self) -> ExtensionKind {
        ExtensionKind::Node
    }

    fn schema(&self) -> Option<SchemaFragment> {
        Some(SchemaFragment::Node(NodeSpec::new().content("block+")))
    }
}

pub struct Text;

impl Extension for Text {
    fn name(&self) -> &str {
        TEXT_KIND
    }

    fn kind(&self) -> ExtensionKind {
        ExtensionKind::Node
    }

    fn schema(&self) -> Option<SchemaFragment> {
        Some(SchemaFragment::Node(NodeSpec::new().group("inline").inline()))
    }
}

/// The fallback textblock. Carries `align` so the align plugin can target it.
pub struct Paragraph;

impl Extension for Paragraph {
    fn name(&self) -> &str {
        "paragraph"
    }

    fn kind(&self) -> ExtensionKind {
        ExtensionKind::Node
    }

    fn schema(&self) -> Option<SchemaFragment> {
        Some(SchemaFragment::Node(
            NodeSpec::new()
                .content("inline*")
                .group("block")
                .attr("align", json!("")),
        ))
    }

    fn keymap(&self, ctx: &KeymapContext<'_>) -> Keymap {
        Keymap::new().bind(
            "Mod-G",
            "Toggle block type to paragraph",
            set_block_type(ctx.type_name(self.name()), Attrs::new()),
        )
    }
}

/// Headings at the configured levels, each bound to `Mod-Alt-<level>`.
pub struct Heading {
    levels: Vec<u8>,
}

impl Default for Heading {
    fn default() -> Self {
        Self {
            levels: (1..=6).collect(),
        }
    }
}

impl Heading {
    pub fn new(levels: impl IntoIterator<Item = u8>) -> Self {
        let levels: Vec<u8> = levels.into_iter().collect();
        if levels.is_empty() {
            return Self::default();
        }
        Self { levels }
    }

    pub fn levels(&self) -> &[u8] {
        &self.levels
    }
}

impl Extension for Heading {
    fn name(&self) -> &str {
        "heading"
    }

    fn kind(&self) -> ExtensionKind {
        ExtensionKind::Node
    }

    fn schema(&self) -> Option<SchemaFragment> {
        let first = self.levels.first().copied().unwrap_or(1);
        Some(SchemaFragment::Node(
            NodeSpec::new()
                .content("inline*")
                .group("block")
                .marks("")
                .attr("level", json!(first))
                .attr("align", json!(""))
                .defining(),
        ))
    }

    fn keymap(&self, ctx: &KeymapContext<'_>) -> Keymap {
        let kind = ctx.type_name(self.name());
        self.levels.iter().fold(Keymap::new(), |keymap, level| {
            let attrs: Attrs = [("level".to_string(), json!(level))].into_iter().collect();
            keymap.bind(
                format!("Mod-Alt-{level}"),
                format!("Toggle block type to h{level}"),
                set_block_type(kind, attrs),
            )
        })
    }
}

pub struct Blockquote;

impl Extension for Blockquote {
    fn name(&self) -> &str {
        "blockquote"
    }

    fn kind(&self) -> ExtensionKind {
        ExtensionKind::Node
    }

    fn schema(&self) -> Option<SchemaFragment> {
        Some(SchemaFragment::Node(
            NodeSpec::new().content("block*").group("block").defining(),
        ))
    }

    fn keymap(&self, ctx: &KeymapContext<'_>) -> Keymap {
        Keymap::new().bind(
            "Mod->",
            "Toggle block to quote",
            toggle_wrap(ctx.type_name(self.name())),
        )
    }
}
