use manos_prose_model::{Attrs, MarkSpec};

use crate::commands::toggle_mark;
use crate::extension::{Extension, ExtensionKind, KeymapContext, SchemaFragment};
use crate::keymap::Keymap;

/// An attribute-less mark toggled by a single key.
pub struct SimpleMark {
    name: &'static str,
    key: &'static str,
    description: &'static str,
}

impl SimpleMark {
    pub const fn new(name: &'static str, key: &'static str, description: &'static str) -> Self {
        Self {
            name,
            key,
            description,
        }
    }

    pub const fn bold() -> Self {
        Self::new("bold", "Mod-b", "Toggle the selection to/from bold")
    }

    pub const fn italic() -> Self {
        Self::new("italic", "Mod-i", "Toggle the selection to/from italic")
    }

    pub const fn underline() -> Self {
        Self::new("underline", "Mod-u", "Underline selected text")
    }

    pub const fn inline_code() -> Self {
        Self::new(
            "inline_code",
            "Mod-Alt-?",
            "Toggle the selection to/from inline code",
        )
    }
}

impl Extension for SimpleMark {
    fn name(&self) -> &str {
        self.name
    }

    fn kind(&self) -> ExtensionKind {
        ExtensionKind::Mark
    }

    fn schema(&self) -> Option<SchemaFragment> {
        Some(SchemaFragment::Mark(MarkSpec::new()))
    }

    fn keymap(&self, ctx: &KeymapContext<'_>) -> Keymap {
        Keymap::new().bind(
            self.key,
            self.description,
            toggle_mark(ctx.type_name(self.name), Attrs::new()),
        )
    }
}
