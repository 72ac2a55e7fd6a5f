use manos_prose_model::NodeSpec;
use serde_json::json;

use crate::commands::{lift_list_item, sink_list_item, split_list_item, toggle_list};
use crate::extension::{Extension, ExtensionKind, KeymapContext, SchemaFragment};
use crate::keymap::Keymap;

pub const LIST_ITEM: &str = "list_item";

/// A list node holding `item` children, toggled with `toggle_key`.
struct ListSpec<'a> {
    item: &'a str,
    toggle_key: &'a str,
    ordered: bool,
}

impl ListSpec<'_> {
    fn schema(&self) -> SchemaFragment {
        let spec = NodeSpec::new()
            .content(format!("{}+", self.item))
            .group("block")
            .defining();
        let spec = if self.ordered {
            spec.attr("order", json!(1))
        } else {
            spec
        };
        SchemaFragment::Node(spec)
    }

    fn keymap(&self, list_kind: &str) -> Keymap {
        Keymap::new().bind(self.toggle_key, "", toggle_list(list_kind, self.item))
    }
}

/// `ol`, numbered from its `order` attribute.
pub struct OrderedList {
    item: String,
}

impl Default for OrderedList {
    fn default() -> Self {
        Self::new(LIST_ITEM)
    }
}

impl OrderedList {
    pub fn new(item: impl Into<String>) -> Self {
        Self { item: item.into() }
    }

    fn spec(&self) -> ListSpec<'_> {
        ListSpec {
            item: &self.item,
            toggle_key: "Mod-Alt-9",
            ordered: true,
        }
    }
}

impl Extension for OrderedList {
    fn name(&self) -> &str {
        "ordered_list"
    }

    fn kind(&self) -> ExtensionKind {
        ExtensionKind::Node
    }

    fn schema(&self) -> Option<SchemaFragment> {
        Some(self.spec().schema())
    }

    fn keymap(&self, ctx: &KeymapContext<'_>) -> Keymap {
        self.spec().keymap(ctx.type_name(self.name()))
    }
}

pub struct UnorderedList {
    item: String,
}

impl Default for UnorderedList {
    fn default() -> Self {
        Self::new(LIST_ITEM)
    }
}

impl UnorderedList {
    pub fn new(item: impl Into<String>) -> Self {
        Self { item: item.into() }
    }

    fn spec(&self) -> ListSpec<'_> {
        ListSpec {
            item: &self.item,
            toggle_key: "Mod-Alt-8",
            ordered: false,
        }
    }
}

impl Extension for UnorderedList {
    fn name(&self) -> &str {
        "unordered_list"
    }

    fn kind(&self) -> ExtensionKind {
        ExtensionKind::Node
    }

    fn schema(&self) -> Option<SchemaFragment> {
        Some(self.spec().schema())
    }

    fn keymap(&self, ctx: &KeymapContext<'_>) -> Keymap {
        self.spec().keymap(ctx.type_name(self.name()))
    }
}

pub struct ListItem;

impl Extension for ListItem {
    fn name(&self) -> &str {
        LIST_ITEM
    }

    fn kind(&self) -> ExtensionKind {
        ExtensionKind::Node
    }

    fn schema(&self) -> Option<SchemaFragment> {
        Some(SchemaFragment::Node(
            NodeSpec::new().content("paragraph block*").defining(),
        ))
    }

    fn keymap(&self, ctx: &KeymapContext<'_>) -> Keymap {
        let item = ctx.type_name(self.name());
        Keymap::new()
            .bind("Enter", "Split the list item", split_list_item(item))
            .bind("Tab", "Nest the list item", sink_list_item(item))
            .bind("Shift-Tab", "Lift the list item out of its list", lift_list_item(item))
    }
}
