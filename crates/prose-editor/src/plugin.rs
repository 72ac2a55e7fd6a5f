use std::cell::OnceCell;
use std::collections::HashMap;

use manos_prose_model::{EditorState, Path, Point, Transaction};
use serde::{Deserialize, Serialize};

use crate::keymap::{KeyBinding, KeyEvent, Keymap, lookup, normalize_key_name};
use crate::options::Platform;
use crate::view::EditorView;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Decoration {
    /// Styles the text between two points.
    Inline { from: Point, to: Point, class: String },
    /// Styles the node at `path`.
    Node { path: Path, class: String },
}

impl Decoration {
    pub fn class(&self) -> &str {
        match self {
            Decoration::Inline { class, .. } | Decoration::Node { class, .. } => class,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClickEvent {
    #[serde(default)]
    pub alt: bool,
    #[serde(default)]
    pub ctrl: bool,
    #[serde(default)]
    pub meta: bool,
    #[serde(default)]
    pub shift: bool,
}

/// Hooks into the view's event handling and transaction flow. Every method
/// has a no-op default.
pub trait Plugin {
    fn key(&self) -> &str;

    fn handle_key_down(&self, _view: &EditorView, _event: &KeyEvent) -> bool {
        false
    }

    fn handle_click(&self, _view: &EditorView, _point: &Point, _event: &ClickEvent) -> bool {
        false
    }

    fn decorations(&self, _state: &EditorState) -> Vec<Decoration> {
        Vec::new()
    }

    /// Observes each applied transaction.
    fn apply(&self, _tx: &Transaction, _old: &EditorState, _new: &EditorState) {}

    fn view_attached(&self, _view: &EditorView) {}

    fn view_updated(&self, _view: &EditorView, _prev: &EditorState) {}

    fn view_destroyed(&self) {}
}

/// Runs key bindings. Names are normalized against the view's platform the
/// first time a key reaches the plugin.
pub struct KeymapPlugin {
    key: String,
    keymap: Keymap,
    bindings: OnceCell<HashMap<String, KeyBinding>>,
}

impl KeymapPlugin {
    pub fn new(key: impl Into<String>, keymap: Keymap) -> Self {
        Self {
            key: key.into(),
            keymap,
            bindings: OnceCell::new(),
        }
    }

    pub fn keymap(&self) -> &Keymap {
        &self.keymap
    }

    fn bindings(&self, platform: Platform) -> &HashMap<String, KeyBinding> {
        self.bindings.get_or_init(|| {
            let mut out = HashMap::new();
            for (name, binding) in self.keymap.iter() {
                match normalize_key_name(name, platform) {
                    Ok(name) => {
                        out.insert(name, binding.clone());
                    }
                    Err(err) => tracing::warn!(plugin = %self.key, %err, "skipping key binding"),
                }
            }
            out
        })
    }
}

impl Plugin for KeymapPlugin {
    fn key(&self) -> &str {
        &self.key
    }

    fn handle_key_down(&self, view: &EditorView, event: &KeyEvent) -> bool {
        for binding in lookup(self.bindings(view.platform()), event) {
            let state = view.state();
            let dispatch = |tx: Transaction| view.dispatch(tx);
            if (binding.handler)(&state, Some(&dispatch)) {
                tracing::trace!(plugin = %self.key, key = %event.key, "key handled");
                return true;
            }
        }
        false
    }
}
