//! Turns a list of extensions into a running editor: schema, plugins,
//! keymap, initial state, view, then each extension's `init`.

use std::collections::HashMap;
use std::rc::Rc;
use std::sync::Arc;

use manos_prose_model::{
    Document, EditorState, MarkSpec, NodeSpec, Op, ProseValue, Schema, SchemaSpec, Selection,
    Transaction, first_text_point,
};

use crate::error::AssemblyError;
use crate::extension::{Extension, ExtensionKind, InitContext, KeymapContext, SchemaFragment};
use crate::extensions::{BaseKeymap, History};
use crate::keymap::{KeyDescription, KeyEvent, KeyNameError, Keymap};
use crate::node_view::NodeViewFactory;
use crate::options::{CollisionPolicy, EditorOptions, Platform};
use crate::plugin::{KeymapPlugin, Plugin};
use crate::view::{EditorView, ViewHost};

/// Extensions prepended unless [`EditorOptions::use_default_extensions`] is off.
pub fn default_extensions() -> Vec<Rc<dyn Extension>> {
    vec![Rc::new(BaseKeymap), Rc::new(History)]
}

/// Ordered name map where a repeated name is resolved by `policy`. A
/// replaced entry keeps its original position.
fn insert_named<T>(
    entries: &mut Vec<(String, T)>,
    name: &str,
    value: T,
    policy: CollisionPolicy,
) -> Result<(), AssemblyError> {
    let Some(existing) = entries.iter_mut().find(|(n, _)| n == name) else {
        entries.push((name.to_string(), value));
        return Ok(());
    };
    tracing::warn!(name, ?policy, "schema name defined twice");
    match policy {
        CollisionPolicy::LastWriteWins => existing.1 = value,
        CollisionPolicy::FirstWriteWins => {}
        CollisionPolicy::Error => return Err(AssemblyError::DuplicateName(name.to_string())),
    }
    Ok(())
}

/// Unified schema from the node and mark fragments, in extension order.
pub fn build_schema(
    extensions: &[Rc<dyn Extension>],
    policy: CollisionPolicy,
) -> Result<Arc<Schema>, AssemblyError> {
    let mut nodes: Vec<(String, NodeSpec)> = Vec::new();
    let mut marks: Vec<(String, MarkSpec)> = Vec::new();
    for ext in extensions {
        match (ext.kind(), ext.schema()) {
            (ExtensionKind::Node, Some(SchemaFragment::Node(spec))) => {
                insert_named(&mut nodes, ext.name(), spec, policy)?
            }
            (ExtensionKind::Mark, Some(SchemaFragment::Mark(spec))) => {
                insert_named(&mut marks, ext.name(), spec, policy)?
            }
            (kind, Some(_)) => {
                tracing::warn!(name = ext.name(), ?kind, "ignoring schema fragment of the wrong kind")
            }
            (_, None) => {}
        }
    }
    let schema = Schema::new(SchemaSpec { nodes, marks })?;
    tracing::debug!(
        nodes = schema.nodes().len(),
        marks = schema.marks().len(),
        "schema built"
    );
    Ok(Arc::new(schema))
}

/// Auxiliary plugins of every extension, in registration order.
pub fn build_plugins(extensions: &[Rc<dyn Extension>]) -> Vec<Rc<dyn Plugin>> {
    let plugins: Vec<Rc<dyn Plugin>> = extensions.iter().flat_map(|ext| ext.plugins()).collect();
    tracing::debug!(plugins = plugins.len(), "plugins built");
    plugins
}

/// Every extension's key bindings merged under normalized names.
pub fn build_keymap(
    extensions: &[Rc<dyn Extension>],
    schema: &Arc<Schema>,
    platform: Platform,
    policy: CollisionPolicy,
) -> Result<Keymap, AssemblyError> {
    let mut merged = Keymap::new();
    let mut owners: HashMap<String, String> = HashMap::new();
    for ext in extensions {
        let ctx = KeymapContext::new(ext.name(), ext.kind(), schema);
        let fragment = ext.keymap(&ctx).normalized(platform)?;
        let keys: Vec<String> = fragment.keys().map(str::to_string).collect();

        let collisions = merged.merge(fragment, policy).map_err(|key| {
            AssemblyError::KeyCollision {
                first: owners.get(&key).cloned().unwrap_or_default(),
                second: ext.name().to_string(),
                key,
            }
        })?;
        for key in &collisions {
            tracing::warn!(
                key = key.as_str(),
                first = owners.get(key).map(String::as_str).unwrap_or_default(),
                second = ext.name(),
                ?policy,
                "key bound twice"
            );
        }
        for key in keys {
            if policy == CollisionPolicy::FirstWriteWins && owners.contains_key(&key) {
                continue;
            }
            owners.insert(key, ext.name().to_string());
        }
    }
    tracing::debug!(bindings = merged.len(), "keymap built");
    Ok(merged)
}

/// Document from either a [`ProseValue`] envelope or a bare document.
fn parse_doc(value: serde_json::Value) -> Result<Document, AssemblyError> {
    Ok(ProseValue::from_json_value(value)?.into_document())
}

/// A running editor assembled from extensions.
pub struct Editor {
    view: EditorView,
    keymap: Keymap,
    extensions: Vec<Rc<dyn Extension>>,
    options: EditorOptions,
}

impl Editor {
    pub fn new(
        host: Rc<dyn ViewHost>,
        extensions: Vec<Rc<dyn Extension>>,
        options: EditorOptions,
    ) -> Result<Self, AssemblyError> {
        let extensions: Vec<Rc<dyn Extension>> = if options.use_default_extensions {
            default_extensions().into_iter().chain(extensions).collect()
        } else {
            extensions
        };
        let policy = options.collision_policy;

        let schema = build_schema(&extensions, policy)?;
        let auxiliary = build_plugins(&extensions);
        let keymap = build_keymap(&extensions, &schema, options.platform, policy)?;

        let doc = options.doc.clone().map(parse_doc).transpose()?;
        let state = EditorState::create(schema, doc, options.engine)?;

        let mut plugins: Vec<Rc<dyn Plugin>> = Vec::with_capacity(auxiliary.len() + 1);
        plugins.push(Rc::new(KeymapPlugin::new("keymap", keymap.clone())));
        plugins.extend(auxiliary);

        let mut factories: HashMap<String, Rc<dyn NodeViewFactory>> = HashMap::new();
        for ext in &extensions {
            if ext.kind() != ExtensionKind::Node {
                continue;
            }
            if let Some(factory) = ext.node_view() {
                factories.insert(ext.name().to_string(), factory);
            }
        }

        let view = EditorView::new(state, host, plugins, factories, options.platform);
        let ctx = InitContext {
            view: view.downgrade(),
        };
        for ext in &extensions {
            ext.init(&ctx);
        }
        tracing::debug!(extensions = extensions.len(), "editor assembled");

        Ok(Self {
            view,
            keymap,
            extensions,
            options,
        })
    }

    pub fn view(&self) -> &EditorView {
        &self.view
    }

    pub fn state(&self) -> EditorState {
        self.view.state()
    }

    pub fn schema(&self) -> Arc<Schema> {
        self.view.schema()
    }

    pub fn options(&self) -> &EditorOptions {
        &self.options
    }

    pub fn extension_names(&self) -> Vec<&str> {
        self.extensions.iter().map(|ext| ext.name()).collect()
    }

    /// Normalized key combinations and their descriptions, for a help surface.
    pub fn key_bindings(&self) -> Vec<KeyDescription> {
        self.keymap.descriptions()
    }

    /// Sends the key combination `combo` (e.g. `Mod-Alt-2`) through the view.
    pub fn press(&self, combo: &str) -> Result<bool, KeyNameError> {
        let event = KeyEvent::from_combo(combo, self.options.platform)?;
        Ok(self.view.handle_key_down(&event))
    }

    /// Replaces the whole document. The change is not undoable and clears
    /// the history.
    pub fn set_doc(&self, value: serde_json::Value) -> Result<(), AssemblyError> {
        let doc = parse_doc(value)?;
        let state = self.view.state();
        // Validate up front so a bad document is reported instead of logged.
        let probe = EditorState::create(state.schema().clone(), Some(doc), state.config())?;

        let old_len = state.doc().children.len();
        let new_children = probe.doc().children.clone();
        let new_len = new_children.len();
        let mut ops: Vec<Op> = new_children
            .into_iter()
            .enumerate()
            .map(|(ix, node)| Op::InsertNode {
                path: vec![ix],
                node,
            })
            .collect();
        ops.extend((0..old_len).map(|_| Op::RemoveNode {
            path: vec![new_len],
        }));

        let mut tx = Transaction::new(ops).without_history().source("editor:set_doc");
        if let Some(point) = first_text_point(probe.doc()) {
            tx = tx.selection_after(Selection::collapsed(point));
        }
        self.view.dispatch(tx);
        Ok(())
    }

    /// The current document in its persisted JSON form.
    pub fn to_json(&self) -> Result<String, AssemblyError> {
        let doc = self.view.state().doc().clone();
        Ok(ProseValue::from_document(doc).to_json_pretty()?)
    }

    pub fn destroy(&self) {
        self.view.destroy();
    }
}
