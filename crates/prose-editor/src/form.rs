use std::fmt;
use std::rc::Rc;

use manos_prose_model::{Attrs, Path};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::commands::set_node_attrs;
use crate::overlay::FloatingOverlay;
use crate::view::EditorView;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Text,
    Boolean,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub kind: FieldKind,
    pub label: String,
    pub name: String,
    pub value: Value,
    /// Question asked by a blocking prompt; the label is used when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
}

impl Field {
    pub fn text(label: impl Into<String>, name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            kind: FieldKind::Text,
            label: label.into(),
            name: name.into(),
            value: Value::String(value.into()),
            prompt: None,
        }
    }

    pub fn boolean(label: impl Into<String>, name: impl Into<String>, value: bool) -> Self {
        Self {
            kind: FieldKind::Boolean,
            label: label.into(),
            name: name.into(),
            value: Value::Bool(value),
            prompt: None,
        }
    }

    pub fn prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = Some(prompt.into());
        self
    }

    /// `value` as this field's JSON type: strings for text fields, booleans
    /// for boolean fields.
    fn coerce(&self, value: Value) -> Value {
        match (self.kind, value) {
            (FieldKind::Text, Value::String(s)) => Value::String(s),
            (FieldKind::Text, Value::Null) => Value::String(String::new()),
            (FieldKind::Text, other) => Value::String(other.to_string()),
            (FieldKind::Boolean, Value::Bool(b)) => Value::Bool(b),
            (FieldKind::Boolean, Value::String(s)) => Value::Bool(s == "true" || s == "on"),
            (FieldKind::Boolean, other) => Value::Bool(!other.is_null()),
        }
    }
}

pub type SubmitHandler = Box<dyn FnOnce(Attrs)>;

/// A field set shown to the user, with the callback receiving the
/// name-keyed values on submission.
pub struct Form {
    pub title: String,
    pub submit_text: String,
    pub fields: Vec<Field>,
    on_submit: SubmitHandler,
}

impl fmt::Debug for Form {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Form")
            .field("title", &self.title)
            .field("submit_text", &self.submit_text)
            .field("fields", &self.fields)
            .finish_non_exhaustive()
    }
}

impl Form {
    pub fn new(
        title: impl Into<String>,
        submit_text: impl Into<String>,
        fields: Vec<Field>,
        on_submit: impl FnOnce(Attrs) + 'static,
    ) -> Self {
        Self {
            title: title.into(),
            submit_text: submit_text.into(),
            fields,
            on_submit: Box::new(on_submit),
        }
    }

    /// Current value of every field.
    pub fn values(&self) -> Attrs {
        self.fields
            .iter()
            .map(|field| (field.name.clone(), field.value.clone()))
            .collect()
    }

    /// Runs the callback with `values` merged over the current field values.
    /// Names that are not fields are dropped.
    pub fn submit(self, mut values: Attrs) {
        let merged: Attrs = self
            .fields
            .iter()
            .map(|field| {
                let value = values
                    .remove(&field.name)
                    .unwrap_or_else(|| field.value.clone());
                (field.name.clone(), field.coerce(value))
            })
            .collect();
        (self.on_submit)(merged);
    }
}

/// Native modal text prompt. `None` when the user cancels.
pub trait BlockingPrompt {
    fn prompt(&self, message: &str, default: &str) -> Option<String>;
}

/// How metadata forms reach the user, decided once at construction.
#[derive(Clone)]
pub enum MetadataSource {
    Overlay(FloatingOverlay),
    Prompt(Rc<dyn BlockingPrompt>),
}

impl MetadataSource {
    /// Shows `form`. Through a blocking prompt each text field is asked in
    /// turn; cancelling any prompt, or leaving the first text field empty or
    /// unchanged, drops the form without submitting.
    pub fn request(&self, form: Form) {
        match self {
            MetadataSource::Overlay(overlay) => overlay.mount(form),
            MetadataSource::Prompt(prompt) => {
                let mut values = form.values();
                let mut primary = true;
                for field in form.fields.iter().filter(|f| f.kind == FieldKind::Text) {
                    let current = field.value.as_str().unwrap_or_default();
                    let message = field.prompt.as_deref().unwrap_or(&field.label);
                    let Some(answer) = prompt.prompt(message, current) else {
                        tracing::debug!(form = %form.title, "prompt cancelled");
                        return;
                    };
                    if primary && (answer.is_empty() || answer == current) {
                        tracing::debug!(form = %form.title, "prompt left unchanged");
                        return;
                    }
                    primary = false;
                    values.insert(field.name.clone(), Value::String(answer));
                }
                form.submit(values);
            }
        }
    }

    pub fn overlay(&self) -> Option<&FloatingOverlay> {
        match self {
            MetadataSource::Overlay(overlay) => Some(overlay),
            MetadataSource::Prompt(_) => None,
        }
    }
}

/// Applies an attribute update captured before an asynchronous gap, unless
/// the editor state moved on since `captured_id`. Returns whether it applied.
pub fn submit_node_attrs(view: &EditorView, captured_id: u64, path: Path, attrs: Attrs) -> bool {
    let current = view.state().id();
    if current != captured_id {
        tracing::debug!(captured_id, current, "discarding stale metadata submission");
        view.focus();
        return false;
    }
    view.dispatch(set_node_attrs(path, attrs));
    view.focus();
    true
}
