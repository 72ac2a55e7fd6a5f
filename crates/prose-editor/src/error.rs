use manos_prose_model::{ApplyError, SchemaError};
use thiserror::Error;

use crate::keymap::KeyNameError;

#[derive(Error, Debug)]
pub enum AssemblyError {
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error(transparent)]
    Apply(#[from] ApplyError),
    #[error("invalid document json: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    KeyName(#[from] KeyNameError),
    #[error("key `{key}` is bound by both `{first}` and `{second}`")]
    KeyCollision {
        key: String,
        first: String,
        second: String,
    },
    #[error("schema name `{0}` is defined by more than one extension")]
    DuplicateName(String),
}

/// Failure reported by an embedded widget. Never propagated past the adapter.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("widget error: {0}")]
pub struct WidgetError(pub String);

impl WidgetError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}
