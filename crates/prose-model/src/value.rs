use serde::{Deserialize, Serialize};

use crate::node::Document;

const DEFAULT_SCHEMA: &str = "manos-prose";
const DEFAULT_VERSION: u32 = 1;

fn default_schema() -> String {
    DEFAULT_SCHEMA.to_string()
}

fn default_version() -> u32 {
    DEFAULT_VERSION
}

/// Versioned JSON envelope around a persisted document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProseValue {
    #[serde(default = "default_schema")]
    pub schema: String,
    #[serde(default = "default_version")]
    pub version: u32,
    pub document: Document,
}

impl ProseValue {
    pub fn from_document(document: Document) -> Self {
        Self {
            schema: default_schema(),
            version: default_version(),
            document,
        }
    }

    pub fn into_document(self) -> Document {
        self.document
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json_str(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }

    /// Accepts either the envelope or a bare document.
    pub fn from_json_value(value: serde_json::Value) -> Result<Self, serde_json::Error> {
        if value.get("document").is_some() {
            serde_json::from_value(value)
        } else {
            serde_json::from_value::<Document>(value).map(Self::from_document)
        }
    }
}
