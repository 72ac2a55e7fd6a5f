use manos_prose_model::EngineConfig;
use serde::{Deserialize, Serialize};

/// How assembly resolves two extensions claiming the same schema name or the
/// same normalized key combination.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollisionPolicy {
    #[default]
    LastWriteWins,
    FirstWriteWins,
    Error,
}

/// Decides what `Mod` means in key names.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    Mac,
    #[default]
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorOptions {
    /// Prepend the base keymap and history extensions.
    pub use_default_extensions: bool,
    pub collision_policy: CollisionPolicy,
    pub platform: Platform,
    pub engine: EngineConfig,
    /// Seed document, either a bare document or a `ProseValue` envelope.
    pub doc: Option<serde_json::Value>,
}

impl Default for EditorOptions {
    fn default() -> Self {
        Self {
            use_default_extensions: true,
            collision_policy: CollisionPolicy::default(),
            platform: Platform::default(),
            engine: EngineConfig::default(),
            doc: None,
        }
    }
}

impl EditorOptions {
    pub fn platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    pub fn collision_policy(mut self, policy: CollisionPolicy) -> Self {
        self.collision_policy = policy;
        self
    }

    pub fn without_default_extensions(mut self) -> Self {
        self.use_default_extensions = false;
        self
    }

    pub fn doc(mut self, doc: serde_json::Value) -> Self {
        self.doc = Some(doc);
        self
    }
}
