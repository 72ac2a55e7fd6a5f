use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use manos_prose_model::{EditorState, Transaction};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::options::{CollisionPolicy, Platform};

/// Sink for the transactions a command produces.
pub type Dispatch<'a> = &'a dyn Fn(Transaction);

/// A command: checks applicability against `state` and, when a dispatch sink
/// is given, emits its transaction(s). Returns whether it applied.
pub type KeyHandler = Rc<dyn Fn(&EditorState, Option<&dyn Fn(Transaction)>) -> bool>;

/// Wraps a closure as a [`KeyHandler`].
pub fn key_handler(
    f: impl Fn(&EditorState, Option<&dyn Fn(Transaction)>) -> bool + 'static,
) -> KeyHandler {
    Rc::new(f)
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unrecognized modifier `{modifier}` in key name `{name}`")]
pub struct KeyNameError {
    pub name: String,
    pub modifier: String,
}

#[derive(Clone)]
pub struct KeyBinding {
    pub description: String,
    pub handler: KeyHandler,
}

impl fmt::Debug for KeyBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyBinding")
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

/// Help-surface entry: a normalized key and what it does.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyDescription {
    pub key: String,
    pub description: String,
}

/// Ordered key name to binding map. Names are stored as given until
/// [`Keymap::normalized`] rewrites them.
#[derive(Clone, Default, Debug)]
pub struct Keymap {
    entries: Vec<(String, KeyBinding)>,
}

impl Keymap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`Keymap::insert`].
    pub fn bind(
        mut self,
        key: impl Into<String>,
        description: impl Into<String>,
        handler: KeyHandler,
    ) -> Self {
        self.insert(key, description, handler);
        self
    }

    /// Binds `key`, replacing an existing binding of the same name in place.
    pub fn insert(
        &mut self,
        key: impl Into<String>,
        description: impl Into<String>,
        handler: KeyHandler,
    ) {
        let key = key.into();
        let binding = KeyBinding {
            description: description.into(),
            handler,
        };
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => *existing = binding,
            None => self.entries.push((key, binding)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&KeyBinding> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, b)| b)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &KeyBinding)> {
        self.entries.iter().map(|(k, b)| (k.as_str(), b))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    /// Same bindings under normalized names. Names that normalize to the same
    /// combination collapse, the later one winning.
    pub fn normalized(self, platform: Platform) -> Result<Keymap, KeyNameError> {
        let mut out = Keymap::new();
        for (key, binding) in self.entries {
            let key = normalize_key_name(&key, platform)?;
            match out.entries.iter_mut().find(|(k, _)| *k == key) {
                Some((_, existing)) => *existing = binding,
                None => out.entries.push((key, binding)),
            }
        }
        Ok(out)
    }

    /// Folds `other` into `self` under `policy` and returns the keys both maps
    /// bound. Under [`CollisionPolicy::Error`] the first collision is returned
    /// as `Err` and `self` is left partially merged.
    pub fn merge(&mut self, other: Keymap, policy: CollisionPolicy) -> Result<Vec<String>, String> {
        let mut collisions = Vec::new();
        for (key, binding) in other.entries {
            match self.entries.iter_mut().find(|(k, _)| *k == key) {
                Some((_, existing)) => {
                    match policy {
                        CollisionPolicy::LastWriteWins => *existing = binding,
                        CollisionPolicy::FirstWriteWins => {}
                        CollisionPolicy::Error => return Err(key),
                    }
                    collisions.push(key);
                }
                None => self.entries.push((key, binding)),
            }
        }
        Ok(collisions)
    }

    pub fn descriptions(&self) -> Vec<KeyDescription> {
        self.entries
            .iter()
            .map(|(key, binding)| KeyDescription {
                key: key.clone(),
                description: binding.description.clone(),
            })
            .collect()
    }
}

/// Rewrites a key name such as `Mod-Shift-z` into canonical
/// `Alt-Ctrl-Meta-Shift-<key>` form.
pub fn normalize_key_name(name: &str, platform: Platform) -> Result<String, KeyNameError> {
    let (modifiers, key) = split_key_name(name);
    let key = if key == "Space" { " " } else { key };

    let mut alt = false;
    let mut ctrl = false;
    let mut meta = false;
    let mut shift = false;
    for modifier in modifiers {
        match modifier {
            "Cmd" | "Meta" | "M" => meta = true,
            "a" | "Alt" => alt = true,
            "c" | "Ctrl" | "Control" => ctrl = true,
            "s" | "Shift" => shift = true,
            "Mod" => match platform {
                Platform::Mac => meta = true,
                Platform::Other => ctrl = true,
            },
            other => {
                return Err(KeyNameError {
                    name: name.to_string(),
                    modifier: other.to_string(),
                });
            }
        }
    }

    Ok(modifier_prefix(alt, ctrl, meta, shift) + key)
}

/// Splits on `-`, treating a trailing `-` as the key itself (`Mod--`).
fn split_key_name(name: &str) -> (Vec<&str>, &str) {
    if name.len() > 1 && name.ends_with('-') {
        let rest = &name[..name.len() - 1];
        let rest = rest.strip_suffix('-').unwrap_or(rest);
        let modifiers = if rest.is_empty() {
            Vec::new()
        } else {
            rest.split('-').collect()
        };
        return (modifiers, "-");
    }
    let mut parts: Vec<&str> = name.split('-').collect();
    let key = parts.pop().unwrap_or_default();
    (parts, key)
}

fn modifier_prefix(alt: bool, ctrl: bool, meta: bool, shift: bool) -> String {
    let mut out = String::new();
    if alt {
        out.push_str("Alt-");
    }
    if ctrl {
        out.push_str("Ctrl-");
    }
    if meta {
        out.push_str("Meta-");
    }
    if shift {
        out.push_str("Shift-");
    }
    out
}

/// A key press as reported by the host. `key` is the produced character or
/// the key's name (`Enter`, `ArrowUp`, `" "`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyEvent {
    pub key: String,
    #[serde(default)]
    pub alt: bool,
    #[serde(default)]
    pub ctrl: bool,
    #[serde(default)]
    pub meta: bool,
    #[serde(default)]
    pub shift: bool,
}

impl KeyEvent {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ..Self::default()
        }
    }

    pub fn alt(mut self) -> Self {
        self.alt = true;
        self
    }

    pub fn ctrl(mut self) -> Self {
        self.ctrl = true;
        self
    }

    pub fn meta(mut self) -> Self {
        self.meta = true;
        self
    }

    pub fn shift(mut self) -> Self {
        self.shift = true;
        self
    }

    /// Event a user pressing `combo` would produce, e.g. `Mod-Alt-2`.
    pub fn from_combo(combo: &str, platform: Platform) -> Result<Self, KeyNameError> {
        let normalized = normalize_key_name(combo, platform)?;
        let (modifiers, key) = split_key_name(&normalized);
        let mut event = KeyEvent::new(key);
        for modifier in modifiers {
            match modifier {
                "Alt" => event.alt = true,
                "Ctrl" => event.ctrl = true,
                "Meta" => event.meta = true,
                "Shift" => event.shift = true,
                _ => {}
            }
        }
        Ok(event)
    }

    /// Whether the platform's `Mod` key is held.
    pub fn is_mod(&self, platform: Platform) -> bool {
        match platform {
            Platform::Mac => self.meta,
            Platform::Other => self.ctrl,
        }
    }

    pub fn has_modifier(&self) -> bool {
        self.alt || self.ctrl || self.meta || self.shift
    }

    fn is_char(&self) -> bool {
        self.key.chars().count() == 1 && self.key != " "
    }

    fn name(&self, with_shift: bool) -> String {
        modifier_prefix(self.alt, self.ctrl, self.meta, with_shift && self.shift) + &self.key
    }

    /// Names to try in order when looking this event up in a normalized map.
    pub fn lookup_names(&self) -> Vec<String> {
        let is_char = self.is_char();
        let mut names = vec![self.name(!is_char)];
        if is_char && self.shift {
            names.push(self.name(true));
        }
        names
    }
}

/// Finds the binding for `event` in a map keyed by normalized names.
pub fn lookup<'a>(map: &'a HashMap<String, KeyBinding>, event: &KeyEvent) -> Vec<&'a KeyBinding> {
    event
        .lookup_names()
        .iter()
        .filter_map(|name| map.get(name))
        .collect()
}
