mod assembly;
pub mod commands;
mod dom;
mod error;
mod extension;
pub mod extensions;
mod form;
pub mod headless;
mod keymap;
pub mod node_view;
mod options;
mod overlay;
mod plugin;
mod view;

pub use crate::assembly::*;
pub use crate::dom::*;
pub use crate::error::*;
pub use crate::extension::*;
pub use crate::form::*;
pub use crate::keymap::*;
pub use crate::options::*;
pub use crate::overlay::*;
pub use crate::plugin::*;
pub use crate::view::*;

pub use manos_prose_model as model;
