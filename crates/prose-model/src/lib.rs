mod content;
mod mapping;
mod node;
mod normalize;
mod ops;
mod schema;
mod selection;
mod state;
pub mod textblock;
mod value;

pub use crate::content::*;
pub use crate::mapping::Mapping;
pub use crate::node::{Attrs, Document, ElementNode, Mark, Node, NodeKind, TEXT_KIND, TextNode};
pub use crate::normalize::{NormalizePass, default_passes};
pub use crate::ops::*;
pub use crate::schema::*;
pub use crate::selection::{
    Bias, Point, Selection, clamp_to_char_boundary, first_text_point, first_text_point_in,
    last_text_point, last_text_point_in,
};
pub use crate::state::*;
pub use crate::value::*;
