//! Built-in extensions: the node and mark types of a typical document and the
//! plugins that give them behaviour.

mod code;
mod figure;
mod link;
mod lists;
mod marks;
mod nodes;
mod plugins;

pub use code::*;
pub use figure::*;
pub use link::*;
pub use lists::*;
pub use marks::*;
pub use nodes::*;
pub use plugins::*;
