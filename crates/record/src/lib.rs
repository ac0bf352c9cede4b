//! Nested form records addressed by field path.
//!
//! [`Value`] is the record itself. Everything else here is generic over the
//! [`Tree`] seam so the same walks and traversals serve any structure that
//! mirrors a record's shape.

mod diff;
mod path;
mod traverse;
mod tree;
mod value;

pub use diff::{diff_paths, same_leaves};
pub use path::{FieldPath, PathKey};
pub use traverse::{
    for_each_path, for_each_path_async, for_each_path_from, for_each_path_mut, path_exists, walk,
    walk_async, walk_with, write_at, write_paths, Control, PathNode, PathNodeMut, Visit,
};
pub use tree::Tree;
pub use value::{Map, Value, DATE_TAG};
