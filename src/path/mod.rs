//! The field path language.
//!
//! A path is a dotted list of segments. Segments before the first `!!`
//! marker address the resource itself; each marker opens an extension whose
//! own sub-path is handed to the codec of that encoding.

pub mod errors;
pub mod extended;
pub mod query;
pub mod tree;

pub use errors::PathError;
pub use extended::{ExtendedPath, ExtendedSegment, EXTENSION_MARKER};
pub use query::{display_path, parse_segments, split_path, PathSegment};
pub use tree::{
    get_at, get_at_mut, is_scalar, lookup_or_create, resolve, resolve_one, retype_scalar,
    scalar_text, Location, NodeKind, Step,
};
