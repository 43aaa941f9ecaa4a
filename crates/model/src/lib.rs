#![warn(missing_docs)]
//! # The document model
//!
//! This crate defines the runtime schema and the persistent document tree of the editor
//! core: nodes, fragments, marks, slices and resolved positions, plus the algorithm that
//! replaces a range of a document with a slice while keeping it valid.
//!
//! A [`Schema`] is compiled once from a [`SchemaSpec`]. Node and mark types are cheap handles
//! into it, and every [`Node`] carries the handle of its type.
mod content;
mod content_expr;
pub(crate) mod de;
mod fragment;
mod marks;
mod node;
mod replace;
mod resolved_pos;
mod schema;
mod spec;
pub(crate) mod util;

#[cfg(test)]
mod test_util;

pub use content::{ContentMatch, ContentMatchError};
pub use content_expr::ContentExprError;
pub use fragment::{Fragment, IndexError};
pub use marks::{Mark, MarkSet};
pub use node::{Node, NodeError, SliceError, Text};
pub use replace::{InsertError, ReplaceError, Slice};
pub use resolved_pos::{
    clear_resolve_cache, set_resolve_cache_size, Index, NodeRange, ResolveErr, ResolvedNode,
    ResolvedPos,
};
pub use schema::{AttrError, Attrs, MarkType, NodeType, Schema, SchemaError};
pub use spec::{AttributeSpec, MarkSpec, NodeSpec, SchemaSpec};
