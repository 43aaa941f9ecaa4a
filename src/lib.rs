#![warn(missing_docs)]
//! # The document editing core
//!
//! This crate bundles a re-implementation of the [ProseMirror](https://prosemirror.net)
//! document model and transforms in Rust. It can be used to validate and apply steps sent
//! by collaborating editors, without any view layer.
//!
//! - [`model`]: schemas, nodes, fragments, marks, slices and resolved positions
//! - [`transform`]: steps, position mapping and the [`Transform`](transform::Transform)
//!   editing operations
//! - [`markdown`]: a CommonMark-shaped schema and node builders

pub use parchment_markdown as markdown;
pub use parchment_model as model;
pub use parchment_transform as transform;

#[cfg(test)]
mod tests;
