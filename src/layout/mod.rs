//! Layout primitives.
//!
//! The runtime does not impose a layout algorithm: each widget receives a
//! rectangle and reports a size it would like. This module only provides
//! the shared geometry types.

mod rect;

pub use rect::Rect;
