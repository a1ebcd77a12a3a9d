//! Cell grid and change tracking.
//!
//! The buffer is the single source of truth for what is on screen. Widgets
//! draw into it, the runtime diffs it, and backends receive only the cells
//! that actually changed.

mod buffer;
mod cell;

pub use buffer::{Buffer, SubBuffer};
pub use cell::{Cell, CellFlags, Modifiers, Rgb, Style};
