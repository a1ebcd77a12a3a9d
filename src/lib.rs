//! # Treadle
//!
//! A layered, partial-redraw terminal UI runtime.
//!
//! Treadle drives a widget tree against a terminal backend with a single
//! event loop, repainting only the cells that actually changed frame to
//! frame.
//!
//! ## Core Concepts
//!
//! - **Generation-stamped dirty tracking**: every buffer write is compared
//!   against the existing cell, and clearing a frame's dirt is an O(1)
//!   generation bump
//! - **Layered screen**: a modal stack of widget trees sharing one buffer,
//!   with per-layer focus and grid-based mouse hit testing
//! - **Coalesced wake-ups**: invalidation and callback scheduling collapse
//!   bursts into a single loop iteration
//! - **Adaptive flushing**: each frame goes out as a rect, row spans, or
//!   individual cells depending on dirty density and backend capabilities
//!
//! ## Example
//!
//! ```rust,ignore
//! use treadle::{App, CrosstermBackend, Message};
//!
//! let mut app = App::new(CrosstermBackend::new());
//! app.set_root(Box::new(my_root_widget));
//! app.run()?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod backend;
pub mod buffer;
pub mod layout;
pub mod runtime;
pub mod screen;
pub mod widget;

// Re-exports for convenience
pub use backend::{Backend, CrosstermBackend, Event, KeyCode, KeyEvent, KeyModifiers,
    MemoryBackend, MouseAction, MouseButton, MouseEvent};
pub use buffer::{Buffer, Cell, CellFlags, Modifiers, Rgb, Style};
pub use layout::Rect;
pub use runtime::{after, every, App, AppConfig, CancelHandle, CancelToken, Clipboard, Command,
    Effect, FlushPolicy, FrameStats, Message, RenderObserver, RuntimeError, Services};
pub use screen::{Announcer, FocusIndicator, FocusMode, FocusScope, Layer, RenderContext, Screen};
pub use widget::{Constraints, HandleResult, Size, Widget, WidgetPath};
