//! Terminal backends.
//!
//! A [`Backend`] owns the physical terminal (or a stand-in for tests). The
//! runtime drives it with individual cell writes and flushes; backends that
//! can accept bulk writes advertise it through the capability queries
//! [`Backend::as_row_writer`] and [`Backend::as_rect_writer`], which the
//! flush path uses to pick a write strategy.

mod event;
mod memory;
mod term;

pub use event::{Event, KeyCode, KeyEvent, KeyModifiers, MouseAction, MouseButton, MouseEvent};
pub use memory::MemoryBackend;
pub use term::CrosstermBackend;

use crate::buffer::Cell;
use crate::layout::Rect;
use std::io;
use std::time::Duration;

/// A source of raw terminal events.
///
/// Obtained from a backend with [`Backend::take_event_source`] and polled
/// from a dedicated thread, so the main loop never blocks on input.
pub trait EventSource: Send {
    /// Wait up to `timeout` for the next event.
    ///
    /// Returns `Ok(None)` when the timeout elapses without an event.
    fn poll(&mut self, timeout: Duration) -> io::Result<Option<Event>>;
}

/// Accepts a run of cells within a single row.
pub trait RowWriter {
    /// Write `cells` starting at column `x` of row `y`.
    fn write_row(&mut self, y: u16, x: u16, cells: &[Cell]) -> io::Result<()>;
}

/// Accepts a rectangular block of cells in one call.
pub trait RectWriter {
    /// Write `cells` (row-major, `rect.width * rect.height` entries) into
    /// `rect`.
    fn write_rect(&mut self, rect: Rect, cells: &[Cell]) -> io::Result<()>;
}

/// A rendering target.
pub trait Backend {
    /// Prepare the terminal for rendering (raw mode, alternate screen).
    fn init(&mut self) -> io::Result<()>;

    /// Restore the terminal to its pre-init state.
    ///
    /// Must be safe to call more than once.
    fn fini(&mut self);

    /// Current terminal dimensions.
    fn size(&self) -> io::Result<(u16, u16)>;

    /// Hide the hardware cursor.
    fn hide_cursor(&mut self) -> io::Result<()>;

    /// Stage a single cell write at (x, y).
    fn set_content(&mut self, x: u16, y: u16, cell: &Cell);

    /// Present all staged writes.
    fn show(&mut self) -> io::Result<()>;

    /// Take ownership of the backend's event source.
    ///
    /// Returns `None` on subsequent calls, or if the backend has no input.
    fn take_event_source(&mut self) -> Option<Box<dyn EventSource>>;

    /// Bulk row-write capability, if this backend supports it.
    fn as_row_writer(&mut self) -> Option<&mut dyn RowWriter> {
        None
    }

    /// Bulk rect-write capability, if this backend supports it.
    fn as_rect_writer(&mut self) -> Option<&mut dyn RectWriter> {
        None
    }
}
