//! In-memory backend for tests.

use super::{Backend, Event, EventSource, RectWriter, RowWriter};
use crate::buffer::Cell;
use crate::layout::Rect;
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;

struct Inner {
    cells: Vec<Cell>,
    width: u16,
    height: u16,
    initialized: bool,
    cursor_hidden: bool,
    show_count: usize,
    cell_writes: usize,
    row_writes: usize,
    rect_writes: usize,
    row_writer: bool,
    rect_writer: bool,
}

impl Inner {
    fn index_of(&self, x: u16, y: u16) -> Option<usize> {
        if x < self.width && y < self.height {
            Some(usize::from(y) * usize::from(self.width) + usize::from(x))
        } else {
            None
        }
    }
}

/// A backend that renders into memory.
///
/// Clones share state, so a test can keep a handle and inspect the final
/// contents after the runtime has consumed the original.
#[derive(Clone)]
pub struct MemoryBackend {
    inner: Arc<Mutex<Inner>>,
    events: Sender<Event>,
    event_source: Arc<Mutex<Option<Receiver<Event>>>>,
}

impl MemoryBackend {
    /// Create a backend with the given dimensions and no capabilities
    /// beyond per-cell writes.
    pub fn new(width: u16, height: u16) -> Self {
        let (tx, rx) = unbounded();
        Self {
            inner: Arc::new(Mutex::new(Inner {
                cells: vec![Cell::EMPTY; usize::from(width) * usize::from(height)],
                width,
                height,
                initialized: false,
                cursor_hidden: false,
                show_count: 0,
                cell_writes: 0,
                row_writes: 0,
                rect_writes: 0,
                row_writer: false,
                rect_writer: false,
            })),
            events: tx,
            event_source: Arc::new(Mutex::new(Some(rx))),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Advertise the bulk row-write capability.
    pub fn with_row_writer(self) -> Self {
        self.lock().row_writer = true;
        self
    }

    /// Advertise the bulk rect-write capability.
    pub fn with_rect_writer(self) -> Self {
        self.lock().rect_writer = true;
        self
    }

    /// Queue an event for the event source to deliver.
    pub fn push_event(&self, event: Event) {
        let _ = self.events.send(event);
    }

    /// Change the reported terminal size.
    ///
    /// Does not generate a resize event; push one explicitly to exercise
    /// the resize path.
    pub fn set_size(&self, width: u16, height: u16) {
        let mut inner = self.lock();
        inner.width = width;
        inner.height = height;
        inner.cells = vec![Cell::EMPTY; usize::from(width) * usize::from(height)];
    }

    /// Read back the cell at (x, y).
    pub fn cell_at(&self, x: u16, y: u16) -> Cell {
        let inner = self.lock();
        inner.index_of(x, y).map_or(Cell::EMPTY, |i| inner.cells[i])
    }

    /// Read back row `y` as a string.
    pub fn row_string(&self, y: u16) -> String {
        let inner = self.lock();
        let width = usize::from(inner.width);
        let start = usize::from(y) * width;
        inner.cells[start..start + width].iter().map(|c| c.ch).collect()
    }

    /// Whether `init` has run and `fini` has not.
    pub fn is_initialized(&self) -> bool {
        self.lock().initialized
    }

    /// Number of completed `show` calls.
    pub fn show_count(&self) -> usize {
        self.lock().show_count
    }

    /// Number of per-cell writes.
    pub fn cell_write_count(&self) -> usize {
        self.lock().cell_writes
    }

    /// Number of bulk row writes.
    pub fn row_write_count(&self) -> usize {
        self.lock().row_writes
    }

    /// Number of bulk rect writes.
    pub fn rect_write_count(&self) -> usize {
        self.lock().rect_writes
    }
}

impl Backend for MemoryBackend {
    fn init(&mut self) -> io::Result<()> {
        self.lock().initialized = true;
        Ok(())
    }

    fn fini(&mut self) {
        self.lock().initialized = false;
    }

    fn size(&self) -> io::Result<(u16, u16)> {
        let inner = self.lock();
        Ok((inner.width, inner.height))
    }

    fn hide_cursor(&mut self) -> io::Result<()> {
        self.lock().cursor_hidden = true;
        Ok(())
    }

    fn set_content(&mut self, x: u16, y: u16, cell: &Cell) {
        let mut inner = self.lock();
        if let Some(idx) = inner.index_of(x, y) {
            inner.cells[idx] = *cell;
            inner.cell_writes += 1;
        }
    }

    fn show(&mut self) -> io::Result<()> {
        self.lock().show_count += 1;
        Ok(())
    }

    fn take_event_source(&mut self) -> Option<Box<dyn EventSource>> {
        let rx = match self.event_source.lock() {
            Ok(mut slot) => slot.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        rx.map(|rx| Box::new(MemoryEvents { rx }) as Box<dyn EventSource>)
    }

    fn as_row_writer(&mut self) -> Option<&mut dyn RowWriter> {
        if self.lock().row_writer {
            Some(self)
        } else {
            None
        }
    }

    fn as_rect_writer(&mut self) -> Option<&mut dyn RectWriter> {
        if self.lock().rect_writer {
            Some(self)
        } else {
            None
        }
    }
}

impl RowWriter for MemoryBackend {
    fn write_row(&mut self, y: u16, x: u16, cells: &[Cell]) -> io::Result<()> {
        let mut inner = self.lock();
        for (i, cell) in cells.iter().enumerate() {
            if let Some(idx) = inner.index_of(x + i as u16, y) {
                inner.cells[idx] = *cell;
            }
        }
        inner.row_writes += 1;
        Ok(())
    }
}

impl RectWriter for MemoryBackend {
    fn write_rect(&mut self, rect: Rect, cells: &[Cell]) -> io::Result<()> {
        let mut inner = self.lock();
        for row in 0..rect.height {
            for col in 0..rect.width {
                let src = usize::from(row) * usize::from(rect.width) + usize::from(col);
                if let Some(idx) = inner.index_of(rect.x + col, rect.y + row) {
                    inner.cells[idx] = cells[src];
                }
            }
        }
        inner.rect_writes += 1;
        Ok(())
    }
}

struct MemoryEvents {
    rx: Receiver<Event>,
}

impl EventSource for MemoryEvents {
    fn poll(&mut self, timeout: Duration) -> io::Result<Option<Event>> {
        match self.rx.recv_timeout(timeout) {
            Ok(event) => Ok(Some(event)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "event channel closed",
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_state() {
        let mut backend = MemoryBackend::new(10, 2);
        let view = backend.clone();
        backend.set_content(3, 1, &Cell::new('Q'));
        assert_eq!(view.cell_at(3, 1).ch, 'Q');
        assert_eq!(view.cell_write_count(), 1);
    }

    #[test]
    fn test_event_source_taken_once() {
        let mut backend = MemoryBackend::new(4, 4);
        assert!(backend.take_event_source().is_some());
        assert!(backend.take_event_source().is_none());
    }

    #[test]
    fn test_event_delivery() {
        let mut backend = MemoryBackend::new(4, 4);
        let mut source = backend.take_event_source().unwrap();
        backend.push_event(Event::Resize {
            width: 8,
            height: 8,
        });
        let event = source.poll(Duration::from_millis(100)).unwrap();
        assert!(matches!(event, Some(Event::Resize { width: 8, height: 8 })));
        let none = source.poll(Duration::from_millis(1)).unwrap();
        assert!(none.is_none());
    }

    #[test]
    fn test_capabilities_off_by_default() {
        let mut backend = MemoryBackend::new(4, 4);
        assert!(backend.as_row_writer().is_none());
        assert!(backend.as_rect_writer().is_none());

        let mut backend = MemoryBackend::new(4, 4).with_row_writer().with_rect_writer();
        assert!(backend.as_row_writer().is_some());
        assert!(backend.as_rect_writer().is_some());
    }

    #[test]
    fn test_row_writer_clips() {
        let mut backend = MemoryBackend::new(4, 2).with_row_writer();
        let cells = [Cell::new('a'), Cell::new('b'), Cell::new('c')];
        backend.write_row(0, 2, &cells).unwrap();
        assert_eq!(backend.row_string(0), "  ab");
        assert_eq!(backend.row_write_count(), 1);
    }
}
