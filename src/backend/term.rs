//! Crossterm-backed terminal backend.
//!
//! Writes are staged as ANSI sequences in a pre-allocated byte buffer and
//! presented with a single `write()` syscall per frame, which is what keeps
//! partial redraws flicker-free. SGR and cursor state are tracked so
//! adjacent writes with the same style cost one escape sequence, not one
//! per cell.

use super::{Backend, Event, EventSource, KeyCode, KeyEvent, KeyModifiers, MouseAction,
            MouseButton, MouseEvent, RectWriter, RowWriter};
use crate::buffer::{Cell, Modifiers, Rgb};
use crate::layout::Rect;
use crossterm::{
    cursor,
    event::{self, EnableMouseCapture, KeyEventKind},
    execute,
    terminal::{self, EnterAlternateScreen, LeaveAlternateScreen},
};
use std::io::{self, Stdout, Write};
use std::time::Duration;
use unicode_width::UnicodeWidthChar;

/// Tracks the terminal's cursor and SGR state between staged writes.
#[derive(Debug, Clone)]
struct SgrState {
    cursor_x: u16,
    cursor_y: u16,
    fg: Option<Rgb>,
    bg: Option<Rgb>,
    modifiers: Option<Modifiers>,
}

impl SgrState {
    const fn new() -> Self {
        Self {
            // Force a cursor move on the first write.
            cursor_x: u16::MAX,
            cursor_y: u16::MAX,
            fg: None,
            bg: None,
            modifiers: None,
        }
    }
}

/// A backend that renders to the real terminal through crossterm.
pub struct CrosstermBackend {
    out: Stdout,
    staged: Vec<u8>,
    state: SgrState,
    mouse_capture: bool,
    initialized: bool,
    event_source_taken: bool,
}

impl CrosstermBackend {
    /// Create a backend writing to stdout, with mouse capture enabled.
    pub fn new() -> Self {
        Self {
            out: io::stdout(),
            staged: Vec::with_capacity(4096),
            state: SgrState::new(),
            mouse_capture: true,
            initialized: false,
            event_source_taken: false,
        }
    }

    /// Disable mouse capture (mouse events will not be reported).
    pub fn without_mouse_capture(mut self) -> Self {
        self.mouse_capture = false;
        self
    }

    fn stage_cursor_move(&mut self, x: u16, y: u16) {
        if self.state.cursor_x == x && self.state.cursor_y == y {
            return;
        }
        let row = y + 1;
        let col = x + 1;
        if row == 1 && col == 1 {
            self.staged.extend_from_slice(b"\x1b[H");
        } else if col == 1 {
            let _ = write!(self.staged, "\x1b[{row}H");
        } else {
            let _ = write!(self.staged, "\x1b[{row};{col}H");
        }
        self.state.cursor_x = x;
        self.state.cursor_y = y;
    }

    fn stage_style(&mut self, cell: &Cell) {
        let mods = cell.style.modifiers;
        let current = self.state.modifiers.unwrap_or(Modifiers::empty());

        // Removing a modifier requires a full SGR reset, which also clears
        // the tracked colors.
        if !current.difference(mods).is_empty() {
            self.staged.extend_from_slice(b"\x1b[0m");
            self.state.fg = None;
            self.state.bg = None;
            self.state.modifiers = None;
        }

        if self.state.fg != Some(cell.style.fg) {
            let c = cell.style.fg;
            let _ = write!(self.staged, "\x1b[38;2;{};{};{}m", c.r, c.g, c.b);
            self.state.fg = Some(c);
        }
        if self.state.bg != Some(cell.style.bg) {
            let c = cell.style.bg;
            let _ = write!(self.staged, "\x1b[48;2;{};{};{}m", c.r, c.g, c.b);
            self.state.bg = Some(c);
        }
        if self.state.modifiers != Some(mods) {
            let added = mods.difference(self.state.modifiers.unwrap_or(Modifiers::empty()));
            stage_modifier_set(&mut self.staged, added);
            self.state.modifiers = Some(mods);
        }
    }

    fn stage_cell(&mut self, x: u16, y: u16, cell: &Cell) {
        // Continuation halves of wide glyphs are never emitted; the head
        // glyph already advanced the hardware cursor past this column.
        if cell.is_wide_continuation() {
            return;
        }
        self.stage_cursor_move(x, y);
        self.stage_style(cell);
        let mut utf8 = [0u8; 4];
        self.staged
            .extend_from_slice(cell.ch.encode_utf8(&mut utf8).as_bytes());
        // The hardware cursor advances by the glyph's display width.
        let advance = cell.ch.width().unwrap_or(1).max(1) as u16;
        self.state.cursor_x = self.state.cursor_x.saturating_add(advance);
    }

    #[cfg(test)]
    fn staged_bytes(&self) -> &[u8] {
        &self.staged
    }
}

fn stage_modifier_set(out: &mut Vec<u8>, modifiers: Modifiers) {
    if modifiers.contains(Modifiers::BOLD) {
        out.extend_from_slice(b"\x1b[1m");
    }
    if modifiers.contains(Modifiers::DIM) {
        out.extend_from_slice(b"\x1b[2m");
    }
    if modifiers.contains(Modifiers::ITALIC) {
        out.extend_from_slice(b"\x1b[3m");
    }
    if modifiers.contains(Modifiers::UNDERLINE) {
        out.extend_from_slice(b"\x1b[4m");
    }
    if modifiers.contains(Modifiers::BLINK) {
        out.extend_from_slice(b"\x1b[5m");
    }
    if modifiers.contains(Modifiers::REVERSED) {
        out.extend_from_slice(b"\x1b[7m");
    }
    if modifiers.contains(Modifiers::STRIKETHROUGH) {
        out.extend_from_slice(b"\x1b[9m");
    }
}

impl Default for CrosstermBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl Backend for CrosstermBackend {
    fn init(&mut self) -> io::Result<()> {
        terminal::enable_raw_mode()?;
        execute!(self.out, EnterAlternateScreen)?;
        if self.mouse_capture {
            execute!(self.out, EnableMouseCapture)?;
        }
        execute!(self.out, cursor::Hide)?;
        self.staged.extend_from_slice(b"\x1b[2J");
        self.state = SgrState::new();
        self.initialized = true;
        Ok(())
    }

    fn fini(&mut self) {
        if !self.initialized {
            return;
        }
        self.initialized = false;
        let _ = execute!(self.out, cursor::Show);
        if self.mouse_capture {
            let _ = execute!(self.out, event::DisableMouseCapture);
        }
        let _ = execute!(self.out, LeaveAlternateScreen);
        let _ = terminal::disable_raw_mode();
    }

    fn size(&self) -> io::Result<(u16, u16)> {
        terminal::size()
    }

    fn hide_cursor(&mut self) -> io::Result<()> {
        self.staged.extend_from_slice(b"\x1b[?25l");
        Ok(())
    }

    fn set_content(&mut self, x: u16, y: u16, cell: &Cell) {
        self.stage_cell(x, y, cell);
    }

    fn show(&mut self) -> io::Result<()> {
        if self.staged.is_empty() {
            return Ok(());
        }
        self.out.write_all(&self.staged)?;
        self.out.flush()?;
        self.staged.clear();
        Ok(())
    }

    fn take_event_source(&mut self) -> Option<Box<dyn EventSource>> {
        if self.event_source_taken {
            return None;
        }
        self.event_source_taken = true;
        Some(Box::new(CrosstermEvents))
    }

    fn as_row_writer(&mut self) -> Option<&mut dyn RowWriter> {
        Some(self)
    }

    fn as_rect_writer(&mut self) -> Option<&mut dyn RectWriter> {
        Some(self)
    }
}

impl RowWriter for CrosstermBackend {
    fn write_row(&mut self, y: u16, x: u16, cells: &[Cell]) -> io::Result<()> {
        // Per-cell staging keeps the tracked cursor honest across wide
        // glyphs; the cursor-move dedup makes contiguous runs free.
        for (i, cell) in cells.iter().enumerate() {
            self.stage_cell(x + i as u16, y, cell);
        }
        Ok(())
    }
}

impl RectWriter for CrosstermBackend {
    fn write_rect(&mut self, rect: Rect, cells: &[Cell]) -> io::Result<()> {
        for row in 0..rect.height {
            let start = usize::from(row) * usize::from(rect.width);
            let end = start + usize::from(rect.width);
            self.write_row(rect.y + row, rect.x, &cells[start..end])?;
        }
        Ok(())
    }
}

impl Drop for CrosstermBackend {
    fn drop(&mut self) {
        self.fini();
    }
}

/// Event source backed by crossterm's event polling.
struct CrosstermEvents;

impl EventSource for CrosstermEvents {
    fn poll(&mut self, timeout: Duration) -> io::Result<Option<Event>> {
        if !event::poll(timeout)? {
            return Ok(None);
        }
        Ok(convert_event(event::read()?))
    }
}

fn convert_event(ev: event::Event) -> Option<Event> {
    match ev {
        event::Event::Key(key) => {
            // Only presses; release and repeat events are noise here.
            if key.kind != KeyEventKind::Press {
                return None;
            }
            Some(Event::Key(KeyEvent {
                code: convert_key_code(key.code)?,
                modifiers: convert_modifiers(key.modifiers),
            }))
        }
        event::Event::Mouse(mouse) => convert_mouse_event(mouse).map(Event::Mouse),
        event::Event::Resize(width, height) => Some(Event::Resize { width, height }),
        event::Event::Paste(text) => Some(Event::Paste(text)),
        event::Event::FocusGained | event::Event::FocusLost => None,
    }
}

fn convert_key_code(code: event::KeyCode) -> Option<KeyCode> {
    Some(match code {
        event::KeyCode::Char(c) => KeyCode::Char(c),
        event::KeyCode::F(n) => KeyCode::F(n),
        event::KeyCode::Backspace => KeyCode::Backspace,
        event::KeyCode::Enter => KeyCode::Enter,
        event::KeyCode::Left => KeyCode::Left,
        event::KeyCode::Right => KeyCode::Right,
        event::KeyCode::Up => KeyCode::Up,
        event::KeyCode::Down => KeyCode::Down,
        event::KeyCode::Home => KeyCode::Home,
        event::KeyCode::End => KeyCode::End,
        event::KeyCode::PageUp => KeyCode::PageUp,
        event::KeyCode::PageDown => KeyCode::PageDown,
        event::KeyCode::Tab => KeyCode::Tab,
        event::KeyCode::BackTab => KeyCode::BackTab,
        event::KeyCode::Delete => KeyCode::Delete,
        event::KeyCode::Insert => KeyCode::Insert,
        event::KeyCode::Esc => KeyCode::Esc,
        _ => return None,
    })
}

fn convert_modifiers(mods: event::KeyModifiers) -> KeyModifiers {
    KeyModifiers {
        shift: mods.contains(event::KeyModifiers::SHIFT),
        control: mods.contains(event::KeyModifiers::CONTROL),
        alt: mods.contains(event::KeyModifiers::ALT),
    }
}

fn convert_mouse_event(mouse: event::MouseEvent) -> Option<MouseEvent> {
    let action = match mouse.kind {
        event::MouseEventKind::Down(button) => MouseAction::Down(convert_mouse_button(button)),
        event::MouseEventKind::Up(button) => MouseAction::Up(convert_mouse_button(button)),
        event::MouseEventKind::Drag(button) => MouseAction::Drag(convert_mouse_button(button)),
        event::MouseEventKind::Moved => MouseAction::Move,
        event::MouseEventKind::ScrollUp => MouseAction::Scroll(1),
        event::MouseEventKind::ScrollDown => MouseAction::Scroll(-1),
        _ => return None,
    };
    Some(MouseEvent {
        x: mouse.column,
        y: mouse.row,
        action,
        modifiers: convert_modifiers(mouse.modifiers),
    })
}

fn convert_mouse_button(button: event::MouseButton) -> MouseButton {
    match button {
        event::MouseButton::Left => MouseButton::Left,
        event::MouseButton::Right => MouseButton::Right,
        event::MouseButton::Middle => MouseButton::Middle,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::Style;

    fn escape_count(bytes: &[u8]) -> usize {
        bytes.iter().filter(|&&b| b == 0x1b).count()
    }

    #[test]
    fn test_wide_glyph_continuation_not_emitted() {
        let mut backend = CrosstermBackend::new();
        backend.set_content(0, 0, &Cell::new('日'));
        backend.set_content(1, 0, &Cell::wide_continuation(Style::DEFAULT));
        backend.set_content(2, 0, &Cell::new('a'));

        let staged = String::from_utf8_lossy(backend.staged_bytes()).into_owned();
        // Cursor home plus the two color sequences; no extra move for the
        // cell after the wide glyph, and no space clobbering its right half.
        assert_eq!(escape_count(staged.as_bytes()), 3);
        assert!(staged.ends_with("日a"));
    }

    #[test]
    fn test_write_row_tracks_display_width() {
        let mut backend = CrosstermBackend::new();
        let cells = [
            Cell::new('日'),
            Cell::wide_continuation(Style::DEFAULT),
            Cell::new('a'),
        ];
        backend
            .write_row(0, 0, &cells)
            .unwrap_or_else(|err| panic!("write_row failed: {err}"));
        let before = backend.staged_bytes().len();

        // The tracked cursor sits at column 3 now, so staging the next cell
        // there must not emit a cursor move.
        backend.set_content(3, 0, &Cell::new('b'));
        let tail = &backend.staged_bytes()[before..];
        assert_eq!(escape_count(tail), 0);
        assert_eq!(tail, b"b".as_slice());
    }
}
