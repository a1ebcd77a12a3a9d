//! Buffer: a grid of cells with generation-stamped dirty tracking.
//!
//! The buffer makes "what changed since last flush" cheap to compute and
//! cheap to iterate, for both small (single-widget) and large (full-screen)
//! changes:
//!
//! - Every write compares against the existing cell and only marks dirt on
//!   an actual change.
//! - A dirty cell is one whose generation stamp equals the current
//!   generation; clearing dirt advances the generation instead of rewriting
//!   the stamp array (the array is only zeroed on wraparound).
//! - A sparse index list accelerates iteration of scattered dirt until it
//!   overflows a capacity threshold, after which consumers fall back to
//!   scanning the dirty bounding rectangle.

use super::cell::{Cell, Style};
use crate::layout::Rect;
use unicode_segmentation::UnicodeSegmentation;
use unicode_width::UnicodeWidthStr;

/// Sparse dirty-list capacity: a quarter of the area, floored at 256 and
/// capped at 8192, never more than the area itself.
fn dirty_list_cap(total: usize) -> usize {
    if total == 0 {
        return 0;
    }
    (total / 4).clamp(256, 8192).min(total)
}

/// A grid of cells representing the terminal screen.
///
/// Cells are stored in a contiguous `Vec` in row-major order:
/// `index = y * width + x`.
pub struct Buffer {
    cells: Vec<Cell>,
    width: u16,
    height: u16,

    /// Generation marker per cell; a cell is dirty iff its stamp equals
    /// `dirty_gen`.
    dirty_stamp: Vec<u32>,
    dirty_gen: u32,
    /// Fast path for "everything changed" (resize, explicit full redraw).
    dirty_all: bool,
    dirty_count: usize,
    dirty_rect: Rect,
    dirty_indices: Vec<usize>,
    dirty_list_cap: usize,
    dirty_list_enabled: bool,
}

impl Buffer {
    /// Create a new buffer with the given dimensions.
    ///
    /// All cells are initialized to empty (space with default style).
    pub fn new(width: u16, height: u16) -> Self {
        let total = usize::from(width) * usize::from(height);
        let cap = dirty_list_cap(total);
        Self {
            cells: vec![Cell::EMPTY; total],
            width,
            height,
            dirty_stamp: vec![0; total],
            dirty_gen: 1,
            dirty_all: false,
            dirty_count: 0,
            dirty_rect: Rect::ZERO,
            dirty_indices: Vec::with_capacity(cap),
            dirty_list_cap: cap,
            dirty_list_enabled: true,
        }
    }

    /// Get the buffer dimensions.
    #[inline]
    pub const fn size(&self) -> (u16, u16) {
        (self.width, self.height)
    }

    /// Get the buffer width.
    #[inline]
    pub const fn width(&self) -> u16 {
        self.width
    }

    /// Get the buffer height.
    #[inline]
    pub const fn height(&self) -> u16 {
        self.height
    }

    /// Get the total number of cells.
    #[inline]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Check if the buffer has zero area.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Get a reference to the underlying cell slice (row-major).
    #[inline]
    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    /// Convert (x, y) coordinates to a linear index.
    ///
    /// Returns `None` if coordinates are out of bounds.
    #[inline]
    fn index_of(&self, x: u16, y: u16) -> Option<usize> {
        if x < self.width && y < self.height {
            Some(usize::from(y) * usize::from(self.width) + usize::from(x))
        } else {
            None
        }
    }

    /// Get the cell at (x, y).
    ///
    /// Returns the empty cell when out of bounds.
    #[inline]
    pub fn get(&self, x: u16, y: u16) -> Cell {
        self.index_of(x, y).map_or(Cell::EMPTY, |i| self.cells[i])
    }

    /// Set a cell at (x, y).
    ///
    /// No-op out of bounds; marks the cell dirty only if it changed.
    #[inline]
    pub fn set(&mut self, x: u16, y: u16, cell: Cell) {
        let Some(idx) = self.index_of(x, y) else {
            return;
        };
        if self.cells[idx] != cell {
            self.cells[idx] = cell;
            self.mark_cell_dirty(x, y, idx);
        }
    }

    /// Write a string starting at (x, y), clipped to the buffer width.
    ///
    /// Text is segmented into grapheme clusters; each cluster occupies the
    /// columns given by its display width (zero-width clusters are skipped,
    /// wide clusters get a trailing continuation cell that backends skip
    /// on emission). Returns the number of columns used.
    pub fn set_string(&mut self, x: u16, y: u16, s: &str, style: Style) -> u16 {
        if y >= self.height || x >= self.width {
            return 0;
        }
        let mut col = x;
        for grapheme in s.graphemes(true) {
            if col >= self.width {
                break;
            }
            let width = grapheme.width() as u16;
            if width == 0 {
                continue;
            }
            let ch = grapheme.chars().next().unwrap_or(' ');
            self.set(col, y, Cell::styled(ch, style));
            if width > 1 && col + 1 < self.width {
                self.set(col + 1, y, Cell::wide_continuation(style));
            }
            col = col.saturating_add(width);
        }
        col - x
    }

    /// Fill a rectangular region with a character and style.
    ///
    /// The region is clipped to the buffer; only changed cells are marked
    /// dirty.
    pub fn fill(&mut self, rect: Rect, ch: char, style: Style) {
        let x_end = rect.right().min(self.width);
        let y_end = rect.bottom().min(self.height);
        let cell = Cell::styled(ch, style);
        for y in rect.y..y_end {
            for x in rect.x..x_end {
                let idx = usize::from(y) * usize::from(self.width) + usize::from(x);
                if self.cells[idx] != cell {
                    self.cells[idx] = cell;
                    self.mark_cell_dirty(x, y, idx);
                }
            }
        }
    }

    /// Clear the entire buffer (fill with empty cells).
    pub fn clear(&mut self) {
        self.fill(Rect::from_size(self.width, self.height), ' ', Style::DEFAULT);
    }

    /// Clear a rectangular region.
    pub fn clear_rect(&mut self, rect: Rect) {
        self.fill(rect, ' ', Style::DEFAULT);
    }

    /// Draw a border around a rect using box-drawing characters.
    pub fn draw_box(&mut self, r: Rect, style: Style) {
        self.draw_border(r, style, ['┌', '┐', '└', '┘']);
    }

    /// Draw a border with rounded corners.
    pub fn draw_rounded_box(&mut self, r: Rect, style: Style) {
        self.draw_border(r, style, ['╭', '╮', '╰', '╯']);
    }

    fn draw_border(&mut self, r: Rect, style: Style, corners: [char; 4]) {
        if r.width < 2 || r.height < 2 {
            return;
        }
        let right = r.x + r.width - 1;
        let bottom = r.y + r.height - 1;

        self.set(r.x, r.y, Cell::styled(corners[0], style));
        self.set(right, r.y, Cell::styled(corners[1], style));
        self.set(r.x, bottom, Cell::styled(corners[2], style));
        self.set(right, bottom, Cell::styled(corners[3], style));

        for x in (r.x + 1)..right {
            self.set(x, r.y, Cell::styled('─', style));
            self.set(x, bottom, Cell::styled('─', style));
        }
        for y in (r.y + 1)..bottom {
            self.set(r.x, y, Cell::styled('│', style));
            self.set(right, y, Cell::styled('│', style));
        }
    }

    /// Resize the buffer, preserving the overlapping region.
    ///
    /// The whole buffer is marked dirty afterwards.
    pub fn resize(&mut self, new_width: u16, new_height: u16) {
        if new_width == self.width && new_height == self.height {
            return;
        }

        let new_total = usize::from(new_width) * usize::from(new_height);
        let mut new_cells = vec![Cell::EMPTY; new_total];

        let copy_width = usize::from(self.width.min(new_width));
        let copy_height = usize::from(self.height.min(new_height));
        for y in 0..copy_height {
            let old_start = y * usize::from(self.width);
            let new_start = y * usize::from(new_width);
            new_cells[new_start..new_start + copy_width]
                .copy_from_slice(&self.cells[old_start..old_start + copy_width]);
        }

        self.cells = new_cells;
        self.width = new_width;
        self.height = new_height;
        self.dirty_stamp = vec![0; new_total];
        self.dirty_gen = 1;
        self.dirty_all = false;
        self.dirty_count = 0;
        self.dirty_rect = Rect::ZERO;
        self.dirty_list_cap = dirty_list_cap(new_total);
        self.dirty_list_enabled = true;
        self.dirty_indices.clear();

        self.mark_all_dirty();
    }

    /// Create a translated, clipped view into a rectangular region.
    pub fn sub(&mut self, bounds: Rect) -> SubBuffer<'_> {
        SubBuffer { parent: self, bounds }
    }

    // --- Dirty tracking ---

    fn mark_cell_dirty(&mut self, x: u16, y: u16, idx: usize) {
        if self.dirty_all {
            return;
        }
        if self.dirty_stamp[idx] == self.dirty_gen {
            return;
        }
        self.dirty_stamp[idx] = self.dirty_gen;
        self.dirty_count += 1;
        self.dirty_rect.expand_to(x, y);
        if self.dirty_list_enabled {
            if self.dirty_count <= self.dirty_list_cap {
                self.dirty_indices.push(idx);
            } else {
                // Over threshold: abandon the list for the rest of the frame.
                self.dirty_list_enabled = false;
                self.dirty_indices.clear();
            }
        }
    }

    /// Mark the entire buffer dirty in O(1).
    pub fn mark_all_dirty(&mut self) {
        self.dirty_all = true;
        self.dirty_count = self.len();
        self.dirty_rect = Rect::from_size(self.width, self.height);
        self.dirty_list_enabled = false;
        self.dirty_indices.clear();
    }

    /// Reset all dirty state by advancing the generation.
    ///
    /// The stamp array is only rewritten when the generation counter wraps.
    pub fn clear_dirty(&mut self) {
        self.dirty_all = false;
        self.dirty_count = 0;
        self.dirty_rect = Rect::ZERO;
        self.dirty_list_enabled = true;
        self.dirty_indices.clear();
        self.dirty_gen = self.dirty_gen.wrapping_add(1);
        if self.dirty_gen == 0 {
            self.dirty_stamp.fill(0);
            self.dirty_gen = 1;
        }
    }

    /// Check if any cell has changed since the last [`Buffer::clear_dirty`].
    #[inline]
    pub fn is_dirty(&self) -> bool {
        self.dirty_all || self.dirty_count > 0
    }

    /// Get the number of dirty cells.
    #[inline]
    pub fn dirty_count(&self) -> usize {
        if self.dirty_all {
            self.len()
        } else {
            self.dirty_count
        }
    }

    /// Get the bounding box of dirty cells (empty rect if clean).
    #[inline]
    pub fn dirty_rect(&self) -> Rect {
        if self.dirty_all {
            Rect::from_size(self.width, self.height)
        } else {
            self.dirty_rect
        }
    }

    /// Check if the cell at (x, y) is dirty.
    pub fn is_cell_dirty(&self, x: u16, y: u16) -> bool {
        let Some(idx) = self.index_of(x, y) else {
            return false;
        };
        self.dirty_all || self.dirty_stamp[idx] == self.dirty_gen
    }

    /// Call `f` for each dirty cell.
    ///
    /// The iteration strategy is chosen by comparing the dirty count against
    /// the buffer area and the dirty rect's area: full-dirty uses a linear
    /// scan; mostly-dirty uses a linear scan with stamp checks; scattered
    /// dirt with a complete sparse list uses the list; otherwise the dirty
    /// bounding rect is scanned row by row.
    pub fn for_each_dirty_cell<F>(&self, mut f: F)
    where
        F: FnMut(u16, u16, Cell),
    {
        let width = usize::from(self.width);
        if self.dirty_all {
            for (idx, cell) in self.cells.iter().enumerate() {
                let y = idx / width;
                let x = idx - y * width;
                f(x as u16, y as u16, *cell);
            }
            return;
        }
        if self.dirty_count == 0 {
            return;
        }
        if self.dirty_count > self.len() / 2 {
            for (idx, cell) in self.cells.iter().enumerate() {
                if self.dirty_stamp[idx] == self.dirty_gen {
                    let y = idx / width;
                    let x = idx - y * width;
                    f(x as u16, y as u16, *cell);
                }
            }
            return;
        }
        if self.dirty_list_enabled && self.dirty_indices.len() == self.dirty_count {
            let rect_area = self.dirty_rect.area() as usize;
            if rect_area > self.dirty_count * 2 {
                for &idx in &self.dirty_indices {
                    if self.dirty_stamp[idx] != self.dirty_gen {
                        continue;
                    }
                    let y = idx / width;
                    let x = idx - y * width;
                    f(x as u16, y as u16, self.cells[idx]);
                }
                return;
            }
        }
        let rect = self.dirty_rect;
        let x_end = rect.right().min(self.width);
        let y_end = rect.bottom().min(self.height);
        for y in rect.y..y_end {
            let row_start = usize::from(y) * width;
            for x in rect.x..x_end {
                let idx = row_start + usize::from(x);
                if self.dirty_stamp[idx] == self.dirty_gen {
                    f(x, y, self.cells[idx]);
                }
            }
        }
    }

    /// Call `f` with `(y, start_x, end_x)` for each contiguous dirty span
    /// per row (`end_x` exclusive). Supports bulk-row backend writers.
    pub fn for_each_dirty_span<F>(&self, mut f: F)
    where
        F: FnMut(u16, u16, u16),
    {
        if self.dirty_all {
            for y in 0..self.height {
                f(y, 0, self.width);
            }
            return;
        }
        if self.dirty_count == 0 {
            return;
        }
        let rect = self.dirty_rect;
        if rect.is_empty() {
            return;
        }
        let width = usize::from(self.width);
        let x_end = rect.right().min(self.width);
        let y_end = rect.bottom().min(self.height);
        for y in rect.y..y_end {
            let row_start = usize::from(y) * width;
            let mut x = rect.x;
            while x < x_end {
                if self.dirty_stamp[row_start + usize::from(x)] != self.dirty_gen {
                    x += 1;
                    continue;
                }
                let start = x;
                x += 1;
                while x < x_end && self.dirty_stamp[row_start + usize::from(x)] == self.dirty_gen {
                    x += 1;
                }
                f(y, start, x);
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn sparse_list_active(&self) -> bool {
        self.dirty_list_enabled
    }
}

impl std::fmt::Debug for Buffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Buffer")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("dirty_count", &self.dirty_count())
            .field("dirty_rect", &self.dirty_rect())
            .finish()
    }
}

/// A view into a rectangular region of a [`Buffer`].
///
/// Writes are translated into the parent's coordinate space and clipped to
/// the region.
pub struct SubBuffer<'a> {
    parent: &'a mut Buffer,
    bounds: Rect,
}

impl SubBuffer<'_> {
    /// Get the view dimensions.
    #[inline]
    pub const fn size(&self) -> (u16, u16) {
        (self.bounds.width, self.bounds.height)
    }

    /// Set a cell at a position relative to the view.
    pub fn set(&mut self, x: u16, y: u16, cell: Cell) {
        if x >= self.bounds.width || y >= self.bounds.height {
            return;
        }
        self.parent.set(self.bounds.x + x, self.bounds.y + y, cell);
    }

    /// Write a string at a position relative to the view.
    pub fn set_string(&mut self, x: u16, y: u16, s: &str, style: Style) {
        if y >= self.bounds.height || x >= self.bounds.width {
            return;
        }
        let mut col = x;
        for grapheme in s.graphemes(true) {
            if col >= self.bounds.width {
                break;
            }
            let width = grapheme.width() as u16;
            if width == 0 {
                continue;
            }
            let ch = grapheme.chars().next().unwrap_or(' ');
            self.set(col, y, Cell::styled(ch, style));
            if width > 1 && col + 1 < self.bounds.width {
                self.set(col + 1, y, Cell::wide_continuation(style));
            }
            col = col.saturating_add(width);
        }
    }

    /// Fill a region relative to the view.
    pub fn fill(&mut self, rect: Rect, ch: char, style: Style) {
        let clipped = rect.intersection(&Rect::from_size(self.bounds.width, self.bounds.height));
        if clipped.is_empty() {
            return;
        }
        self.parent.fill(
            Rect::new(
                self.bounds.x + clipped.x,
                self.bounds.y + clipped.y,
                clipped.width,
                clipped.height,
            ),
            ch,
            style,
        );
    }

    /// Clear the view region.
    pub fn clear(&mut self) {
        self.fill(
            Rect::from_size(self.bounds.width, self.bounds.height),
            ' ',
            Style::DEFAULT,
        );
    }
}
