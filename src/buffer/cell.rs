//! Cell: the atomic unit of terminal display.
//!
//! A cell is a plain value: one display character plus a [`Style`].
//! The buffer owns cell storage; cells themselves carry no dirty state.
//! Dirtiness is tracked per-index by the buffer's generation stamps.

use bitflags::bitflags;

/// True-color RGB representation.
#[repr(C)]
#[derive(Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct Rgb {
    /// Red channel (0-255)
    pub r: u8,
    /// Green channel (0-255)
    pub g: u8,
    /// Blue channel (0-255)
    pub b: u8,
}

impl Rgb {
    /// Create a new RGB color.
    #[inline]
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Black (0, 0, 0)
    pub const BLACK: Self = Self::new(0, 0, 0);
    /// White (255, 255, 255)
    pub const WHITE: Self = Self::new(255, 255, 255);
    /// Default foreground (white)
    pub const DEFAULT_FG: Self = Self::WHITE;
    /// Default background (black)
    pub const DEFAULT_BG: Self = Self::BLACK;

    /// Create from a 24-bit hex color (e.g., 0xFF5500).
    #[inline]
    pub const fn from_u32(hex: u32) -> Self {
        Self::new(
            ((hex >> 16) & 0xFF) as u8,
            ((hex >> 8) & 0xFF) as u8,
            (hex & 0xFF) as u8,
        )
    }
}

impl std::fmt::Debug for Rgb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl From<(u8, u8, u8)> for Rgb {
    #[inline]
    fn from((r, g, b): (u8, u8, u8)) -> Self {
        Self::new(r, g, b)
    }
}

impl From<u32> for Rgb {
    #[inline]
    fn from(hex: u32) -> Self {
        Self::from_u32(hex)
    }
}

bitflags! {
    /// Text style modifiers.
    ///
    /// These can be combined using bitwise OR.
    ///
    /// # Example
    /// ```
    /// use treadle::Modifiers;
    /// let style = Modifiers::BOLD | Modifiers::ITALIC;
    /// ```
    #[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Modifiers: u8 {
        /// Bold text
        const BOLD = 0b0000_0001;
        /// Dim/faint text
        const DIM = 0b0000_0010;
        /// Italic text
        const ITALIC = 0b0000_0100;
        /// Underlined text
        const UNDERLINE = 0b0000_1000;
        /// Blinking text
        const BLINK = 0b0001_0000;
        /// Reversed colors (fg/bg swapped)
        const REVERSED = 0b0010_0000;
        /// Hidden/invisible text
        const HIDDEN = 0b0100_0000;
        /// Strikethrough text
        const STRIKETHROUGH = 0b1000_0000;
    }
}

impl std::fmt::Debug for Modifiers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        bitflags::parser::to_writer(self, f)
    }
}

bitflags! {
    /// Structural cell flags, separate from visual style.
    #[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct CellFlags: u8 {
        /// The right half of a wide glyph. The glyph lives in the cell to
        /// the left; backends must not emit this cell.
        const WIDE_CONTINUATION = 0b0000_0001;
    }
}

impl std::fmt::Debug for CellFlags {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        bitflags::parser::to_writer(self, f)
    }
}

/// Colors and modifiers applied to a cell.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct Style {
    /// Foreground color.
    pub fg: Rgb,
    /// Background color.
    pub bg: Rgb,
    /// Text modifiers (bold, italic, etc.).
    pub modifiers: Modifiers,
}

impl Default for Style {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl Style {
    /// Default foreground on default background, no modifiers.
    pub const DEFAULT: Self = Self {
        fg: Rgb::DEFAULT_FG,
        bg: Rgb::DEFAULT_BG,
        modifiers: Modifiers::empty(),
    };

    /// Create a style from foreground and background colors.
    #[inline]
    pub const fn new(fg: Rgb, bg: Rgb) -> Self {
        Self {
            fg,
            bg,
            modifiers: Modifiers::empty(),
        }
    }

    /// Set the foreground color (builder pattern).
    #[inline]
    #[must_use]
    pub const fn with_fg(mut self, fg: Rgb) -> Self {
        self.fg = fg;
        self
    }

    /// Set the background color (builder pattern).
    #[inline]
    #[must_use]
    pub const fn with_bg(mut self, bg: Rgb) -> Self {
        self.bg = bg;
        self
    }

    /// Set the modifiers (builder pattern).
    #[inline]
    #[must_use]
    pub const fn with_modifiers(mut self, modifiers: Modifiers) -> Self {
        self.modifiers = modifiers;
        self
    }
}

/// A single terminal cell: one character plus its style.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Cell {
    /// The display character.
    pub ch: char,
    /// Colors and modifiers.
    pub style: Style,
    flags: CellFlags,
}

impl Default for Cell {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl Cell {
    /// An empty cell (space character with default style).
    pub const EMPTY: Self = Self {
        ch: ' ',
        style: Style::DEFAULT,
        flags: CellFlags::empty(),
    };

    /// Create a cell with the default style.
    #[inline]
    pub const fn new(ch: char) -> Self {
        Self {
            ch,
            style: Style::DEFAULT,
            flags: CellFlags::empty(),
        }
    }

    /// Create a cell with an explicit style.
    #[inline]
    pub const fn styled(ch: char, style: Style) -> Self {
        Self {
            ch,
            style,
            flags: CellFlags::empty(),
        }
    }

    /// Create the trailing half of a wide glyph.
    #[inline]
    pub const fn wide_continuation(style: Style) -> Self {
        Self {
            ch: ' ',
            style,
            flags: CellFlags::WIDE_CONTINUATION,
        }
    }

    /// Structural flags for this cell.
    #[inline]
    pub const fn flags(&self) -> CellFlags {
        self.flags
    }

    /// True if this cell is the right half of a wide glyph.
    #[inline]
    pub const fn is_wide_continuation(&self) -> bool {
        self.flags.contains(CellFlags::WIDE_CONTINUATION)
    }

    /// Set the style (builder pattern).
    #[inline]
    #[must_use]
    pub const fn with_style(mut self, style: Style) -> Self {
        self.style = style;
        self
    }

    /// Reset the cell to empty (space with default style).
    #[inline]
    pub fn reset(&mut self) {
        *self = Self::EMPTY;
    }
}

impl std::fmt::Debug for Cell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Cell({:?}, {:?})", self.ch, self.style)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rgb_from_tuple() {
        let rgb: Rgb = (255, 128, 0).into();
        assert_eq!(rgb.r, 255);
        assert_eq!(rgb.g, 128);
        assert_eq!(rgb.b, 0);
    }

    #[test]
    fn test_rgb_from_hex() {
        let rgb: Rgb = 0xFF8000.into();
        assert_eq!(rgb.r, 255);
        assert_eq!(rgb.g, 128);
        assert_eq!(rgb.b, 0);
    }

    #[test]
    fn test_cell_equality() {
        let red = Style::DEFAULT.with_fg(Rgb::new(255, 0, 0));
        let green = Style::DEFAULT.with_fg(Rgb::new(0, 255, 0));
        assert_eq!(Cell::styled('A', red), Cell::styled('A', red));
        assert_ne!(Cell::styled('A', red), Cell::styled('A', green));
        assert_ne!(Cell::styled('A', red), Cell::styled('B', red));
    }

    #[test]
    fn test_style_builder() {
        let style = Style::DEFAULT
            .with_fg(Rgb::new(255, 0, 0))
            .with_bg(Rgb::new(0, 0, 255))
            .with_modifiers(Modifiers::BOLD | Modifiers::ITALIC);

        assert_eq!(style.fg, Rgb::new(255, 0, 0));
        assert_eq!(style.bg, Rgb::new(0, 0, 255));
        assert!(style.modifiers.contains(Modifiers::BOLD));
        assert!(style.modifiers.contains(Modifiers::ITALIC));
    }

    #[test]
    fn test_cell_reset() {
        let mut cell = Cell::styled('X', Style::DEFAULT.with_fg(Rgb::new(255, 0, 0)));
        cell.reset();
        assert_eq!(cell, Cell::EMPTY);
    }
}
