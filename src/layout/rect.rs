//! Rect: A rectangle primitive for layout and dirty-region tracking.

/// A rectangle defined by position and size.
///
/// Zero-area rectangles carry no content: every consumer treats
/// `width == 0 || height == 0` as empty.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Rect {
    /// X coordinate (column) of the top-left corner.
    pub x: u16,
    /// Y coordinate (row) of the top-left corner.
    pub y: u16,
    /// Width in columns.
    pub width: u16,
    /// Height in rows.
    pub height: u16,
}

impl Rect {
    /// Create a new rectangle.
    #[inline]
    pub const fn new(x: u16, y: u16, width: u16, height: u16) -> Self {
        Self { x, y, width, height }
    }

    /// Create a rectangle from a terminal size (full screen).
    #[inline]
    pub const fn from_size(width: u16, height: u16) -> Self {
        Self::new(0, 0, width, height)
    }

    /// Zero-sized rectangle.
    pub const ZERO: Self = Self::new(0, 0, 0, 0);

    /// Get the area (number of cells).
    #[inline]
    pub const fn area(&self) -> u32 {
        (self.width as u32) * (self.height as u32)
    }

    /// Check if the rectangle is empty.
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Get the right edge (exclusive).
    #[inline]
    pub const fn right(&self) -> u16 {
        self.x.saturating_add(self.width)
    }

    /// Get the bottom edge (exclusive).
    #[inline]
    pub const fn bottom(&self) -> u16 {
        self.y.saturating_add(self.height)
    }

    /// Check if a point is inside the rectangle.
    #[inline]
    pub const fn contains(&self, x: u16, y: u16) -> bool {
        x >= self.x && x < self.right() && y >= self.y && y < self.bottom()
    }

    /// Check if this rectangle intersects with another.
    #[inline]
    pub const fn intersects(&self, other: &Self) -> bool {
        self.x < other.right()
            && self.right() > other.x
            && self.y < other.bottom()
            && self.bottom() > other.y
    }

    /// Compute the overlapping region with another rectangle.
    ///
    /// Returns [`Rect::ZERO`] when the rectangles do not overlap.
    #[must_use]
    pub fn intersection(&self, other: &Self) -> Self {
        if !self.intersects(other) {
            return Self::ZERO;
        }
        let x = self.x.max(other.x);
        let y = self.y.max(other.y);
        let right = self.right().min(other.right());
        let bottom = self.bottom().min(other.bottom());
        Self::new(x, y, right - x, bottom - y)
    }

    /// Grow this rectangle so it covers a single point.
    ///
    /// An empty rectangle becomes a 1x1 rectangle at the point.
    pub fn expand_to(&mut self, x: u16, y: u16) {
        if self.is_empty() {
            *self = Self::new(x, y, 1, 1);
            return;
        }
        if x < self.x {
            self.width += self.x - x;
            self.x = x;
        } else if x >= self.right() {
            self.width = x - self.x + 1;
        }
        if y < self.y {
            self.height += self.y - y;
            self.y = y;
        } else if y >= self.bottom() {
            self.height = y - self.y + 1;
        }
    }
}

impl std::fmt::Debug for Rect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Rect({}, {} {}x{})", self.x, self.y, self.width, self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contains() {
        let r = Rect::new(2, 3, 4, 2);
        assert!(r.contains(2, 3));
        assert!(r.contains(5, 4));
        assert!(!r.contains(6, 3));
        assert!(!r.contains(2, 5));
    }

    #[test]
    fn test_intersection() {
        let a = Rect::new(0, 0, 10, 10);
        let b = Rect::new(5, 5, 10, 10);
        assert_eq!(a.intersection(&b), Rect::new(5, 5, 5, 5));

        let c = Rect::new(20, 20, 2, 2);
        assert_eq!(a.intersection(&c), Rect::ZERO);
    }

    #[test]
    fn test_expand_to() {
        let mut r = Rect::ZERO;
        r.expand_to(4, 2);
        assert_eq!(r, Rect::new(4, 2, 1, 1));

        r.expand_to(1, 5);
        assert_eq!(r, Rect::new(1, 2, 4, 4));

        r.expand_to(6, 1);
        assert_eq!(r, Rect::new(1, 1, 6, 5));
    }
}
