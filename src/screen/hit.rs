//! Mouse hit testing.
//!
//! The grid maps each screen cell to the widget that should receive mouse
//! events there. Widgets are identified by their layer index plus a
//! child-index path from the layer root, so the grid holds no references
//! into the tree. When regions overlap on a cell, the narrowest one wins,
//! which keeps small controls clickable inside large containers.

use crate::layout::Rect;
use crate::widget::WidgetPath;

/// A registered hit region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HitRegion {
    /// Index of the layer the widget lives in.
    pub layer: usize,
    /// Child-index path from the layer root.
    pub path: WidgetPath,
    /// Screen-space bounds of the widget.
    pub bounds: Rect,
}

/// Per-cell widget lookup for mouse routing.
pub struct HitGrid {
    width: u16,
    height: u16,
    // Region index + 1; zero means no hit.
    cells: Vec<u32>,
    regions: Vec<HitRegion>,
}

impl HitGrid {
    /// Create an empty grid covering the given area.
    pub fn new(width: u16, height: u16) -> Self {
        Self {
            width,
            height,
            cells: vec![0; usize::from(width) * usize::from(height)],
            regions: Vec::new(),
        }
    }

    /// Drop all regions, keeping the dimensions.
    pub fn clear(&mut self) {
        self.cells.fill(0);
        self.regions.clear();
    }

    /// Resize the grid, dropping all regions.
    pub fn resize(&mut self, width: u16, height: u16) {
        self.width = width;
        self.height = height;
        self.cells = vec![0; usize::from(width) * usize::from(height)];
        self.regions.clear();
    }

    /// Register a widget's bounds, clipped to the grid.
    ///
    /// Cells already claimed by a smaller region are left alone.
    pub fn add(&mut self, layer: usize, path: WidgetPath, bounds: Rect) {
        if bounds.is_empty() {
            return;
        }
        let area = bounds.area();
        let region_id = self.regions.len() as u32 + 1;
        self.regions.push(HitRegion {
            layer,
            path,
            bounds,
        });

        let x_end = bounds.right().min(self.width);
        let y_end = bounds.bottom().min(self.height);
        for y in bounds.y..y_end {
            let row = usize::from(y) * usize::from(self.width);
            for x in bounds.x..x_end {
                let idx = row + usize::from(x);
                let cur = self.cells[idx];
                if cur == 0 || self.regions[cur as usize - 1].bounds.area() >= area {
                    self.cells[idx] = region_id;
                }
            }
        }
    }

    /// Look up the region at (x, y).
    pub fn region_at(&self, x: u16, y: u16) -> Option<&HitRegion> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = usize::from(y) * usize::from(self.width) + usize::from(x);
        match self.cells[idx] {
            0 => None,
            id => self.regions.get(id as usize - 1),
        }
    }
}
