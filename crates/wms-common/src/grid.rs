//! Regular output grids (the pixel lattice of a rendered map request).

use crate::{BoundingBox, CrsCode};
use serde::{Deserialize, Serialize};

/// A regular grid of output pixels covering a bounding box in some CRS.
///
/// Pixels are ordered row-major, top-to-bottom: pixel (0, 0) is the
/// north-west corner and the flat index of (col, row) is `row * width + col`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegularGrid {
    /// CRS the bounding box is expressed in
    pub crs: CrsCode,
    /// Extent of the grid
    pub bbox: BoundingBox,
    /// Number of pixels in X
    pub width: usize,
    /// Number of pixels in Y
    pub height: usize,
}

impl RegularGrid {
    pub fn new(crs: CrsCode, bbox: BoundingBox, width: usize, height: usize) -> Self {
        Self {
            crs,
            bbox,
            width,
            height,
        }
    }

    /// Coordinates of the centre of pixel (col, row) in the grid's CRS.
    pub fn pixel_centre(&self, col: usize, row: usize) -> (f64, f64) {
        let dx = self.bbox.width() / self.width as f64;
        let dy = self.bbox.height() / self.height as f64;
        let x = self.bbox.min_x + (col as f64 + 0.5) * dx;
        let y = self.bbox.max_y - (row as f64 + 0.5) * dy;
        (x, y)
    }

    /// Pixel centre for a flat (row-major) pixel index.
    pub fn pixel_centre_at(&self, index: usize) -> (f64, f64) {
        self.pixel_centre(index % self.width, index / self.width)
    }

    /// Total number of pixels.
    pub fn len(&self) -> usize {
        self.width * self.height
    }

    /// Check if grid is empty.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}
