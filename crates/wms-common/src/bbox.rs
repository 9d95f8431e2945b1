//! Bounding box types and longitude canonicalisation.

use serde::{Deserialize, Serialize};

/// A geographic or projected bounding box.
///
/// For geographic CRS (EPSG:4326 / CRS:84), coordinates are in degrees.
/// For projected CRS (EPSG:3857, etc.), coordinates are in meters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BoundingBox {
    /// Create a new bounding box from corner coordinates.
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// Width of the bounding box in coordinate units.
    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    /// Height of the bounding box in coordinate units.
    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    /// The corners as `[min_x, min_y, max_x, max_y]`.
    pub fn to_array(&self) -> [f64; 4] {
        [self.min_x, self.min_y, self.max_x, self.max_y]
    }

    /// Copy of this bbox with both X bounds wrapped into (-180, 180].
    ///
    /// Only meaningful for longitude axes. Functionally equivalent boxes
    /// (e.g. 0..360 and -360..0) map onto the same values.
    pub fn with_constrained_longitudes(&self) -> Self {
        Self {
            min_x: constrain_longitude_180(self.min_x),
            max_x: constrain_longitude_180(self.max_x),
            ..*self
        }
    }
}

/// Wrap a longitude into the range [0, 360).
pub fn constrain_longitude_360(value: f64) -> f64 {
    let wrapped = value % 360.0;
    if wrapped < 0.0 {
        wrapped + 360.0
    } else {
        wrapped
    }
}

/// Wrap a longitude into the range (-180, 180].
pub fn constrain_longitude_180(value: f64) -> f64 {
    let wrapped = constrain_longitude_360(value);
    if wrapped > 180.0 {
        wrapped - 360.0
    } else {
        wrapped
    }
}
