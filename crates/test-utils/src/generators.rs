//! Synthetic curvilinear grids and fields.
//!
//! Every generated grid is an affine image of a regular index lattice, so
//! the cell containing any point is known analytically: map the point back
//! to fractional indices and round.

use projection::CurvilinearCoordinates;
use wms_common::constrain_longitude_180;

/// A regular lon/lat grid rotated about its first grid point.
///
/// Grid point (i, j) lies at
/// `origin + spacing * R(angle) * (i, j)`.
///
/// # Example
///
/// ```
/// use test_utils::RotatedGrid;
///
/// let grid = RotatedGrid::new(4, 4).with_rotation(15.0);
/// let coords = grid.coordinates();
/// assert_eq!(coords.longitudes.len(), 16);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RotatedGrid {
    pub ni: usize,
    pub nj: usize,
    pub origin_lon: f64,
    pub origin_lat: f64,
    /// Distance between neighbouring points, degrees
    pub spacing: f64,
    /// Counter-clockwise rotation, degrees
    pub rotation_deg: f64,
    /// Store longitudes in (-180, 180] instead of unwrapped
    pub wrap_longitudes: bool,
}

impl RotatedGrid {
    /// Unrotated unit-spaced grid with its first point at (0, 0).
    pub fn new(ni: usize, nj: usize) -> Self {
        Self {
            ni,
            nj,
            origin_lon: 0.0,
            origin_lat: 0.0,
            spacing: 1.0,
            rotation_deg: 0.0,
            wrap_longitudes: false,
        }
    }

    pub fn with_origin(mut self, lon: f64, lat: f64) -> Self {
        self.origin_lon = lon;
        self.origin_lat = lat;
        self
    }

    pub fn with_spacing(mut self, spacing: f64) -> Self {
        self.spacing = spacing;
        self
    }

    pub fn with_rotation(mut self, degrees: f64) -> Self {
        self.rotation_deg = degrees;
        self
    }

    /// Wrap stored longitudes into (-180, 180], e.g. for grids crossing
    /// the antimeridian.
    pub fn wrapped(mut self) -> Self {
        self.wrap_longitudes = true;
        self
    }

    /// Position of fractional grid index (fi, fj), unwrapped.
    pub fn position(&self, fi: f64, fj: f64) -> (f64, f64) {
        let (sin, cos) = self.rotation_deg.to_radians().sin_cos();
        let lon = self.origin_lon + self.spacing * (fi * cos - fj * sin);
        let lat = self.origin_lat + self.spacing * (fi * sin + fj * cos);
        (lon, lat)
    }

    /// Fractional grid index of a position (inverse of [`position`](Self::position)).
    pub fn fractional_index(&self, lon: f64, lat: f64) -> (f64, f64) {
        let (sin, cos) = self.rotation_deg.to_radians().sin_cos();
        let dlon = constrain_longitude_180(lon - self.origin_lon) / self.spacing;
        let dlat = (lat - self.origin_lat) / self.spacing;
        (dlon * cos + dlat * sin, -dlon * sin + dlat * cos)
    }

    /// Cell containing a position, if any.
    pub fn cell_containing(&self, lon: f64, lat: f64) -> Option<(usize, usize)> {
        let (fi, fj) = self.fractional_index(lon, lat);
        let (i, j) = (fi.round(), fj.round());
        if i < 0.0 || j < 0.0 || i >= self.ni as f64 || j >= self.nj as f64 {
            return None;
        }
        Some((i as usize, j as usize))
    }

    /// Coordinate arrays for this grid.
    pub fn coordinates(&self) -> CurvilinearCoordinates {
        CurvilinearCoordinates::from_fn(self.ni, self.nj, |i, j| {
            let (lon, lat) = self.position(i as f64, j as f64);
            if self.wrap_longitudes {
                (constrain_longitude_180(lon), lat)
            } else {
                (lon, lat)
            }
        })
    }
}

/// A field whose value at (i, j) is `j * ni + i`, so sampled values
/// identify the grid point they came from.
///
/// # Example
///
/// ```
/// use test_utils::index_field;
///
/// let field = index_field(3, 2);
/// assert_eq!(field[4], Some(4.0)); // i = 1, j = 1
/// ```
pub fn index_field(ni: usize, nj: usize) -> Vec<Option<f32>> {
    (0..ni * nj).map(|idx| Some(idx as f32)).collect()
}

/// Deterministic points spread over the interior of a grid, as fractional
/// indices kept at least `margin` away from every cell edge.
pub fn interior_indices(ni: usize, nj: usize, per_cell: usize, margin: f64) -> Vec<(f64, f64)> {
    let mut points = Vec::with_capacity(ni * nj * per_cell * per_cell);
    let span = 1.0 - 2.0 * margin;
    for j in 0..nj {
        for i in 0..ni {
            for a in 0..per_cell {
                for b in 0..per_cell {
                    let u = -0.5 + margin + span * (a as f64 + 0.5) / per_cell as f64;
                    let v = -0.5 + margin + span * (b as f64 + 0.5) / per_cell as f64;
                    points.push((i as f64 + u, j as f64 + v));
                }
            }
        }
    }
    points
}
