//! Look-up table (LUT) from longitude/latitude to approximate grid indices.
//!
//! Lon/lat space over the grid's envelope is divided into square bins of a
//! fixed resolution (about a third of the grid's typical cell size). Each bin
//! stores the (i, j) of a cell near the bin, so a query costs two divisions
//! and an array read. The stored index is only a first guess; callers refine
//! it with point-in-cell tests (see [`LookUpTableGrid`](crate::LookUpTableGrid)).
//!
//! # Rasterization
//!
//! 1. Every bin whose centre lies inside a cell gets that cell's index.
//! 2. The bin containing each cell centre is filled if still empty.
//! 3. Remaining empty bins within one bin of a cell's envelope get that
//!    cell's index, so any point strictly inside the grid finds a guess.
//!
//! The envelope carries a one-bin margin; points further out are "not found".
//!
//! # Longitude convention
//!
//! Grids may use 0..360 or -180..180 longitudes, and may cross the
//! antimeridian. Cells are rasterized with longitudes unwrapped relative to
//! the first grid point; queries are shifted by a multiple of 360° into
//! `[min_lon, min_lon + 360)` before binning.

use std::time::Instant;

use tracing::debug;
use wms_common::constrain_longitude_360;

use crate::curvilinear::{unwrap_lon, Cell, CurvilinearGrid};
use crate::error::{ProjectionError, ProjectionResult};

/// Upper bound on the number of bins in one table.
const MAX_BINS: usize = 200_000_000;

/// Uniform-resolution index from lon/lat to approximate (i, j).
#[derive(Clone)]
pub struct LookUpTable {
    min_lon: f64,
    min_lat: f64,
    resolution: f64,
    n_lon: usize,
    n_lat: usize,
    /// Grid indices per bin, flat index `row * n_lon + col`
    indices: Vec<(u32, u32)>,
    /// Bit N is 1 if bin N holds an index. Packed as 64-bit words.
    populated: Vec<u64>,
}

impl LookUpTable {
    /// Build a table for `grid` with bins of `resolution` degrees.
    pub fn new(grid: &CurvilinearGrid, resolution: f64) -> ProjectionResult<Self> {
        if !resolution.is_finite() || resolution <= 0.0 {
            return Err(ProjectionError::invalid_grid(format!(
                "look-up table resolution must be positive, got {}",
                resolution
            )));
        }
        if grid.ni() > u32::MAX as usize || grid.nj() > u32::MAX as usize {
            return Err(ProjectionError::invalid_grid("grid dimensions exceed u32 range"));
        }

        let start = Instant::now();
        let reference = grid.point(0, 0).lon;

        let (mut min_lon, mut min_lat, mut max_lon, mut max_lat) =
            (f64::INFINITY, f64::INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY);
        for cell in grid.cells() {
            let (x0, y0, x1, y1) = unwrapped_envelope(&cell, reference);
            min_lon = min_lon.min(x0);
            min_lat = min_lat.min(y0);
            max_lon = max_lon.max(x1);
            max_lat = max_lat.max(y1);
        }
        min_lon -= resolution;
        min_lat -= resolution;
        max_lon += resolution;
        max_lat += resolution;

        let n_lon = (((max_lon - min_lon) / resolution).ceil() as usize).max(1);
        let n_lat = (((max_lat - min_lat) / resolution).ceil() as usize).max(1);
        if n_lon.saturating_mul(n_lat) > MAX_BINS {
            return Err(ProjectionError::LookUpTableTooLarge { n_lon, n_lat });
        }

        let n_bins = n_lon * n_lat;
        let mut lut = Self {
            min_lon,
            min_lat,
            resolution,
            n_lon,
            n_lat,
            indices: vec![(0, 0); n_bins],
            populated: vec![0u64; n_bins.div_ceil(64)],
        };

        // Pass 1: bins whose centre is inside the cell
        for cell in grid.cells() {
            let (x0, y0, x1, y1) = unwrapped_envelope(&cell, reference);
            let (cols, rows) = lut.centre_range(x0, y0, x1, y1);
            for row in rows {
                for col in cols.clone() {
                    let (lon, lat) = lut.bin_centre(col, row);
                    if cell.contains(&crate::LonLat::new(lon, lat)) {
                        lut.set(row * n_lon + col, cell.i(), cell.j());
                    }
                }
            }
        }

        // Pass 2: the bin holding each cell centre
        for cell in grid.cells() {
            let centre = cell.centre();
            if let Some(bin) = lut.bin_index(centre.lon, centre.lat) {
                if !lut.is_populated(bin) {
                    lut.set(bin, cell.i(), cell.j());
                }
            }
        }

        // Pass 3: gaps along cell edges and the grid boundary
        for cell in grid.cells() {
            let (x0, y0, x1, y1) = unwrapped_envelope(&cell, reference);
            let (cols, rows) = lut.centre_range(
                x0 - resolution,
                y0 - resolution,
                x1 + resolution,
                y1 + resolution,
            );
            for row in rows {
                for col in cols.clone() {
                    let bin = row * n_lon + col;
                    if !lut.is_populated(bin) {
                        lut.set(bin, cell.i(), cell.j());
                    }
                }
            }
        }

        debug!(
            n_lon = n_lon,
            n_lat = n_lat,
            resolution = resolution,
            populated = lut.populated_count(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Built look-up table"
        );

        Ok(lut)
    }

    /// Approximate grid indices for a lon/lat point.
    ///
    /// Returns `None` outside the table's envelope or for unpopulated bins.
    pub fn lookup(&self, lon: f64, lat: f64) -> Option<(usize, usize)> {
        let bin = self.bin_index(lon, lat)?;
        if self.is_populated(bin) {
            let (i, j) = self.indices[bin];
            Some((i as usize, j as usize))
        } else {
            None
        }
    }

    /// Bin edge length in degrees.
    pub fn resolution(&self) -> f64 {
        self.resolution
    }

    /// Table dimensions as (n_lon, n_lat).
    pub fn dimensions(&self) -> (usize, usize) {
        (self.n_lon, self.n_lat)
    }

    /// Number of bins holding an index.
    pub fn populated_count(&self) -> usize {
        self.populated
            .iter()
            .map(|w| w.count_ones() as usize)
            .sum()
    }

    /// Approximate heap footprint in bytes.
    pub fn byte_size(&self) -> usize {
        self.indices.len() * std::mem::size_of::<(u32, u32)>() + self.populated.len() * 8
    }

    fn bin_index(&self, lon: f64, lat: f64) -> Option<usize> {
        if !lon.is_finite() || !lat.is_finite() {
            return None;
        }
        let lon = self.min_lon + constrain_longitude_360(lon - self.min_lon);
        let col = ((lon - self.min_lon) / self.resolution).floor();
        let row = ((lat - self.min_lat) / self.resolution).floor();
        if col < 0.0 || row < 0.0 || col >= self.n_lon as f64 || row >= self.n_lat as f64 {
            return None;
        }
        Some(row as usize * self.n_lon + col as usize)
    }

    fn bin_centre(&self, col: usize, row: usize) -> (f64, f64) {
        (
            self.min_lon + (col as f64 + 0.5) * self.resolution,
            self.min_lat + (row as f64 + 0.5) * self.resolution,
        )
    }

    /// Column and row ranges of bins whose centres fall inside an envelope.
    fn centre_range(
        &self,
        min_lon: f64,
        min_lat: f64,
        max_lon: f64,
        max_lat: f64,
    ) -> (std::ops::Range<usize>, std::ops::Range<usize>) {
        let span = |lo: f64, hi: f64, origin: f64, n: usize| {
            let first = ((lo - origin) / self.resolution - 0.5).ceil().max(0.0);
            let last = ((hi - origin) / self.resolution - 0.5).floor();
            if last < first {
                return 0..0;
            }
            let first = first as usize;
            let end = ((last as usize) + 1).min(n);
            first.min(end)..end
        };
        (
            span(min_lon, max_lon, self.min_lon, self.n_lon),
            span(min_lat, max_lat, self.min_lat, self.n_lat),
        )
    }

    #[inline]
    fn is_populated(&self, bin: usize) -> bool {
        (self.populated[bin / 64] & (1u64 << (bin % 64))) != 0
    }

    #[inline]
    fn set(&mut self, bin: usize, i: usize, j: usize) {
        self.indices[bin] = (i as u32, j as u32);
        self.populated[bin / 64] |= 1u64 << (bin % 64);
    }
}

/// Cell envelope shifted so the cell centre lies within 180° of `reference`.
fn unwrapped_envelope(cell: &Cell<'_>, reference: f64) -> (f64, f64, f64, f64) {
    let centre = cell.centre().lon;
    let shift = unwrap_lon(centre, reference) - centre;
    let (x0, y0, x1, y1) = cell.envelope();
    (x0 + shift, y0, x1 + shift, y1)
}

impl std::fmt::Debug for LookUpTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LookUpTable")
            .field("min_lon", &self.min_lon)
            .field("min_lat", &self.min_lat)
            .field("resolution", &self.resolution)
            .field("n_lon", &self.n_lon)
            .field("n_lat", &self.n_lat)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::curvilinear::CurvilinearCoordinates;

    fn regular(ni: usize, nj: usize, lon0: f64) -> CurvilinearGrid {
        let coords =
            CurvilinearCoordinates::from_fn(ni, nj, |i, j| (lon0 + i as f64, j as f64));
        CurvilinearGrid::new(coords).unwrap()
    }

    #[test]
    fn test_lookup_inside_grid() {
        let grid = regular(10, 8, 0.0);
        let lut = LookUpTable::new(&grid, 1.0 / 3.0).unwrap();

        assert_eq!(lut.lookup(3.0, 4.0), Some((3, 4)));
        assert_eq!(lut.lookup(0.1, 0.1), Some((0, 0)));
        assert_eq!(lut.lookup(9.2, 6.9), Some((9, 7)));
    }

    #[test]
    fn test_lookup_outside_envelope() {
        let grid = regular(10, 8, 0.0);
        let lut = LookUpTable::new(&grid, 1.0 / 3.0).unwrap();

        assert_eq!(lut.lookup(50.0, 50.0), None);
        assert_eq!(lut.lookup(3.0, -20.0), None);
        assert_eq!(lut.lookup(-100.0, 4.0), None);
        assert_eq!(lut.lookup(f64::NAN, 4.0), None);
    }

    #[test]
    fn test_longitude_conventions() {
        // Grid stored in 0..360, centres at 200..209
        let grid = regular(10, 4, 200.0);
        let lut = LookUpTable::new(&grid, 0.25).unwrap();

        assert_eq!(lut.lookup(205.0, 2.0), Some((5, 2)));
        // The same meridian expressed in -180..180
        assert_eq!(lut.lookup(-155.0, 2.0), Some((5, 2)));
        assert_eq!(lut.lookup(565.0, 2.0), Some((5, 2)));
    }

    #[test]
    fn test_every_bin_near_grid_is_populated() {
        let grid = regular(6, 6, 0.0);
        let lut = LookUpTable::new(&grid, 0.2).unwrap();
        for step_i in 0..60 {
            for step_j in 0..60 {
                let lon = -0.49 + step_i as f64 * 0.1;
                let lat = -0.49 + step_j as f64 * 0.1;
                assert!(lut.lookup(lon, lat).is_some(), "no guess for ({}, {})", lon, lat);
            }
        }
    }

    #[test]
    fn test_rejects_bad_resolution() {
        let grid = regular(4, 4, 0.0);
        assert!(LookUpTable::new(&grid, 0.0).is_err());
        assert!(LookUpTable::new(&grid, f64::NAN).is_err());
        assert!(matches!(
            LookUpTable::new(&grid, 1e-6),
            Err(ProjectionError::LookUpTableTooLarge { .. })
        ));
    }
}
