//! Curvilinear grids and their cells.
//!
//! Grid points are treated as cell centres. Cell corners are not stored in
//! source files, so they are derived: each corner is the mean of the four
//! surrounding centres, using one row/column of linear extrapolation beyond
//! every edge of the grid. For an affine (e.g. rotated regular) grid this
//! reproduces the true cell corners exactly.
//!
//! All longitude arithmetic goes through [`unwrap_lon`], so cells next to the
//! antimeridian never appear to span hundreds of degrees.

use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};

use wms_common::constrain_longitude_180;

use crate::error::{ProjectionError, ProjectionResult};
use crate::position::LonLat;

/// Shift `lon` by a multiple of 360° so it lies within 180° of `reference`.
#[inline]
pub(crate) fn unwrap_lon(lon: f64, reference: f64) -> f64 {
    reference + constrain_longitude_180(lon - reference)
}

/// Raw 2-D coordinate arrays describing a curvilinear grid.
///
/// Both arrays hold one value per grid point at flat index `j * ni + i`.
#[derive(Debug, Clone, PartialEq)]
pub struct CurvilinearCoordinates {
    pub ni: usize,
    pub nj: usize,
    pub longitudes: Vec<f64>,
    pub latitudes: Vec<f64>,
}

impl CurvilinearCoordinates {
    /// Wrap coordinate arrays, checking their lengths.
    pub fn new(
        ni: usize,
        nj: usize,
        longitudes: Vec<f64>,
        latitudes: Vec<f64>,
    ) -> ProjectionResult<Self> {
        let expected = ni * nj;
        if longitudes.len() != expected || latitudes.len() != expected {
            return Err(ProjectionError::invalid_grid(format!(
                "expected {} x {} = {} coordinates, got {} longitudes and {} latitudes",
                ni,
                nj,
                expected,
                longitudes.len(),
                latitudes.len()
            )));
        }
        Ok(Self {
            ni,
            nj,
            longitudes,
            latitudes,
        })
    }

    /// Build coordinate arrays by evaluating `f(i, j) -> (lon, lat)`.
    pub fn from_fn<F>(ni: usize, nj: usize, f: F) -> Self
    where
        F: Fn(usize, usize) -> (f64, f64),
    {
        let mut longitudes = Vec::with_capacity(ni * nj);
        let mut latitudes = Vec::with_capacity(ni * nj);
        for j in 0..nj {
            for i in 0..ni {
                let (lon, lat) = f(i, j);
                longitudes.push(lon);
                latitudes.push(lat);
            }
        }
        Self {
            ni,
            nj,
            longitudes,
            latitudes,
        }
    }

    /// Content hash of the coordinate arrays plus the grid dimensions.
    pub fn fingerprint(&self) -> GridFingerprint {
        let mut hasher = DefaultHasher::new();
        self.ni.hash(&mut hasher);
        self.nj.hash(&mut hasher);
        for v in self.longitudes.iter().chain(&self.latitudes) {
            v.to_bits().hash(&mut hasher);
        }
        GridFingerprint {
            content_hash: hasher.finish(),
            ni: self.ni,
            nj: self.nj,
        }
    }
}

/// Identity of a curvilinear grid for caching: a 64-bit hash of the
/// coordinate arrays together with the grid dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GridFingerprint {
    pub content_hash: u64,
    pub ni: usize,
    pub nj: usize,
}

impl fmt::Display for GridFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}:{:016x}", self.ni, self.nj, self.content_hash)
    }
}

/// A 2-D grid whose points carry explicit longitude/latitude values.
///
/// Two grids are equal when their coordinate arrays are equal; derived data
/// (corners, mean cell area) follows from the coordinates.
pub struct CurvilinearGrid {
    coords: CurvilinearCoordinates,
    /// Cell corner longitudes, flat index `cj * (ni + 1) + ci`
    corner_lons: Vec<f64>,
    /// Cell corner latitudes, same layout as `corner_lons`
    corner_lats: Vec<f64>,
    mean_cell_area: f64,
    fingerprint: GridFingerprint,
}

impl CurvilinearGrid {
    /// Build a grid from its coordinate arrays.
    ///
    /// Fails if the grid is smaller than 2 × 2, contains non-finite
    /// coordinates, or has a cell of zero area.
    pub fn new(coords: CurvilinearCoordinates) -> ProjectionResult<Self> {
        let fingerprint = coords.fingerprint();
        Self::with_fingerprint(coords, fingerprint)
    }

    pub(crate) fn with_fingerprint(
        coords: CurvilinearCoordinates,
        fingerprint: GridFingerprint,
    ) -> ProjectionResult<Self> {
        let CurvilinearCoordinates { ni, nj, .. } = coords;
        if ni < 2 || nj < 2 {
            return Err(ProjectionError::invalid_grid(format!(
                "grid must be at least 2 x 2, got {} x {}",
                ni, nj
            )));
        }
        if coords.longitudes.len() != ni * nj || coords.latitudes.len() != ni * nj {
            return Err(ProjectionError::invalid_grid(
                "coordinate array length does not match grid dimensions",
            ));
        }
        if let Some(pos) = coords
            .longitudes
            .iter()
            .zip(&coords.latitudes)
            .position(|(lon, lat)| !lon.is_finite() || !lat.is_finite())
        {
            return Err(ProjectionError::invalid_grid(format!(
                "non-finite coordinate at i={}, j={}",
                pos % ni,
                pos / ni
            )));
        }

        let (corner_lons, corner_lats) = compute_corners(&coords);
        let mut grid = Self {
            coords,
            corner_lons,
            corner_lats,
            mean_cell_area: 0.0,
            fingerprint,
        };

        let mut total_area = 0.0;
        for cell in grid.cells() {
            let area = cell.area();
            if !area.is_finite() || area <= 0.0 {
                return Err(ProjectionError::invalid_grid(format!(
                    "degenerate cell at i={}, j={} (area {})",
                    cell.i(),
                    cell.j(),
                    area
                )));
            }
            total_area += area;
        }
        let mean = total_area / (ni * nj) as f64;
        if !mean.is_finite() || mean <= 0.0 {
            return Err(ProjectionError::invalid_grid(format!(
                "mean cell area is {}",
                mean
            )));
        }
        grid.mean_cell_area = mean;

        Ok(grid)
    }

    pub fn ni(&self) -> usize {
        self.coords.ni
    }

    pub fn nj(&self) -> usize {
        self.coords.nj
    }

    pub fn coordinates(&self) -> &CurvilinearCoordinates {
        &self.coords
    }

    pub fn fingerprint(&self) -> GridFingerprint {
        self.fingerprint
    }

    /// Arithmetic mean of all cell areas, in square degrees.
    pub fn mean_cell_area(&self) -> f64 {
        self.mean_cell_area
    }

    /// Lon/lat of grid point (i, j). Callers guarantee the indices are in range.
    #[inline]
    pub(crate) fn point(&self, i: usize, j: usize) -> LonLat {
        let idx = j * self.coords.ni + i;
        LonLat::new(self.coords.longitudes[idx], self.coords.latitudes[idx])
    }

    #[inline]
    fn corner(&self, ci: usize, cj: usize) -> LonLat {
        let idx = cj * (self.coords.ni + 1) + ci;
        LonLat::new(self.corner_lons[idx], self.corner_lats[idx])
    }

    /// The cell at (i, j).
    pub fn cell(&self, i: usize, j: usize) -> ProjectionResult<Cell<'_>> {
        self.checked_cell(i as isize, j as isize)
            .ok_or(ProjectionError::CellOutOfRange {
                i: i as isize,
                j: j as isize,
                ni: self.ni(),
                nj: self.nj(),
            })
    }

    fn checked_cell(&self, i: isize, j: isize) -> Option<Cell<'_>> {
        if i < 0 || j < 0 || i >= self.ni() as isize || j >= self.nj() as isize {
            return None;
        }
        Some(Cell {
            grid: self,
            i: i as usize,
            j: j as usize,
        })
    }

    /// Iterate over every cell, i fastest.
    pub fn cells(&self) -> impl Iterator<Item = Cell<'_>> + '_ {
        let ni = self.ni();
        (0..ni * self.nj()).map(move |idx| Cell {
            grid: self,
            i: idx % ni,
            j: idx / ni,
        })
    }
}

impl PartialEq for CurvilinearGrid {
    fn eq(&self, other: &Self) -> bool {
        self.fingerprint == other.fingerprint && self.coords == other.coords
    }
}

impl fmt::Debug for CurvilinearGrid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CurvilinearGrid")
            .field("ni", &self.ni())
            .field("nj", &self.nj())
            .field("mean_cell_area", &self.mean_cell_area)
            .field("fingerprint", &self.fingerprint)
            .finish()
    }
}

/// One cell of a curvilinear grid.
#[derive(Clone, Copy)]
pub struct Cell<'a> {
    grid: &'a CurvilinearGrid,
    i: usize,
    j: usize,
}

impl<'a> Cell<'a> {
    pub fn i(&self) -> usize {
        self.i
    }

    pub fn j(&self) -> usize {
        self.j
    }

    /// The grid point this cell is centred on.
    pub fn centre(&self) -> LonLat {
        self.grid.point(self.i, self.j)
    }

    /// Corners in order around the cell, longitudes unwrapped relative to
    /// the centre.
    pub fn corners(&self) -> [LonLat; 4] {
        let reference = self.centre().lon;
        let (i, j) = (self.i, self.j);
        [(i, j), (i + 1, j), (i + 1, j + 1), (i, j + 1)].map(|(ci, cj)| {
            let c = self.grid.corner(ci, cj);
            LonLat::new(unwrap_lon(c.lon, reference), c.lat)
        })
    }

    /// Point-in-polygon test against the cell's four corners.
    pub fn contains(&self, point: &LonLat) -> bool {
        let vertices = self
            .corners()
            .map(|c| LonLat::new(unwrap_lon(c.lon, point.lon), c.lat));

        let mut inside = false;
        let mut prev = vertices[3];
        for curr in vertices {
            if (curr.lat > point.lat) != (prev.lat > point.lat) {
                let crossing =
                    (prev.lon - curr.lon) * (point.lat - curr.lat) / (prev.lat - curr.lat) + curr.lon;
                if point.lon < crossing {
                    inside = !inside;
                }
            }
            prev = curr;
        }
        inside
    }

    /// Squared distance in lon/lat degree space from the cell centre.
    ///
    /// Only meaningful for comparing nearby cells.
    pub fn distance_sq(&self, point: &LonLat) -> f64 {
        let centre = self.centre();
        let dlon = constrain_longitude_180(point.lon - centre.lon);
        let dlat = point.lat - centre.lat;
        dlon * dlon + dlat * dlat
    }

    /// Cells sharing an edge with this one (fewer than 4 on the boundary).
    pub fn neighbours(&self) -> impl Iterator<Item = Cell<'a>> {
        let grid = self.grid;
        let (i, j) = (self.i as isize, self.j as isize);
        [(i - 1, j), (i + 1, j), (i, j - 1), (i, j + 1)]
            .into_iter()
            .filter_map(move |(ni, nj)| grid.checked_cell(ni, nj))
    }

    /// Area of the cell's quadrilateral in square degrees.
    pub fn area(&self) -> f64 {
        let c = self.corners();
        let mut twice_area = 0.0;
        for k in 0..4 {
            let a = c[k];
            let b = c[(k + 1) % 4];
            twice_area += a.lon * b.lat - b.lon * a.lat;
        }
        twice_area.abs() / 2.0
    }

    /// Lon/lat envelope of the cell as `(min_lon, min_lat, max_lon, max_lat)`.
    pub(crate) fn envelope(&self) -> (f64, f64, f64, f64) {
        self.corners().iter().fold(
            (f64::INFINITY, f64::INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY),
            |(x0, y0, x1, y1), c| (x0.min(c.lon), y0.min(c.lat), x1.max(c.lon), y1.max(c.lat)),
        )
    }
}

impl PartialEq for Cell<'_> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.grid, other.grid) && self.i == other.i && self.j == other.j
    }
}

impl Eq for Cell<'_> {}

impl Hash for Cell<'_> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.i.hash(state);
        self.j.hash(state);
    }
}

impl fmt::Debug for Cell<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cell")
            .field("i", &self.i)
            .field("j", &self.j)
            .finish()
    }
}

fn compute_corners(coords: &CurvilinearCoordinates) -> (Vec<f64>, Vec<f64>) {
    let (ni, nj) = (coords.ni as isize, coords.nj as isize);
    let n_corners = ((ni + 1) * (nj + 1)) as usize;
    let mut lons = Vec::with_capacity(n_corners);
    let mut lats = Vec::with_capacity(n_corners);

    for cj in 0..=nj {
        for ci in 0..=ni {
            let surrounding = [
                extended_point(coords, ci - 1, cj - 1),
                extended_point(coords, ci, cj - 1),
                extended_point(coords, ci - 1, cj),
                extended_point(coords, ci, cj),
            ];
            let reference = surrounding[0].0;
            let lon = surrounding
                .iter()
                .map(|&(lon, _)| unwrap_lon(lon, reference))
                .sum::<f64>()
                / 4.0;
            let lat = surrounding.iter().map(|&(_, lat)| lat).sum::<f64>() / 4.0;
            lons.push(lon);
            lats.push(lat.clamp(-90.0, 90.0));
        }
    }

    (lons, lats)
}

/// Grid point (i, j), linearly extrapolated one step beyond each edge.
fn extended_point(coords: &CurvilinearCoordinates, i: isize, j: isize) -> (f64, f64) {
    let (ni, nj) = (coords.ni as isize, coords.nj as isize);
    if i < 0 {
        extrapolate(extended_point(coords, 0, j), extended_point(coords, 1, j))
    } else if i >= ni {
        extrapolate(
            extended_point(coords, ni - 1, j),
            extended_point(coords, ni - 2, j),
        )
    } else if j < 0 {
        extrapolate(extended_point(coords, i, 0), extended_point(coords, i, 1))
    } else if j >= nj {
        extrapolate(
            extended_point(coords, i, nj - 1),
            extended_point(coords, i, nj - 2),
        )
    } else {
        let idx = (j * ni + i) as usize;
        (coords.longitudes[idx], coords.latitudes[idx])
    }
}

/// Reflect `inner` through `edge`.
fn extrapolate(edge: (f64, f64), inner: (f64, f64)) -> (f64, f64) {
    let inner_lon = unwrap_lon(inner.0, edge.0);
    (2.0 * edge.0 - inner_lon, 2.0 * edge.1 - inner.1)
}
