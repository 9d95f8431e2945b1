//! Nearest-grid-point queries on curvilinear grids and the LUT grid cache.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::curvilinear::{Cell, CurvilinearCoordinates, CurvilinearGrid, GridFingerprint};
use crate::error::ProjectionResult;
use crate::lut::LookUpTable;
use crate::position::{HorizontalPosition, LonLat};

/// Maximum number of greedy steps when the LUT guess misses.
pub const MAX_DESCENT_ITERATIONS: usize = 100;

/// Default ratio between typical cell size and LUT bin size.
pub const DEFAULT_RESOLUTION_DIVISOR: f64 = 3.0;

/// Index of a grid point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct GridCoordinates {
    pub i: usize,
    pub j: usize,
}

impl GridCoordinates {
    pub fn new(i: usize, j: usize) -> Self {
        Self { i, j }
    }
}

impl From<Cell<'_>> for GridCoordinates {
    fn from(cell: Cell<'_>) -> Self {
        Self::new(cell.i(), cell.j())
    }
}

/// A curvilinear grid paired with its look-up table.
///
/// Immutable after construction, so queries need no locking.
#[derive(Debug)]
pub struct LookUpTableGrid {
    grid: CurvilinearGrid,
    lut: LookUpTable,
}

impl LookUpTableGrid {
    /// Build the look-up table for `grid`.
    ///
    /// Bin size is `sqrt(mean cell area) / resolution_divisor` degrees.
    pub fn build(grid: CurvilinearGrid, resolution_divisor: f64) -> ProjectionResult<Self> {
        let resolution = grid.mean_cell_area().sqrt() / resolution_divisor;
        let lut = LookUpTable::new(&grid, resolution)?;
        Ok(Self { grid, lut })
    }

    pub fn grid(&self) -> &CurvilinearGrid {
        &self.grid
    }

    pub fn lut(&self) -> &LookUpTable {
        &self.lut
    }

    /// Find the grid point nearest to `position`.
    ///
    /// `Ok(None)` means the position lies outside the grid's domain. An
    /// error is returned only if the position's CRS cannot be transformed
    /// to lon/lat.
    pub fn find_nearest_grid_point(
        &self,
        position: &HorizontalPosition,
    ) -> ProjectionResult<Option<GridCoordinates>> {
        let point = position.to_lon_lat()?;
        Ok(self.find_nearest_lon_lat(point))
    }

    /// Find the grid point nearest to a lon/lat point.
    ///
    /// Once the look-up table yields a guess this always returns a cell.
    pub fn find_nearest_lon_lat(&self, point: LonLat) -> Option<GridCoordinates> {
        let (i, j) = self.lut.lookup(point.lon, point.lat)?;
        let guess = self.grid.cell(i, j).ok()?;
        if guess.contains(&point) {
            return Some(guess.into());
        }
        Some(self.refine(guess, &point))
    }

    /// Greedy descent on centre distance from `start`, then containment
    /// checks on the result and its neighbours.
    ///
    /// Distances wrap longitude differences into (-180, 180], so descent
    /// cannot cross a gap of more than 180 degrees between `start` and the
    /// target. Table guesses are always far closer than that.
    fn refine(&self, start: Cell<'_>, point: &LonLat) -> GridCoordinates {
        let mut best = start;
        let mut best_distance = start.distance_sq(point);
        let mut visited: HashSet<(usize, usize)> = HashSet::new();
        visited.insert((start.i(), start.j()));

        for _ in 0..MAX_DESCENT_ITERATIONS {
            let mut candidate = None;
            let mut candidate_distance = best_distance;
            for neighbour in best.neighbours() {
                if !visited.insert((neighbour.i(), neighbour.j())) {
                    continue;
                }
                let distance = neighbour.distance_sq(point);
                if distance < candidate_distance {
                    candidate_distance = distance;
                    candidate = Some(neighbour);
                }
            }
            match candidate {
                Some(cell) => {
                    best = cell;
                    best_distance = candidate_distance;
                }
                None => break,
            }
        }

        if best.contains(point) {
            return best.into();
        }
        if let Some(neighbour) = best.neighbours().find(|n| n.contains(point)) {
            return neighbour.into();
        }

        // Usually a point on a shared edge or just outside the boundary
        best.into()
    }
}

/// Snapshot of [`LutGridCache`] counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LutCacheStats {
    pub entries: usize,
    pub builds: u64,
    pub hits: u64,
}

/// Cache of [`LookUpTableGrid`]s keyed by coordinate content.
///
/// At most one instance exists per distinct grid: the check, build and
/// insert happen under one lock, so concurrent callers for the same grid
/// wait for a single build.
pub struct LutGridCache {
    grids: Mutex<HashMap<GridFingerprint, Arc<LookUpTableGrid>>>,
    resolution_divisor: f64,
    builds: AtomicU64,
    hits: AtomicU64,
}

impl LutGridCache {
    pub fn new() -> Self {
        Self::with_resolution_divisor(DEFAULT_RESOLUTION_DIVISOR)
    }

    pub fn with_resolution_divisor(resolution_divisor: f64) -> Self {
        Self {
            grids: Mutex::new(HashMap::new()),
            resolution_divisor,
            builds: AtomicU64::new(0),
            hits: AtomicU64::new(0),
        }
    }

    pub fn resolution_divisor(&self) -> f64 {
        self.resolution_divisor
    }

    /// Return the cached grid for these coordinates, building it if needed.
    pub fn generate(
        &self,
        coords: CurvilinearCoordinates,
    ) -> ProjectionResult<Arc<LookUpTableGrid>> {
        let fingerprint = coords.fingerprint();
        let mut grids = self.grids.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(existing) = grids.get(&fingerprint) {
            if existing.grid().coordinates() == &coords {
                self.hits.fetch_add(1, Ordering::Relaxed);
                debug!(grid = %fingerprint, "Look-up table cache hit");
                return Ok(Arc::clone(existing));
            }
            warn!(
                grid = %fingerprint,
                "Coordinate hash collision, replacing cached look-up table"
            );
        }

        debug!(
            grid = %fingerprint,
            ni = coords.ni,
            nj = coords.nj,
            "Need to generate new look-up table"
        );
        let start = Instant::now();
        let grid = CurvilinearGrid::with_fingerprint(coords, fingerprint)?;
        let lut_grid = Arc::new(LookUpTableGrid::build(grid, self.resolution_divisor)?);
        self.builds.fetch_add(1, Ordering::Relaxed);

        let (n_lon, n_lat) = lut_grid.lut().dimensions();
        info!(
            grid = %fingerprint,
            n_lon = n_lon,
            n_lat = n_lat,
            resolution = lut_grid.lut().resolution(),
            size_kb = lut_grid.lut().byte_size() / 1024,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Generated new look-up table"
        );

        grids.insert(fingerprint, Arc::clone(&lut_grid));
        Ok(lut_grid)
    }

    /// Drop every cached grid. Callers holding an `Arc` keep theirs.
    pub fn clear(&self) {
        let mut grids = self.grids.lock().unwrap_or_else(PoisonError::into_inner);
        let dropped = grids.len();
        grids.clear();
        info!(dropped = dropped, "Cleared look-up table cache");
    }

    pub fn len(&self) -> usize {
        self.grids
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> LutCacheStats {
        LutCacheStats {
            entries: self.len(),
            builds: self.builds.load(Ordering::Relaxed),
            hits: self.hits.load(Ordering::Relaxed),
        }
    }
}

impl Default for LutGridCache {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for LutGridCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LutGridCache")
            .field("resolution_divisor", &self.resolution_divisor)
            .field("stats", &self.stats())
            .finish()
    }
}
