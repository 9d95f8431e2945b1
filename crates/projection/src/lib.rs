//! Nearest-neighbour lookup on curvilinear grids.
//!
//! A curvilinear grid gives the longitude and latitude of every grid point
//! explicitly (two 2-D coordinate arrays), so there is no closed-form inverse
//! from a lon/lat position to an (i, j) index. This crate answers that query
//! in two stages:
//!
//! 1. A [`LookUpTable`] bins lon/lat space at roughly a third of the grid's
//!    cell size and stores an approximate (i, j) per bin (O(1) guess).
//! 2. [`LookUpTableGrid`] checks the guess with a point-in-cell test and, if
//!    needed, refines it by a bounded greedy descent over neighbouring cells.
//!
//! Building a look-up table is O(ni × nj), so [`LutGridCache`] keeps one
//! [`LookUpTableGrid`] per distinct coordinate content.
//!
//! ```text
//! position ──► to lon/lat ──► LookUpTable bin ──► (i, j) guess
//!                                                    │
//!                          contains()? ──yes──► return (i, j)
//!                                │no
//!                                ▼
//!                  greedy descent on centre distance (≤ 100 steps)
//!                                │
//!                  best cell or a containing neighbour
//! ```

pub mod curvilinear;
pub mod error;
pub mod lut;
pub mod lut_grid;
pub mod position;

pub use curvilinear::{Cell, CurvilinearCoordinates, CurvilinearGrid, GridFingerprint};
pub use error::{ProjectionError, ProjectionResult};
pub use lut::LookUpTable;
pub use lut_grid::{GridCoordinates, LookUpTableGrid, LutCacheStats, LutGridCache};
pub use position::{HorizontalPosition, LonLat};
