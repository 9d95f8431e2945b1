//! Error types for curvilinear grid lookups.

use thiserror::Error;

/// Result type for projection operations.
pub type ProjectionResult<T> = Result<T, ProjectionError>;

/// Errors raised while building or querying curvilinear grids.
#[derive(Error, Debug)]
pub enum ProjectionError {
    /// The coordinate arrays do not describe a usable grid.
    #[error("invalid curvilinear grid: {0}")]
    InvalidGrid(String),

    /// A cell index outside [0, ni) × [0, nj).
    #[error("cell ({i}, {j}) is outside a {ni} x {nj} grid")]
    CellOutOfRange {
        i: isize,
        j: isize,
        ni: usize,
        nj: usize,
    },

    /// The look-up table would need more bins than we are willing to allocate.
    #[error("look-up table of {n_lon} x {n_lat} bins is too large")]
    LookUpTableTooLarge { n_lon: usize, n_lat: usize },

    /// Positions in this CRS cannot be converted to longitude/latitude.
    #[error("cannot transform positions from {0} to lon/lat")]
    UnsupportedCrs(String),
}

impl ProjectionError {
    /// Create an InvalidGrid error.
    pub fn invalid_grid(msg: impl Into<String>) -> Self {
        Self::InvalidGrid(msg.into())
    }
}
