//! Reader traits for the data path.
//!
//! These are the seams between the cache-fronted read path and whatever
//! actually decodes the source files (NetCDF, OPeNDAP, in-memory test data).

use async_trait::async_trait;
use projection::CurvilinearCoordinates;
use wms_common::{DataTile, FileAndTimeIndex, Layer, RegularGrid};

use crate::error::Result;

/// Extracts a layer's values onto a regular output grid.
#[async_trait]
pub trait GridReader: Send + Sync {
    /// Read one horizontal slice of `layer` at the given file, time index
    /// and elevation index, sampled at every pixel of `grid`.
    ///
    /// Pixels with no data are missing in the returned tile.
    async fn read_horizontal_domain(
        &self,
        layer: &dyn Layer,
        file: &FileAndTimeIndex,
        z_index: Option<usize>,
        grid: &RegularGrid,
    ) -> Result<DataTile>;
}

/// Reads a whole horizontal field on the layer's native grid.
#[async_trait]
pub trait NativeFieldSource: Send + Sync {
    /// Values for every native grid point.
    ///
    /// The returned tile has `width = ni`, `height = nj`, and point (i, j)
    /// at index `j * ni + i`.
    async fn read_field(
        &self,
        layer: &dyn Layer,
        file: &FileAndTimeIndex,
        z_index: Option<usize>,
    ) -> Result<DataTile>;
}

/// Supplies the 2-D coordinate arrays of a layer's curvilinear grid.
#[async_trait]
pub trait GridDescriptorProvider: Send + Sync {
    async fn coordinates(&self, layer: &dyn Layer, filename: &str)
        -> Result<CurvilinearCoordinates>;
}
