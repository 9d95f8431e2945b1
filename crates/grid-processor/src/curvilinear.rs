//! Nearest-neighbour reader for curvilinear grids.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use projection::{HorizontalPosition, LookUpTableGrid, LutGridCache};
use rayon::prelude::*;
use tracing::debug;
use wms_common::{DataTile, FileAndTimeIndex, Layer, RegularGrid};

use crate::error::{GridProcessorError, Result};
use crate::reader::{GridDescriptorProvider, GridReader, NativeFieldSource};

/// Reads a layer stored on a curvilinear grid onto a regular output grid.
///
/// Every output pixel takes the value of the native grid point whose cell
/// contains the pixel centre. Pixels outside the native domain are missing.
pub struct CurvilinearGridReader {
    descriptors: Arc<dyn GridDescriptorProvider>,
    fields: Arc<dyn NativeFieldSource>,
    luts: Arc<LutGridCache>,
    parallel: bool,
}

impl CurvilinearGridReader {
    pub fn new(
        descriptors: Arc<dyn GridDescriptorProvider>,
        fields: Arc<dyn NativeFieldSource>,
        luts: Arc<LutGridCache>,
    ) -> Self {
        Self {
            descriptors,
            fields,
            luts,
            parallel: true,
        }
    }

    /// Resolve pixels sequentially instead of on the rayon pool.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn lut_cache(&self) -> &Arc<LutGridCache> {
        &self.luts
    }
}

#[async_trait]
impl GridReader for CurvilinearGridReader {
    async fn read_horizontal_domain(
        &self,
        layer: &dyn Layer,
        file: &FileAndTimeIndex,
        z_index: Option<usize>,
        grid: &RegularGrid,
    ) -> Result<DataTile> {
        let coords = self.descriptors.coordinates(layer, &file.filename).await?;
        let field = self.fields.read_field(layer, file, z_index).await?;

        if field.width() != coords.ni || field.height() != coords.nj {
            return Err(GridProcessorError::invalid_metadata(format!(
                "field is {} x {} but grid coordinates are {} x {}",
                field.width(),
                field.height(),
                coords.ni,
                coords.nj
            )));
        }

        // Building a look-up table is CPU bound
        let luts = Arc::clone(&self.luts);
        let lut_grid = tokio::task::spawn_blocking(move || luts.generate(coords)).await??;

        let output = grid.clone();
        let parallel = self.parallel;
        let start = Instant::now();
        let tile = tokio::task::spawn_blocking(move || {
            sample_nearest(&lut_grid, &field, &output, parallel)
        })
        .await??;

        debug!(
            layer = %layer.id(),
            width = tile.width(),
            height = tile.height(),
            valid = tile.valid_count(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Sampled curvilinear field"
        );
        Ok(tile)
    }
}

/// Value of the native point nearest to each pixel centre of `output`.
fn sample_nearest(
    lut_grid: &LookUpTableGrid,
    field: &DataTile,
    output: &RegularGrid,
    parallel: bool,
) -> Result<DataTile> {
    let ni = field.width();
    let sample = |index: usize| -> Result<Option<f32>> {
        let (x, y) = output.pixel_centre_at(index);
        let position = HorizontalPosition::new(x, y, output.crs);
        Ok(lut_grid
            .find_nearest_grid_point(&position)?
            .and_then(|point| field.get(point.j * ni + point.i)))
    };

    let samples: Vec<Option<f32>> = if parallel {
        (0..output.len()).into_par_iter().map(sample).collect::<Result<_>>()?
    } else {
        (0..output.len()).map(sample).collect::<Result<_>>()?
    };

    Ok(DataTile::from_samples(output.width, output.height, samples))
}
