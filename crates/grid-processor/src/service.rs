//! Cache-fronted data read path.
//!
//! [`DataGridService`] is what a GetMap handler calls to obtain the samples
//! behind one image: it resolves the requested time and elevation against
//! the layer, builds a [`TileCacheKey`], and only touches the
//! [`GridReader`] when the tile cache cannot answer.
//!
//! # Example
//!
//! ```rust,ignore
//! let service = DataGridService::new(tile_cache, reader, lut_cache);
//!
//! let read = service
//!     .read_data_grid(&layer, Some(time), Some(10.0), &grid)
//!     .await?;
//! render(&read.tile);
//! ```

use std::sync::Arc;

use chrono::{DateTime, Utc};
use projection::{LutCacheStats, LutGridCache};
use storage::{TileCache, TileCacheKey, TileCacheStats};
use tracing::{debug, instrument};
use wms_common::{DataTile, Layer, RegularGrid};

use crate::config::GridProcessorConfig;
use crate::curvilinear::CurvilinearGridReader;
use crate::error::{GridProcessorError, Result};
use crate::reader::{GridDescriptorProvider, GridReader, NativeFieldSource};

/// Result of one data read.
#[derive(Debug, Clone)]
pub struct DataGridRead {
    pub tile: Arc<DataTile>,
    /// True if the samples came from the tile cache.
    pub used_cache: bool,
}

/// High-level service for reading layer data onto output grids.
pub struct DataGridService {
    tile_cache: Arc<TileCache>,
    reader: Arc<dyn GridReader>,
    lut_cache: Arc<LutGridCache>,
}

impl DataGridService {
    pub fn new(
        tile_cache: Arc<TileCache>,
        reader: Arc<dyn GridReader>,
        lut_cache: Arc<LutGridCache>,
    ) -> Self {
        Self {
            tile_cache,
            reader,
            lut_cache,
        }
    }

    /// Build the curvilinear read path from configuration.
    ///
    /// Starts the tile cache expiry sweeper if one is configured and a
    /// tokio runtime is available.
    pub fn from_config(
        config: &GridProcessorConfig,
        descriptors: Arc<dyn GridDescriptorProvider>,
        fields: Arc<dyn NativeFieldSource>,
    ) -> Result<Self> {
        config.validate().map_err(GridProcessorError::config_error)?;

        let tile_cache = Arc::new(TileCache::new(&config.tile_cache));
        tile_cache.spawn_sweeper();

        let lut_cache = Arc::new(LutGridCache::with_resolution_divisor(
            config.lut_resolution_divisor,
        ));
        let reader = CurvilinearGridReader::new(descriptors, fields, Arc::clone(&lut_cache))
            .with_parallel(config.parallel_sampling);

        Ok(Self::new(tile_cache, Arc::new(reader), lut_cache))
    }

    /// Read `layer` at the given time and elevation onto `grid`.
    ///
    /// Dimension values the layer cannot resolve fail with
    /// `InvalidDimensionValue`, and a data location that exists but is not
    /// a file fails with `InvalidDataLocation`, whether or not the tile
    /// cache is enabled. A disabled cache simply never hits.
    #[instrument(skip(self, layer, grid), fields(layer = %layer.id()))]
    pub async fn read_data_grid(
        &self,
        layer: &dyn Layer,
        time: Option<DateTime<Utc>>,
        elevation: Option<f64>,
        grid: &RegularGrid,
    ) -> Result<DataGridRead> {
        let file = layer.find_file_and_time_index(time)?;
        let z_index = layer.find_elevation_index(elevation)?;

        let key = TileCacheKey::new(&file.filename, layer, grid, file.t_index_in_file, z_index)?;
        if let Some(tile) = self.tile_cache.get(&key).await {
            debug!(key = %key, "Tile cache hit");
            return Ok(DataGridRead {
                tile,
                used_cache: true,
            });
        }

        debug!(key = %key, "Tile cache miss, reading source");
        let tile = Arc::new(
            self.reader
                .read_horizontal_domain(layer, &file, z_index, grid)
                .await?,
        );
        self.tile_cache.put(key, Arc::clone(&tile)).await;

        Ok(DataGridRead {
            tile,
            used_cache: false,
        })
    }

    pub fn tile_cache(&self) -> &Arc<TileCache> {
        &self.tile_cache
    }

    pub fn tile_cache_stats(&self) -> TileCacheStats {
        self.tile_cache.stats()
    }

    pub fn lut_cache_stats(&self) -> LutCacheStats {
        self.lut_cache.stats()
    }

    /// Drop all cached look-up tables, e.g. after a dataset's grid changed.
    pub fn clear_lut_cache(&self) {
        self.lut_cache.clear();
    }

    /// Stop the tile cache sweeper and release cached tiles.
    pub async fn shutdown(&self) {
        self.tile_cache.shutdown().await;
    }
}
