//! Configuration for the grid processor.

use serde::{Deserialize, Serialize};
use storage::TileCacheConfig;

/// Configuration for the data read path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridProcessorConfig {
    /// Tile cache in front of the grid reader.
    pub tile_cache: TileCacheConfig,

    /// Resolve output pixels on the rayon thread pool.
    pub parallel_sampling: bool,

    /// Ratio of typical cell size to look-up table bin size (>= 1).
    pub lut_resolution_divisor: f64,
}

impl Default for GridProcessorConfig {
    fn default() -> Self {
        Self {
            tile_cache: TileCacheConfig::default(),
            parallel_sampling: true,
            lut_resolution_divisor: 3.0,
        }
    }
}

impl GridProcessorConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self {
            tile_cache: TileCacheConfig::from_env(),
            ..Self::default()
        };

        if let Ok(val) = std::env::var("GRID_PARALLEL_SAMPLING") {
            config.parallel_sampling = val.to_lowercase() == "true" || val == "1";
        }

        if let Ok(val) = std::env::var("LUT_RESOLUTION_DIVISOR") {
            if let Ok(divisor) = val.parse() {
                config.lut_resolution_divisor = divisor;
            }
        }

        config
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        self.tile_cache.validate()?;

        if !self.lut_resolution_divisor.is_finite() || self.lut_resolution_divisor < 1.0 {
            return Err("lut_resolution_divisor must be >= 1".to_string());
        }

        Ok(())
    }
}
