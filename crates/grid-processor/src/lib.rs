//! Data read path for curvilinear WMS layers.
//!
//! Turns a map request (layer, time, elevation, output grid) into the
//! samples behind the image, caching extracted tiles and the look-up tables
//! used to locate pixels on curvilinear grids.
//!
//! # Architecture
//!
//! ```text
//! GetMap request
//!      │
//!      ▼
//! DataGridService::read_data_grid(layer, time, elevation, grid)
//!      │
//!      ├─► Layer resolves (file, t index) and z index
//!      │
//!      ├─► TileCacheKey (canonical CRS + bbox, file stamp)
//!      │         │
//!      │         ├─► Cache hit: return cached tile
//!      │         │
//!      │         └─► Cache miss
//!      │                 │
//!      │                 ▼
//!      │      CurvilinearGridReader
//!      │         ├─► LutGridCache::generate(coordinates)
//!      │         └─► nearest grid point per pixel (rayon)
//!      │
//!      └─► Store tile, return to renderer
//! ```

pub mod config;
pub mod curvilinear;
pub mod error;
pub mod reader;
pub mod service;

pub use config::GridProcessorConfig;
pub use curvilinear::CurvilinearGridReader;
pub use error::{GridProcessorError, Result};
pub use reader::{GridDescriptorProvider, GridReader, NativeFieldSource};
pub use service::{DataGridRead, DataGridService};
