//! Tile caching for the curvilinear WMS data path.
//!
//! Provides:
//! - [`TileCacheKey`]: canonical fingerprint of one extracted data tile
//! - [`TileCache`]: bounded in-memory LRU store for those tiles
//! - [`TileCacheConfig`]: environment-driven cache settings

pub mod config;
pub mod tile_cache;
pub mod tile_cache_key;

pub use config::TileCacheConfig;
pub use tile_cache::{TileCache, TileCacheStats};
pub use tile_cache_key::TileCacheKey;
