//! Common types and utilities shared across the curvilinear WMS crates.

pub mod bbox;
pub mod crs;
pub mod error;
pub mod grid;
pub mod layer;
pub mod tile;

pub use bbox::{constrain_longitude_180, constrain_longitude_360, BoundingBox};
pub use crs::CrsCode;
pub use error::{WmsError, WmsResult};
pub use grid::RegularGrid;
pub use layer::{is_ncml_aggregation, is_remote_location, Dataset, FileAndTimeIndex, Layer, LayerId};
pub use tile::DataTile;
