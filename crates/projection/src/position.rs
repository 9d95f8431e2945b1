//! Horizontal positions and their conversion to longitude/latitude.

use wms_common::CrsCode;

use crate::error::{ProjectionError, ProjectionResult};

/// Web Mercator sphere radius (meters).
const EARTH_RADIUS: f64 = 6378137.0;

/// A WGS84 longitude/latitude pair in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LonLat {
    pub lon: f64,
    pub lat: f64,
}

impl LonLat {
    pub fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }
}

/// A position in some coordinate reference system.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HorizontalPosition {
    pub x: f64,
    pub y: f64,
    pub crs: CrsCode,
}

impl HorizontalPosition {
    pub fn new(x: f64, y: f64, crs: CrsCode) -> Self {
        Self { x, y, crs }
    }

    /// A WGS84 lon/lat position.
    pub fn lon_lat(lon: f64, lat: f64) -> Self {
        Self::new(lon, lat, CrsCode::Epsg4326)
    }

    /// Transform this position to WGS84 longitude/latitude.
    ///
    /// Geographic CRSs pass through unchanged (NAD83 and WGS84 differ by far
    /// less than a grid cell). Web Mercator uses the spherical inverse.
    pub fn to_lon_lat(&self) -> ProjectionResult<LonLat> {
        match self.crs {
            CrsCode::Epsg4326 | CrsCode::Epsg4269 => Ok(LonLat::new(self.x, self.y)),
            CrsCode::Epsg3857 => Ok(mercator_to_lon_lat(self.x, self.y)),
            other => Err(ProjectionError::UnsupportedCrs(other.to_string())),
        }
    }
}

impl From<LonLat> for HorizontalPosition {
    fn from(p: LonLat) -> Self {
        Self::lon_lat(p.lon, p.lat)
    }
}

/// Inverse spherical Mercator.
fn mercator_to_lon_lat(x: f64, y: f64) -> LonLat {
    let lon = (x / EARTH_RADIUS).to_degrees();
    let lat = (2.0 * (y / EARTH_RADIUS).exp().atan() - std::f64::consts::FRAC_PI_2).to_degrees();
    LonLat::new(lon, lat)
}
