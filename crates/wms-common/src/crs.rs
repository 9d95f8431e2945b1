//! Coordinate Reference System codes.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier used for every WGS84 longitude/latitude CRS in cache keys.
pub const CANONICAL_LON_LAT_CODE: &str = "CRS:84";

/// Well-known CRS codes supported by the WMS server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CrsCode {
    /// WGS84 Geographic (lon/lat in degrees)
    Epsg4326,
    /// Web Mercator (meters)
    Epsg3857,
    /// NAD83 Geographic
    Epsg4269,
    /// Polar Stereographic North
    Epsg3413,
    /// Polar Stereographic South
    Epsg3031,
}

impl CrsCode {
    /// Parse a CRS string from a WMS request.
    ///
    /// Accepts formats like:
    /// - "EPSG:4326"
    /// - "epsg:4326"
    /// - "CRS:84" (equivalent to EPSG:4326 with lon/lat axis order)
    pub fn from_wms_string(s: &str) -> Result<Self, CrsParseError> {
        let normalized = s.trim().to_uppercase();

        match normalized.as_str() {
            "EPSG:4326" | "CRS:84" => Ok(CrsCode::Epsg4326),
            "EPSG:3857" | "EPSG:900913" => Ok(CrsCode::Epsg3857),
            "EPSG:4269" => Ok(CrsCode::Epsg4269),
            "EPSG:3413" => Ok(CrsCode::Epsg3413),
            "EPSG:3031" => Ok(CrsCode::Epsg3031),
            _ => Err(CrsParseError::UnsupportedCrs(s.to_string())),
        }
    }

    /// Check if this is WGS84 longitude/latitude.
    pub fn is_wgs84_lon_lat(&self) -> bool {
        matches!(self, CrsCode::Epsg4326)
    }

    /// Identifier declared by this CRS.
    pub fn declared_identifier(&self) -> &'static str {
        match self {
            CrsCode::Epsg4326 => "EPSG:4326",
            CrsCode::Epsg3857 => "EPSG:3857",
            CrsCode::Epsg4269 => "EPSG:4269",
            CrsCode::Epsg3413 => "EPSG:3413",
            CrsCode::Epsg3031 => "EPSG:3031",
        }
    }

    /// Identifier to use when two requests must compare equal.
    ///
    /// Every WGS84 lon/lat spelling collapses onto [`CANONICAL_LON_LAT_CODE`].
    pub fn canonical_code(&self) -> &'static str {
        if self.is_wgs84_lon_lat() {
            CANONICAL_LON_LAT_CODE
        } else {
            self.declared_identifier()
        }
    }
}

impl fmt::Display for CrsCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.declared_identifier())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CrsParseError {
    #[error("Unsupported CRS: {0}")]
    UnsupportedCrs(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_crs() {
        assert_eq!(
            CrsCode::from_wms_string("EPSG:4326").unwrap(),
            CrsCode::Epsg4326
        );
        assert_eq!(
            CrsCode::from_wms_string("epsg:3857").unwrap(),
            CrsCode::Epsg3857
        );
        assert_eq!(
            CrsCode::from_wms_string("CRS:84").unwrap(),
            CrsCode::Epsg4326
        );
        assert!(CrsCode::from_wms_string("EPSG:99999").is_err());
    }

    #[test]
    fn test_canonical_code() {
        assert_eq!(CrsCode::Epsg4326.canonical_code(), "CRS:84");
        assert_eq!(CrsCode::Epsg3857.canonical_code(), "EPSG:3857");
        // NAD83 is geographic but not WGS84, so it keeps its own code
        assert_eq!(CrsCode::Epsg4269.canonical_code(), "EPSG:4269");
    }
}
