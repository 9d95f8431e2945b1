//! Cache keys identifying one extracted data tile.
//!
//! A key captures everything that determines the samples of a tile: the
//! layer, the output grid (CRS, bounding box, size), the source file and
//! the indices within it. It also records a cheap change signal for the
//! source so that a rewritten file never serves stale tiles:
//!
//! - Local files: modification time and size.
//! - OPeNDAP endpoints and NcML aggregations: the owning dataset's last
//!   reload time, since the individual files cannot be observed.
//!
//! Geographic requests are canonicalised before keying: every WGS84 lon/lat
//! spelling becomes `CRS:84` and bounding-box longitudes are wrapped into
//! (-180, 180], so equivalent requests share one cache entry.

use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::time::UNIX_EPOCH;

use wms_common::{
    is_ncml_aggregation, is_remote_location, Layer, RegularGrid, WmsError, WmsResult,
};

/// Immutable fingerprint of one data tile.
///
/// The canonical string and its hash are computed once at construction.
#[derive(Debug, Clone)]
pub struct TileCacheKey {
    layer_id: String,
    crs_code: String,
    bbox: [f64; 4],
    width: usize,
    height: usize,
    filepath: String,
    /// Milliseconds since the epoch, 0 if not a local file
    last_modified: i64,
    /// Bytes, 0 if not a local file
    file_size: u64,
    t_index: Option<usize>,
    z_index: Option<usize>,
    /// Milliseconds since the epoch, 0 for plain local files
    dataset_last_modified: i64,
    canonical: String,
    hash: u64,
}

impl TileCacheKey {
    /// Build the key for a tile of `layer` read from `filepath`.
    ///
    /// Fails with [`WmsError::InvalidDataLocation`] if `filepath` exists
    /// locally but is not a regular file.
    pub fn new(
        filepath: &str,
        layer: &dyn Layer,
        grid: &RegularGrid,
        t_index: Option<usize>,
        z_index: Option<usize>,
    ) -> WmsResult<Self> {
        let (crs_code, bbox) = if grid.crs.is_wgs84_lon_lat() {
            (
                grid.crs.canonical_code(),
                grid.bbox.with_constrained_longitudes(),
            )
        } else {
            (grid.crs.declared_identifier(), grid.bbox)
        };

        let (last_modified, file_size) = if is_remote_location(filepath) {
            (0, 0)
        } else {
            local_file_stamp(filepath)?
        };

        let dataset_last_modified = if is_remote_location(filepath) || is_ncml_aggregation(filepath)
        {
            layer.dataset().last_update_time().timestamp_millis()
        } else {
            0
        };

        let mut key = Self {
            layer_id: layer.id().to_string(),
            crs_code: crs_code.to_string(),
            bbox: bbox.to_array(),
            width: grid.width,
            height: grid.height,
            filepath: filepath.to_string(),
            last_modified,
            file_size,
            t_index,
            z_index,
            dataset_last_modified,
            canonical: String::new(),
            hash: 0,
        };
        key.canonical = key.render();

        let mut hasher = DefaultHasher::new();
        key.canonical.hash(&mut hasher);
        key.hash = hasher.finish();

        Ok(key)
    }

    pub fn layer_id(&self) -> &str {
        &self.layer_id
    }

    pub fn crs_code(&self) -> &str {
        &self.crs_code
    }

    pub fn bbox(&self) -> [f64; 4] {
        self.bbox
    }

    pub fn filepath(&self) -> &str {
        &self.filepath
    }

    pub fn last_modified(&self) -> i64 {
        self.last_modified
    }

    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    pub fn dataset_last_modified(&self) -> i64 {
        self.dataset_last_modified
    }

    /// The cached 64-bit hash of the canonical string.
    pub fn hash_value(&self) -> u64 {
        self.hash
    }

    /// The canonical string form.
    pub fn as_str(&self) -> &str {
        &self.canonical
    }

    fn render(&self) -> String {
        // Missing indices are written as -1
        let index = |i: Option<usize>| i.map_or_else(|| "-1".to_string(), |i| i.to_string());
        let mut bbox = String::new();
        for v in self.bbox {
            bbox.push_str(&v.to_string());
            bbox.push(',');
        }
        format!(
            "{},{},{{{}}},{},{},{},{},{},{},{},{}",
            self.layer_id,
            self.crs_code,
            bbox,
            self.width,
            self.height,
            self.filepath,
            self.last_modified,
            self.file_size,
            index(self.t_index),
            index(self.z_index),
            self.dataset_last_modified
        )
    }
}

/// Modification time (ms) and size of a local file.
///
/// Anything that cannot be stat'ed (missing, unreadable parent, a path
/// through a regular file) counts as absent and stamps as zeros.
fn local_file_stamp(filepath: &str) -> WmsResult<(i64, u64)> {
    let Ok(metadata) = std::fs::metadata(filepath) else {
        return Ok((0, 0));
    };
    if !metadata.is_file() {
        return Err(WmsError::InvalidDataLocation(filepath.to_string()));
    }
    let modified = metadata
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map_or(0, |d| d.as_millis() as i64);
    Ok((modified, metadata.len()))
}

impl PartialEq for TileCacheKey {
    fn eq(&self, other: &Self) -> bool {
        // Cheap comparisons first, then the ones most likely to differ
        self.t_index == other.t_index
            && self.z_index == other.z_index
            && self.file_size == other.file_size
            && self.last_modified == other.last_modified
            && self.dataset_last_modified == other.dataset_last_modified
            && self.width == other.width
            && self.height == other.height
            && self.crs_code == other.crs_code
            && self.filepath == other.filepath
            && self.layer_id == other.layer_id
            && self
                .bbox
                .iter()
                .zip(&other.bbox)
                .all(|(a, b)| a.to_bits() == b.to_bits())
    }
}

impl Eq for TileCacheKey {}

impl Hash for TileCacheKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.hash);
    }
}

impl fmt::Display for TileCacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical)
    }
}
