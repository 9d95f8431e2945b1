//! Layer and dataset collaborator interfaces.
//!
//! Layer metadata (time/elevation axes, file locations) is loaded by the
//! configuration layer; the data path only needs to resolve a requested
//! time and elevation to indices within one underlying file.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::WmsResult;

/// Unique identifier for a layer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LayerId(pub String);

impl LayerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for LayerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A configured dataset: one location (file, directory glob, NcML or
/// OPeNDAP endpoint) whose metadata is periodically reloaded.
pub trait Dataset: Send + Sync {
    /// Dataset identifier.
    fn id(&self) -> &str;

    /// Location the dataset was configured with.
    fn location(&self) -> &str;

    /// When the dataset's metadata was last (re)loaded.
    fn last_update_time(&self) -> DateTime<Utc>;
}

/// The file holding a requested timestep, and the timestep's index in it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileAndTimeIndex {
    /// Path or URL of the file
    pub filename: String,
    /// Index along the file's time axis; `None` when the layer has no time axis
    pub t_index_in_file: Option<usize>,
}

impl FileAndTimeIndex {
    pub fn new(filename: impl Into<String>, t_index_in_file: Option<usize>) -> Self {
        Self {
            filename: filename.into(),
            t_index_in_file,
        }
    }
}

/// A displayable variable within a dataset.
pub trait Layer: Send + Sync {
    /// Stable layer identifier.
    fn id(&self) -> &LayerId;

    /// Dataset that owns this layer.
    fn dataset(&self) -> &dyn Dataset;

    /// Resolve a requested time to the file containing it.
    ///
    /// `None` selects the layer's default time. Fails with
    /// [`WmsError::InvalidDimensionValue`](crate::WmsError::InvalidDimensionValue)
    /// when the time is not available.
    fn find_file_and_time_index(&self, time: Option<DateTime<Utc>>) -> WmsResult<FileAndTimeIndex>;

    /// Resolve a requested elevation to its index on the layer's z axis.
    ///
    /// Returns `Ok(None)` for layers without a vertical axis.
    fn find_elevation_index(&self, elevation: Option<f64>) -> WmsResult<Option<usize>>;
}

/// Check whether a location refers to an OPeNDAP endpoint.
pub fn is_remote_location(location: &str) -> bool {
    let lower = location.trim().to_lowercase();
    lower.starts_with("dods://") || lower.starts_with("http://") || lower.starts_with("https://")
}

/// Check whether a location refers to an NcML aggregation.
pub fn is_ncml_aggregation(location: &str) -> bool {
    location.trim().to_lowercase().ends_with(".ncml")
}
