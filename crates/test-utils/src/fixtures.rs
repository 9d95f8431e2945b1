//! In-memory layer and dataset fixtures plus temporary data files.

use std::fs::{File, FileTimes};
use std::io::Write;
use std::path::PathBuf;
use std::time::{Duration, SystemTime};

use chrono::{DateTime, TimeZone, Utc};
use tempfile::TempDir;
use wms_common::{Dataset, FileAndTimeIndex, Layer, LayerId, WmsError, WmsResult};

/// A dataset with a fixed location and reload time.
#[derive(Debug, Clone)]
pub struct TestDataset {
    pub id: String,
    pub location: String,
    pub last_update: DateTime<Utc>,
}

impl TestDataset {
    pub fn new(id: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            location: location.into(),
            last_update: reference_time(),
        }
    }

    pub fn with_last_update(mut self, last_update: DateTime<Utc>) -> Self {
        self.last_update = last_update;
        self
    }
}

impl Dataset for TestDataset {
    fn id(&self) -> &str {
        &self.id
    }

    fn location(&self) -> &str {
        &self.location
    }

    fn last_update_time(&self) -> DateTime<Utc> {
        self.last_update
    }
}

/// A layer with an explicit list of timesteps and elevations.
///
/// With no timesteps, every time resolves to the dataset location with no
/// time index. The default time is the latest timestep; the default
/// elevation is the first.
#[derive(Debug, Clone)]
pub struct TestLayer {
    pub id: LayerId,
    pub dataset: TestDataset,
    pub timesteps: Vec<(DateTime<Utc>, FileAndTimeIndex)>,
    pub elevations: Vec<f64>,
}

impl TestLayer {
    pub fn new(id: impl Into<String>, dataset: TestDataset) -> Self {
        Self {
            id: LayerId::new(id),
            dataset,
            timesteps: Vec::new(),
            elevations: Vec::new(),
        }
    }

    pub fn with_timestep(
        mut self,
        time: DateTime<Utc>,
        filename: impl Into<String>,
        t_index: usize,
    ) -> Self {
        self.timesteps
            .push((time, FileAndTimeIndex::new(filename, Some(t_index))));
        self
    }

    pub fn with_elevations(mut self, elevations: Vec<f64>) -> Self {
        self.elevations = elevations;
        self
    }
}

impl Layer for TestLayer {
    fn id(&self) -> &LayerId {
        &self.id
    }

    fn dataset(&self) -> &dyn Dataset {
        &self.dataset
    }

    fn find_file_and_time_index(&self, time: Option<DateTime<Utc>>) -> WmsResult<FileAndTimeIndex> {
        if self.timesteps.is_empty() {
            return Ok(FileAndTimeIndex::new(self.dataset.location.clone(), None));
        }
        let found = match time {
            None => self.timesteps.iter().max_by_key(|(t, _)| *t),
            Some(requested) => self.timesteps.iter().find(|(t, _)| *t == requested),
        };
        found.map(|(_, file)| file.clone()).ok_or_else(|| {
            WmsError::invalid_dimension(format!(
                "time {} is not available for layer {}",
                time.map(|t| t.to_rfc3339()).unwrap_or_default(),
                self.id
            ))
        })
    }

    fn find_elevation_index(&self, elevation: Option<f64>) -> WmsResult<Option<usize>> {
        if self.elevations.is_empty() {
            return Ok(None);
        }
        match elevation {
            None => Ok(Some(0)),
            Some(z) => self
                .elevations
                .iter()
                .position(|e| *e == z)
                .map(Some)
                .ok_or_else(|| {
                    WmsError::invalid_dimension(format!(
                        "elevation {} is not available for layer {}",
                        z, self.id
                    ))
                }),
        }
    }
}

/// A fixed, well-known timestamp (2024-01-01T00:00:00Z).
pub fn reference_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
        .single()
        .unwrap_or_default()
}

/// A temporary directory holding one small data file whose modification
/// time can be changed.
pub struct TempDataFile {
    dir: TempDir,
    path: PathBuf,
}

impl TempDataFile {
    /// Create `name` inside a fresh temporary directory with some bytes.
    pub fn new(name: &str, contents: &[u8]) -> std::io::Result<Self> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join(name);
        let mut file = File::create(&path)?;
        file.write_all(contents)?;
        Ok(Self { dir, path })
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    pub fn path_str(&self) -> String {
        self.path.to_string_lossy().into_owned()
    }

    /// Set the file's modification time to `secs` after the Unix epoch.
    pub fn set_modified_secs(&self, secs: u64) -> std::io::Result<()> {
        let file = File::options().write(true).open(&self.path)?;
        let mtime = SystemTime::UNIX_EPOCH + Duration::from_secs(secs);
        file.set_times(FileTimes::new().set_modified(mtime))
    }

    /// Directory containing the file (exists but is not a file).
    pub fn dir_str(&self) -> String {
        self.dir.path().to_string_lossy().into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    fn layer() -> TestLayer {
        let t0 = reference_time();
        TestLayer::new("ocean/temp", TestDataset::new("ocean", "/data/ocean.ncml"))
            .with_timestep(t0, "/data/ocean_0.nc", 0)
            .with_timestep(t0 + ChronoDuration::hours(6), "/data/ocean_1.nc", 3)
            .with_elevations(vec![0.0, -10.0])
    }

    #[test]
    fn test_default_time_is_latest() {
        let file = layer().find_file_and_time_index(None).unwrap();
        assert_eq!(file, FileAndTimeIndex::new("/data/ocean_1.nc", Some(3)));
    }

    #[test]
    fn test_unknown_time_is_invalid_dimension() {
        let err = layer()
            .find_file_and_time_index(Some(reference_time() + ChronoDuration::hours(1)))
            .unwrap_err();
        assert!(matches!(err, WmsError::InvalidDimensionValue(_)));
    }

    #[test]
    fn test_elevation_lookup() {
        let layer = layer();
        assert_eq!(layer.find_elevation_index(None).unwrap(), Some(0));
        assert_eq!(layer.find_elevation_index(Some(-10.0)).unwrap(), Some(1));
        assert!(layer.find_elevation_index(Some(5.0)).is_err());
    }

    #[test]
    fn test_temp_data_file_mtime() {
        let file = TempDataFile::new("roms.nc", b"CDF\x01").unwrap();
        file.set_modified_secs(1_700_000_000).unwrap();
        let modified = std::fs::metadata(file.path()).unwrap().modified().unwrap();
        assert_eq!(
            modified,
            SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000)
        );
    }
}
