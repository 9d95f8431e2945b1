//! Error types for grid processing.

use projection::ProjectionError;
use thiserror::Error;
use wms_common::WmsError;

/// Errors that can occur during grid processing.
#[derive(Error, Debug)]
pub enum GridProcessorError {
    /// Failed to read data from the grid.
    #[error("failed to read grid data: {0}")]
    ReadFailed(String),

    /// Invalid metadata in the grid file.
    #[error("invalid grid metadata: {0}")]
    InvalidMetadata(String),

    /// Storage/IO error.
    #[error("storage error: {0}")]
    StorageError(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    ConfigError(String),

    /// Curvilinear grid or look-up table error.
    #[error("projection error: {0}")]
    Projection(#[from] ProjectionError),

    /// Layer, dimension or data location error.
    #[error(transparent)]
    Wms(#[from] WmsError),
}

impl GridProcessorError {
    /// Create a ReadFailed error.
    pub fn read_failed(msg: impl Into<String>) -> Self {
        Self::ReadFailed(msg.into())
    }

    /// Create an InvalidMetadata error.
    pub fn invalid_metadata(msg: impl Into<String>) -> Self {
        Self::InvalidMetadata(msg.into())
    }

    /// Create a ConfigError.
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    /// The underlying WMS error, if this is one (e.g. to map it to an
    /// OGC exception code).
    pub fn as_wms_error(&self) -> Option<&WmsError> {
        match self {
            Self::Wms(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for GridProcessorError {
    fn from(err: std::io::Error) -> Self {
        Self::StorageError(err.to_string())
    }
}

impl From<tokio::task::JoinError> for GridProcessorError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::ReadFailed(format!("blocking task failed: {}", err))
    }
}

/// Result type for grid processor operations.
pub type Result<T> = std::result::Result<T, GridProcessorError>;
