//! Error types for WMS data access.

use thiserror::Error;

/// Result type alias using WmsError.
pub type WmsResult<T> = Result<T, WmsError>;

/// Primary error type for WMS operations.
#[derive(Debug, Error)]
pub enum WmsError {
    #[error("Invalid dimension value: {0}")]
    InvalidDimensionValue(String),

    #[error("{0} exists but is not a valid file on this server")]
    InvalidDataLocation(String),

    #[error("Internal server error: {0}")]
    InternalError(String),
}

impl WmsError {
    /// Create an InvalidDimensionValue error.
    pub fn invalid_dimension(msg: impl Into<String>) -> Self {
        Self::InvalidDimensionValue(msg.into())
    }

    /// Get the OGC WMS exception code for this error.
    pub fn wms_exception_code(&self) -> &'static str {
        match self {
            WmsError::InvalidDimensionValue(_) => "InvalidDimensionValue",
            _ => "NoApplicableCode",
        }
    }

    /// Get the HTTP status code for this error.
    pub fn http_status_code(&self) -> u16 {
        match self {
            WmsError::InvalidDimensionValue(_) => 400,
            _ => 500,
        }
    }
}

impl From<std::io::Error> for WmsError {
    fn from(err: std::io::Error) -> Self {
        WmsError::InternalError(err.to_string())
    }
}
