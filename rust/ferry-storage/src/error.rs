use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The serializable form of an error reported for a single object, e.g. in
/// a batch response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorObject {
    /// HTTP-style status code describing the failure.
    pub code: u16,
    /// Human readable description.
    pub message: String,
}

/// Errors produced by storage backends.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The requested object does not exist.
    #[error("Object was not found")]
    ObjectNotFound,

    /// The object exists but is not what the caller expected (e.g. its size
    /// differs).
    #[error("{0}")]
    InvalidObject(String),

    /// The backend failed to carry out an operation.
    #[error("Storage backend error: {0}")]
    Backend(String),

    /// The backend is misconfigured.
    #[error("Storage configuration error: {0}")]
    Configuration(String),

    /// Local I/O failed.
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StorageError {
    /// The HTTP-style status code for this error.
    pub fn code(&self) -> u16 {
        match self {
            StorageError::ObjectNotFound => 404,
            StorageError::InvalidObject(_) => 422,
            StorageError::Backend(_) | StorageError::Configuration(_) | StorageError::Io(_) => 500,
        }
    }

    /// Convert into the structure reported to clients.
    pub fn as_error_object(&self) -> ErrorObject {
        ErrorObject {
            code: self.code(),
            message: self.to_string(),
        }
    }
}

#[cfg(feature = "s3")]
impl From<reqwest::Error> for StorageError {
    fn from(error: reqwest::Error) -> Self {
        StorageError::Backend(error.to_string())
    }
}
