use ferry_preauth::PreAuthError;
use ferry_storage::StorageError;
use thiserror::Error;

/// Errors returned to the transport layer, each with an HTTP status.
#[derive(Debug, Error)]
pub enum TransferError {
    /// The requested object or resource does not exist.
    #[error("{0}")]
    NotFound(String),

    /// The request was understood but cannot be honored.
    #[error("{0}")]
    InvalidPayload(String),

    /// The caller is authenticated but lacks permission.
    #[error("{0}")]
    Forbidden(String),

    /// The caller could not be authenticated.
    #[error("{0}")]
    Unauthorized(String),

    /// The storage backend failed.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Pre-authorization headers could not be issued or checked.
    #[error(transparent)]
    PreAuth(#[from] PreAuthError),
}

impl TransferError {
    /// HTTP status the transport should respond with.
    pub fn status(&self) -> u16 {
        match self {
            TransferError::NotFound(_) => 404,
            TransferError::InvalidPayload(_) => 422,
            TransferError::Forbidden(_) => 403,
            TransferError::Unauthorized(_) => 401,
            TransferError::Storage(error) => error.code(),
            TransferError::PreAuth(PreAuthError::InvalidToken(_) | PreAuthError::Expired) => 401,
            TransferError::PreAuth(_) => 500,
        }
    }

    pub(crate) fn forbidden() -> Self {
        TransferError::Forbidden("Forbidden".into())
    }
}
