use thiserror::Error;

/// Errors issuing or checking pre-authorization headers.
#[derive(Debug, Error)]
pub enum PreAuthError {
    /// Headers could not be issued.
    #[error("Failed to sign pre-authorization: {0}")]
    Signing(String),

    /// A token payload could not be encoded.
    #[error("Failed to encode pre-authorization: {0}")]
    Encoding(String),

    /// Presented headers are malformed or carry a bad signature.
    #[error("Invalid pre-authorization token: {0}")]
    InvalidToken(String),

    /// Presented headers were valid but have expired.
    #[error("Pre-authorization token expired")]
    Expired,
}
