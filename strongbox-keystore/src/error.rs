//! Error taxonomy.
//!
//! Every operation returns an explicit `ErrorKind`; mapping to HTTP status
//! happens exactly once, at the API boundary. Credential failures are
//! deliberately uniform so callers cannot enumerate client names.

use thiserror::Error;

use crate::types::DekId;

pub type Result<T> = std::result::Result<T, ErrorKind>;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ErrorKind {
    /// Input rejected before any state change. 400.
    #[error("validation failure: {0}")]
    Validation(String),

    /// No usable bearer token presented. 401.
    #[error("authentication required")]
    AuthenticationRequired,

    /// Login failed. Covers unknown name, inactive client, and wrong
    /// secret with one message. 401.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// Token failed verification or expired. 401.
    #[error("invalid or expired token")]
    InvalidToken,

    /// Token was valid but the client has been revoked. 401.
    #[error("client is inactive")]
    InactiveClient,

    /// Authenticated but not allowed. Message lists what was required. 403.
    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// Uniqueness or referential-integrity refusal. 409.
    #[error("conflict: {0}")]
    Conflict(String),

    /// AEAD authentication failed while opening a stored package.
    /// Fatal to the operation, never retried. 500.
    #[error("decryption failed under dek {dek_id}")]
    CryptoFailure { dek_id: DekId },

    /// KMS checksum disagreement. Fatal to the operation. 502.
    #[error("kms transport corruption: {0}")]
    TransportCorruption(String),

    /// KMS call exceeded its deadline. Callers may retry above. 504.
    #[error("kms transport timeout")]
    TransportTimeout,

    /// KMS rejected or mangled a wrap/unwrap for a non-transport reason.
    #[error("kms failure: {0}")]
    Kms(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ErrorKind {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}
